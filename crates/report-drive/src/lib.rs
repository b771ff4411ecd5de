//! Upload daily report files into OneDrive / SharePoint through Microsoft Graph.
//!
//! The crate is blocking and transport-agnostic: every network call goes
//! through [`transport::HttpTransport`], with [`transport::UreqTransport`] as
//! the production implementation.

pub mod auth;
pub mod config;
pub mod destination;
pub mod files;
pub mod graph;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod naming;
pub mod transport;
pub mod upload;

pub use auth::{AuthError, OAuthClient, TokenSet};
pub use config::{ConfigError, DriveConfig, OAuthConfig, SharePointSite};
pub use destination::{Destination, DestinationKind, ReportMetadata, UploadReceipt, UploadRequest};
pub use graph::{DriveItem, GraphClient, GraphError};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError, UreqTransport};
pub use upload::UploadError;

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_GRAPH_BETA_BASE: &str = "https://graph.microsoft.com/beta";
pub const DEFAULT_AUTH_BASE: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SHAREPOINT_HOST: &str = "kaymet365.sharepoint.com";
pub const DEFAULT_SHAREPOINT_SITE: &str = "dailyreports";
