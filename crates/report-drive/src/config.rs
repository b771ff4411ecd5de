use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    DEFAULT_AUTH_BASE, DEFAULT_GRAPH_BASE, DEFAULT_GRAPH_BETA_BASE, DEFAULT_SHAREPOINT_HOST,
    DEFAULT_SHAREPOINT_SITE,
};

pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "profile",
    "email",
    "offline_access",
    "https://graph.microsoft.com/.default",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authority: default_authority(),
            scopes: default_scopes(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.tenant_id, "MICROSOFT_TENANT_ID")?;
        require(&self.client_id, "MICROSOFT_CLIENT_ID")?;
        require(&self.client_secret, "MICROSOFT_CLIENT_SECRET")?;
        require(&self.redirect_uri, "REDIRECT_URI")?;
        require_absolute_url(&self.redirect_uri, "REDIRECT_URI")?;
        require_absolute_url(&self.authority, "AUTH_BASE_URL")?;
        if self.scopes.is_empty() {
            return Err(ConfigError::Invalid {
                key: "scopes",
                reason: "at least one scope is required".into(),
            });
        }
        Ok(())
    }

    /// `{authority}/{tenant}/oauth2/v2.0`
    pub fn endpoint_base(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0",
            self.authority.trim_end_matches('/'),
            self.tenant_id.trim_matches('/')
        )
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharePointSite {
    pub host: String,
    pub site: String,
}

impl Default for SharePointSite {
    fn default() -> Self {
        Self {
            host: DEFAULT_SHAREPOINT_HOST.to_string(),
            site: DEFAULT_SHAREPOINT_SITE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    #[serde(default = "default_graph_base")]
    pub graph_base_url: String,
    #[serde(default = "default_graph_beta_base")]
    pub graph_beta_url: String,
    #[serde(default)]
    pub sharepoint: Option<SharePointSite>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base(),
            graph_beta_url: default_graph_beta_base(),
            sharepoint: Some(SharePointSite::default()),
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_absolute_url(&self.graph_base_url, "GRAPH_BASE_URL")?;
        require_absolute_url(&self.graph_beta_url, "GRAPH_BETA_URL")?;
        if let Some(site) = &self.sharepoint {
            require(&site.host, "SHAREPOINT_HOST")?;
            require(&site.site, "SHAREPOINT_SITE")?;
            if site.host.contains('/') || site.site.contains('/') {
                return Err(ConfigError::Invalid {
                    key: "SHAREPOINT_SITE",
                    reason: "host and site name must not contain '/'".into(),
                });
            }
        }
        Ok(())
    }
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(())
}

fn require_absolute_url(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be an absolute URL".into(),
        });
    }
    Ok(())
}

fn default_authority() -> String {
    DEFAULT_AUTH_BASE.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
}

fn default_graph_base() -> String {
    DEFAULT_GRAPH_BASE.to_string()
}

fn default_graph_beta_base() -> String {
    DEFAULT_GRAPH_BETA_BASE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthConfig {
        OAuthConfig::new("tenant", "client", "secret", "http://localhost:3001/auth/callback")
    }

    #[test]
    fn oauth_defaults_validate() {
        let cfg = oauth();
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.endpoint_base(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0"
        );
        assert!(cfg.scope_param().contains("offline_access"));
    }

    #[test]
    fn blank_client_secret_is_missing() {
        let mut cfg = oauth();
        cfg.client_secret = "  ".into();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Missing("MICROSOFT_CLIENT_SECRET"))
        );
    }

    #[test]
    fn relative_redirect_is_rejected() {
        let mut cfg = oauth();
        cfg.redirect_uri = "/auth/callback".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("REDIRECT_URI"));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let raw = r#"{"graph_base_url":"https://graph.microsoft.com/v1.0","unexpected":true}"#;
        let err = serde_json::from_str::<DriveConfig>(raw).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn drive_defaults_include_sharepoint_site() {
        let cfg: DriveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.graph_base_url, DEFAULT_GRAPH_BASE);
        assert_eq!(cfg.sharepoint, None);
        let cfg = DriveConfig::default();
        assert_eq!(cfg.sharepoint, Some(SharePointSite::default()));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sharepoint_site_with_slash_is_invalid() {
        let cfg = DriveConfig {
            sharepoint: Some(SharePointSite {
                host: "contoso.sharepoint.com".into(),
                site: "sites/reports".into(),
            }),
            ..DriveConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
