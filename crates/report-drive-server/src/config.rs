use std::time::Duration;

use clap::{ArgAction, Parser};
use report_drive::config::ConfigError;
use report_drive::{
    DEFAULT_AUTH_BASE, DEFAULT_GRAPH_BASE, DEFAULT_GRAPH_BETA_BASE, DEFAULT_SHAREPOINT_HOST,
    DEFAULT_SHAREPOINT_SITE, DriveConfig, OAuthConfig, SharePointSite,
};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "report-drive-server")]
#[command(
    about = "HTTP API that uploads daily reports to OneDrive / SharePoint",
    long_about = None
)]
pub struct Cli {
    #[arg(long, env = "MICROSOFT_CLIENT_ID")]
    pub client_id: Option<String>,
    #[arg(long, env = "MICROSOFT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
    #[arg(long, env = "MICROSOFT_TENANT_ID")]
    pub tenant_id: Option<String>,
    #[arg(long, env = "REDIRECT_URI")]
    pub redirect_uri: Option<String>,
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,
    /// Only users whose address ends in `@<domain>` may sign in.
    #[arg(long, env = "ALLOWED_EMAIL_DOMAIN")]
    pub allowed_email_domain: Option<String>,
    /// Set to an empty string together with `--sharepoint-site ""` to skip the known site.
    #[arg(long, env = "SHAREPOINT_HOST", default_value = DEFAULT_SHAREPOINT_HOST)]
    pub sharepoint_host: String,
    #[arg(long, env = "SHAREPOINT_SITE", default_value = DEFAULT_SHAREPOINT_SITE)]
    pub sharepoint_site: String,
    #[arg(long, env = "GRAPH_BASE_URL", default_value = DEFAULT_GRAPH_BASE)]
    pub graph_base_url: String,
    #[arg(long, env = "GRAPH_BETA_URL", default_value = DEFAULT_GRAPH_BETA_BASE)]
    pub graph_beta_url: String,
    #[arg(long, env = "AUTH_BASE_URL", default_value = DEFAULT_AUTH_BASE)]
    pub auth_base_url: String,
    #[arg(long, env = "COOKIE_SECURE", action = ArgAction::Set, default_value_t = false)]
    pub cookie_secure: bool,
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 60)]
    pub http_timeout_secs: u64,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub allowed_email_domain: Option<String>,
    pub cookie_secure: bool,
    pub max_upload_bytes: usize,
    pub http_timeout: Duration,
    pub oauth: OAuthConfig,
    pub drive: DriveConfig,
}

impl ServerConfig {
    pub fn new(oauth: OAuthConfig, drive: DriveConfig) -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            frontend_url: "http://localhost:3000".into(),
            allowed_email_domain: None,
            cookie_secure: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            http_timeout: Duration::from_secs(60),
            oauth,
            drive,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Cli {
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut oauth = OAuthConfig::new(
            self.tenant_id.unwrap_or_default().trim(),
            self.client_id.unwrap_or_default().trim(),
            self.client_secret.unwrap_or_default().trim(),
            self.redirect_uri.unwrap_or_default().trim(),
        );
        oauth.authority = self.auth_base_url;
        oauth.validate()?;

        let host = self.sharepoint_host.trim();
        let site = self.sharepoint_site.trim();
        let sharepoint = match (host.is_empty(), site.is_empty()) {
            (true, true) => None,
            (false, false) => Some(SharePointSite {
                host: host.to_string(),
                site: site.to_string(),
            }),
            _ => {
                return Err(ConfigError::Invalid {
                    key: "SHAREPOINT_SITE",
                    reason: "SHAREPOINT_HOST and SHAREPOINT_SITE must be set together".into(),
                });
            }
        };
        let drive = DriveConfig {
            graph_base_url: self.graph_base_url,
            graph_beta_url: self.graph_beta_url,
            sharepoint,
        };
        drive.validate()?;

        let frontend_url = self.frontend_url.trim().trim_end_matches('/').to_string();
        if !(frontend_url.starts_with("http://") || frontend_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "FRONTEND_URL",
                reason: format!("expected an absolute http(s) URL, got {frontend_url:?}"),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_UPLOAD_BYTES",
                reason: "must be greater than zero".into(),
            });
        }

        let allowed_email_domain = self
            .allowed_email_domain
            .map(|d| d.trim().trim_start_matches('@').to_string())
            .filter(|d| !d.is_empty());

        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            frontend_url,
            allowed_email_domain,
            cookie_secure: self.cookie_secure,
            max_upload_bytes: self.max_upload_bytes,
            http_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            oauth,
            drive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["report-drive-server"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    const REQUIRED: &[&str] = &[
        "--client-id",
        "client",
        "--client-secret",
        "secret",
        "--tenant-id",
        "tenant",
        "--redirect-uri",
        "http://localhost:3001/auth/callback",
    ];

    #[test]
    fn defaults_match_deployment() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&["--host", "127.0.0.1"]);
        let cfg = parse(&args).into_config().expect("config");
        assert_eq!(cfg.bind_addr(), format!("127.0.0.1:{}", cfg.port));
        assert_eq!(cfg.frontend_url, "http://localhost:3000");
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.drive.sharepoint, Some(SharePointSite::default()));
        assert_eq!(
            cfg.oauth.endpoint_base(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0"
        );
        assert!(!cfg.cookie_secure);
    }

    #[test]
    fn blank_client_secret_is_rejected() {
        let mut args = REQUIRED.to_vec();
        args[3] = "  ";
        let err = parse(&args).into_config().unwrap_err();
        assert_eq!(err, ConfigError::Missing("MICROSOFT_CLIENT_SECRET"));
    }

    #[test]
    fn sharepoint_can_be_disabled() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&["--sharepoint-host", "", "--sharepoint-site", ""]);
        let cfg = parse(&args).into_config().expect("config");
        assert_eq!(cfg.drive.sharepoint, None);
    }

    #[test]
    fn half_configured_sharepoint_is_rejected() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&["--sharepoint-site", ""]);
        assert!(matches!(
            parse(&args).into_config(),
            Err(ConfigError::Invalid { key: "SHAREPOINT_SITE", .. })
        ));
    }

    #[test]
    fn domain_and_frontend_are_normalised() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&[
            "--allowed-email-domain",
            "@kaymet.com",
            "--frontend-url",
            "https://reports.example.com/",
            "--cookie-secure",
            "true",
        ]);
        let cfg = parse(&args).into_config().expect("config");
        assert_eq!(cfg.allowed_email_domain.as_deref(), Some("kaymet.com"));
        assert_eq!(cfg.frontend_url, "https://reports.example.com");
        assert!(cfg.cookie_secure);
    }
}
