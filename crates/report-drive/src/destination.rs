//! Upload-destination resolution.
//!
//! A report goes to the first storage location that accepts it, tried in
//! order: the user's personal drive, the configured SharePoint site (under
//! three address formats), then every site the user can reach. Each
//! candidate drive gets the date folder created on demand before the upload.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{DriveConfig, SharePointSite};
use crate::graph::{Collection, Drive, DriveItem, GraphClient, Site};
use crate::naming::{encode_path, validate_file_name};
use crate::upload::{Attempt, UploadError, upload_item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    PersonalDrive,
    KnownSite,
    AnySite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub kind: DestinationKind,
    pub drive_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub original_file_name: Option<String>,
    pub report_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub destination: Destination,
    pub folder: String,
    pub item: DriveItem,
}

/// Ways of addressing the known SharePoint site, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteAddress {
    CompositeId,
    ServerRelative,
    BetaServerRelative,
}

impl SiteAddress {
    const ALL: [SiteAddress; 3] = [
        SiteAddress::CompositeId,
        SiteAddress::ServerRelative,
        SiteAddress::BetaServerRelative,
    ];

    fn site_path(self, client: &GraphClient<'_>, site: &SharePointSite) -> String {
        match self {
            SiteAddress::CompositeId => format!("/sites/{},sites,{}", site.host, site.site),
            SiteAddress::ServerRelative => format!("/sites/{}:/sites/{}:/", site.host, site.site),
            SiteAddress::BetaServerRelative => {
                format!("{}/sites/{}:/sites/{}", client.beta_url(), site.host, site.site)
            }
        }
    }

    fn drives_path(self, client: &GraphClient<'_>, site_id: &str) -> String {
        match self {
            SiteAddress::BetaServerRelative => {
                format!("{}/sites/{site_id}/drives", client.beta_url())
            }
            _ => format!("/sites/{site_id}/drives"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            SiteAddress::CompositeId => "composite id",
            SiteAddress::ServerRelative => "server-relative path",
            SiteAddress::BetaServerRelative => "beta server-relative path",
        }
    }
}

pub fn resolve_and_upload(
    client: &GraphClient<'_>,
    cfg: &DriveConfig,
    request: &UploadRequest,
    folder: &str,
) -> Result<UploadReceipt, UploadError> {
    let file_name = validate_file_name(&request.file_name)?;
    info!(
        file_name = %file_name,
        folder,
        size = request.bytes.len(),
        original_file_name = request.metadata.original_file_name.as_deref().unwrap_or(""),
        report_name = request.metadata.report_name.as_deref().unwrap_or(""),
        "resolving upload destination"
    );
    let bytes = request.bytes.as_slice();
    let mut attempts = Vec::new();

    match personal_drive(client).and_then(|drive_id| {
        place(client, &drive_id, folder, &file_name, bytes).map(|item| (drive_id, item))
    }) {
        Ok((drive_id, item)) => {
            info!(drive_id = %drive_id, "uploaded to personal drive");
            return Ok(receipt(DestinationKind::PersonalDrive, drive_id, None, folder, item));
        }
        Err(err) => {
            warn!(error = %err, "personal drive upload failed, trying SharePoint");
            attempts.push(Attempt {
                label: "personal drive".into(),
                error: err.to_string(),
            });
        }
    }

    if let Some(site) = &cfg.sharepoint {
        for address in SiteAddress::ALL {
            let label = format!("SharePoint {}/{} ({})", site.host, site.site, address.label());
            match known_site_drive(client, site, address).and_then(|drive_id| {
                place(client, &drive_id, folder, &file_name, bytes).map(|item| (drive_id, item))
            }) {
                Ok((drive_id, item)) => {
                    info!(
                        drive_id = %drive_id,
                        address = address.label(),
                        "uploaded to SharePoint site"
                    );
                    return Ok(receipt(
                        DestinationKind::KnownSite,
                        drive_id,
                        Some(site.site.clone()),
                        folder,
                        item,
                    ));
                }
                Err(err) => {
                    warn!(error = %err, address = address.label(), "SharePoint address failed");
                    attempts.push(Attempt {
                        label,
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    info!("trying every accessible site");
    match any_site(client, folder, &file_name, bytes, &mut attempts) {
        Ok(Some(receipt)) => Ok(receipt),
        Ok(None) => Err(UploadError::Exhausted { attempts }),
        Err(err) => {
            attempts.push(Attempt {
                label: "accessible sites".into(),
                error: err.to_string(),
            });
            Err(UploadError::Exhausted { attempts })
        }
    }
}

/// Creates `name` at the drive root unless it already resolves.
pub fn ensure_folder(
    client: &GraphClient<'_>,
    drive_id: &str,
    name: &str,
) -> Result<(), UploadError> {
    let lookup = format!("/drives/{drive_id}/root:/{}", encode_path(&[name]));
    match client.get_json(&lookup) {
        Ok(_) => {
            debug!(folder = name, "folder already exists");
            return Ok(());
        }
        Err(err) => debug!(folder = name, error = %err, "folder lookup failed, creating"),
    }
    let body = json!({
        "name": name,
        "folder": {},
        "@microsoft.graph.conflictBehavior": "replace"
    });
    client.post_json(&format!("/drives/{drive_id}/root/children"), &body)?;
    info!(folder = name, drive_id, "folder created");
    Ok(())
}

fn personal_drive(client: &GraphClient<'_>) -> Result<String, UploadError> {
    let drive: Drive = client.get("/me/drive")?;
    Ok(drive.id)
}

fn known_site_drive(
    client: &GraphClient<'_>,
    site: &SharePointSite,
    address: SiteAddress,
) -> Result<String, UploadError> {
    let resolved: Site = client.get(&address.site_path(client, site))?;
    let label = format!("site {}", resolved.label());
    first_drive(client, &address.drives_path(client, &resolved.id), &label)
}

fn any_site(
    client: &GraphClient<'_>,
    folder: &str,
    file_name: &str,
    bytes: &[u8],
    attempts: &mut Vec<Attempt>,
) -> Result<Option<UploadReceipt>, UploadError> {
    let sites: Collection<Site> = client.get("/sites?search=*")?;
    if sites.value.is_empty() {
        return Err(UploadError::NoSites);
    }
    for site in &sites.value {
        let label = format!("site {}", site.label());
        debug!(site = site.label(), "trying site");
        let outcome = first_drive(client, &format!("/sites/{}/drives", site.id), &label)
            .and_then(|drive_id| {
                place(client, &drive_id, folder, file_name, bytes).map(|item| (drive_id, item))
            });
        match outcome {
            Ok((drive_id, item)) => {
                info!(site = site.label(), drive_id = %drive_id, "uploaded to accessible site");
                return Ok(Some(receipt(
                    DestinationKind::AnySite,
                    drive_id,
                    Some(site.label().to_string()),
                    folder,
                    item,
                )));
            }
            Err(err) => {
                warn!(site = site.label(), error = %err, "site upload failed");
                attempts.push(Attempt {
                    label,
                    error: err.to_string(),
                });
            }
        }
    }
    Ok(None)
}

fn first_drive(client: &GraphClient<'_>, path: &str, label: &str) -> Result<String, UploadError> {
    let drives: Collection<Drive> = client.get(path)?;
    drives
        .value
        .into_iter()
        .next()
        .map(|drive| drive.id)
        .ok_or_else(|| UploadError::NoDrives(label.to_string()))
}

fn place(
    client: &GraphClient<'_>,
    drive_id: &str,
    folder: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<DriveItem, UploadError> {
    ensure_folder(client, drive_id, folder)?;
    upload_item(
        client,
        &format!("/drives/{drive_id}/root"),
        &encode_path(&[folder, file_name]),
        bytes,
    )
}

fn receipt(
    kind: DestinationKind,
    drive_id: String,
    site_name: Option<String>,
    folder: &str,
    item: DriveItem,
) -> UploadReceipt {
    UploadReceipt {
        destination: Destination {
            kind,
            drive_id,
            site_name,
        },
        folder: folder.to_string(),
        item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;

    #[test]
    fn existing_folder_is_not_recreated() {
        let transport = ScriptedTransport::new();
        transport.respond("GET", "/drives/d1/root:/07-03-2024", 200, r#"{"id":"f"}"#);
        let cfg = DriveConfig::default();
        let client = GraphClient::new(&transport, "tok", &cfg);
        ensure_folder(&client, "d1", "07-03-2024").unwrap();
        assert_eq!(transport.count("POST", "/drives/d1/root/children"), 0);
    }

    #[test]
    fn missing_folder_is_created_with_replace() {
        let transport = ScriptedTransport::new();
        transport.respond("POST", "/drives/d1/root/children", 201, r#"{"id":"f"}"#);
        let cfg = DriveConfig::default();
        let client = GraphClient::new(&transport, "tok", &cfg);
        ensure_folder(&client, "d1", "07-03-2024").unwrap();
        let post = transport
            .calls()
            .into_iter()
            .find(|c| c.method == "POST")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&post.body.unwrap()).unwrap();
        assert_eq!(body["name"], "07-03-2024");
        assert_eq!(body["@microsoft.graph.conflictBehavior"], "replace");
        assert!(body["folder"].is_object());
    }

    #[test]
    fn folder_creation_failure_propagates() {
        let transport = ScriptedTransport::new();
        transport.respond("POST", "/drives/d1/root/children", 403, "denied");
        let cfg = DriveConfig::default();
        let client = GraphClient::new(&transport, "tok", &cfg);
        assert!(ensure_folder(&client, "d1", "x").is_err());
    }

    #[test]
    fn site_address_formats() {
        let transport = ScriptedTransport::new();
        let cfg = DriveConfig::default();
        let client = GraphClient::new(&transport, "tok", &cfg);
        let site = SharePointSite::default();
        assert_eq!(
            SiteAddress::CompositeId.site_path(&client, &site),
            "/sites/kaymet365.sharepoint.com,sites,dailyreports"
        );
        assert_eq!(
            SiteAddress::ServerRelative.site_path(&client, &site),
            "/sites/kaymet365.sharepoint.com:/sites/dailyreports:/"
        );
        assert_eq!(
            SiteAddress::BetaServerRelative.site_path(&client, &site),
            "https://graph.microsoft.com/beta/sites/kaymet365.sharepoint.com:/sites/dailyreports"
        );
        assert_eq!(
            SiteAddress::BetaServerRelative.drives_path(&client, "s1"),
            "https://graph.microsoft.com/beta/sites/s1/drives"
        );
        assert_eq!(
            SiteAddress::CompositeId.drives_path(&client, "s1"),
            "/sites/s1/drives"
        );
    }
}
