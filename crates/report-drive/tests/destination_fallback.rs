use anyhow::Result;
use report_drive::destination::{DestinationKind, resolve_and_upload};
use report_drive::mock::ScriptedTransport;
use report_drive::upload::SIMPLE_UPLOAD_LIMIT;
use report_drive::{DriveConfig, GraphClient, ReportMetadata, UploadError, UploadRequest};

const FOLDER: &str = "07-03-2024";
const ITEM: &str = r#"{"id":"item-9","name":"Daily Report.pdf","webUrl":"https://contoso/Daily%20Report.pdf","size":5}"#;
const BETA: &str = "https://graph.microsoft.com/beta";

fn request(bytes: Vec<u8>) -> UploadRequest {
    UploadRequest {
        file_name: "Daily Report.pdf".into(),
        bytes,
        metadata: ReportMetadata {
            original_file_name: Some("scan_001.pdf".into()),
            report_name: Some("Daily Report.pdf".into()),
        },
    }
}

fn without_sharepoint() -> DriveConfig {
    DriveConfig {
        sharepoint: None,
        ..DriveConfig::default()
    }
}

#[test]
fn personal_drive_wins_and_creates_folder() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 200, r#"{"id":"me-d"}"#)
        .respond("POST", "/drives/me-d/root/children", 201, r#"{"id":"folder"}"#)
        .respond(
            "PUT",
            "/drives/me-d/root:/07-03-2024/Daily%20Report.pdf:/content",
            201,
            ITEM,
        );
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let receipt = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER)?;
    assert_eq!(receipt.destination.kind, DestinationKind::PersonalDrive);
    assert_eq!(receipt.destination.drive_id, "me-d");
    assert_eq!(receipt.folder, FOLDER);
    assert_eq!(receipt.item.id, "item-9");
    assert_eq!(
        transport.call_log(),
        vec![
            "GET https://graph.microsoft.com/v1.0/me/drive",
            "GET https://graph.microsoft.com/v1.0/drives/me-d/root:/07-03-2024",
            "POST https://graph.microsoft.com/v1.0/drives/me-d/root/children",
            "PUT https://graph.microsoft.com/v1.0/drives/me-d/root:/07-03-2024/Daily%20Report.pdf:/content",
        ]
    );
    Ok(())
}

#[test]
fn known_site_composite_id_is_next() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 403, r#"{"error":{"code":"accessDenied"}}"#)
        .respond(
            "GET",
            "/v1.0/sites/kaymet365.sharepoint.com,sites,dailyreports",
            200,
            r#"{"id":"site-1","displayName":"Daily Reports"}"#,
        )
        .respond(
            "GET",
            "/v1.0/sites/site-1/drives",
            200,
            r#"{"value":[{"id":"sp-d"},{"id":"other"}]}"#,
        )
        .respond("GET", "/drives/sp-d/root:/07-03-2024", 200, r#"{"id":"folder"}"#)
        .respond(
            "PUT",
            "/drives/sp-d/root:/07-03-2024/Daily%20Report.pdf:/content",
            201,
            ITEM,
        );
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let receipt = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER)?;
    assert_eq!(receipt.destination.kind, DestinationKind::KnownSite);
    assert_eq!(receipt.destination.drive_id, "sp-d");
    assert_eq!(receipt.destination.site_name.as_deref(), Some("dailyreports"));
    assert_eq!(transport.count("POST", "/root/children"), 0);
    Ok(())
}

#[test]
fn beta_address_is_last_known_site_format() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 401, "")
        .respond(
            "GET",
            &format!("{BETA}/sites/kaymet365.sharepoint.com:/sites/dailyreports"),
            200,
            r#"{"id":"site-b"}"#,
        )
        .respond(
            "GET",
            &format!("{BETA}/sites/site-b/drives"),
            200,
            r#"{"value":[{"id":"beta-d"}]}"#,
        )
        .respond("GET", "/drives/beta-d/root:/07-03-2024", 200, "{}")
        .respond("PUT", "/drives/beta-d/root:/07-03-2024/Daily%20Report.pdf:/content", 200, ITEM);
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let receipt = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER)?;
    assert_eq!(receipt.destination.drive_id, "beta-d");
    let log = transport.call_log();
    assert!(log.contains(
        &"GET https://graph.microsoft.com/v1.0/sites/kaymet365.sharepoint.com,sites,dailyreports"
            .to_string()
    ));
    assert!(log.contains(
        &"GET https://graph.microsoft.com/v1.0/sites/kaymet365.sharepoint.com:/sites/dailyreports:/"
            .to_string()
    ));
    Ok(())
}

#[test]
fn site_without_drives_moves_to_next_format() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 403, "")
        .respond(
            "GET",
            "/v1.0/sites/kaymet365.sharepoint.com,sites,dailyreports",
            200,
            r#"{"id":"site-1"}"#,
        )
        .respond("GET", "/v1.0/sites/site-1/drives", 200, r#"{"value":[]}"#)
        .respond(
            "GET",
            "/v1.0/sites/kaymet365.sharepoint.com:/sites/dailyreports:/",
            200,
            r#"{"id":"site-2"}"#,
        )
        .respond("GET", "/v1.0/sites/site-2/drives", 200, r#"{"value":[{"id":"d2"}]}"#)
        .respond("GET", "/drives/d2/root:/07-03-2024", 200, "{}")
        .respond("PUT", "/drives/d2/root:/07-03-2024/Daily%20Report.pdf:/content", 201, ITEM);
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let receipt = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER)?;
    assert_eq!(receipt.destination.kind, DestinationKind::KnownSite);
    assert_eq!(receipt.destination.drive_id, "d2");
    Ok(())
}

#[test]
fn any_site_walks_sites_in_order() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 403, "")
        .respond(
            "GET",
            "/v1.0/sites",
            200,
            r#"{"value":[{"id":"s1","displayName":"First"},{"id":"s2","displayName":"Second"}]}"#,
        )
        .respond("GET", "/v1.0/sites/s1/drives", 200, r#"{"value":[{"id":"d1"}]}"#)
        .respond("POST", "/drives/d1/root/children", 403, "read only")
        .respond("GET", "/v1.0/sites/s2/drives", 200, r#"{"value":[{"id":"d2"}]}"#)
        .respond("GET", "/drives/d2/root:/07-03-2024", 200, "{}")
        .respond("PUT", "/drives/d2/root:/07-03-2024/Daily%20Report.pdf:/content", 201, ITEM);
    let cfg = without_sharepoint();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let receipt = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER)?;
    assert_eq!(receipt.destination.kind, DestinationKind::AnySite);
    assert_eq!(receipt.destination.site_name.as_deref(), Some("Second"));
    let sites_call = transport
        .calls()
        .into_iter()
        .find(|c| c.url.contains("/sites?"))
        .map(|c| c.url);
    assert_eq!(
        sites_call.as_deref(),
        Some("https://graph.microsoft.com/v1.0/sites?search=*")
    );
    Ok(())
}

#[test]
fn exhausted_reports_every_attempt() {
    let transport = ScriptedTransport::new();
    transport.respond("GET", "/me/drive", 403, "denied");
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let err = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER).unwrap_err();
    let attempts = match err {
        UploadError::Exhausted { attempts } => attempts,
        other => panic!("expected exhausted, got {other:?}"),
    };
    let labels: Vec<_> = attempts.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "personal drive",
            "SharePoint kaymet365.sharepoint.com/dailyreports (composite id)",
            "SharePoint kaymet365.sharepoint.com/dailyreports (server-relative path)",
            "SharePoint kaymet365.sharepoint.com/dailyreports (beta server-relative path)",
            "accessible sites",
        ]
    );
    assert!(attempts[0].error.contains("403"));
}

#[test]
fn no_sites_is_reported() {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 403, "")
        .respond("GET", "/v1.0/sites", 200, r#"{"value":[]}"#);
    let cfg = without_sharepoint();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let err = resolve_and_upload(&client, &cfg, &request(b"hello".to_vec()), FOLDER).unwrap_err();
    let attempts = match err {
        UploadError::Exhausted { attempts } => attempts,
        other => panic!("expected exhausted, got {other:?}"),
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].error, "no SharePoint sites found");
}

#[test]
fn invalid_name_is_rejected_before_any_call() {
    let transport = ScriptedTransport::new();
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);
    let mut req = request(b"x".to_vec());
    req.file_name = "bad:name.pdf".into();

    let err = resolve_and_upload(&client, &cfg, &req, FOLDER).unwrap_err();
    assert!(matches!(err, UploadError::Name(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn large_report_goes_through_upload_session() -> Result<()> {
    let transport = ScriptedTransport::new();
    transport
        .respond("GET", "/me/drive", 200, r#"{"id":"me-d"}"#)
        .respond("GET", "/drives/me-d/root:/07-03-2024", 200, "{}")
        .respond(
            "POST",
            "/drives/me-d/root:/07-03-2024/Daily%20Report.pdf:/createUploadSession",
            200,
            r#"{"uploadUrl":"https://upload.invalid/big"}"#,
        )
        .respond("PUT", "https://upload.invalid/big", 202, "{}")
        .respond("PUT", "https://upload.invalid/big", 202, "{}")
        .respond("PUT", "https://upload.invalid/big", 201, ITEM);
    let cfg = DriveConfig::default();
    let client = GraphClient::new(&transport, "tok", &cfg);

    let bytes = vec![1u8; SIMPLE_UPLOAD_LIMIT * 2];
    let receipt = resolve_and_upload(&client, &cfg, &request(bytes), FOLDER)?;
    assert_eq!(receipt.item.id, "item-9");
    assert_eq!(transport.count("PUT", "https://upload.invalid/big"), 3);
    assert_eq!(transport.count("PUT", ":/content"), 0);
    Ok(())
}
