use tracing::{info, warn};

use crate::graph::{Collection, Drive, DriveItem, GraphClient, GraphError};

pub const RECENT_FILES_LIMIT: usize = 20;

fn children_query() -> String {
    format!(
        "$select=id,name,webUrl,createdDateTime,size&$orderby=createdDateTime%20desc&$top={RECENT_FILES_LIMIT}"
    )
}

/// Newest items at the root of the user's first drive, falling back to the
/// personal drive. Returns an empty list when neither can be read.
pub fn recent_files(client: &GraphClient<'_>) -> Vec<DriveItem> {
    match first_drive_children(client) {
        Ok(files) => {
            info!(count = files.len(), "retrieved files from drive");
            return files;
        }
        Err(err) => warn!(error = %err, "failed to get files from user drives"),
    }
    let path = format!("/me/drive/root/children?{}", children_query());
    match client.get::<Collection<DriveItem>>(&path) {
        Ok(files) => {
            info!(count = files.value.len(), "retrieved files from personal drive");
            files.value
        }
        Err(err) => {
            warn!(error = %err, "failed to get files from personal drive");
            Vec::new()
        }
    }
}

fn first_drive_children(client: &GraphClient<'_>) -> Result<Vec<DriveItem>, GraphError> {
    let drives: Collection<Drive> = client.get("/me/drives")?;
    let Some(drive) = drives.value.into_iter().next() else {
        return Err(GraphError::Decode("no drives found for user".into()));
    };
    let path = format!("/drives/{}/root/children?{}", drive.id, children_query());
    let files: Collection<DriveItem> = client.get(&path)?;
    Ok(files.value)
}
