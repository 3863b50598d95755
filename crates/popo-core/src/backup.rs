//! Backup export. Import goes through [`crate::migrate::parse_backup`] and
//! [`crate::restore::restore`].

use serde::Serialize;

use crate::error::Result;
use crate::model::{Document, User};

/// Default file name offered for a whole-document backup.
pub const BACKUP_FILE_NAME: &str = "popo2-backup.json";

/// An exported backup, ready to be written wherever the operator chooses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub file_name: String,
    pub content: String,
}

/// Serialize the whole document.
///
/// # Errors
///
/// Fails only if the document cannot be encoded.
pub fn export_all(document: &Document) -> Result<BackupFile> {
    Ok(BackupFile {
        file_name: BACKUP_FILE_NAME.to_string(),
        content: serde_json::to_string_pretty(document)?,
    })
}

/// Serialize one profile as a single-user document that any restore mode
/// accepts.
///
/// # Errors
///
/// Fails only if the projection cannot be encoded.
pub fn export_profile(document: &Document, user: &User) -> Result<BackupFile> {
    let projection = document.profile_projection(user);
    Ok(BackupFile {
        file_name: profile_file_name(user),
        content: serde_json::to_string_pretty(&projection)?,
    })
}

/// `profile-<name>.json`, with path separators replaced so the name is
/// always a single file.
fn profile_file_name(user: &User) -> String {
    let name = user.name().trim();
    let name = if name.is_empty() { "user" } else { name };
    let safe: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("profile-{safe}.json")
}
