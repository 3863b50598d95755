use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::lock::LockError;
use crate::model::EntityId;

/// Machine-readable error codes for scripted restores and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    FormatError,
    InvalidBackupFormat,
    EmptyBackup,
    LastUser,
    UserNotFound,
    ProcessNotFound,
    StepNotFound,
    UnsupportedImage,
    StoreIo,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::FormatError => "E2001",
            Self::InvalidBackupFormat => "E2002",
            Self::EmptyBackup => "E2003",
            Self::LastUser => "E3001",
            Self::UserNotFound => "E3002",
            Self::ProcessNotFound => "E3003",
            Self::StepNotFound => "E3004",
            Self::UnsupportedImage => "E4001",
            Self::StoreIo => "E5001",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::FormatError => "Unreadable document",
            Self::InvalidBackupFormat => "Invalid backup format",
            Self::EmptyBackup => "Backup has no users",
            Self::LastUser => "At least one profile is required",
            Self::UserNotFound => "Profile not found",
            Self::ProcessNotFound => "Process not found",
            Self::StepNotFound => "Step not found",
            Self::UnsupportedImage => "Unsupported image type",
            Self::StoreIo => "Store I/O failed",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to the operator.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in popo/config.toml and retry."),
            Self::FormatError => Some("Check that the file is valid JSON."),
            Self::InvalidBackupFormat => {
                Some("Use a file produced by `popo backup export` or a legacy profile export.")
            }
            Self::EmptyBackup => Some("Pick a backup that contains at least one profile."),
            Self::LastUser => Some("Add another profile before deleting this one."),
            Self::UserNotFound => Some("Run `popo profile list` to see profile ids."),
            Self::ProcessNotFound => Some("Run `popo process list` to see process ids."),
            Self::StepNotFound => Some("Run `popo process show <id>` to see step ids."),
            Self::UnsupportedImage => Some("Use a .jpg, .jpeg or .png file."),
            Self::StoreIo => Some("Check permissions and free space in the data directory."),
            Self::LockContention => Some("Retry after the other `popo` process finishes."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by document loading, migration, restore and mutation.
///
/// Every variant leaves the previously stored document authoritative: callers
/// only write after an operation has fully succeeded.
#[derive(Debug, thiserror::Error)]
pub enum PopoError {
    /// Input could not be parsed as a document.
    #[error("unreadable document: {0}")]
    Format(String),

    /// Migrated input still lacks a `users` array.
    #[error("Invalid backup format")]
    InvalidBackupFormat,

    /// No usable user in the incoming document.
    #[error("Backup has no users")]
    EmptyBackup,

    /// Deleting this profile would leave the document without users.
    #[error("At least one profile is required")]
    LastUser,

    #[error("profile not found: {0}")]
    UserNotFound(EntityId),

    #[error("process not found: {0}")]
    ProcessNotFound(EntityId),

    #[error("step not found: {0}")]
    StepNotFound(EntityId),

    /// A reorder named a position outside the process's step list. `index`
    /// is zero-based; the message counts from one.
    #[error("no step at position {} (process has {len} steps)", .index + 1)]
    StepPosition { index: usize, len: usize },

    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),

    /// Reading or writing the data directory failed.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

impl PopoError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Format(_) => ErrorCode::FormatError,
            Self::InvalidBackupFormat => ErrorCode::InvalidBackupFormat,
            Self::EmptyBackup => ErrorCode::EmptyBackup,
            Self::LastUser => ErrorCode::LastUser,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::ProcessNotFound(_) => ErrorCode::ProcessNotFound,
            Self::StepNotFound(_) | Self::StepPosition { .. } => ErrorCode::StepNotFound,
            Self::UnsupportedImage(_) => ErrorCode::UnsupportedImage,
            Self::Io(_) => ErrorCode::StoreIo,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::Lock(err) => err.code(),
        }
    }

    /// Remediation hint, falling back to the code's generic message.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.code()
            .hint()
            .unwrap_or_else(|| self.code().message())
            .to_string()
    }
}

impl From<serde_json::Error> for PopoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

pub type Result<T, E = PopoError> = std::result::Result<T, E>;
