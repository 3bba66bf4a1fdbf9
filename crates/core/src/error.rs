use serde::Serialize;
use std::path::PathBuf;

/// Fatal errors: the archive as a whole cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to open archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip central directory is unreadable.
    #[error("corrupt archive {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Errors local to a single archive entry. These never abort a run; they
/// are converted into [`Diagnostic`]s and the entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("missing mandatory field '{field}'")]
    MissingField { field: &'static str },

    #[error("entry is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("entry is not valid UTF-8")]
    NotUtf8,

    #[error("unreadable entry: {0}")]
    Unreadable(String),
}

/// Category of a non-fatal condition recorded during a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    EntryReadFailure,
    EntryParseFailure,
    StructuralShapeMismatch,
    DuplicateIdentifier,
    OrphanFlow,
    UnreachableNode,
}

impl DiagnosticKind {
    /// True for kinds that mean the entry produced no entity.
    pub fn is_entry_failure(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::EntryReadFailure | DiagnosticKind::EntryParseFailure
        )
    }
}

/// A non-fatal condition, returned alongside the primary result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, path: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            path: path.to_owned(),
            object_id: None,
            message: message.into(),
        }
    }

    pub fn for_object(mut self, object_id: &str) -> Self {
        self.object_id = Some(object_id.to_owned());
        self
    }

    pub fn from_entry_error(path: &str, error: &EntryError) -> Self {
        let kind = match error {
            EntryError::MalformedXml(_) | EntryError::MissingField { .. } => {
                DiagnosticKind::EntryParseFailure
            }
            EntryError::TooLarge { .. } | EntryError::NotUtf8 | EntryError::Unreadable(_) => {
                DiagnosticKind::EntryReadFailure
            }
        };
        Diagnostic::new(kind, path, error.to_string())
    }
}
