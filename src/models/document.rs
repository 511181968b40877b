use serde::{Deserialize, Serialize};

/// Snapshot of an open editor document as seen by the host. The embedding
/// shell constructs these from its editor API and hands them to the index
/// and view components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// URI scheme, e.g. "file", "untitled", "output".
    pub scheme: String,
    /// Absolute, OS-native path for on-disk documents.
    pub path: String,
    /// Current number of lines in the editor buffer.
    pub line_count: u32,
}

impl Document {
    pub fn on_disk(path: impl Into<String>, line_count: u32) -> Document {
        Document {
            scheme: "file".to_string(),
            path: path.into(),
            line_count,
        }
    }

    /// Only on-disk documents correspond to real debt records. Virtual and
    /// output-channel documents churn frequently and are rejected before any
    /// network call.
    pub fn is_on_disk(&self) -> bool {
        self.scheme == "file"
    }
}
