use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One open file as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
    pub path: PathBuf,
    pub scroll_position: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<String>,
}

/// The files open at save time, in tab order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub files: Vec<SessionFile>,
}

impl SessionSnapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn scroll_position_of(&self, path: &std::path::Path) -> Option<u64> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.scroll_position)
    }
}
