mod records;
mod repository;

pub use records::{RecentFiles, Settings};
pub use repository::Store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode state record: {0}")]
    Encode(#[from] serde_json::Error),
}
