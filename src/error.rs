use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no timer at index {index} (registry holds {len})")]
    NoSuchTimer { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("could not create archive directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}
