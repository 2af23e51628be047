use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("History store not available: {0}")]
    Unavailable(String),
}
