use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid key: {0}")]
    InvalidKeyKind(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Decode error: {0}")]
    Codec(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, MapError>;

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<sqlx::Error> for MapError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_error) => Self::Storage(match db_error.code() {
                Some(code) => format!("{} (SQLSTATE {})", db_error.message(), code),
                None => db_error.message().to_string(),
            }),
            other => Self::Storage(other.to_string()),
        }
    }
}
