use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} record not found: {id}")]
    NotFound { table: &'static str, id: String },

    #[error("{table} record already exists: {id}")]
    AlreadyExists { table: &'static str, id: String },

    #[error("table missing: {0}")]
    MissingTable(&'static str),

    #[error("store version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed store document: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoercionError {
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("name is required")]
    NameRequired,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("key \"occurredAt\" is reserved")]
    ReservedKey,

    #[error("missing required field: {0}")]
    MissingRequired(String),

    #[error("unknown activity: {0}")]
    UnknownActivity(String),
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid backup file")]
    Invalid,

    #[error("backup is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::not_found(err.to_string()),
            StoreError::AlreadyExists { .. } => Self::conflict(err.to_string()),
            other => {
                tracing::error!(error = %other, "store error");
                Self::internal(other)
            }
        }
    }
}

impl From<CoercionError> for AppError {
    fn from(err: CoercionError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::Invalid | BackupError::Parse(_) => Self::bad_request(err.to_string()),
            BackupError::Store(store) => store.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
