use std::fmt::{self, Display};

use serde::Serialize;
use thiserror::Error;
use warp::reject::{Reject, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    InvalidSession,
    Forbidden,
    NotFound,
    MethodNotAllowed,
}

impl HtmlError {
    pub fn new(self, info: &str) -> Error {
        Error::Http {
            kind: self,
            info: info.to_string(),
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::Unauthorized => "Authentication credentials were not provided",
            HtmlError::InvalidSession => "Invalid session",
            HtmlError::Forbidden => "You don't have permission to perform this action",
            HtmlError::NotFound => "Not found",
            HtmlError::MethodNotAllowed => "Method not allowed",
        };
        self.new(info)
    }

    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized | HtmlError::InvalidSession => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
        }
    }
}

impl Display for HtmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::Unauthorized => "Unauthorized",
            HtmlError::InvalidSession => "Invalid session",
            HtmlError::Forbidden => "Forbidden",
            HtmlError::NotFound => "Not found",
            HtmlError::MethodNotAllowed => "Method not allowed",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind}: {info}")]
    Http { kind: HtmlError, info: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] QueryError),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    #[error("Missing resource {name}: {info}")]
    MissingResource { name: String, info: String },

    #[error("Failed to render document: {0}")]
    Render(String),

    #[error("Amount overflow while summing {name} ({measurement_unit})")]
    AmountOverflow {
        name: String,
        measurement_unit: String,
    },

    #[error("Environment misconfigured: {0}")]
    Config(String),
}

impl Error {
    pub fn code(&self) -> u16 {
        match self {
            Error::Http { kind, .. } => kind.code(),
            Error::StorageUnavailable(_) | Error::CacheUnavailable(_) => 503,
            Error::MissingResource { .. }
            | Error::Render(_)
            | Error::AmountOverflow { .. }
            | Error::Config(_) => 500,
        }
    }

    /// Message safe to hand back to a client; server-side failures stay generic.
    pub fn public_info(&self) -> String {
        match self {
            Error::Http { info, .. } => info.to_owned(),
            Error::StorageUnavailable(_) | Error::CacheUnavailable(_) => {
                String::from("Service temporarily unavailable")
            }
            _ => String::from("Internal server error"),
        }
    }

    pub fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

impl Reject for Error {}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

#[derive(Error, Debug)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

#[derive(Error, Debug)]
#[error("{info}")]
pub struct CacheError {
    info: String,
}

impl CacheError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self::new(format!("{:?} - {:?}", value.code(), value.detail()))
    }
}

impl From<redis::RedisError> for Error {
    fn from(value: redis::RedisError) -> Self {
        CacheError::from(value).into()
    }
}

/// Body of every error reply, `{"errors": "..."}`.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub errors: String,
}
