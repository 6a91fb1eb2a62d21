use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict error: {0}")]
    ConflictError(String),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::InternalError(err.to_string())
    }
}

impl ResponseError for CatalogError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::ValidationError(_) => HttpResponse::BadRequest().json(self.to_string()),
            Self::ConflictError(_) => HttpResponse::Conflict().json(self.to_string()),
            Self::NotFound(_) => HttpResponse::NotFound().json(self.to_string()),
            Self::ConfigError(_) | Self::InternalError(_) => {
                HttpResponse::InternalServerError().json(self.to_string())
            }
        }
    }
}
