use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::error;

use crate::utils::encode_query_value;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Please log in to access this page.")]
    LoginRequired { next: String },

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into().into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        Self::Remote(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::LoginRequired { next } => {
                let target = format!("/login/?next={}", encode_query_value(next));
                return Redirect::to(&target).into_response();
            }
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Storage(_)
            | AppError::Serialization(_)
            | AppError::Remote(_)
            | AppError::InternalError(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
