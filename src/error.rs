use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to fetch data: {0}")]
    FetchError(String),

    #[error("LLM processing error: {0}")]
    LlmError(String),

    #[error("Error parsing content: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InputError(String),

    #[error("Could not decode image: {0}")]
    ImageError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::FetchError(_) | AppError::ParseError(_) | AppError::LlmError(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InputError(_) => StatusCode::BAD_REQUEST,
            AppError::ImageError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Message shown on the dashboard, prefixed by which interaction failed.
    pub fn user_message(&self) -> String {
        match self {
            AppError::LlmError(msg) => {
                format!("Terjadi kesalahan saat menghubungi API Gemini: {}", msg)
            }
            AppError::FetchError(msg) | AppError::ParseError(msg) => {
                format!("Gagal mengambil berita: {}", msg)
            }
            AppError::ImageError(msg) => format!("Gagal memuat gambar: {}", msg),
            AppError::InputError(msg) => msg.clone(),
            AppError::ConfigError(msg) => format!("Konfigurasi tidak valid: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error::<()>(self.status_code(), self.user_message()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::FetchError(format!("request timed out: {}", err))
        } else {
            AppError::FetchError(err.to_string())
        }
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::ConfigError(format!("template error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
