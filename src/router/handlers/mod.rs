//! HTTP request handlers

pub mod download;
pub mod egg;
pub mod files;
pub mod servers;
pub mod system;
pub mod upload;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-surface error taxonomy.
///
/// Each variant owns one HTTP status and one stable `error` kind string so
/// API consumers can dispatch on the kind rather than parse status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// The container engine itself misbehaved (Docker API error, daemon
    /// unreachable) rather than the request being invalid.
    #[error("container engine error: {0}")]
    EngineError(String),

    /// The egg installation script ran and failed.
    #[error("installation failed: {0}")]
    InstallFailed(String),

    /// Caller should retry; the failure is expected to be transient
    /// (operation timed out, cancelled by a concurrent power action).
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn engine_error(message: impl Into<String>) -> Self {
        Self::EngineError(message.into())
    }

    pub fn install_failed(message: impl Into<String>) -> Self {
        Self::InstallFailed(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EngineError(_) => StatusCode::BAD_GATEWAY,
            ApiError::InstallFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "conflict",
            ApiError::EngineError(_) => "engine_error",
            ApiError::InstallFailed(_) => "install_failed",
            ApiError::Transient(_) => "transient",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.to_string();

        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<crate::filesystem::FilesystemError> for ApiError {
    fn from(err: crate::filesystem::FilesystemError) -> Self {
        match StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR) {
            StatusCode::NOT_FOUND => ApiError::not_found(err.to_string()),
            StatusCode::FORBIDDEN => ApiError::forbidden(err.to_string()),
            StatusCode::BAD_REQUEST => ApiError::bad_request(err.to_string()),
            StatusCode::CONFLICT => ApiError::conflict(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

impl From<crate::egg::RegistryError> for ApiError {
    fn from(err: crate::egg::RegistryError) -> Self {
        use crate::egg::RegistryError;
        match &err {
            RegistryError::NotFound(_) => ApiError::not_found(err.to_string()),
            RegistryError::Invalid(_) => ApiError::bad_request(err.to_string()),
            RegistryError::Io(_) | RegistryError::Serde(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<crate::egg::StoreError> for ApiError {
    fn from(err: crate::egg::StoreError) -> Self {
        use crate::egg::StoreError;
        match &err {
            StoreError::NotFound(_) => ApiError::not_found(err.to_string()),
            StoreError::UnknownEgg(_)
            | StoreError::PortOutOfRange(_)
            | StoreError::VariableInvalid { .. } => ApiError::bad_request(err.to_string()),
            StoreError::Io(_) | StoreError::Serde(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<crate::server::PowerError> for ApiError {
    fn from(err: crate::server::PowerError) -> Self {
        use crate::server::PowerError;
        match &err {
            PowerError::Installing | PowerError::Busy => ApiError::conflict(err.to_string()),
            PowerError::AlreadyRunning
            | PowerError::AlreadyStopped
            | PowerError::Suspended => ApiError::bad_request(err.to_string()),
            PowerError::Timeout | PowerError::Cancelled => ApiError::transient(err.to_string()),
            PowerError::Environment(_) => ApiError::engine_error(err.to_string()),
            PowerError::Other(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<crate::server::InstallError> for ApiError {
    fn from(err: crate::server::InstallError) -> Self {
        use crate::server::InstallError;
        match &err {
            InstallError::AlreadyInstalling => ApiError::conflict(err.to_string()),
            InstallError::Docker(_) => ApiError::engine_error(err.to_string()),
            InstallError::ImagePull(_) | InstallError::Failed(_) => {
                ApiError::install_failed(err.to_string())
            }
            InstallError::Timeout | InstallError::Cancelled => ApiError::transient(err.to_string()),
            InstallError::Io(_) | InstallError::Api(_) | InstallError::Other(_) => {
                ApiError::internal(err.to_string())
            }
        }
    }
}
