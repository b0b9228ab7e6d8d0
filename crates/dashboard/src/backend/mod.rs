//! Client for the bakery REST backend.
//!
//! # Architecture
//!
//! - The backend is the single source of truth - NO local sync, direct API
//!   calls with a per-user bearer token
//! - Wire types mirror the backend's Spanish JSON field names; everything
//!   past this module speaks the dashboard's own types
//! - Reference listings (productos, clientes, repartos) are cached
//!   in-memory via `moka` for 30 seconds and invalidated on mutation
//!
//! # Example
//!
//! ```rust,ignore
//! use espiga_dashboard::backend::BackendClient;
//!
//! let client = BackendClient::new(config.backend_url.clone());
//! let session = client.login("maria", "hunter2").await?;
//! let token = AuthToken::from(session.token);
//! let productos = client.list_productos(&token, &ListQuery::default()).await?;
//! ```

mod client;
pub mod types;

pub use client::{BackendClient, ExistenciaFilter, LineOp, ListQuery, RemitoFilter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bearer token issued by the backend at login.
///
/// Implements `Debug` manually so the token never leaks into logs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// The raw token for the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Errors that can occur when talking to the backend API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connect, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing of a backend response failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The bearer token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-success status.
    #[error("Backend error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the backend's error body.
        message: String,
    },

    /// A step of a multi-request line-write plan failed.
    ///
    /// `rolled_back` reports whether every previously applied step was
    /// successfully compensated; when false the document may be left
    /// partially edited on the backend.
    #[error("Line write failed at {step} (rolled back: {rolled_back}): {source}")]
    LineWrite {
        /// Human-readable description of the failed step.
        step: String,
        /// Whether compensation of earlier steps succeeded.
        rolled_back: bool,
        /// The underlying failure.
        #[source]
        source: Box<BackendError>,
    },

    /// The configured backend URL cannot address the requested path.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// Message suitable for showing in a form banner.
    ///
    /// Submission failures surface the backend's own message; transport
    /// and parse failures get a generic Spanish fallback.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::NotFound(what) => format!("No se encontró {what}."),
            Self::Unauthorized => "La sesión expiró. Vuelva a iniciar sesión.".to_string(),
            Self::LineWrite {
                step, rolled_back, ..
            } => {
                if *rolled_back {
                    format!("No se pudo guardar {step}. Los cambios fueron revertidos.")
                } else {
                    format!(
                        "No se pudo guardar {step} y la reversión falló. Revise el documento."
                    )
                }
            }
            Self::Http(_) | Self::Parse(_) | Self::InvalidUrl(_) => {
                "No se pudo contactar al servidor. Intente nuevamente.".to_string()
            }
        }
    }
}

/// Error body shapes the backend uses interchangeably.
///
/// Depending on the endpoint an error arrives as `{"error": "..."}`,
/// `{"message": "..."}` or `{"errors": ["...", ...]}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

impl ErrorBody {
    /// First usable message, if any shape matched.
    pub(crate) fn into_message(self) -> Option<String> {
        if let Some(errors) = self.errors {
            if let Some(first) = errors.into_iter().next() {
                return Some(first);
            }
        }
        self.error.or(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_debug_is_redacted() {
        let token = AuthToken::from("eyJhbGciOi.secret.signature".to_string());
        let debug_output = format!("{token:?}");
        assert!(!debug_output.contains("secret"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_error_body_shapes() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "Stock insuficiente"}"#)
            .expect("parse");
        assert_eq!(body.into_message().as_deref(), Some("Stock insuficiente"));

        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "Token inválido"}"#).expect("parse");
        assert_eq!(body.into_message().as_deref(), Some("Token inválido"));

        let body: ErrorBody =
            serde_json::from_str(r#"{"errors": ["Primero", "Segundo"]}"#).expect("parse");
        assert_eq!(body.into_message().as_deref(), Some("Primero"));

        let body: ErrorBody = serde_json::from_str("{}").expect("parse");
        assert_eq!(body.into_message(), None);
    }

    #[test]
    fn test_user_message_prefers_backend_text() {
        let err = BackendError::Status {
            status: 400,
            message: "Stock insuficiente de Pan flauta".to_string(),
        };
        assert_eq!(err.user_message(), "Stock insuficiente de Pan flauta");
    }

    #[test]
    fn test_line_write_message_reports_rollback() {
        let err = BackendError::LineWrite {
            step: "la línea 2 del pedido".to_string(),
            rolled_back: true,
            source: Box::new(BackendError::Status {
                status: 500,
                message: "boom".to_string(),
            }),
        };
        assert!(err.user_message().contains("revertidos"));
    }
}
