//! Error taxonomy shared by every portal view.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The API host could not be reached or the transport failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("request failed with status {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status { status: u16, detail: Option<String> },

    /// The API answered 200 with an `{"error": ...}` envelope.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The payload did not match the expected shape.
    #[error("malformed {context} payload: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("not logged in")]
    Unauthenticated,

    #[error("invalid form input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("configuration error: {0}")]
    Config(String),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self::Validation(fields)
    }

    /// One line suitable for a notice banner. Every view reports failures
    /// through this so forms, searches and deletes read the same way.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Server unreachable. Check that the portal API is running.".to_string()
            }
            Self::Status { status, detail } => match (*status, detail) {
                (_, Some(detail)) => detail.clone(),
                (401, None) => "Your session has expired. Please log in again.".to_string(),
                (403, None) => "You do not have access to this page.".to_string(),
                (404, None) => "The requested record was not found.".to_string(),
                (status, None) => format!("The server returned an error ({status})."),
            },
            Self::Rejected(message) => message.clone(),
            Self::Decode { context, .. } => {
                format!("The server sent an unexpected {context} response.")
            }
            Self::Unauthenticated => "Please log in first.".to_string(),
            Self::Validation(fields) => format!("Please fix: {}", join_fields(fields)),
            Self::Config(message) => message.clone(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Status { status: 401, .. }
        )
    }

    /// Rejected locally before any request was sent.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
