use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Well-known error codes reported by the management layer.
///
/// Negative codes in `-3000..=-1000` are console-side sentinels whose text
/// comes from the message catalog; positive codes are raised by the backend.
pub mod codes {
    pub const NOT_FOUND: i32 = -1000;
    pub const POLICY_NOT_FOUND: i32 = -1001;
    pub const MEMBER_NOT_FOUND: i32 = -1008;
    pub const FILE_EXISTS: i32 = -1009;
    pub const INVALID_INPUT: i32 = -1010;
    pub const NO_EFFECT: i32 = -1099;
    pub const STATE_FAILURE: i32 = -2000;
    pub const SERVER_DOWN: i32 = -2800;
    pub const ACCESS_DENIED: i32 = -2803;
    pub const INVALID_ENTRIES: i32 = -3333;

    pub const ARCHIVER_CONFIG_ERRORS: i32 = 30651;
    pub const ARCHIVER_CONFIG_WARNINGS: i32 = 30652;
    pub const SHARED_FS_PARTIAL: i32 = 30802;
    pub const RELEASE_FILES_FAILED: i32 = 30180;
    pub const ARCHIVE_FILES_FAILED: i32 = 30629;
    pub const CALL_TIMEOUT: i32 = 30806;
    pub const NETWORK_DOWN: i32 = 30807;
}

/// Failure of one host inside a multi-host operation.
#[derive(Debug, Clone, PartialEq)]
pub struct HostFailure {
    pub host: String,
    pub error: SamFsError,
}

/// Error raised by the management backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamFsError {
    /// A single failure identified by its code.
    #[error("SAM-FS error {code}: {}", .message.as_deref().unwrap_or("no detail"))]
    Code { code: i32, message: Option<String> },

    /// One or more hosts of a shared file system failed. The operation still
    /// ran on the remaining hosts.
    #[error("{message}")]
    MultiHost {
        code: i32,
        message: String,
        failures: Vec<HostFailure>,
    },

    /// The primary action ran but the resulting configuration reported errors.
    #[error("{}", .messages.join("; "))]
    MultiMsg { code: i32, messages: Vec<String> },

    /// The primary action ran and only warnings were reported.
    #[error("{}", .messages.join("; "))]
    Warnings { code: i32, messages: Vec<String> },
}

impl SamFsError {
    pub fn code_only(code: i32) -> Self {
        Self::Code {
            code,
            message: None,
        }
    }

    pub fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self::Code {
            code,
            message: Some(message.into()),
        }
    }

    pub fn not_found() -> Self {
        Self::code_only(codes::NOT_FOUND)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Code { code, .. }
            | Self::MultiHost { code, .. }
            | Self::MultiMsg { code, .. }
            | Self::Warnings { code, .. } => *code,
        }
    }

    /// Backend supplied detail, if any. Sentinel errors carry none and are
    /// rendered from the message catalog instead.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Code { message, .. } => message.clone(),
            _ => Some(self.to_string()),
        }
    }

    /// True when the primary action is known to have been carried out even
    /// though an error was reported.
    pub fn action_completed(&self) -> bool {
        matches!(
            self,
            Self::MultiMsg { .. } | Self::Warnings { .. } | Self::MultiHost { .. }
        )
    }
}

impl From<StateError> for SamFsError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(what) => Self::with_message(codes::NOT_FOUND, what),
            StateError::AlreadyExists(what) => Self::with_message(codes::FILE_EXISTS, what),
            other => Self::with_message(codes::STATE_FAILURE, other.to_string()),
        }
    }
}

/// Error type for the JSON API surface.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Backend error: {0}")]
    Backend(#[from] SamFsError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    pub fn code(&self) -> i32 {
        match self {
            Self::ServiceNotFound(_) | Self::MethodNotFound(_) => 404,
            Self::InvalidParams(_) => 400,
            Self::Backend(e) if e.code() == codes::NOT_FOUND => 404,
            Self::Backend(_) => 500,
            Self::State(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            404 => StatusCode::NOT_FOUND,
            400 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response sent to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_code: Option<i32>,
    pub message: String,
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let backend_code = match &self {
            ConsoleError::Backend(e) => Some(e.code()),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code(),
                backend_code,
                message: self.to_string(),
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Error type for state management.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to read state file: {0}")]
    Read(String),

    #[error("Failed to write state file: {0}")]
    Write(String),

    #[error("Failed to parse state: {0}")]
    Parse(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item already exists: {0}")]
    AlreadyExists(String),
}

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, SamFsError>;

/// Result type alias for API operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;
