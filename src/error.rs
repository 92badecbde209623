use std::fmt;

/// Central error type for the sync engine
#[derive(Debug)]
pub enum AppError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// JSON encoding/decoding of stored payloads
    Serialization(serde_json::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// Validation error (e.g. invalid inputs)
    Validation(String),
    /// Resource not found
    NotFound(String),
    /// The sync queue is at capacity; nothing was enqueued
    QueueFull { max: usize },
    /// Connection reset, timeout, DNS failure
    Network(String),
    /// 5xx from the remote
    Server { status: u16, message: String },
    /// Session lost (401 or redirect to login)
    Unauthorized(String),
    /// Unexpected content type or undecodable body
    MalformedResponse(String),
    /// Any other 4xx
    Rejected { status: u16, message: String },
    /// Image processing error
    ImageProcessing(String),
    /// General error
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::QueueFull { max } => write!(f, "Sync queue full ({} items)", max),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Server { status, message } => {
                write!(f, "Server error {}: {}", status, message)
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            AppError::Rejected { status, message } => {
                write!(f, "Request rejected ({}): {}", status, message)
            }
            AppError::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<media_library::MediaLibraryError> for AppError {
    fn from(e: media_library::MediaLibraryError) -> Self {
        use media_library::MediaLibraryError;
        match e {
            MediaLibraryError::DatabaseError(e) => AppError::Database(e),
            MediaLibraryError::NotFound(msg) => AppError::NotFound(msg),
            MediaLibraryError::IoError(e) => AppError::Filesystem(e),
            MediaLibraryError::ThumbnailError(e) => AppError::ImageProcessing(e.to_string()),
            MediaLibraryError::Other(msg) => AppError::Other(msg),
        }
    }
}

impl From<media_library::ThumbnailError> for AppError {
    fn from(e: media_library::ThumbnailError) -> Self {
        AppError::ImageProcessing(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::MalformedResponse(e.to_string())
        } else if let Some(status) = e.status() {
            AppError::Server {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl AppError {
    /// The user has to sign in again before anything else can sync
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Unauthorized(_))
    }

    /// Whether a later attempt may succeed without user intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::Server { .. } | AppError::MalformedResponse(_)
        )
    }

    /// User-friendly error messages for UI
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred. Please try again.".to_string(),
            AppError::Filesystem(_) => {
                "Error accessing files. Please check app permissions.".to_string()
            }
            AppError::QueueFull { max } => format!(
                "Too many changes are waiting to sync ({}). Connect to the internet and sync before capturing more.",
                max
            ),
            AppError::Unauthorized(_) => {
                "Your session has expired. Please sign in again to continue syncing.".to_string()
            }
            AppError::Network(_) | AppError::Server { .. } | AppError::MalformedResponse(_) => {
                "Could not reach the server. Changes will sync automatically.".to_string()
            }
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => format!("{} was not found.", msg),
            AppError::ImageProcessing(_) => "Error processing image.".to_string(),
            AppError::Config(msg) | AppError::Other(msg) => msg.clone(),
            AppError::Serialization(_) | AppError::Rejected { .. } => {
                "The server did not accept this change.".to_string()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
