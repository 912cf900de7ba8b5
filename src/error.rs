use thiserror::Error;

#[derive(Error, Debug)]
pub enum LakeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetch error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    // Reclassified as success by the provisioners.
    #[error("Resource already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("{service} error: {message}")]
    Provider { service: &'static str, message: String },

    #[error("Query submission error: {0}")]
    Submit(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LakeError {
    pub fn provider(service: &'static str, message: impl Into<String>) -> Self {
        LakeError::Provider {
            service,
            message: message.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        LakeError::AlreadyExists {
            resource: resource.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, LakeError::AlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, LakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_includes_status() {
        let err = LakeError::Fetch {
            status: Some(401),
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch error (status 401): Unauthorized");

        let err = LakeError::Fetch {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch error: connection refused");
    }

    #[test]
    fn test_already_exists_helper() {
        assert!(LakeError::already_exists("bucket demo").is_already_exists());
        assert!(!LakeError::provider("S3", "AccessDenied").is_already_exists());
    }
}
