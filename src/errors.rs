//! # Submission Error Types Module
//!
//! Structured errors for the calls the bot makes to the web application and to
//! Telegram while turning a finished wizard session into a property.

/// Failure of a single external call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The remote side answered with a non-success HTTP status
    Status { status: u16, body: String },
    /// The request never produced a usable response
    Transport(String),
    /// The response arrived but could not be decoded
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status { status, .. } => write!(f, "HTTP {status}"),
            ApiError::Transport(msg) => write!(f, "transport error: {msg}"),
            ApiError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Failure of the property submission as a whole
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionError {
    /// Property-Create failed; nothing was created
    Create(ApiError),
    /// A photo could not be downloaded; the property already exists
    MediaFetch { property_id: String, source: ApiError },
    /// Photo-Attach failed; the property already exists without photos
    PhotoAttach { property_id: String, source: ApiError },
}

impl SubmissionError {
    /// Identifier of the property that exists despite the failure, if any
    pub fn created_property_id(&self) -> Option<&str> {
        match self {
            SubmissionError::Create(_) => None,
            SubmissionError::MediaFetch { property_id, .. }
            | SubmissionError::PhotoAttach { property_id, .. } => Some(property_id),
        }
    }
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::Create(source) => write!(f, "property creation failed: {source}"),
            SubmissionError::MediaFetch { property_id, source } => {
                write!(f, "property {property_id} created but photo download failed: {source}")
            }
            SubmissionError::PhotoAttach { property_id, source } => {
                write!(f, "property {property_id} created but photo upload failed: {source}")
            }
        }
    }
}

impl std::error::Error for SubmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmissionError::Create(source)
            | SubmissionError::MediaFetch { source, .. }
            | SubmissionError::PhotoAttach { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = SubmissionError::Create(ApiError::Status {
            status: 401,
            body: "Unauthorized".to_string(),
        });
        assert_eq!(err.to_string(), "property creation failed: HTTP 401");
        assert_eq!(err.created_property_id(), None);

        let err = SubmissionError::PhotoAttach {
            property_id: "abc".to_string(),
            source: ApiError::Transport("connection reset".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "property abc created but photo upload failed: transport error: connection reset"
        );
        assert_eq!(err.created_property_id(), Some("abc"));
    }
}
