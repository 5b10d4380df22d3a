use thiserror::Error;

/// Failures of the HTTP layer.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Invalid URL `{0}`")]
    InvalidUrl(String),

    #[error("Request to `{url}` failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Transport error at `{url}`: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Raised when downloaded bytes are not a valid torrent file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unable to decode bencode data: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("Invalid info dictionary: {0}")]
    InvalidInfo(String),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Network error: {0}")]
    Network(#[from] HttpError),

    #[error("No response from `{0}`")]
    NoResponse(String),

    #[error("Authentication failed at `{0}`")]
    Authentication(String),

    #[error("{0}")]
    Extraction(String),

    #[error("Torrent parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid tracker URL `{0}`")]
    InvalidUrl(String),

    #[error("Unable to resolve `{0}` at any mirror")]
    Unresolvable(String),

    #[error("Tracker handler for `{0}` is not registered")]
    NotRegistered(String),

    #[error("Consecutive login attempt detected at `{0}`")]
    ConsecutiveLogin(String),
}

impl TrackerError {
    /// Fatal errors signal a caller bug and are never swallowed by fallback loops.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::ConsecutiveLogin(_))
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("RPC request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC call rejected: {0}")]
    Rejected(String),

    #[error("Failed negotiating RPC session at `{0}`")]
    Session(String),

    #[error("RPC backend `{0}` is unknown")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error returned by toolbox operations.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_consecutive_login_is_fatal() {
        assert!(TrackerError::ConsecutiveLogin("kinozal.tv".to_string()).is_fatal());
        assert!(!TrackerError::Unresolvable("http://a.com/x".to_string()).is_fatal());
        assert!(!TrackerError::Extraction("no link".to_string()).is_fatal());
        assert!(!TrackerError::Authentication("http://a.com/login".to_string()).is_fatal());
    }

    #[test]
    fn test_tracker_error_display() {
        let error = TrackerError::NotRegistered("http://unknown.org/1".to_string());
        assert_eq!(
            format!("{}", error),
            "Tracker handler for `http://unknown.org/1` is not registered"
        );
    }

    #[test]
    fn test_app_error_is_transparent() {
        let error: AppError = ConfigurationError::Invalid("bad level".to_string()).into();
        assert_eq!(format!("{}", error), "Invalid configuration: bad level");
    }
}
