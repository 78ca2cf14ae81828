//! Error types for ChRIS API operations.
//!
//! Status errors keep the HTTP status, the URL that produced them, the response body
//! (when it was JSON) and the payload that was sent, so callers can log or branch on them.

use serde_json::Value;
use thiserror::Error;

/// Details of an HTTP response whose status was 400 or above.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusError {
    /// HTTP status code
    pub status: u16,
    /// URL the response came from
    pub url: String,
    /// Response body, if it was valid JSON
    pub message: Option<Value>,
    /// Request payload that was sent, for diagnosis
    pub request_data: Option<Value>,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.url)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Main error type for ChRIS API operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The backend rejected the request (4xx other than 401)
    #[error("Bad request: {0}")]
    BadRequest(Box<StatusError>),

    /// The backend failed (5xx)
    #[error("Internal server error: {0}")]
    InternalServer(Box<StatusError>),

    /// The request was not authorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(Box<StatusError>),

    /// Username or password rejected by the auth-token endpoint
    #[error("Incorrect login: {0}")]
    IncorrectLogin(String),

    /// Pagination would exceed the configured maximum number of requests
    #[error(
        "Too many requests made to {url}. If this is expected, configure an unlimited \
         max_search_requests for the client"
    )]
    TooMuchPagination {
        /// URL of the page that was about to be requested
        url: String,
    },

    /// A search expected to have exactly one result has none
    #[error("Search has no results: {url}")]
    NoneSearch {
        /// Search URL
        url: String,
    },

    /// A search expected to have exactly one result has several
    #[error("Search has {count} results, expected one: {url}")]
    ManySearch {
        /// Search URL
        url: String,
        /// Number of results reported by the backend
        count: u64,
    },

    /// The backend returned data which does not make sense
    #[error("Nonsensical response: {0}")]
    NonsenseResponse(String),

    /// Response JSON does not have the expected shape
    #[error("Failed to deserialize response: {0}")]
    Deserialize(String),

    /// A method refers to a link its owner does not declare
    #[error("Method `{method}` needs link \"{link}\" but `{owner}` does not have it")]
    UndefinedLink {
        /// Type that owns the method
        owner: &'static str,
        /// Method name
        method: &'static str,
        /// Link name
        link: &'static str,
    },

    /// A declared link has no URL on this instance
    #[error("`{owner}` does not have a URL for link \"{link}\"")]
    MissingLink {
        /// Type that was asked for the link
        owner: &'static str,
        /// Link name
        link: String,
    },

    /// A caller-supplied argument is not acceptable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The session was closed before the request was made
    #[error("Session is closed")]
    SessionClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

/// Specialized result type for ChRIS API operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InternalServer(_) => "INTERNAL_SERVER_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::IncorrectLogin(_) => "INCORRECT_LOGIN",
            Self::TooMuchPagination { .. } => "TOO_MUCH_PAGINATION",
            Self::NoneSearch { .. } => "NONE_SEARCH",
            Self::ManySearch { .. } => "MANY_SEARCH",
            Self::NonsenseResponse(_) => "NONSENSE_RESPONSE",
            Self::Deserialize(_) => "DESERIALIZE",
            Self::UndefinedLink { .. } => "UNDEFINED_LINK",
            Self::MissingLink { .. } => "MISSING_LINK",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Http(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Classify a response status. Returns `None` for statuses below 400.
    #[must_use]
    pub fn from_status(
        status: u16,
        url: impl Into<String>,
        message: Option<Value>,
        request_data: Option<Value>,
    ) -> Option<Self> {
        if status < 400 {
            return None;
        }
        let details = Box::new(StatusError {
            status,
            url: url.into(),
            message,
            request_data,
        });
        Some(match status {
            401 => Self::Unauthorized(details),
            400..=499 => Self::BadRequest(details),
            _ => Self::InternalServer(details),
        })
    }

    /// HTTP status details, for errors that came from a response status.
    #[must_use]
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            Self::BadRequest(e) | Self::InternalServer(e) | Self::Unauthorized(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true for failures a caller may reasonably retry.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::InternalServer(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Deserialize(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialize(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        let url = "http://cube/api/v1/";
        assert!(Error::from_status(204, url, None, None).is_none());
        assert!(matches!(
            Error::from_status(401, url, None, None),
            Some(Error::Unauthorized(_))
        ));
        assert!(matches!(
            Error::from_status(400, url, None, None),
            Some(Error::BadRequest(_))
        ));
        assert!(matches!(
            Error::from_status(404, url, None, None),
            Some(Error::BadRequest(_))
        ));
        assert!(matches!(
            Error::from_status(503, url, None, None),
            Some(Error::InternalServer(_))
        ));
    }

    #[test]
    fn test_status_details_kept() {
        let err = Error::from_status(
            400,
            "http://cube/api/v1/feeds/1/",
            Some(json!({"name": ["too long"]})),
            Some(json!({"name": "x"})),
        )
        .unwrap();

        let details = err.status().unwrap();
        assert_eq!(details.status, 400);
        assert_eq!(details.url, "http://cube/api/v1/feeds/1/");
        assert_eq!(details.message, Some(json!({"name": ["too long"]})));
        assert_eq!(details.request_data, Some(json!({"name": "x"})));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::SessionClosed.error_code(), "SESSION_CLOSED");
        assert_eq!(
            Error::NoneSearch {
                url: "u".to_string()
            }
            .error_code(),
            "NONE_SEARCH"
        );
        assert_eq!(
            Error::ManySearch {
                url: "u".to_string(),
                count: 2
            }
            .error_code(),
            "MANY_SEARCH"
        );
        assert_eq!(
            Error::IncorrectLogin("nope".to_string()).error_code(),
            "INCORRECT_LOGIN"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::UndefinedLink {
            owner: "Feed",
            method: "get_note",
            link: "note",
        };
        assert_eq!(
            err.to_string(),
            "Method `get_note` needs link \"note\" but `Feed` does not have it"
        );

        let err = Error::ManySearch {
            url: "http://cube/api/v1/plugins/search/".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Search has 3 results, expected one: http://cube/api/v1/plugins/search/"
        );
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::Http("reset".to_string()).is_transport());
        assert!(Error::Timeout("slow".to_string()).is_transport());
        assert!(!Error::SessionClosed.is_transport());
        assert!(!Error::Deserialize("bad".to_string()).is_transport());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let chris_err: Error = err.into();
        assert!(matches!(chris_err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let chris_err: Error = err.into();
        assert!(matches!(chris_err, Error::Deserialize(_)));
    }
}
