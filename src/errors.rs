//! Errors related to interacting with an OCI compliant remote store

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors that can be raised while building or executing registry requests
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The client configuration was rejected at construction time
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// The HTTP method supplied to the request builder is not valid
    #[error("Invalid request method: {0}")]
    InvalidMethod(#[source] http::Error),
    /// A header could not be attached to an outgoing request
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// The URL of an outgoing request could not be turned into a request URI
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    /// A network or connection failure on one of the round trips
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The registry answered 401 with a missing or unusable challenge
    #[error("Cannot parse authentication challenge: {0}")]
    ChallengeParse(#[from] ChallengeParseError),
    /// The registry asked for credentials but none usable are configured
    #[error("Authentication required but no usable credentials are configured: {0}")]
    AuthConfig(String),
    /// The token exchange with the auth realm failed
    #[error(transparent)]
    TokenExchange(#[from] TokenExchangeError),
    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,
    /// The caller supplied deadline elapsed before the operation completed
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl RegistryError {
    /// Returns true when the error was caused by caller-initiated cancellation
    /// or an elapsed deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RegistryError::Cancelled | RegistryError::DeadlineExceeded
        )
    }
}

/// Reasons a `WWW-Authenticate` challenge could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeParseError {
    /// The 401 response carried no `WWW-Authenticate` header
    #[error("missing WWW-Authenticate header")]
    MissingHeader,
    /// The header value is not visible ASCII
    #[error("cannot convert header value to string: {0}")]
    InvalidHeader(String),
    /// No challenge in the header uses a supported scheme
    #[error("no supported challenge found in {0:?}")]
    UnsupportedScheme(String),
    /// The bearer challenge has no `realm` parameter
    #[error("missing required parameter realm")]
    MissingRealm,
    /// The realm is not an absolute URL
    #[error("realm {realm:?} is not a valid URL: {reason}")]
    InvalidRealm {
        /// Realm as sent by the registry
        realm: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Failures of the token exchange with an auth realm
#[derive(Error, Debug)]
pub enum TokenExchangeError {
    /// The realm answered with something other than 200
    #[error("Token request to {realm} failed with status {status}: {message}")]
    UnexpectedStatus {
        /// Realm that was queried
        realm: String,
        /// HTTP status returned by the realm
        status: u16,
        /// Response body, if any
        message: String,
    },
    /// The realm answered 200 but the body did not contain a token
    #[error("Failed to decode registry token: {0}")]
    InvalidBody(String),
}

/// Helper type to declare `Result` objects that might return a `RegistryError`
pub type Result<T> = std::result::Result<T, RegistryError>;
