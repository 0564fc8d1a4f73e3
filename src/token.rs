use http::HeaderValue;
use serde::Deserialize;
use std::fmt;

use crate::errors::TokenExchangeError;

/// A token granted during the OAuth2-like workflow for OCI registries.
#[derive(Deserialize, Clone)]
#[serde(untagged)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RegistryToken {
    Token { token: String },
    AccessToken { access_token: String },
}

impl fmt::Debug for RegistryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = String::from("<redacted>");
        match self {
            RegistryToken::Token { .. } => {
                f.debug_struct("Token").field("token", &redacted).finish()
            }
            RegistryToken::AccessToken { .. } => f
                .debug_struct("AccessToken")
                .field("access_token", &redacted)
                .finish(),
        }
    }
}

impl RegistryToken {
    /// Decodes the body of a successful token response. A body whose token
    /// is empty, or cannot be carried in an `Authorization` header, is treated
    /// like a body without one.
    pub fn from_slice(body: &[u8]) -> Result<Self, TokenExchangeError> {
        let token: RegistryToken = serde_json::from_slice(body)
            .map_err(|e| TokenExchangeError::InvalidBody(e.to_string()))?;
        if token.token().is_empty() {
            return Err(TokenExchangeError::InvalidBody(
                "token response contains an empty token".to_string(),
            ));
        }
        if HeaderValue::from_str(token.token()).is_err() {
            return Err(TokenExchangeError::InvalidBody(
                "token contains characters not allowed in a header".to_string(),
            ));
        }
        Ok(token)
    }

    pub fn token(&self) -> &str {
        match self {
            RegistryToken::Token { token } => token,
            RegistryToken::AccessToken { access_token } => access_token,
        }
    }
}
