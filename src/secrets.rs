//! Types for working with registry access secrets

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};

use crate::errors::{RegistryError, Result};

/// A method for authenticating to a registry
#[derive(Clone, Default, PartialEq, Eq)]
pub enum RegistryAuth {
    /// Access the registry anonymously
    #[default]
    Anonymous,

    /// Exchange HTTP Basic credentials for a bearer token when challenged
    Basic(String, String),

    /// Present a pre-provisioned bearer token on every request
    Bearer(String),
}

impl RegistryAuth {
    /// Basic credentials, if configured
    pub(crate) fn basic_credentials(&self) -> Option<(&str, &str)> {
        match self {
            RegistryAuth::Basic(username, password) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryAuth::Anonymous => f.write_str("Anonymous"),
            RegistryAuth::Basic(username, _) => f
                .debug_tuple("Basic")
                .field(username)
                .field(&"<redacted>")
                .finish(),
            RegistryAuth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Something an `Authorization` header can be attached to
pub(crate) trait Authenticable {
    fn set_authorization(&mut self, value: HeaderValue);

    fn basic_auth(&mut self, username: &str, password: &str) -> Result<()> {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        self.set_authorization(sensitive(format!("Basic {}", encoded))?);
        Ok(())
    }

    fn bearer_auth(&mut self, token: &str) -> Result<()> {
        self.set_authorization(sensitive(format!("Bearer {}", token))?);
        Ok(())
    }

    fn apply_authentication(&mut self, auth: &RegistryAuth) -> Result<()> {
        match auth {
            RegistryAuth::Anonymous => Ok(()),
            RegistryAuth::Basic(username, password) => self.basic_auth(username, password),
            RegistryAuth::Bearer(token) => self.bearer_auth(token),
        }
    }
}

impl Authenticable for HeaderMap {
    fn set_authorization(&mut self, value: HeaderValue) {
        self.insert(AUTHORIZATION, value);
    }
}

fn sensitive(value: String) -> Result<HeaderValue> {
    let mut value = HeaderValue::try_from(value).map_err(|_| {
        RegistryError::InvalidHeader("credentials contain characters not allowed in a header".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}
