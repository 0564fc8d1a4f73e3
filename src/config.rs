//! Client configuration
//!
//! A [`ClientConfig`] is validated once, when it is created, and is not
//! modified afterwards. Credentials can be replaced through
//! [`Client::set_auth`](crate::Client::set_auth).

use http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::regexp;
use crate::secrets::RegistryAuth;

/// Reasons a configuration is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The registry address is not a URL
    #[error("registry address {address:?} is not a valid URL: {reason}")]
    InvalidAddress {
        /// Address as supplied
        address: String,
        /// Parser message
        reason: String,
    },
    /// Only `http` and `https` registries can be reached
    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    /// The registry address carries no host
    #[error("registry address {0:?} has no host")]
    MissingHost(String),
    /// The address carries a query or fragment that would be lost on every request
    #[error("registry address {0:?} must not contain a query or fragment")]
    UnexpectedAddressComponent(String),
    /// The namespace does not follow the repository name grammar
    #[error("invalid namespace {0:?}")]
    InvalidNamespace(String),
    /// The HTTP client could not be built from the TLS settings
    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
    /// The user agent cannot be sent as a header value
    #[error("invalid user agent {0:?}")]
    InvalidUserAgent(String),
}

/// The encoding of the certificate
#[derive(Debug, Clone)]
pub enum CertificateEncoding {
    #[allow(missing_docs)]
    Der,
    #[allow(missing_docs)]
    Pem,
}

/// A x509 certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    /// Which encoding is used by the certificate
    pub encoding: CertificateEncoding,

    /// Actual certificate
    pub data: Vec<u8>,
}

/// A client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    address: Url,
    namespace: String,
    auth: RegistryAuth,
    user_agent: Option<HeaderValue>,
    auth_scope: Option<String>,
    accept_invalid_certificates: bool,
    #[cfg(feature = "native-tls")]
    accept_invalid_hostnames: bool,
    extra_root_certificates: Vec<Certificate>,
}

impl ClientConfig {
    /// Creates a configuration for the registry at `address`, operating on the
    /// repository `namespace`.
    ///
    /// `address` must be an absolute `http` or `https` URL. It may carry a path
    /// prefix, which is kept in front of every request path.
    pub fn new(
        address: &str,
        namespace: &str,
        auth: RegistryAuth,
    ) -> std::result::Result<Self, ConfigError> {
        let address = parse_address(address)?;
        validate_namespace(namespace)?;
        Ok(ClientConfig {
            address,
            namespace: namespace.to_string(),
            auth,
            user_agent: None,
            auth_scope: None,
            accept_invalid_certificates: false,
            #[cfg(feature = "native-tls")]
            accept_invalid_hostnames: false,
            extra_root_certificates: Vec::new(),
        })
    }

    /// Sends `user_agent` as the `User-Agent` header of every request,
    /// including token requests
    pub fn with_user_agent(mut self, user_agent: &str) -> std::result::Result<Self, ConfigError> {
        let value = HeaderValue::from_str(user_agent)
            .map_err(|_| ConfigError::InvalidUserAgent(user_agent.to_string()))?;
        self.user_agent = Some(value);
        Ok(self)
    }

    /// Requests `scope` from the auth realm instead of the scope advertised by
    /// the registry challenge
    pub fn with_auth_scope(mut self, scope: impl Into<String>) -> Self {
        self.auth_scope = Some(scope.into());
        self
    }

    /// Accept invalid certificates. Defaults to false
    pub fn with_accept_invalid_certificates(mut self, accept: bool) -> Self {
        self.accept_invalid_certificates = accept;
        self
    }

    /// Accept invalid hostnames. Defaults to false
    #[cfg(feature = "native-tls")]
    pub fn with_accept_invalid_hostnames(mut self, accept: bool) -> Self {
        self.accept_invalid_hostnames = accept;
        self
    }

    /// Trust an extra root certificate. This can be used to connect
    /// to servers using self-signed certificates
    pub fn with_extra_root_certificate(mut self, certificate: Certificate) -> Self {
        self.extra_root_certificates.push(certificate);
        self
    }

    /// Base address of the registry
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Repository substituted into `:name` path segments
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Credentials used to answer authentication challenges
    pub fn auth(&self) -> &RegistryAuth {
        &self.auth
    }

    /// `User-Agent` header value, if configured
    pub fn user_agent(&self) -> Option<&HeaderValue> {
        self.user_agent.as_ref()
    }

    /// Scope override for token requests, if configured
    pub fn auth_scope(&self) -> Option<&str> {
        self.auth_scope.as_deref()
    }

    /// Whether invalid certificates are accepted
    pub fn accept_invalid_certificates(&self) -> bool {
        self.accept_invalid_certificates
    }

    /// Whether invalid hostnames are accepted
    #[cfg(feature = "native-tls")]
    pub fn accept_invalid_hostnames(&self) -> bool {
        self.accept_invalid_hostnames
    }

    /// Extra trusted root certificates
    pub fn extra_root_certificates(&self) -> &[Certificate] {
        &self.extra_root_certificates
    }

    pub(crate) fn set_auth(&mut self, auth: RegistryAuth) {
        self.auth = auth;
    }
}

fn parse_address(address: &str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(address).map_err(|e| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingHost(address.to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::UnexpectedAddressComponent(address.to_string()));
    }
    Ok(url)
}

fn validate_namespace(namespace: &str) -> std::result::Result<(), ConfigError> {
    if regexp::is_valid_namespace(namespace) {
        Ok(())
    } else {
        Err(ConfigError::InvalidNamespace(namespace.to_string()))
    }
}
