//! The HTTP capability used to reach registries and auth realms
//!
//! [`Client`](crate::Client) never talks to the network directly: every round
//! trip goes through a [`Transport`]. [`ReqwestTransport`] is the default one;
//! anything else implementing the trait (a proxy, a recorder, an in-memory test
//! double) can be injected with
//! [`Client::with_transport`](crate::Client::with_transport).

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::{CertificateEncoding, ClientConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure to complete an HTTP round trip
#[derive(Error, Debug)]
#[error("Transport error: {message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Wraps the underlying error of a transport implementation
    pub fn new(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        TransportError {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::new(e)
    }
}

/// Sends one HTTP request and returns the complete response
pub trait Transport: Send + Sync {
    /// Performs a single round trip. Implementations must not retry, nor
    /// answer authentication challenges themselves.
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        (**self).send(request)
    }
}

/// A [`Transport`] backed by a `reqwest::Client`
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Uses an already configured `reqwest::Client`
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

impl TryFrom<&ClientConfig> for ReqwestTransport {
    type Error = reqwest::Error;

    fn try_from(config: &ClientConfig) -> std::result::Result<Self, Self::Error> {
        #[allow(unused_mut)]
        let mut client_builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let mut client_builder =
            client_builder.danger_accept_invalid_certs(config.accept_invalid_certificates());

        client_builder = match () {
            #[cfg(all(feature = "native-tls", not(target_arch = "wasm32")))]
            () => client_builder.danger_accept_invalid_hostnames(config.accept_invalid_hostnames()),
            #[cfg(any(not(feature = "native-tls"), target_arch = "wasm32"))]
            () => client_builder,
        };

        #[cfg(not(target_arch = "wasm32"))]
        for c in config.extra_root_certificates() {
            let cert = match c.encoding {
                CertificateEncoding::Der => reqwest::Certificate::from_der(c.data.as_slice())?,
                CertificateEncoding::Pem => reqwest::Certificate::from_pem(c.data.as_slice())?,
            };
            client_builder = client_builder.add_root_certificate(cert);
        }

        Ok(ReqwestTransport {
            client: client_builder.build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        Box::pin(async move {
            let request = reqwest::Request::try_from(request)?;
            let res = self.client.execute(request).await?;
            let status = res.status();
            let version = res.version();
            let headers = res.headers().clone();
            let body = res.bytes().await?;

            let mut response = http::Response::new(body);
            *response.status_mut() = status;
            *response.version_mut() = version;
            *response.headers_mut() = headers;
            Ok::<_, TransportError>(response)
        })
    }
}
