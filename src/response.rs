//! Responses handed back to the caller

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

/// The final response of an executed request
#[derive(Clone, Debug)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub(crate) fn from_http(url: Url, response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Response {
            url,
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// The URL the request producing this response was sent to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Response body decoded as UTF-8
    pub fn text(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Response body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// The data returned by a successful tags/list Request
#[derive(Deserialize, Debug)]
pub struct TagResponse {
    /// Repository Name
    pub name: String,
    /// List of existing Tags
    pub tags: Vec<String>,
}
