//! Building registry requests
//!
//! Requests are created by [`Client::new_request`](crate::Client::new_request),
//! which resolves the path template against the configured namespace. They can
//! then be modified freely until they are handed to
//! [`Client::execute`](crate::Client::execute), which only borrows them.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::form_urlencoded;
use url::Url;

use crate::config::ConfigError;
use crate::errors::{RegistryError, Result};
use crate::regexp;

const NAME_PLACEHOLDER: &str = ":name";
const REFERENCE_PLACEHOLDER: &str = ":reference";
const DIGEST_PLACEHOLDER: &str = ":digest";
const SESSION_ID_PLACEHOLDER: &str = ":session_id";

/// Values substituted into the placeholder segments of a path template
///
/// A template segment is replaced only when it consists of the placeholder
/// alone, e.g. `/v2/:name/manifests/:reference`. Placeholders without a value
/// are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathParams {
    name: Option<String>,
    reference: Option<String>,
    digest: Option<String>,
    session_id: Option<String>,
}

impl PathParams {
    /// No values, `:name` falls back to the configured namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `name` for `:name` instead of the configured namespace
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Value for `:reference`, a tag or a digest
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Value for `:digest`
    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Value for `:session_id`, the upload session of a chunked blob push
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn resolve(&self, template: &str, namespace: &str) -> String {
        template
            .split('/')
            .map(|segment| match segment {
                NAME_PLACEHOLDER => self.name.as_deref().unwrap_or(namespace),
                REFERENCE_PLACEHOLDER => self.reference.as_deref().unwrap_or(segment),
                DIGEST_PLACEHOLDER => self.digest.as_deref().unwrap_or(segment),
                SESSION_ID_PLACEHOLDER => self.session_id.as_deref().unwrap_or(segment),
                other => other,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// An unexecuted registry request
///
/// Query parameters keep their insertion order. [`Request::set_query_param`]
/// replaces the value of a name already present (last write wins) while
/// [`Request::add_query_param`] appends another value for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    pub(crate) fn new<M>(
        method: M,
        template: &str,
        namespace: &str,
        params: &PathParams,
    ) -> Result<Self>
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        let method = Method::try_from(method).map_err(|e| RegistryError::InvalidMethod(e.into()))?;
        if let Some(name) = params.name.as_deref() {
            if !regexp::is_valid_namespace(name) {
                return Err(ConfigError::InvalidNamespace(name.to_string()).into());
            }
        }

        let mut path = params.resolve(template, namespace);
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        check_path(&path)?;

        Ok(Request {
            method,
            path,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        })
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path with every placeholder resolved
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of the query parameter `name`
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets the query parameter `name` to `value`, replacing every value it
    /// had before. The parameter keeps the position it was first added at.
    pub fn set_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.query.iter().position(|(k, _)| *k == name) {
            Some(first) => {
                self.query[first].1 = value;
                let mut index = 0;
                self.query.retain(|(k, _)| {
                    let keep = index <= first || *k != name;
                    index += 1;
                    keep
                });
            }
            None => self.query.push((name, value)),
        }
        self
    }

    /// Appends a value for the query parameter `name`, keeping existing ones
    pub fn add_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Caller supplied headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a header, replacing previous values of the same name
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Request body
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Sets the request body
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// The path followed by the serialized query, e.g.
    /// `/v2/library/alpine/tags/list?n=10`
    pub fn path_and_query(&self) -> String {
        match self.encoded_query() {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// The URL this request is sent to when the registry lives at `base`.
    /// A path prefix of `base` is kept in front of the request path.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        let path = format!("{}{}", base.path().trim_end_matches('/'), self.path);
        url.set_path(&path);
        url.set_query(self.encoded_query().as_deref());
        url
    }

    fn encoded_query(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        Some(
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish(),
        )
    }
}

/// Rejects paths the URL parser would rewrite on the way to the wire: dot
/// segments (also percent-encoded ones) get collapsed and backslashes turn
/// into slashes.
fn check_path(path: &str) -> Result<()> {
    let rewritten = path.contains('\\')
        || path.split('/').any(|segment| {
            let segment = segment.to_ascii_lowercase().replace("%2e", ".");
            segment == "." || segment == ".."
        });
    if rewritten {
        return Err(RegistryError::InvalidUrl(format!(
            "path {:?} would not be sent as written",
            path
        )));
    }
    Ok(())
}
