//! OCI distribution client
//!
//! The [`Client`] builds requests against a single repository of a registry
//! and executes them, answering one authentication challenge on the way.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryFutureExt;
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{Method, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::cancellation::Guard;
use crate::challenge::{BearerChallenge, Challenge};
use crate::config::{ClientConfig, ConfigError};
use crate::errors::{RegistryError, Result, TokenExchangeError};
use crate::request::{PathParams, Request};
use crate::response::Response;
use crate::secrets::{Authenticable, RegistryAuth};
use crate::token::RegistryToken;
use crate::transport::{ReqwestTransport, Transport};

/// Which credential goes into the `Authorization` header of an outgoing request
enum Credential<'a> {
    /// Whatever the configuration provides up front: a pre-provisioned bearer
    /// token, or nothing. Basic credentials are only sent when challenged.
    Configured,
    Bearer(&'a str),
    Basic(&'a str, &'a str),
}

/// The client connects to an OCI registry and executes requests against one
/// repository (the namespace) of it.
///
/// Most registries require an OAuth2-like handshake: a request without a
/// bearer token is answered with `401 Unauthorized` and a `WWW-Authenticate`
/// challenge naming an auth realm. [`Client::execute`] handles this
/// transparently: it exchanges the configured basic credentials for a token at
/// the realm and sends the request once more with that token. Tokens are not
/// cached, every challenged request triggers a new exchange.
///
/// A `Client` is cheap to clone and can be shared between tasks. The
/// configuration is immutable; [`Client::set_auth`] needs exclusive access and
/// only affects the client it is called on.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl TryFrom<ClientConfig> for Client {
    type Error = RegistryError;

    fn try_from(config: ClientConfig) -> std::result::Result<Self, Self::Error> {
        let transport = ReqwestTransport::try_from(&config)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Client::with_transport(config, transport))
    }
}

impl Client {
    /// Create a new client with the supplied config
    pub fn new(config: ClientConfig) -> Self {
        let transport = ReqwestTransport::try_from(&config).unwrap_or_else(|err| {
            warn!("Cannot create HTTP client from config: {:?}", err);
            warn!("Creating HTTP client with default TLS settings");
            ReqwestTransport::default()
        });
        Client::with_transport(config, transport)
    }

    /// Create a new client sending its requests through `transport`
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Client {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    /// The configuration of this client
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replaces the credentials of this client.
    ///
    /// Clones of this client, and requests they are executing, keep the
    /// credentials they had.
    pub fn set_auth(&mut self, auth: RegistryAuth) {
        Arc::make_mut(&mut self.config).set_auth(auth);
    }

    /// Builds a request for `path_template`, substituting the configured
    /// namespace for `:name` segments. Nothing is sent.
    ///
    /// ```
    /// # use reggie::{Client, config::ClientConfig, secrets::RegistryAuth};
    /// let config = ClientConfig::new("https://registry.example.com", "library/alpine", RegistryAuth::Anonymous)?;
    /// let client = Client::new(config);
    /// let mut req = client.new_request("GET", "/v2/:name/tags/list")?;
    /// req.set_query_param("n", "10");
    /// assert_eq!(req.path_and_query(), "/v2/library/alpine/tags/list?n=10");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new_request<M>(&self, method: M, path_template: &str) -> Result<Request>
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        self.new_request_with(method, path_template, PathParams::default())
    }

    /// Like [`Client::new_request`], also substituting `:reference`, `:digest`
    /// and `:session_id` segments, and optionally overriding `:name`.
    ///
    /// A `:name` override must be a valid repository name. Values producing
    /// `.` or `..` path segments are rejected with [`RegistryError::InvalidUrl`].
    pub fn new_request_with<M>(
        &self,
        method: M,
        path_template: &str,
        params: PathParams,
    ) -> Result<Request>
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        Request::new(method, path_template, self.config.namespace(), &params)
    }

    /// Executes `request`, answering at most one authentication challenge.
    ///
    /// The request is sent as is. If the registry answers `401 Unauthorized`,
    /// the `WWW-Authenticate` challenge is parsed, a token is obtained from the
    /// realm using the configured basic credentials, and the request is sent
    /// again with that token. The response to the second attempt is returned
    /// whatever its status, a second challenge is not answered.
    ///
    /// `request` is only borrowed and is never modified.
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        self._execute(request, Guard::default()).await
    }

    /// Like [`Client::execute`], aborting with [`RegistryError::Cancelled`] as
    /// soon as `cancel` is triggered. No further round trip is started once
    /// the token is cancelled.
    pub async fn execute_with_cancellation(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self._execute(request, Guard::cancellable(cancel)).await
    }

    /// Like [`Client::execute`], aborting with
    /// [`RegistryError::DeadlineExceeded`] once `deadline` has passed.
    pub async fn execute_with_deadline(
        &self,
        request: &Request,
        deadline: Instant,
    ) -> Result<Response> {
        self._execute(request, Guard::until(deadline)).await
    }

    async fn _execute(&self, request: &Request, guard: Guard<'_>) -> Result<Response> {
        let config = Arc::clone(&self.config);
        debug!(method = %request.method(), path = %request.path_and_query(), "Sending request");

        let response = self.send(request, Credential::Configured, &guard).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = Challenge::from_headers(response.headers())?;
        debug!(?challenge, "Registry requested authentication");
        let (username, password) = config.auth().basic_credentials().ok_or_else(|| {
            RegistryError::AuthConfig(format!(
                "{} requires authentication but no basic credentials are configured",
                response.url()
            ))
        })?;

        let response = match challenge {
            Challenge::Bearer(challenge) => {
                let token = self
                    .fetch_token(&challenge, username, password, &guard)
                    .await?;
                debug!("Retrying request with bearer token");
                self.send(request, Credential::Bearer(token.token()), &guard)
                    .await?
            }
            Challenge::Basic => {
                debug!("Retrying request with HTTP basic authentication");
                self.send(request, Credential::Basic(username, password), &guard)
                    .await?
            }
        };

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Registry still requires authentication after retrying with credentials");
        }
        Ok(response)
    }

    /// Sends a fresh copy of `request`. The copy is the only thing modified.
    async fn send(
        &self,
        request: &Request,
        credential: Credential<'_>,
        guard: &Guard<'_>,
    ) -> Result<Response> {
        let url = request.url(self.config.address());
        let mut wire = wire_request(
            request.method().clone(),
            &url,
            request.body().cloned().unwrap_or_default(),
        )?;
        let headers = wire.headers_mut();
        *headers = request.headers().clone();
        if let Some(user_agent) = self.config.user_agent() {
            if !headers.contains_key(USER_AGENT) {
                headers.insert(USER_AGENT, user_agent.clone());
            }
        }
        match credential {
            Credential::Configured => {
                let auth = self.config.auth();
                if matches!(auth, RegistryAuth::Bearer(_)) && !headers.contains_key(AUTHORIZATION)
                {
                    trace!("Using pre-provisioned bearer token");
                    headers.apply_authentication(auth)?;
                }
            }
            Credential::Bearer(token) => headers.bearer_auth(token)?,
            Credential::Basic(username, password) => headers.basic_auth(username, password)?,
        }

        let response = guard
            .run(self.transport.send(wire).map_err(RegistryError::from))
            .await?;
        trace!(%url, status = %response.status(), "Received response");
        Ok(Response::from_http(url, response))
    }

    /// Exchanges basic credentials for a token at the challenge realm
    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        username: &str,
        password: &str,
        guard: &Guard<'_>,
    ) -> Result<RegistryToken> {
        let scope = self.config.auth_scope().or(challenge.scope.as_deref());
        let service = challenge.service.as_deref();
        let mut query = Vec::new();
        if let Some(s) = service {
            query.push(("service", s));
        }
        if let Some(s) = scope {
            query.push(("scope", s));
        }

        let mut realm = challenge.realm.clone();
        if !query.is_empty() {
            realm.query_pairs_mut().extend_pairs(query);
        }

        debug!(realm = %challenge.realm, ?service, ?scope, "Making authentication call");
        let mut wire = wire_request(Method::GET, &realm, Bytes::new())?;
        let headers = wire.headers_mut();
        if let Some(user_agent) = self.config.user_agent() {
            headers.insert(USER_AGENT, user_agent.clone());
        }
        headers.basic_auth(username, password)?;

        let auth_res = guard
            .run(self.transport.send(wire).map_err(RegistryError::from))
            .await?;

        match auth_res.status() {
            StatusCode::OK => {
                let token = RegistryToken::from_slice(auth_res.body())?;
                debug!("Successfully obtained token from {}", challenge.realm);
                Ok(token)
            }
            status => {
                let reason = String::from_utf8_lossy(auth_res.body()).into_owned();
                debug!(%status, "Failed to authenticate at {}: {}", challenge.realm, reason);
                Err(TokenExchangeError::UnexpectedStatus {
                    realm: challenge.realm.to_string(),
                    status: status.as_u16(),
                    message: reason,
                }
                .into())
            }
        }
    }
}

fn wire_request(method: Method, url: &Url, body: Bytes) -> Result<http::Request<Bytes>> {
    http::Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(body)
        .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::ChallengeParseError;
    use crate::transport::TransportError;
    use futures_util::future::BoxFuture;
    use http::header::WWW_AUTHENTICATE;
    use http::HeaderMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const REGISTRY: &str = "http://reg.test";
    const NAMESPACE: &str = "testnamespace";
    const REALM: &str = "http://auth.test/v2/auth";
    const CHALLENGE: &str =
        r#"Bearer realm="http://auth.test/v2/auth",service="testservice",scope="testscope""#;
    const BASIC_HEADER: &str = "Basic dGVzdHVzZXI6dGVzdHBhc3M=";
    const TOKEN: &str = "abc123";

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        uri: String,
        headers: HeaderMap,
    }

    impl Recorded {
        fn authorization(&self) -> Option<&str> {
            self.headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
        }
    }

    enum Reply {
        Respond(http::Response<Bytes>),
        Fail,
        Hang,
    }

    type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

    struct MockTransport {
        handler: Box<Handler>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl MockTransport {
        fn new(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(MockTransport {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn requests_to(&self, prefix: &str) -> Vec<Recorded> {
            self.requests()
                .into_iter()
                .filter(|r| r.uri.starts_with(prefix))
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn send(
            &self,
            request: http::Request<Bytes>,
        ) -> BoxFuture<'_, std::result::Result<http::Response<Bytes>, TransportError>> {
            let recorded = Recorded {
                method: request.method().clone(),
                uri: request.uri().to_string(),
                headers: request.headers().clone(),
            };
            self.requests.lock().unwrap().push(recorded.clone());
            let reply = (self.handler)(&recorded);
            Box::pin(async move {
                match reply {
                    Reply::Respond(response) => Ok(response),
                    Reply::Fail => Err(TransportError::msg("connection refused")),
                    Reply::Hang => std::future::pending().await,
                }
            })
        }
    }

    fn status(code: StatusCode) -> Reply {
        Reply::Respond(
            http::Response::builder()
                .status(code)
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn challenge(header: &str) -> Reply {
        Reply::Respond(
            http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header(WWW_AUTHENTICATE, header)
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn json(body: &'static str) -> Reply {
        Reply::Respond(
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    /// A registry that wants `Bearer abc123` and a realm that hands it out for
    /// testuser:testpass
    fn registry_and_realm(req: &Recorded) -> Reply {
        if req.uri.starts_with(REALM) {
            if req.authorization() == Some(BASIC_HEADER) {
                json(r#"{"token": "abc123"}"#)
            } else {
                status(StatusCode::UNAUTHORIZED)
            }
        } else if req.authorization() == Some("Bearer abc123") {
            status(StatusCode::OK)
        } else {
            challenge(CHALLENGE)
        }
    }

    fn basic_auth() -> RegistryAuth {
        RegistryAuth::Basic("testuser".to_string(), "testpass".to_string())
    }

    fn client_with(auth: RegistryAuth, transport: Arc<MockTransport>) -> Client {
        let config = ClientConfig::new(REGISTRY, NAMESPACE, auth).expect("valid config");
        Client::with_transport(config, transport)
    }

    #[tokio::test]
    async fn answers_bearer_challenge() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::OK);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].uri, "http://reg.test/v2/testnamespace/tags/list");
        assert_eq!(requests[0].authorization(), None);
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(
            requests[1].uri,
            "http://auth.test/v2/auth?service=testservice&scope=testscope"
        );
        assert_eq!(requests[1].authorization(), Some(BASIC_HEADER));
        assert_eq!(requests[2].uri, "http://reg.test/v2/testnamespace/tags/list");
        assert_eq!(requests[2].authorization(), Some("Bearer abc123"));
        Ok(())
    }

    #[tokio::test]
    async fn execute_does_not_modify_request() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(basic_auth(), transport.clone());

        let mut req = client.new_request("GET", "/v2/:name/tags/list")?;
        let old = req.path_and_query();
        req.set_query_param("digest", "zwxyz");
        let before = req.clone();

        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(req, before);
        assert_eq!(req.path_and_query(), format!("{}?digest=zwxyz", old));

        let retried = transport.requests_to(REGISTRY).pop().unwrap();
        assert_eq!(
            retried.uri,
            "http://reg.test/v2/testnamespace/tags/list?digest=zwxyz"
        );
        assert_eq!(res.url().as_str(), retried.uri);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_credentials_fail_token_exchange() {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(
            RegistryAuth::Basic("testuser".to_string(), "wrong".to_string()),
            transport.clone(),
        );

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::TokenExchange(TokenExchangeError::UnexpectedStatus { status: 401, .. })
        ));
        assert_eq!(transport.requests_to(REGISTRY).len(), 1);
        assert_eq!(transport.requests_to(REALM).len(), 1);
    }

    #[tokio::test]
    async fn malformed_token_body() {
        for body in [
            r#"{"not_a_token": "abc123"}"#,
            r#"{"token": "abc\n123"}"#,
        ] {
            let transport = MockTransport::new(move |req| {
                if req.uri.starts_with(REALM) {
                    json(body)
                } else {
                    challenge(CHALLENGE)
                }
            });
            let client = client_with(basic_auth(), transport.clone());

            let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
            let err = client.execute(&req).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    RegistryError::TokenExchange(TokenExchangeError::InvalidBody(_))
                ),
                "body {}: {:?}",
                body,
                err
            );
            assert_eq!(transport.requests_to(REGISTRY).len(), 1);
        }
    }

    #[tokio::test]
    async fn challenge_without_realm() {
        let transport = MockTransport::new(|_| {
            challenge(r#"Bearer service="testservice",scope="testscope""#)
        });
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ChallengeParse(ChallengeParseError::MissingRealm)
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_without_challenge() {
        let transport = MockTransport::new(|_| status(StatusCode::UNAUTHORIZED));
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ChallengeParse(ChallengeParseError::MissingHeader)
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn challenge_without_credentials() {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(RegistryAuth::Anonymous, transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(err, RegistryError::AuthConfig(_)));
        assert!(transport.requests_to(REALM).is_empty());
    }

    #[tokio::test]
    async fn non_challenge_status_is_returned_unchanged() -> anyhow::Result<()> {
        let transport = MockTransport::new(|_| status(StatusCode::NOT_FOUND));
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::HEAD, "/v2/:name/manifests/latest")?;
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.requests()[0].method, Method::HEAD);
        Ok(())
    }

    #[tokio::test]
    async fn second_challenge_is_final() -> anyhow::Result<()> {
        let transport = MockTransport::new(|req| {
            if req.uri.starts_with(REALM) {
                json(r#"{"token": "abc123"}"#)
            } else {
                challenge(CHALLENGE)
            }
        });
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(transport.requests_to(REGISTRY).len(), 2);
        assert_eq!(transport.requests_to(REALM).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_execution_fetches_new_tokens() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        assert_eq!(client.execute(&req).await?.status(), StatusCode::OK);
        assert_eq!(client.execute(&req).await?.status(), StatusCode::OK);

        let requests = transport.requests();
        assert_eq!(requests.len(), 6);
        assert_eq!(transport.requests_to(REALM).len(), 2);
        // the second call starts without the token obtained by the first
        assert_eq!(requests[3].authorization(), None);
        Ok(())
    }

    #[tokio::test]
    async fn preprovisioned_bearer_token() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(RegistryAuth::Bearer(TOKEN.to_string()), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.requests()[0].authorization(), Some("Bearer abc123"));
        Ok(())
    }

    #[tokio::test]
    async fn caller_authorization_header_is_sent_first() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(basic_auth(), transport.clone());

        let mut req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        req.set_header(AUTHORIZATION, http::HeaderValue::from_static("Bearer stale"));
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::OK);

        let registry = transport.requests_to(REGISTRY);
        assert_eq!(registry[0].authorization(), Some("Bearer stale"));
        assert_eq!(registry[1].authorization(), Some("Bearer abc123"));
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer stale");
        Ok(())
    }

    #[tokio::test]
    async fn answers_basic_challenge() -> anyhow::Result<()> {
        let transport = MockTransport::new(|req| {
            if req.authorization() == Some(BASIC_HEADER) {
                status(StatusCode::OK)
            } else {
                challenge(r#"Basic realm="Registry Realm""#)
            }
        });
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        let res = client.execute(&req).await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(transport.requests().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn transport_errors_are_surfaced() {
        let transport = MockTransport::new(|req| {
            if req.uri.starts_with(REALM) {
                Reply::Fail
            } else {
                challenge(CHALLENGE)
            }
        });
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
        assert_eq!(transport.requests_to(REGISTRY).len(), 1);
    }

    #[tokio::test]
    async fn auth_scope_and_user_agent() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let config = ClientConfig::new(REGISTRY, NAMESPACE, basic_auth())?
            .with_user_agent("reggie-test/1.0")?
            .with_auth_scope("repository:testnamespace:pull,push");
        let client = Client::with_transport(config, transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list")?;
        client.execute(&req).await?;

        let requests = transport.requests();
        assert_eq!(
            requests[1].uri,
            "http://auth.test/v2/auth?service=testservice&scope=repository%3Atestnamespace%3Apull%2Cpush"
        );
        for r in &requests {
            assert_eq!(r.headers[USER_AGENT], "reggie-test/1.0");
        }
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_before_retry() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let transport = MockTransport::new(move |req| {
            if req.uri.starts_with(REALM) {
                trigger.cancel();
            }
            registry_and_realm(req)
        });
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client
            .execute_with_cancellation(&req, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
        // no retry is attempted once cancelled
        assert_eq!(transport.requests_to(REGISTRY).len(), 1);
    }

    #[tokio::test]
    async fn deadline_exceeded() {
        let transport = MockTransport::new(|_| Reply::Hang);
        let client = client_with(basic_auth(), transport.clone());

        let req = client.new_request(Method::GET, "/v2/:name/tags/list").unwrap();
        let err = client
            .execute_with_deadline(&req, Instant::now() + Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DeadlineExceeded));
        assert!(err.is_cancellation());

        // the client is still usable afterwards
        assert!(client.new_request(Method::GET, "/v2/:name/tags/list").is_ok());
    }

    #[tokio::test]
    async fn set_auth_only_affects_this_client() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let anonymous = client_with(RegistryAuth::Anonymous, transport.clone());
        let mut authenticated = anonymous.clone();
        authenticated.set_auth(basic_auth());

        let req = anonymous.new_request(Method::GET, "/v2/:name/tags/list")?;
        assert_eq!(authenticated.execute(&req).await?.status(), StatusCode::OK);
        assert!(matches!(
            anonymous.execute(&req).await.unwrap_err(),
            RegistryError::AuthConfig(_)
        ));
        assert_eq!(anonymous.config().auth(), &RegistryAuth::Anonymous);
        Ok(())
    }

    #[test]
    fn new_request_with_path_params() -> anyhow::Result<()> {
        let transport = MockTransport::new(registry_and_realm);
        let client = client_with(RegistryAuth::Anonymous, transport.clone());
        let req = client.new_request_with(
            Method::PUT,
            "/v2/:name/manifests/:reference",
            PathParams::new().reference("v1"),
        )?;
        assert_eq!(req.path(), "/v2/testnamespace/manifests/v1");

        let err = client
            .new_request_with(
                Method::GET,
                "/v2/:name/manifests/:reference",
                PathParams::new().reference(".."),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidUrl(_)));
        assert!(transport.requests().is_empty());

        let err = client.new_request("BAD METHOD", "/v2/").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidMethod(_)));
        Ok(())
    }
}
