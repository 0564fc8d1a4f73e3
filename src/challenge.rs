//! Parsing of `WWW-Authenticate` challenges

use http::header::WWW_AUTHENTICATE;
use http::{HeaderMap, HeaderValue};
use http_auth::{parser::ChallengeParser, ChallengeRef};
use url::Url;
use tracing::debug;

use crate::errors::ChallengeParseError;

type Result<T> = std::result::Result<T, ChallengeParseError>;

/// A challenge the client knows how to answer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Challenge {
    /// Obtain a token from an auth realm, then present it as a bearer credential
    Bearer(BearerChallenge),
    /// Present HTTP Basic credentials directly to the registry
    Basic,
}

/// The parameters of a `Bearer` challenge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Where tokens are issued
    pub realm: Url,
    /// Service identifier to pass to the realm
    pub service: Option<String>,
    /// Scope to request from the realm
    pub scope: Option<String>,
}

impl Challenge {
    /// Picks the challenge to answer from the `WWW-Authenticate` headers of a
    /// response. A `Bearer` challenge is preferred over `Basic` when a server
    /// offers both.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let mut values = headers.get_all(WWW_AUTHENTICATE).iter().peekable();
        if values.peek().is_none() {
            return Err(ChallengeParseError::MissingHeader);
        }

        let mut basic = false;
        let mut bearer_error = None;
        let mut seen = Vec::new();
        for value in values {
            let text = header_str(value)?;
            seen.push(text.to_string());
            for parsed in ChallengeParser::new(text) {
                let challenge_ref = match parsed {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(error = ?e, header = text, "Stopped parsing challenge header");
                        break;
                    }
                };
                if challenge_ref.scheme.eq_ignore_ascii_case("Bearer") {
                    match BearerChallenge::try_from(&challenge_ref) {
                        Ok(bearer) => return Ok(Challenge::Bearer(bearer)),
                        Err(e) => bearer_error = Some(e),
                    }
                } else if challenge_ref.scheme.eq_ignore_ascii_case("Basic") {
                    basic = true;
                }
            }
        }

        match (bearer_error, basic) {
            (Some(e), false) => Err(e),
            (_, true) => Ok(Challenge::Basic),
            (None, false) => Err(ChallengeParseError::UnsupportedScheme(seen.join(", "))),
        }
    }
}

impl BearerChallenge {
    /// Parses a single header value such as
    /// `Bearer realm="https://auth.example.com/token",service="registry",scope="repository:foo:pull"`
    pub fn parse(value: &str) -> Result<Self> {
        ChallengeParser::new(value)
            .filter_map(|parser_res| parser_res.ok())
            .find(|challenge_ref| challenge_ref.scheme.eq_ignore_ascii_case("Bearer"))
            .ok_or_else(|| ChallengeParseError::UnsupportedScheme(value.to_string()))
            .and_then(|challenge_ref| BearerChallenge::try_from(&challenge_ref))
    }
}

impl TryFrom<&HeaderValue> for BearerChallenge {
    type Error = ChallengeParseError;

    fn try_from(value: &HeaderValue) -> Result<Self> {
        BearerChallenge::parse(header_str(value)?)
    }
}

impl TryFrom<&ChallengeRef<'_>> for BearerChallenge {
    type Error = ChallengeParseError;

    fn try_from(value: &ChallengeRef<'_>) -> Result<Self> {
        if !value.scheme.eq_ignore_ascii_case("Bearer") {
            return Err(ChallengeParseError::UnsupportedScheme(
                value.scheme.to_string(),
            ));
        }
        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (k, v) in &value.params {
            if k.eq_ignore_ascii_case("realm") {
                realm = Some(v.to_unescaped());
            }

            if k.eq_ignore_ascii_case("service") {
                service = Some(v.to_unescaped());
            }

            if k.eq_ignore_ascii_case("scope") {
                scope = Some(v.to_unescaped());
            }
        }

        let realm = realm.ok_or(ChallengeParseError::MissingRealm)?;
        let realm_url = Url::parse(&realm).map_err(|e| ChallengeParseError::InvalidRealm {
            realm: realm.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(realm_url.scheme(), "http" | "https") {
            return Err(ChallengeParseError::InvalidRealm {
                realm,
                reason: "realm must be an http or https URL".to_string(),
            });
        }

        Ok(BearerChallenge {
            realm: realm_url,
            service,
            scope,
        })
    }
}

fn header_str(value: &HeaderValue) -> Result<&str> {
    value
        .to_str()
        .map_err(|e| ChallengeParseError::InvalidHeader(e.to_string()))
}
