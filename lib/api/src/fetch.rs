use async_trait::async_trait;
use rdf_relay_common::EngineResult;

/// An HTTP request as seen by the engine.
///
/// Transport is a collaborator; the engine only describes what to fetch.
/// Credentials come either from the `auth` field (`user:password`) or, when
/// `include_credentials` is set, from whatever ambient credentials the
/// implementation manages.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
    pub auth: Option<String>,
    pub include_credentials: bool,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET",
            headers: Vec::new(),
            body: None,
            auth: None,
            include_credentials: false,
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>, content_type: &'static str) -> Self {
        Self {
            url: url.into(),
            method: "POST",
            headers: vec![("content-type", content_type.to_owned())],
            body: Some(body),
            auth: None,
            include_credentials: false,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.headers.push(("accept", accept.into()));
        self
    }

    pub fn with_auth(mut self, auth: Option<String>, include_credentials: bool) -> Self {
        self.auth = auth;
        self.include_credentials = include_credentials;
        self
    }
}

/// An HTTP response with its body read to completion.
///
/// In-flight requests are cancelled by dropping the future returned by
/// [`Fetcher::fetch`].
#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub ok: bool,
    /// The final URL after redirects.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// The first header with the given (lowercase) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        // Strip parameters such as `; charset=utf-8`.
        self.header("content-type")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }
}

/// The HTTP transport contract consumed by the engine.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> EngineResult<FetchResponse>;
}
