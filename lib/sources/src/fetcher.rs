use async_trait::async_trait;
use rdf_relay_api::{FetchRequest, FetchResponse, Fetcher};
use rdf_relay_common::{EngineError, EngineResult};

const USER_AGENT: &str = concat!("rdf-relay/", env!("CARGO_PKG_VERSION"));

/// The default [`Fetcher`], backed by a shared [`reqwest::Client`].
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> EngineResult<FetchResponse> {
        let url = request.url.clone();
        let mut builder = match request.method {
            "POST" => self.client.post(&request.url),
            _ => self.client.get(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(auth) = &request.auth {
            let (user, password) = auth.split_once(':').unwrap_or((auth.as_str(), ""));
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::source(&url, e))?;
        let status = response.status().as_u16();
        let ok = response.status().is_success();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::source(&url, e))?
            .to_vec();
        Ok(FetchResponse {
            status,
            ok,
            url: final_url,
            headers,
            body,
        })
    }
}
