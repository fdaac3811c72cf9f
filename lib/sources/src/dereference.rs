use async_trait::async_trait;
use oxrdfio::{RdfFormat, RdfParser};
use rdf_relay_api::{Dereference, Dereferencer, FetchRequest, Fetcher, QueryContext};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::Quad;
use std::path::Path;
use std::sync::Arc;

const ACCEPT: &str = "application/trig, application/n-quads, text/turtle, \
                      application/n-triples, application/rdf+xml";

const HYDRA_NS: &str = "http://www.w3.org/ns/hydra/core#";
const VOID_NS: &str = "http://rdfs.org/ns/void#";

/// The default [`Dereferencer`]: fetch through the [`Fetcher`] contract (or
/// the filesystem for `file://` URLs), parse by content type with oxrdfio,
/// and split the document into data quads and the quads describing the
/// document itself.
pub struct HttpDereferencer {
    fetcher: Arc<dyn Fetcher>,
}

impl HttpDereferencer {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Dereferencer for HttpDereferencer {
    async fn dereference(&self, url: &str, ctx: &QueryContext) -> EngineResult<Dereference> {
        let (body, media_type, final_url) = if let Some(path) = url.strip_prefix("file://") {
            let body =
                std::fs::read(path).map_err(|e| EngineError::source(url, e))?;
            let media_type = Path::new(path)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(RdfFormat::from_extension)
                .map(|format| format.media_type().to_owned());
            (body, media_type, url.to_owned())
        } else {
            let request = FetchRequest::get(url)
                .with_accept(ACCEPT)
                .with_auth(ctx.auth().map(str::to_owned), ctx.include_credentials());
            let response = self.fetcher.fetch(request).await?;
            if !response.ok {
                return Err(EngineError::source(
                    url,
                    format!("HTTP status {}", response.status),
                ));
            }
            let media_type = response.content_type().map(str::to_owned);
            let final_url = response.url.clone();
            (response.body, media_type, final_url)
        };

        let format = media_type
            .as_deref()
            .and_then(RdfFormat::from_media_type)
            .unwrap_or(RdfFormat::Turtle);
        let mut parser = RdfParser::from_format(format);
        if let Ok(with_base) = RdfParser::from_format(format).with_base_iri(&final_url) {
            parser = with_base;
        }

        let mut quads = Vec::new();
        let mut metadata = Vec::new();
        for quad in parser.for_reader(body.as_slice()) {
            let quad = match quad {
                Ok(quad) => quad,
                Err(e) if ctx.lenient() => {
                    tracing::debug!(url, error = %e, "skipping malformed quad");
                    continue;
                }
                Err(e) => return Err(EngineError::source(url, e)),
            };
            if is_metadata(&quad, &final_url) {
                metadata.push(quad);
            } else {
                quads.push(quad);
            }
        }
        tracing::debug!(
            url,
            data = quads.len(),
            metadata = metadata.len(),
            "dereferenced document"
        );
        Ok(Dereference {
            url: final_url,
            media_type,
            quads,
            metadata,
        })
    }
}

/// Whether a quad describes the document rather than the data: hypermedia
/// controls and dataset statistics, or any statement about the page URL.
fn is_metadata(quad: &Quad, url: &str) -> bool {
    let predicate = quad.predicate.as_str();
    if predicate.starts_with(HYDRA_NS) || predicate.starts_with(VOID_NS) {
        return true;
    }
    match &quad.subject {
        rdf_relay_model::Subject::NamedNode(subject) => {
            // Ignore a fragment when comparing against the page URL.
            let subject = subject.as_str();
            subject.split('#').next() == url.split('#').next()
        }
        _ => false,
    }
}
