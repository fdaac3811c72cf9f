mod controls;

pub use controls::{extract_controls, instantiate_search_form, Controls, SearchForm};

use crate::DereferenceCache;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{ready, FutureExt, Stream};
use rdf_relay_api::{
    Actor, Dereference, Dereferencer, EngineView, QuadPatternAction, QueryContext,
    ResolvedQuads, Source, SourceKind, TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineError, EngineResult};
use rdf_relay_model::{Quad, QuadPattern};
use rustc_hash::FxHashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Resolves quad patterns against dereferenceable documents and Triple/Quad
/// Pattern Fragments interfaces.
///
/// The source URL is dereferenced through the cache. If the document
/// advertises a Hydra search form, the form is instantiated with the
/// pattern's ground terms and the resulting fragment is streamed page by
/// page, following `hydra:next` links. A plain document without controls is
/// matched directly.
pub struct HypermediaSourceActor {
    cache: Arc<DereferenceCache>,
}

impl HypermediaSourceActor {
    pub fn new(cache: Arc<DereferenceCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Actor<QuadPatternAction> for HypermediaSourceActor {
    fn name(&self) -> &'static str {
        "source-hypermedia"
    }

    fn test(&self, _action: &QuadPatternAction, ctx: &QueryContext) -> TestOutcome {
        match ctx.sources() {
            [Source::Iri { kind, .. }] if matches!(
                kind,
                SourceKind::Auto | SourceKind::Hypermedia | SourceKind::File
            ) =>
            {
                TestOutcome::passed()
            }
            _ => TestOutcome::Rejected("requires a single dereferenceable source"),
        }
    }

    async fn run(
        &self,
        action: QuadPatternAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedQuads> {
        let [Source::Iri { value: url, .. }] = ctx.sources() else {
            return EngineError::internal("hypermedia actor ran without an IRI source");
        };
        let document = self
            .cache
            .dereference(url, ctx, &view.dereferencer)
            .await?;
        let document_controls = extract_controls(&document.metadata, &document.url);

        // With a search form, re-dereference the instantiated fragment;
        // without one, the document itself is the single page, including the
        // quads our dereferencer classified as "about the document".
        let (page, include_metadata) = match &document_controls.search {
            Some(form) => {
                let fragment_url = instantiate_search_form(form, &action.pattern);
                tracing::debug!(url = %fragment_url, "instantiated search form");
                let page = self
                    .cache
                    .dereference(&fragment_url, ctx, &view.dereferencer)
                    .await?;
                (page, false)
            }
            None => (document, true),
        };

        let page_controls = extract_controls(&page.metadata, &page.url);
        let matched = match_page(&page, &action.pattern, include_metadata);
        let cardinality = match (page_controls.total_items, &page_controls.next) {
            (Some(total), _) => Cardinality::Estimate(total),
            (None, None) => Cardinality::from(matched.len()),
            (None, Some(_)) => Cardinality::Infinite,
        };

        let mut seen_pages = FxHashSet::default();
        seen_pages.insert(page.url.clone());
        Ok(ResolvedQuads {
            stream: Box::pin(PageStream {
                cache: Arc::clone(&self.cache),
                dereferencer: Arc::clone(&view.dereferencer),
                ctx: ctx.clone(),
                pattern: action.pattern,
                include_metadata,
                seen_pages,
                state: PageState::Emitting {
                    quads: matched.into_iter(),
                    next: page_controls.next,
                },
            }),
            cardinality,
        })
    }
}

fn match_page(page: &Dereference, pattern: &QuadPattern, include_metadata: bool) -> Vec<Quad> {
    let quads = page.quads.iter();
    let metadata = page.metadata.iter().filter(|_| include_metadata);
    quads
        .chain(metadata)
        .filter(|quad| pattern.match_quad(quad).is_some())
        .cloned()
        .collect()
}

enum PageState {
    Emitting {
        quads: std::vec::IntoIter<Quad>,
        next: Option<String>,
    },
    Fetching(BoxFuture<'static, EngineResult<Arc<Dereference>>>),
    Done,
}

/// Streams the matching quads of a fragment, page by page. Pages already
/// delivered stand if a later page fetch fails; the error surfaces on the
/// stream and ends it.
struct PageStream {
    cache: Arc<DereferenceCache>,
    dereferencer: Arc<dyn Dereferencer>,
    ctx: QueryContext,
    pattern: QuadPattern,
    include_metadata: bool,
    /// Guards against next-link cycles between pages.
    seen_pages: FxHashSet<String>,
    state: PageState,
}

impl Stream for PageStream {
    type Item = EngineResult<Quad>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                PageState::Emitting { quads, next } => {
                    if let Some(quad) = quads.next() {
                        return Poll::Ready(Some(Ok(quad)));
                    }
                    match next.take() {
                        Some(url) if this.seen_pages.insert(url.clone()) => {
                            tracing::debug!(url = %url, "following next-page link");
                            let cache = Arc::clone(&this.cache);
                            let dereferencer = Arc::clone(&this.dereferencer);
                            let ctx = this.ctx.clone();
                            this.state = PageState::Fetching(
                                async move {
                                    cache.dereference(&url, &ctx, &dereferencer).await
                                }
                                .boxed(),
                            );
                        }
                        _ => {
                            this.state = PageState::Done;
                            return Poll::Ready(None);
                        }
                    }
                }
                PageState::Fetching(fetch) => match ready!(fetch.poll_unpin(cx)) {
                    Ok(page) => {
                        let controls = extract_controls(&page.metadata, &page.url);
                        let matched =
                            match_page(&page, &this.pattern, this.include_metadata);
                        this.state = PageState::Emitting {
                            quads: matched.into_iter(),
                            next: controls.next,
                        };
                    }
                    Err(e) => {
                        this.state = PageState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                PageState::Done => return Poll::Ready(None),
            }
        }
    }
}
