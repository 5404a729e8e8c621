//! In-place rendering of Markdown containers.

use anyhow::{Result, anyhow, bail};
use clap::ValueEnum;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::document::{ContainerSelector, Document, MarkdownContainer};
use crate::markdown::{LinkResolver, MarkdownConverter};
use crate::retrieve::{Retrieve, Retriever};

/// Default number of documents retrieved at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// What to do with a container that has no location attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MissingSource {
    /// Render it like a failed retrieval: empty content, reported as failure.
    #[default]
    Fail,
    /// Leave its content untouched.
    Skip,
    /// Stop before retrieving anything; the page is not modified.
    Abort,
}

/// A container that rendered with empty content.
#[derive(Debug)]
pub struct RenderFailure {
    index: usize,
    source: Option<String>,
    location: Option<Url>,
    error: anyhow::Error,
}

impl RenderFailure {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Location attribute as written in the page.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Location after resolution against the page URL, when it resolved.
    pub fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

/// Outcome counts of one rendering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RenderSummary {
    pub fn total(&self) -> usize {
        self.rendered + self.failed + self.skipped
    }
}

type FailureHook = Box<dyn Fn(&RenderFailure) + Send + Sync>;

/// Retrieval outcome of one container.
enum Fetched {
    Text { location: Url, text: String },
    Failed { location: Option<Url>, error: anyhow::Error },
    Skipped,
}

/// Renders every Markdown container of a page in place.
///
/// Each container's location is resolved against the page URL, retrieved,
/// converted and written back as the container's inner HTML. Retrievals run
/// concurrently up to a limit, but conversion and writes follow document
/// order. A failed retrieval renders the conversion of an empty document;
/// it is logged and handed to the failure hook, never propagated.
pub struct MarkdownRenderer<R = Retriever> {
    retriever: R,
    converter: MarkdownConverter,
    selector: ContainerSelector,
    page: Url,
    missing_source: MissingSource,
    concurrency: usize,
    rebase_links: bool,
    on_failure: Option<FailureHook>,
}

impl MarkdownRenderer<Retriever> {
    /// Creates renderer for a page at `page`, retrieving over HTTP and file URLs.
    pub fn new(page: Url) -> Self {
        Self::with_retriever(Retriever::new(), page)
    }
}

impl<R: Retrieve> MarkdownRenderer<R> {
    /// Creates renderer with a custom retrieval backend.
    pub fn with_retriever(retriever: R, page: Url) -> Self {
        Self {
            retriever,
            converter: MarkdownConverter::new(),
            selector: ContainerSelector::default(),
            page,
            missing_source: MissingSource::default(),
            concurrency: DEFAULT_CONCURRENCY,
            rebase_links: false,
            on_failure: None,
        }
    }

    pub fn selector(mut self, selector: ContainerSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn converter(mut self, converter: MarkdownConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn missing_source(mut self, policy: MissingSource) -> Self {
        self.missing_source = policy;
        self
    }

    /// Caps in-flight retrievals. `1` retrieves strictly one after another.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Rebases relative links of each document onto the page.
    pub fn rebase_links(mut self, enabled: bool) -> Self {
        self.rebase_links = enabled;
        self
    }

    /// Installs a callback invoked for every container that failed.
    ///
    /// Without a hook failures are only logged.
    pub fn on_failure(mut self, hook: impl Fn(&RenderFailure) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Box::new(hook));
        self
    }

    /// Renders all containers of `document` in place.
    ///
    /// The page is replaced once every container of the pass is resolved,
    /// so an error leaves it unmodified.
    ///
    /// # Errors
    ///
    /// Returns error if the markup cannot be rewritten, or if a container
    /// lacks its location attribute under [`MissingSource::Abort`]. Retrieval
    /// failures are not errors.
    pub async fn render_all(&self, document: &mut Document) -> Result<RenderSummary> {
        let marked = document.mark(&self.selector)?;
        let containers = marked.containers();

        if containers.is_empty() {
            debug!(class = self.selector.class(), "No Markdown containers found");
            return Ok(RenderSummary::default());
        }

        if self.missing_source == MissingSource::Abort
            && let Some(container) = containers.iter().find(|c| c.source().is_none())
        {
            bail!(
                "Markdown container #{} has no `{}` attribute",
                container.index(),
                self.selector.attribute()
            );
        }

        let fetched: Vec<Fetched> = stream::iter(containers.iter().map(|c| self.fetch(c)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let empty = self.converter.convert("")?;
        let mut summary = RenderSummary::default();
        let mut contents = Vec::with_capacity(containers.len());

        for (container, fetched) in containers.iter().zip(fetched) {
            let content = match fetched {
                Fetched::Skipped => {
                    debug!(index = container.index(), "Skipping container without location");
                    summary.skipped += 1;
                    None
                }
                Fetched::Text { location, text } => match self.convert(&text, &location) {
                    Ok(html) => {
                        summary.rendered += 1;
                        Some(html)
                    }
                    Err(error) => {
                        self.report(container, Some(location), error);
                        summary.failed += 1;
                        Some(empty.clone())
                    }
                },
                Fetched::Failed { location, error } => {
                    self.report(container, location, error);
                    summary.failed += 1;
                    Some(empty.clone())
                }
            };
            contents.push(content);
        }

        document.fill(marked, &self.selector, &contents)?;

        info!(
            rendered = summary.rendered,
            failed = summary.failed,
            skipped = summary.skipped,
            "Rendered Markdown containers"
        );
        Ok(summary)
    }

    async fn fetch(&self, container: &MarkdownContainer) -> Fetched {
        let Some(source) = container.source() else {
            return match self.missing_source {
                MissingSource::Skip => Fetched::Skipped,
                MissingSource::Fail | MissingSource::Abort => Fetched::Failed {
                    location: None,
                    error: anyhow!("missing `{}` attribute", self.selector.attribute()),
                },
            };
        };

        let location = match self.page.join(source) {
            Ok(location) => location,
            Err(e) => {
                return Fetched::Failed {
                    location: None,
                    error: anyhow::Error::new(e).context(format!("Invalid location {source:?}")),
                };
            }
        };

        debug!(index = container.index(), %location, "Retrieving Markdown document");
        match self.retriever.retrieve(&location).await {
            Ok(text) => Fetched::Text { location, text },
            Err(error) => Fetched::Failed {
                location: Some(location),
                error,
            },
        }
    }

    fn convert(&self, text: &str, location: &Url) -> Result<String> {
        if self.rebase_links {
            let resolver = LinkResolver::new(location.clone(), self.page.clone());
            self.converter.convert_rebased(text, &resolver)
        } else {
            self.converter.convert(text)
        }
    }

    fn report(&self, container: &MarkdownContainer, location: Option<Url>, error: anyhow::Error) {
        let message = format!("{error:#}");
        warn!(
            index = container.index(),
            source = container.source().unwrap_or_default(),
            error = %message,
            "Rendering Markdown container with empty content"
        );

        if let Some(hook) = &self.on_failure {
            hook(&RenderFailure {
                index: container.index(),
                source: container.source().map(String::from),
                location,
                error,
            });
        }
    }
}
