//! HTML documents and the Markdown containers inside them.

use anyhow::{Context, Result, bail};
use lol_html::html_content::ContentType;
use lol_html::{ElementContentHandlers, RewriteStrSettings, Selector, rewrite_str};
use std::borrow::Cow;
use std::cell::Cell;
use std::fs;
use std::rc::Rc;
use std::path::Path;

/// Transient attribute tying a container to its slot between passes.
const SLOT_ATTRIBUTE: &str = "data-mdembed-slot";

/// Identifies Markdown containers: a CSS class plus a location attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSelector {
    class: String,
    attribute: String,
}

impl ContainerSelector {
    /// Creates selector for elements of `class` carrying `attribute`.
    ///
    /// # Errors
    ///
    /// Returns error if either name is not a valid CSS identifier
    pub fn new(class: impl Into<String>, attribute: impl Into<String>) -> Result<Self> {
        let selector = Self {
            class: class.into(),
            attribute: attribute.into(),
        };

        if !is_identifier(&selector.class) {
            bail!("Invalid container class: {:?}", selector.class);
        }
        if !is_identifier(&selector.attribute) {
            bail!("Invalid attribute name: {:?}", selector.attribute);
        }

        Ok(selector)
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    fn container_selector(&self) -> Result<Selector> {
        format!(".{}", self.class)
            .parse()
            .with_context(|| format!("Invalid container class: {:?}", self.class))
    }

    fn slot_selector(&self) -> Result<Selector> {
        format!(".{}[{}]", self.class, SLOT_ATTRIBUTE)
            .parse()
            .with_context(|| format!("Invalid container class: {:?}", self.class))
    }
}

/// Accepts the plain CSS identifiers usable unescaped in a selector.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl Default for ContainerSelector {
    fn default() -> Self {
        Self {
            class: "markdown".to_string(),
            attribute: "md_file".to_string(),
        }
    }
}

/// Element tagged for Markdown rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownContainer {
    index: usize,
    source: Option<String>,
}

impl MarkdownContainer {
    /// Position among the page's containers in document order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of the location attribute, absent when the element lacks it.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Page markup after the marking pass.
#[derive(Debug)]
pub(crate) struct MarkedDocument {
    html: String,
    containers: Vec<MarkdownContainer>,
}

impl MarkedDocument {
    pub(crate) fn containers(&self) -> &[MarkdownContainer] {
        &self.containers
    }
}

/// HTML page holding Markdown containers.
///
/// Rendering rewrites the markup stream twice. The marking pass tags each
/// container with its slot number; the filling pass replaces the inner HTML
/// of every slot and strips the tag. Markup outside containers is left as
/// it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    html: String,
}

impl Document {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Reads page from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read as UTF-8
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML page: {}", path.display()))?;
        Ok(Self::new(html))
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    /// Lists Markdown containers in document order.
    ///
    /// A container nested inside another one is not listed: the outer
    /// container's rendered content replaces it.
    ///
    /// # Errors
    ///
    /// Returns error if the markup cannot be tokenized
    pub fn containers(&self, selector: &ContainerSelector) -> Result<Vec<MarkdownContainer>> {
        Ok(self.mark(selector)?.containers)
    }

    /// Tags every container with its slot number.
    ///
    /// The document itself is not modified.
    pub(crate) fn mark(&self, selector: &ContainerSelector) -> Result<MarkedDocument> {
        let mut containers = Vec::new();
        // Containers currently open around the tokenizer position.
        let open = Rc::new(Cell::new(0usize));

        let html = rewrite_str(
            &self.html,
            RewriteStrSettings {
                element_content_handlers: vec![(
                    Cow::Owned(selector.container_selector()?),
                    ElementContentHandlers::default().element(|el| {
                        let nested = open.get() > 0;
                        if el.can_have_content() {
                            open.set(open.get() + 1);
                            let open = Rc::clone(&open);
                            el.on_end_tag(move |_| {
                                open.set(open.get().saturating_sub(1));
                                Ok(())
                            })?;
                        }
                        if nested {
                            return Ok(());
                        }

                        let index = containers.len();
                        containers.push(MarkdownContainer {
                            index,
                            source: el.get_attribute(selector.attribute()),
                        });
                        el.set_attribute(SLOT_ATTRIBUTE, &index.to_string())?;
                        Ok(())
                    }),
                )],
                ..RewriteStrSettings::default()
            },
        )
        .context("Failed to scan page for Markdown containers")?;

        Ok(MarkedDocument { html, containers })
    }

    /// Writes rendered content into the slots of a marked page.
    ///
    /// `contents[i]` replaces the inner HTML of slot `i`; `None` leaves the
    /// container untouched. The page is replaced only when the whole pass
    /// succeeds.
    pub(crate) fn fill(
        &mut self,
        marked: MarkedDocument,
        selector: &ContainerSelector,
        contents: &[Option<String>],
    ) -> Result<()> {
        let html = rewrite_str(
            &marked.html,
            RewriteStrSettings {
                element_content_handlers: vec![(
                    Cow::Owned(selector.slot_selector()?),
                    ElementContentHandlers::default().element(|el| {
                        let slot = el.get_attribute(SLOT_ATTRIBUTE);
                        el.remove_attribute(SLOT_ATTRIBUTE);

                        let content = slot
                            .and_then(|slot| slot.parse::<usize>().ok())
                            .and_then(|index| contents.get(index))
                            .and_then(Option::as_deref);

                        if let Some(content) = content {
                            el.set_inner_content(content, ContentType::Html);
                        }
                        Ok(())
                    }),
                )],
                ..RewriteStrSettings::default()
            },
        )
        .context("Failed to write rendered Markdown into page")?;

        self.html = html;
        Ok(())
    }
}
