//! Link rebasing for embedded documents.

use anyhow::{Context, Result};
use url::Url;

/// Rebases links written for a Markdown document onto the page embedding it.
///
/// A Markdown file links relative to its own location (`./api.md`,
/// `../img/logo.png`). Once its HTML is inlined into a page those links
/// would resolve against the page instead. The resolver joins each link
/// with the document URL and re-expresses it relative to the page URL.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    source: Url,
    page: Url,
}

impl LinkResolver {
    /// Creates resolver for a document embedded in a page.
    ///
    /// # Arguments
    ///
    /// * `source`: URL the Markdown document was retrieved from
    /// * `page`: URL of the page the document is embedded in
    pub fn new(source: Url, page: Url) -> Self {
        Self { source, page }
    }

    /// Resolves link from the embedded document to a page relative URL.
    ///
    /// Handles different link types:
    /// - Absolute URLs (https://, mailto:) remain unchanged
    /// - Anchor links (#section) remain unchanged
    /// - Root relative and protocol relative paths (/docs, //cdn) remain
    ///   unchanged while document and page share an origin
    /// - Relative paths resolve against the document, then relative to the page
    /// - Targets on another origin become absolute URLs
    ///
    /// # Errors
    ///
    /// Returns error if the link cannot be joined with the document URL
    pub fn resolve(&self, link: &str) -> Result<String> {
        if link.is_empty() || link.starts_with('#') || Url::parse(link).is_ok() {
            return Ok(link.to_string());
        }

        let target = self
            .source
            .join(link)
            .with_context(|| format!("Failed to resolve link against {}", self.source))?;

        if link.starts_with('/') {
            return Ok(if same_origin(&self.source, &self.page) {
                link.to_string()
            } else {
                target.to_string()
            });
        }

        Ok(self
            .page
            .make_relative(&target)
            .filter(|relative| !relative.is_empty())
            .unwrap_or_else(|| target.to_string()))
    }
}

/// `file` URLs have opaque origins; they match on host instead.
fn same_origin(a: &Url, b: &Url) -> bool {
    if a.scheme() == "file" && b.scheme() == "file" {
        return a.host() == b.host();
    }
    a.origin() == b.origin()
}
