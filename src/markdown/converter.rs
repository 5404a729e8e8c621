//! Markdown to HTML conversion with GitHub Flavored Markdown support.

use anyhow::{Context, Result};
use comrak::Options;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::debug;

use super::LinkResolver;

const CODE_OPEN: &str = "<code class=\"language-";
const CODE_CLOSE: &str = "</code>";

/// Converts Markdown documents to HTML fragments.
///
/// Stateless between calls: the same input always yields the same output.
/// Enables the GFM extensions (tables, strikethrough, autolinks, task lists,
/// footnotes, description lists), smart punctuation, heading ids and raw
/// HTML pass-through. Fenced code blocks with a language are highlighted
/// with CSS classes through syntect.
pub struct MarkdownConverter {
    options: Options<'static>,
    syntax_set: Option<SyntaxSet>,
}

impl MarkdownConverter {
    /// Creates converter with heading ids and code highlighting enabled.
    pub fn new() -> Self {
        let mut options = Options::default();

        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options.extension.description_lists = true;
        options.extension.header_ids = Some(String::new());

        options.parse.smart = true;

        // Embedded documents are trusted like the page itself
        options.render.unsafe_ = true;

        Self {
            options,
            syntax_set: Some(SyntaxSet::load_defaults_newlines()),
        }
    }

    /// Toggles `id` attributes derived from heading text.
    pub fn with_heading_ids(mut self, enabled: bool) -> Self {
        self.options.extension.header_ids = enabled.then(String::new);
        self
    }

    /// Toggles syntax highlighting of fenced code blocks.
    pub fn with_highlighting(mut self, enabled: bool) -> Self {
        self.syntax_set = enabled.then(SyntaxSet::load_defaults_newlines);
        self
    }

    /// Converts Markdown content to an HTML fragment.
    ///
    /// Empty input converts to an empty string.
    ///
    /// # Errors
    ///
    /// Returns error if syntax highlighting fails
    pub fn convert(&self, content: &str) -> Result<String> {
        let html = comrak::markdown_to_html(content, &self.options);

        match &self.syntax_set {
            Some(syntax_set) => highlight_code_blocks(&html, syntax_set),
            None => Ok(html),
        }
    }

    /// Converts Markdown content and rebases its relative links.
    ///
    /// `href` of anchors and `src` of images are passed through the
    /// resolver. A link the resolver rejects is left as written.
    ///
    /// # Errors
    ///
    /// Returns error if conversion or link rewriting fails
    pub fn convert_rebased(&self, content: &str, resolver: &LinkResolver) -> Result<String> {
        let html = self.convert(content)?;
        rebase_links(&html, resolver)
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn rebase_links(html: &str, resolver: &LinkResolver) -> Result<String> {
    let rebase = |link: String| match resolver.resolve(&link) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!(%link, error = %e, "Keeping link as written");
            link
        }
    };

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href") {
                        el.set_attribute("href", &rebase(href))?;
                    }
                    Ok(())
                }),
                element!("img[src]", |el| {
                    if let Some(src) = el.get_attribute("src") {
                        el.set_attribute("src", &rebase(src))?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .context("Failed to rebase links")
}

/// Byte ranges of one `<code class="language-X">...</code>` block.
struct CodeBlock<'h> {
    start: usize,
    end: usize,
    language: &'h str,
    body: &'h str,
}

fn find_code_block(html: &str, from: usize) -> Option<CodeBlock<'_>> {
    let mut search = from;

    loop {
        let start = search + html[search..].find(CODE_OPEN)?;
        let language_start = start + CODE_OPEN.len();

        let parsed = html[language_start..].find('"').and_then(|len| {
            let language_end = language_start + len;
            let body_start = language_end + html[language_end..].find('>')? + 1;
            let body_end = body_start + html[body_start..].find(CODE_CLOSE)?;
            Some(CodeBlock {
                start,
                end: body_end + CODE_CLOSE.len(),
                language: &html[language_start..language_end],
                body: &html[body_start..body_end],
            })
        });

        match parsed {
            Some(block) => return Some(block),
            None => search = start + 1,
        }
    }
}

/// Replaces the escaped text of fenced code blocks with highlighted spans.
///
/// The `language-*` class written by comrak is preserved on the tag.
fn highlight_code_blocks(html: &str, syntax_set: &SyntaxSet) -> Result<String> {
    let mut result = String::with_capacity(html.len());
    let mut copied = 0;

    while let Some(block) = find_code_block(html, copied) {
        result.push_str(&html[copied..block.start]);

        let highlighted = highlight_code(&unescape(block.body), block.language, syntax_set)
            .with_context(|| format!("Failed to highlight {} code block", block.language))?;

        result.push_str(CODE_OPEN);
        result.push_str(block.language);
        result.push_str("\">");
        result.push_str(&highlighted);
        result.push_str(CODE_CLOSE);

        copied = block.end;
    }

    result.push_str(&html[copied..]);
    Ok(result)
}

/// Highlights code with `hljs-` prefixed CSS classes.
///
/// Unknown languages fall back to escaped plain text.
fn highlight_code(code: &str, language: &str, syntax_set: &SyntaxSet) -> Result<String> {
    if code.is_empty() {
        return Ok(String::new());
    }

    let Some(syntax) = syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_extension(language))
    else {
        return Ok(escape(code));
    };

    let mut generator = ClassedHTMLGenerator::new_with_class_style(
        syntax,
        syntax_set,
        ClassStyle::SpacedPrefixed { prefix: "hljs-" },
    );

    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }

    Ok(generator.finalize())
}

fn unescape(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
