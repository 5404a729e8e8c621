//! Markdown conversion with GitHub Flavored Markdown support.
//!
//! This module converts retrieved Markdown documents to HTML fragments using
//! comrak with GFM extensions, highlights fenced code with syntect, and
//! optionally rebases relative links onto the embedding page.

mod converter;
mod links;

pub use converter::MarkdownConverter;
pub use links::LinkResolver;
