//! Renders Markdown documents referenced by HTML elements in place.

mod config;
mod document;
mod markdown;
mod render;
mod retrieve;

pub use config::Config;
pub use document::{ContainerSelector, Document, MarkdownContainer};
pub use markdown::{LinkResolver, MarkdownConverter};
pub use render::{
    DEFAULT_CONCURRENCY, MarkdownRenderer, MissingSource, RenderFailure, RenderSummary,
};
pub use retrieve::{Retrieve, RetrievalError, Retriever};
