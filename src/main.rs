use anyhow::{Context, Result, bail};
use mdembed::{Config, Document, MarkdownRenderer};
use std::fs;
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_page(config: &Config) -> Result<Document> {
    if config.reads_stdin() {
        let mut html = String::new();
        io::stdin()
            .read_to_string(&mut html)
            .context("Failed to read HTML page from stdin")?;
        return Ok(Document::new(html));
    }

    Document::read(&config.input)
}

fn write_page(config: &Config, document: &Document) -> Result<()> {
    match &config.output {
        Some(path) => fs::write(path, document.html())
            .with_context(|| format!("Failed to write {}", path.display())),
        None => io::stdout()
            .write_all(document.html().as_bytes())
            .context("Failed to write page to stdout"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(&config);
    config.validate().context("Invalid configuration")?;

    let mut document = read_page(&config)?;

    let renderer = MarkdownRenderer::new(config.base_url()?)
        .selector(config.selector()?)
        .converter(config.converter())
        .missing_source(config.on_missing)
        .concurrency(config.concurrency)
        .rebase_links(config.rebase_links);

    let renderer = if config.strict {
        renderer.on_failure(|failure| {
            eprintln!(
                "error: container #{} ({}): {:#}",
                failure.index(),
                failure.source().unwrap_or("no location"),
                failure.error()
            );
        })
    } else {
        renderer
    };

    let summary = renderer
        .render_all(&mut document)
        .await
        .context("Failed to render Markdown containers")?;

    write_page(&config, &document)?;

    if config.open
        && let Some(output) = &config.output
    {
        open::that(output).with_context(|| format!("Failed to open {}", output.display()))?;
    }

    if config.strict && summary.failed > 0 {
        bail!(
            "{} of {} Markdown containers failed to render",
            summary.failed,
            summary.total()
        );
    }

    Ok(())
}
