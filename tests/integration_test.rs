//! Integration tests for rendering pages against local and HTTP documents.

mod common;

use anyhow::Result;
use common::{create_site, html_page, page_url};
use mdembed::{
    ContainerSelector, Document, MarkdownConverter, MarkdownRenderer, MissingSource,
    RetrievalError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn converted(markdown: &str) -> String {
    MarkdownConverter::new()
        .convert(markdown)
        .expect("Conversion should not fail")
}

/// Tests a heading document next to the page renders in place.
#[tokio::test]
async fn test_render_local_document() -> Result<()> {
    // Arrange
    let page = html_page(r#"<div class="markdown" md_file="doc.md">Loading...</div>"#);
    let site = create_site(&[("index.html", page.as_str()), ("doc.md", "# Title")])?;
    let mut document = Document::new(page);
    let renderer = MarkdownRenderer::new(page_url(&site, "index.html")?);

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 1);
    let html = document.html();
    assert!(html.contains(&converted("# Title")), "{}", html);
    assert!(html.contains("id=\"title\""), "Heading should carry id: {}", html);
    assert!(html.contains("<head><title>Docs</title></head>"), "Page shell kept");
    assert!(!html.contains("Loading..."));

    Ok(())
}

/// Tests nested relative locations resolve against the page.
#[tokio::test]
async fn test_render_nested_relative_location() -> Result<()> {
    // Arrange
    let page = html_page(r#"<article class="markdown" md_file="../shared/usage.md"></article>"#);
    let site = create_site(&[
        ("site/guide/index.html", page.as_str()),
        ("site/shared/usage.md", "Use `mdembed`."),
    ])?;
    let mut document = Document::new(page);
    let renderer = MarkdownRenderer::new(page_url(&site, "site/guide/index.html")?);

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 1);
    assert!(
        document.html().contains("<p>Use <code>mdembed</code>.</p>"),
        "{}",
        document.html()
    );

    Ok(())
}

/// Tests a nonexistent document renders the conversion of an empty string.
#[tokio::test]
async fn test_missing_document_renders_empty() -> Result<()> {
    // Arrange
    let page = r#"<div class="markdown" md_file="nope.md">Loading...</div>"#;
    let site = create_site(&[("index.html", page)])?;
    let mut document = Document::new(page);
    let renderer = MarkdownRenderer::new(page_url(&site, "index.html")?);

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.failed, 1);
    assert_eq!(converted(""), "");
    assert_eq!(
        document.html(),
        r#"<div class="markdown" md_file="nope.md"></div>"#
    );

    Ok(())
}

/// Tests documents served over HTTP with one missing resource.
#[tokio::test]
async fn test_render_http_documents_with_isolation() -> Result<()> {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/a.md"))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# A"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/c.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("*c*"))
        .mount(&server)
        .await;

    let page_url = Url::parse(&format!("{}/docs/index.html", server.uri()))?;
    let mut document = Document::new(html_page(
        r#"<div class="markdown" md_file="a.md"></div>
<div class="markdown" md_file="b.md">B</div>
<div class="markdown" md_file="c.md"></div>"#,
    ));

    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);
    let renderer = MarkdownRenderer::new(page_url).on_failure(move |failure| {
        let status = match failure.error().downcast_ref::<RetrievalError>() {
            Some(RetrievalError::Status { status, .. }) => Some(status.as_u16()),
            _ => None,
        };
        seen.lock().unwrap().push((failure.index(), status));
    });

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(*failures.lock().unwrap(), vec![(1, Some(404))]);

    let html = document.html();
    let a = html.find(&converted("# A")).expect("a.md rendered");
    let c = html.find("<p><em>c</em></p>").expect("c.md rendered");
    assert!(a < c, "Documents stay in page order");
    assert!(
        html.contains(r#"<div class="markdown" md_file="b.md"></div>"#),
        "Failed container is emptied: {}",
        html
    );

    Ok(())
}

/// Tests binary and undecodable HTTP bodies render as failed, empty containers.
#[tokio::test]
async fn test_non_text_http_documents_fail() -> Result<()> {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a], "image/png"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bin.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0xff, 0xfe, 0x00, 0x80, b'h', b'i'], "text/plain"),
        )
        .mount(&server)
        .await;

    let mut document = Document::new(
        r#"<div class="markdown" md_file="img.md">img</div><div class="markdown" md_file="bin.md">bin</div>"#,
    );
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);
    let renderer = MarkdownRenderer::new(Url::parse(&server.uri())?).on_failure(move |failure| {
        let not_text = matches!(
            failure.error().downcast_ref::<RetrievalError>(),
            Some(RetrievalError::NotText { .. })
        );
        seen.lock().unwrap().push((failure.index(), not_text));
    });

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 0);
    assert_eq!(summary.failed, 2);
    assert_eq!(*failures.lock().unwrap(), vec![(0, true), (1, true)]);
    assert_eq!(
        document.html(),
        r#"<div class="markdown" md_file="img.md"></div><div class="markdown" md_file="bin.md"></div>"#
    );

    Ok(())
}

/// Tests retrievals completing out of order are still written in page order.
#[tokio::test]
async fn test_concurrent_retrieval_keeps_page_order() -> Result<()> {
    // Arrange
    let server = MockServer::start().await;
    let delay = Duration::from_millis(300);
    Mock::given(method("GET"))
        .and(path("/slow.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("first")
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow-gone.md"))
        .respond_with(ResponseTemplate::new(404).set_delay(delay))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("third"))
        .mount(&server)
        .await;

    let mut document = Document::new(
        r#"<div class="markdown" md_file="slow.md"></div>
<div class="markdown" md_file="slow-gone.md"></div>
<div class="markdown" md_file="fast.md"></div>
<div class="markdown" md_file="fast-gone.md"></div>"#,
    );
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);
    let renderer = MarkdownRenderer::new(Url::parse(&server.uri())?).on_failure(move |failure| {
        let path = failure.location().map(|url| url.path().to_string());
        seen.lock().unwrap().push((failure.index(), path));
    });

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(
        *failures.lock().unwrap(),
        vec![
            (1, Some("/slow-gone.md".to_string())),
            (3, Some("/fast-gone.md".to_string())),
        ],
        "Failures are reported in page order"
    );
    assert_eq!(
        document.html(),
        r#"<div class="markdown" md_file="slow.md"><p>first</p>
</div>
<div class="markdown" md_file="slow-gone.md"></div>
<div class="markdown" md_file="fast.md"><p>third</p>
</div>
<div class="markdown" md_file="fast-gone.md"></div>"#
    );

    Ok(())
}

/// Tests two passes over unchanged resources give the same page.
#[tokio::test]
async fn test_render_is_idempotent() -> Result<()> {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/readme.md"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("## Usage\n\n```rust\nlet x = 1;\n```\n"),
        )
        .mount(&server)
        .await;

    let mut document = Document::new(r#"<main class="markdown" md_file="/readme.md"></main>"#);
    let renderer = MarkdownRenderer::new(Url::parse(&server.uri())?);

    // Act
    renderer.render_all(&mut document).await?;
    let first = document.html().to_string();
    renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(document.html(), first);
    assert!(first.contains("hljs-"), "Code block is highlighted: {}", first);

    Ok(())
}

/// Tests sequential retrieval renders every container in order.
#[tokio::test]
async fn test_sequential_retrieval() -> Result<()> {
    // Arrange
    let files: Vec<(String, String)> = (0..5)
        .map(|i| (format!("part{i}.md"), format!("part number {i}")))
        .collect();
    let mut entries: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, text)| (name.as_str(), text.as_str()))
        .collect();
    let body: String = (0..5)
        .map(|i| format!(r#"<div class="markdown" md_file="part{i}.md"></div>"#))
        .collect();
    entries.push(("index.html", body.as_str()));
    let site = create_site(&entries)?;

    let mut document = Document::new(body.clone());
    let renderer = MarkdownRenderer::new(page_url(&site, "index.html")?).concurrency(1);

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 5);
    let html = document.html();
    let positions: Vec<usize> = (0..5)
        .map(|i| html.find(&format!("part number {i}")).expect("part rendered"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", html);

    Ok(())
}

/// Tests custom class and attribute names with the skip policy.
#[tokio::test]
async fn test_custom_selector_and_skip_policy() -> Result<()> {
    // Arrange
    let page = r#"<div class="doc" data-src="notes.md"></div><div class="doc">static</div><div class="markdown" md_file="notes.md">other</div>"#;
    let site = create_site(&[("index.html", page), ("notes.md", "notes")])?;
    let mut document = Document::new(page);
    let renderer = MarkdownRenderer::new(page_url(&site, "index.html")?)
        .selector(ContainerSelector::new("doc", "data-src")?)
        .missing_source(MissingSource::Skip);

    // Act
    let summary = renderer.render_all(&mut document).await?;

    // Assert
    assert_eq!(summary.rendered, 1);
    assert_eq!(summary.skipped, 1);
    let html = document.html();
    assert!(html.contains("<p>notes</p>"), "{}", html);
    assert!(html.contains(r#"<div class="doc">static</div>"#), "{}", html);
    assert!(
        html.contains(r#"md_file="notes.md">other</div>"#),
        "Other classes are not containers: {}",
        html
    );

    Ok(())
}

/// Tests link rebasing for a document in a subdirectory.
#[tokio::test]
async fn test_rebase_links_for_local_document() -> Result<()> {
    // Arrange
    let page = r#"<div class="markdown" md_file="docs/guide.md"></div>"#;
    let site = create_site(&[
        ("index.html", page),
        ("docs/guide.md", "See [the API](api.md) and ![logo](../img/logo.png)."),
    ])?;
    let mut document = Document::new(page);
    let renderer = MarkdownRenderer::new(page_url(&site, "index.html")?).rebase_links(true);

    // Act
    renderer.render_all(&mut document).await?;

    // Assert
    let html = document.html();
    assert!(html.contains("href=\"docs/api.md\""), "{}", html);
    assert!(html.contains("src=\"img/logo.png\""), "{}", html);

    Ok(())
}
