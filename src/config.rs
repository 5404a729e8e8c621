//! Command line configuration.

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use url::Url;

use crate::document::ContainerSelector;
use crate::markdown::MarkdownConverter;
use crate::render::{DEFAULT_CONCURRENCY, MissingSource};

/// Input path that reads the page from standard input.
const STDIN: &str = "-";

/// Command line configuration for mdembed.
#[derive(Debug, Clone, Parser)]
#[command(name = "mdembed", version, about, long_about = None)]
pub struct Config {
    /// HTML page to render, `-` reads from stdin
    pub input: PathBuf,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base URL or directory that document locations resolve against
    /// (defaults to the input page itself)
    #[arg(long)]
    pub base: Option<String>,

    /// Class marking Markdown containers
    #[arg(long, default_value = "markdown")]
    pub class: String,

    /// Attribute holding the document location
    #[arg(long, default_value = "md_file")]
    pub attribute: String,

    /// Handling of containers without a location attribute
    #[arg(long, value_enum, default_value_t = MissingSource::Fail)]
    pub on_missing: MissingSource,

    /// Documents retrieved at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Exit with an error when any container failed to render
    #[arg(long)]
    pub strict: bool,

    /// Rebase relative links of embedded documents onto the page
    #[arg(long)]
    pub rebase_links: bool,

    /// Do not add ids to headings
    #[arg(long)]
    pub no_heading_ids: bool,

    /// Do not highlight fenced code blocks
    #[arg(long)]
    pub no_highlight: bool,

    /// Open the output file in the default browser
    #[arg(long)]
    pub open: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    /// Parses configuration from command line arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Validates configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the input page does not exist, the selector names
    /// are invalid, concurrency is zero, or `--open` has no file to open.
    pub fn validate(&self) -> Result<()> {
        if !self.reads_stdin() && !self.input.is_file() {
            bail!("Input page does not exist: {}", self.input.display());
        }

        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }

        if self.open && self.output.is_none() {
            bail!("--open requires --output");
        }

        self.selector()?;
        Ok(())
    }

    /// Returns whether the page is read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == STDIN
    }

    /// Returns container selector from class and attribute names.
    ///
    /// # Errors
    ///
    /// Returns error if either name is not a valid CSS identifier.
    pub fn selector(&self) -> Result<ContainerSelector> {
        ContainerSelector::new(&self.class, &self.attribute)
    }

    /// Returns converter configured from the rendering flags.
    pub fn converter(&self) -> MarkdownConverter {
        MarkdownConverter::new()
            .with_heading_ids(!self.no_heading_ids)
            .with_highlighting(!self.no_highlight)
    }

    /// Returns URL that document locations resolve against.
    ///
    /// An explicit `--base` is taken as a URL when it parses as one, as a
    /// directory otherwise. Without it the input page's own file URL is
    /// used, or the working directory when reading stdin.
    ///
    /// # Errors
    ///
    /// Returns error if the base path cannot be canonicalized.
    pub fn base_url(&self) -> Result<Url> {
        if let Some(base) = &self.base {
            if let Ok(url) = Url::parse(base)
                && !url.cannot_be_a_base()
            {
                return Ok(url);
            }
            return directory_url(Path::new(base));
        }

        if self.reads_stdin() {
            return directory_url(Path::new("."));
        }

        let path = self
            .input
            .canonicalize()
            .with_context(|| format!("Cannot resolve input path: {}", self.input.display()))?;
        Url::from_file_path(&path)
            .map_err(|()| anyhow!("Cannot express {} as a URL", path.display()))
    }

    /// Returns tracing filter directive for the verbosity level.
    pub fn log_filter(&self) -> String {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("warn,mdembed={level}")
    }
}

fn directory_url(dir: &Path) -> Result<Url> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve base directory: {}", dir.display()))?;
    Url::from_directory_path(&dir).map_err(|()| anyhow!("Cannot express {} as a URL", dir.display()))
}
