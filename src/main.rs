//! CLI for bib-pages - Generate website partials from a BibTeX bibliography.

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{info, LevelFilter};

use bib_pages::{check, compile, CompileError, Config, ConfigError, CONFIG_FILE};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Generate publication, software and conference partials from a BibTeX file
#[derive(Parser)]
#[command(name = "bib-pages")]
#[command(version)]
#[command(after_help = "\
Examples:
  bib-pages
  bib-pages -C site --highlight-author 'Jane Doe'
  bib-pages --bib cv/reference.bib --no-detail-pages
  bib-pages --check

Entries are routed by the tags in their `keywords` field:
  pub, software, present, poster, part")]
struct Cli {
    /// Site root; all relative paths resolve against it
    #[arg(short = 'C', long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/bib-pages.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bibliography file
    #[arg(short, long)]
    bib: Option<PathBuf>,

    /// Directory receiving the generated partials
    #[arg(long)]
    includes_dir: Option<PathBuf>,

    /// Author name to emphasise in author lists
    #[arg(long)]
    highlight_author: Option<String>,

    /// Don't generate publication detail pages
    #[arg(long)]
    no_detail_pages: bool,

    /// Exit with an error if any partial is out of date, without writing
    #[arg(long)]
    check: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    /// File configuration with command-line overrides applied.
    fn resolve_config(&self) -> Result<Config, ConfigError> {
        let explicit = self.config.as_ref().map(|path| self.root.join(path));
        let mut config = Config::discover(&self.root, explicit.as_deref())?;

        if let Some(bib) = &self.bib {
            config.bibliography = bib.clone();
        }
        if let Some(dir) = &self.includes_dir {
            config.includes_dir = dir.clone();
        }
        if let Some(author) = &self.highlight_author {
            config.highlight_author = Some(author.clone());
        }
        if self.no_detail_pages {
            config.detail_pages = false;
        }

        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: configuration file unreadable or invalid
    Config(String),
    /// Exit 11: bibliography file not found / unreadable
    BibRead(String),
    /// Exit 12: bibliography is malformed
    BibMalformed {
        message: String,
        key: Option<String>,
        line: usize,
    },
    /// Exit 15: cannot write a partial
    OutputFile(String),
    /// Exit 16: `--check` found partials that are out of date
    Stale(usize),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 10,
            AppError::BibRead(_) => 11,
            AppError::BibMalformed { .. } => 12,
            AppError::OutputFile(_) => 15,
            AppError::Stale(_) => 16,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<CompileError> for AppError {
    fn from(e: CompileError) -> Self {
        match &e {
            CompileError::ReadBibliography { .. } => AppError::BibRead(e.to_string()),
            CompileError::Parse { source, .. } => AppError::BibMalformed {
                message: e.to_string(),
                key: source.key().map(str::to_string),
                line: source.line(),
            },
            CompileError::Output(_) => AppError::OutputFile(e.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => {
                write!(
                    f,
                    "{}\n  hint: valid keys in {} are bibliography, includes_dir, pages_dir, assets_dir, highlight_author, detail_pages, lint_header",
                    msg, CONFIG_FILE
                )
            }
            AppError::BibRead(msg) => {
                write!(
                    f,
                    "{}\n  hint: run from the site root, or pass --root or --bib",
                    msg
                )
            }
            AppError::BibMalformed { message, key, line } => {
                write!(f, "{}\n  hint: ", message)?;
                match key {
                    Some(key) => write!(f, "fix entry '{}' near line {}", key, line)?,
                    None => write!(f, "fix the bibliography near line {}", line)?,
                }
                write!(f, "; no partials were written")
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory is writable",
                    msg
                )
            }
            AppError::Stale(count) => {
                write!(
                    f,
                    "{} generated file(s) out of date\n  hint: run bib-pages without --check to regenerate them",
                    count
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_env(env_logger::Env::new().filter("BIB_PAGES_LOG"))
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.resolve_config()?;

    if cli.check {
        return check_command(cli, &config);
    }

    let summary = compile(&cli.root, &config)?;
    let counts = summary.counts;
    info!(
        "{} entries: {} publications, {} software, {} presented, {} posters, {} attended",
        summary.entries,
        counts.publications(),
        counts.software,
        counts.presented,
        counts.posters,
        counts.attended
    );
    info!(
        "{} file(s) written, {} unchanged",
        summary.report.written, summary.report.unchanged
    );

    Ok(())
}

/// Lists out-of-date partials on stdout and fails if there are any.
fn check_command(cli: &Cli, config: &Config) -> Result<(), AppError> {
    let stale = check(&cli.root, config)?;
    for path in &stale {
        println!("{}", path.display());
    }
    if stale.is_empty() {
        info!("all generated files are up to date");
        Ok(())
    } else {
        Err(AppError::Stale(stale.len()))
    }
}
