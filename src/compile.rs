//! The compile pipeline: read the bibliography, classify, render every
//! partial in memory, then write.
//!
//! Nothing touches the output directories until the bibliography has parsed
//! and every partial has been rendered.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::bib::{parse_bib, BibError, Entry};
use crate::category::{Catalog, Category};
use crate::config::Config;
use crate::output::{stale_partials, write_partials, OutputError, Partial, WriteReport};
use crate::render::{
    render_conferences, render_detail_page, render_pub_conference_list, render_publications,
    render_research_counts, render_software, render_timeline, AssetDir, RenderContext,
    ResearchCounts,
};

/// Prepended to every partial so markdownlint skips generated files.
pub const LINT_HEADER: &str = "<!-- markdownlint-disable -->\n\n";

/// Number of partials written to the includes directory.
const INCLUDE_PARTIALS: usize = 8;

/// File names of the generated partials inside the includes directory.
pub mod files {
    pub const PUBLICATIONS: &str = "publications_content.md";
    pub const SOFTWARE: &str = "software_content.md";
    pub const PRESENTED: &str = "presented_content.md";
    pub const POSTERS: &str = "posters_content.md";
    pub const ATTENDED: &str = "attended_content.md";
    pub const CONFERENCES: &str = "conferences_content.md";
    pub const RESEARCH_COUNTS: &str = "research_counts.md";
    pub const PUB_CONFERENCE_LIST: &str = "pub_conference_list.md";
}

/// Errors that abort a compile run.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to read bibliography '{}': {source}", path.display())]
    ReadBibliography {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed bibliography '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: BibError,
    },

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub entries: usize,
    pub unclassified: usize,
    pub counts: ResearchCounts,
    pub detail_pages: usize,
    pub report: WriteReport,
}

/// Reads and parses the configured bibliography.
pub fn load_entries(root: &Path, config: &Config) -> Result<Vec<Entry>, CompileError> {
    let path = root.join(&config.bibliography);
    let text = fs::read_to_string(&path).map_err(|source| CompileError::ReadBibliography {
        path: path.clone(),
        source,
    })?;
    let entries = parse_bib(&text).map_err(|source| CompileError::Parse { path, source })?;
    info!(
        "parsed {} entries from {}",
        entries.len(),
        config.bibliography.display()
    );
    Ok(entries)
}

/// Runs the whole pipeline and writes the results under `root`.
pub fn compile(root: &Path, config: &Config) -> Result<Summary, CompileError> {
    let entries = load_entries(root, config)?;
    let catalog = Catalog::build(&entries);
    report_unclassified(&catalog, &entries);

    let partials = render_site(&catalog, config, root);
    let detail_pages = partials.len() - INCLUDE_PARTIALS;
    let report = write_partials(root, &partials)?;
    if detail_pages > 0 {
        info!("{} publication detail pages", detail_pages);
    }

    Ok(Summary {
        entries: entries.len(),
        unclassified: catalog.unclassified().len(),
        counts: ResearchCounts::from_catalog(&catalog),
        detail_pages,
        report,
    })
}

/// Renders everything without writing and returns the paths that would change.
pub fn check(root: &Path, config: &Config) -> Result<Vec<PathBuf>, CompileError> {
    let entries = load_entries(root, config)?;
    let catalog = Catalog::build(&entries);
    report_unclassified(&catalog, &entries);
    Ok(stale_partials(root, &render_site(&catalog, config, root)))
}

fn report_unclassified(catalog: &Catalog<'_>, entries: &[Entry]) {
    for entry in catalog.unclassified() {
        warn!(
            "entry '{}' (line {}) has no recognized tag in `keywords`; it will not appear on any page",
            entry.key, entry.line
        );
    }
    for entry in entries {
        for tag in entry.tags().filter(|t| Category::from_tag(t).is_none()) {
            debug!("entry '{}': ignoring unknown tag '{}'", entry.key, tag);
        }
    }
}

/// Every partial and detail page for a catalog, in a fixed order.
pub fn render_site(catalog: &Catalog<'_>, config: &Config, root: &Path) -> Vec<Partial> {
    let ctx = render_context(root, config);
    let include = |name: &str, content: String| {
        Partial::new(
            config.includes_dir.join(name),
            with_header(content, config.lint_header),
        )
    };

    let mut partials = vec![
        include(files::PUBLICATIONS, render_publications(catalog, &ctx)),
        include(files::SOFTWARE, render_software(catalog, &ctx)),
        include(
            files::PRESENTED,
            render_timeline(catalog, Category::Presented, &ctx),
        ),
        include(files::POSTERS, render_timeline(catalog, Category::Poster, &ctx)),
        include(
            files::ATTENDED,
            render_timeline(catalog, Category::Attended, &ctx),
        ),
        include(files::CONFERENCES, render_conferences(catalog, &ctx)),
        include(files::RESEARCH_COUNTS, render_research_counts(catalog)),
        include(files::PUB_CONFERENCE_LIST, render_pub_conference_list(catalog)),
    ];
    debug_assert_eq!(partials.len(), INCLUDE_PARTIALS);

    if config.detail_pages {
        for entry in catalog.get(Category::Publication) {
            if !is_path_safe(&entry.key) {
                warn!(
                    "entry '{}' (line {}): key cannot be used as a directory name; skipping its detail page",
                    entry.key, entry.line
                );
                continue;
            }
            partials.push(Partial::new(
                config.pages_dir.join(&entry.key).join("index.qmd"),
                render_detail_page(entry, &ctx),
            ));
        }
    }

    partials
}

fn render_context(root: &Path, config: &Config) -> RenderContext {
    RenderContext {
        highlight_author: config.highlight_author.clone(),
        detail_pages: config.detail_pages,
        detail_base: link_path(&config.pages_dir),
        assets: config.assets_dir.as_ref().map(|dir| AssetDir {
            dir: root.join(dir),
            link_prefix: link_path(dir),
        }),
    }
}

/// A relative filesystem path as a URL path (`/`-separated, no `.`).
fn link_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_path_safe(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

fn with_header(mut content: String, lint_header: bool) -> String {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    if lint_header {
        content.insert_str(0, LINT_HEADER);
    }
    content
}
