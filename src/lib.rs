//! bib-pages: generate website markdown partials from a BibTeX bibliography.
//!
//! The library provides functionality to:
//! - Parse BibTeX entries with line-accurate errors
//! - Convert LaTeX markup in field values to markdown
//! - Route entries to output categories by their `keywords` tags
//! - Render publication, software and conference partials and detail pages
//! - Write partials atomically, skipping files that are already current

pub mod bib;
pub mod category;
pub mod compile;
pub mod config;
pub mod date;
pub mod latex;
pub mod output;
pub mod render;

pub use bib::{parse_bib, BibError, Entry};
pub use category::{categories_of, Catalog, Category, TAG_TABLE};
pub use compile::{check, compile, load_entries, render_site, CompileError, Summary};
pub use config::{Config, ConfigError, CONFIG_FILE};
pub use output::{stale_partials, write_partials, OutputError, Partial, WriteReport};
pub use render::{RenderContext, ResearchCounts};
