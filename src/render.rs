//! Markdown rendering of the generated partials.
//!
//! Every function here is a function of the catalog and a [`RenderContext`];
//! the only outside input is the existence check for attached files. Missing
//! optional fields are left out of the output entirely.

use std::path::PathBuf;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::bib::Entry;
use crate::category::{Catalog, Category};
use crate::date::format_date;

lazy_static! {
    /// pkgdown sites hosted on GitHub Pages: `https://<user>.github.io/<repo>`
    static ref GITHUB_PAGES: Regex =
        Regex::new(r"^https://([^./]+)\.github\.io/([^/]+)").expect("valid github pages regex");
}

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Notes that only restate the category and are not worth showing.
const BOILERPLATE_NOTES: &[&str] = &["participation", "paper presented"];

/// Settings shared by all renderers.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Author name to emphasise in author lists
    pub highlight_author: Option<String>,
    /// Whether `publications/<key>/` detail pages are generated and linked
    pub detail_pages: bool,
    /// Site-relative directory holding the detail pages
    pub detail_base: String,
    /// Where attached files (`file` field) live
    pub assets: Option<AssetDir>,
}

/// A directory of files referenced from `file` fields (PDFs, certificates).
#[derive(Debug, Clone)]
pub struct AssetDir {
    /// Directory on disk the `file` values are relative to
    pub dir: PathBuf,
    /// The same directory as a site-relative link prefix
    pub link_prefix: String,
}

impl AssetDir {
    /// Site-relative link for an attached file, if it exists on disk.
    pub fn link(&self, relative: &str) -> Option<String> {
        if self.dir.join(relative).is_file() {
            let prefix = self.link_prefix.trim_end_matches('/');
            if prefix.is_empty() {
                Some(relative.to_string())
            } else {
                Some(format!("{}/{}", prefix, relative))
            }
        } else {
            debug!(
                "attached file '{}' not found under {}",
                relative,
                self.dir.display()
            );
            None
        }
    }
}

impl RenderContext {
    fn asset_link(&self, entry: &Entry) -> Option<String> {
        let file = entry.get("file")?;
        self.assets.as_ref()?.link(file)
    }

    fn authors(&self, entry: &Entry) -> String {
        let authors = entry.text("author").unwrap_or_default();
        match self.highlight_author.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => authors.replace(name, &format!("**{}**", name)),
            None => authors,
        }
    }

    fn detail_url(&self, entry: &Entry) -> String {
        let base = self.detail_base.trim_matches('/');
        if base.is_empty() {
            format!("{}/", entry.key)
        } else {
            format!("{}/{}/", base, entry.key)
        }
    }
}

/// Strips resolver prefixes so only the bare DOI remains.
fn doi_of(entry: &Entry) -> Option<&str> {
    let raw = entry.get("doi")?;
    let bare = DOI_PREFIXES
        .iter()
        .find_map(|prefix| raw.strip_prefix(*prefix))
        .unwrap_or(raw);
    Some(bare.trim()).filter(|d| !d.is_empty())
}

fn eprint_of(entry: &Entry) -> Option<(String, &str)> {
    let eprint = entry.get("eprint")?;
    let kind = entry.get("eprinttype").unwrap_or_default().to_ascii_lowercase();
    Some((kind, eprint))
}

fn is_journal_article(entry: &Entry) -> bool {
    entry.kind == "article"
}

/// A `<details>` block; `indent` keeps it inside a list item.
fn collapsible(summary: &str, body: &str, indent: &str, open: bool) -> String {
    let tag = if open { "<details open>" } else { "<details>" };
    format!(
        "{indent}{tag}\n{indent}<summary>{summary}</summary>\n\n{indent}{body}\n\n{indent}</details>",
        indent = indent,
        tag = tag,
        summary = summary,
        body = body
    )
}

// ---------------------------------------------------------------------------
// Publications
// ---------------------------------------------------------------------------

/// Numbered lists of journal articles and preprints.
pub fn render_publications(catalog: &Catalog<'_>, ctx: &RenderContext) -> String {
    let pubs = catalog.get(Category::Publication);
    let (articles, preprints): (Vec<&Entry>, Vec<&Entry>) =
        pubs.iter().copied().partition(|e| is_journal_article(e));

    let mut lines: Vec<String> = Vec::new();
    for (heading, group) in [("## Journal Articles\n", articles), ("## Preprints\n", preprints)] {
        if group.is_empty() {
            continue;
        }
        lines.push(heading.to_string());
        for (i, entry) in group.iter().enumerate() {
            lines.push(publication_item(entry, i + 1, ctx));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn venue_citation(entry: &Entry) -> Option<String> {
    if let Some(journal) = entry.text("journal").or_else(|| entry.text("journaltitle")) {
        let mut cite = format!("*{}*", journal);
        if let Some(volume) = entry.text("volume") {
            cite.push_str(&format!(", {}", volume));
        }
        if let Some(number) = entry.text("number") {
            cite.push_str(&format!("({})", number));
        }
        if let Some(pages) = entry.text("pages") {
            cite.push_str(&format!(", {}", pages));
        }
        cite.push('.');
        return Some(cite);
    }
    entry.text("note").map(|note| format!("*{}.*", note))
}

fn publication_item(entry: &Entry, index: usize, ctx: &RenderContext) -> String {
    let title = entry.text("title").unwrap_or_else(|| "Untitled".to_string());
    let authors = ctx.authors(entry);

    let mut parts: Vec<String> = Vec::new();
    match (authors.is_empty(), entry.year()) {
        (false, Some(year)) => parts.push(format!("{} ({}).", authors, year)),
        (false, None) => parts.push(format!("{}.", authors)),
        (true, Some(year)) => parts.push(format!("({}).", year)),
        (true, None) => {}
    }

    if ctx.detail_pages {
        parts.push(format!("\u{201c}[{}]({}).\u{201d}", title, ctx.detail_url(entry)));
    } else {
        parts.push(format!("\u{201c}{}.\u{201d}", title));
    }

    if let Some(venue) = venue_citation(entry) {
        parts.push(venue);
    }
    if let Some(doi) = doi_of(entry) {
        parts.push(format!("DOI: [{}](https://doi.org/{}).", doi, doi));
    }
    match eprint_of(entry) {
        Some((kind, id)) if kind == "researchsquare" => parts.push(format!(
            "ResearchSquare: [{}](https://www.researchsquare.com/article/{}).",
            id, id
        )),
        Some((kind, id)) if kind == "arxiv" => {
            parts.push(format!("arXiv: [{}](https://arxiv.org/abs/{}).", id, id))
        }
        _ => {}
    }

    let marker = format!("{}. ", index);
    let mut item = format!("{}{}\n", marker, parts.join(" "));
    if let Some(abstract_text) = entry.text("abstract") {
        let indent = " ".repeat(marker.len());
        item.push('\n');
        item.push_str(&collapsible("Abstract", &abstract_text, &indent, false));
        item.push('\n');
    }
    item
}

/// Full page for one publication, written to `<detail_base>/<key>/index.qmd`.
pub fn render_detail_page(entry: &Entry, ctx: &RenderContext) -> String {
    let title = entry.text("title").unwrap_or_else(|| "Untitled".to_string());
    let authors = entry.text("author").unwrap_or_default();
    let published = match entry.get("date") {
        Some(date) => format_date(date),
        None => entry.year().unwrap_or_default(),
    };
    let type_label = if is_journal_article(entry) {
        "JOURNAL ARTICLES"
    } else {
        "PREPRINTS"
    };

    let details = match entry.text("journal").or_else(|| entry.text("journaltitle")) {
        Some(journal) => {
            let mut d = format!("<em>{}</em>", journal);
            if let Some(volume) = entry.text("volume") {
                d.push_str(&format!(", <strong>{}</strong>", volume));
            }
            if let Some(number) = entry.text("number") {
                d.push_str(&format!("({})", number));
            }
            if let Some(pages) = entry.text("pages") {
                d.push_str(&format!(", {}", pages));
            }
            Some(d)
        }
        None => entry.text("note"),
    };

    let mut badges: Vec<String> = Vec::new();
    if let Some(doi) = doi_of(entry) {
        badges.push(format!(
            "<a href=\"https://doi.org/{}\" class=\"pub-link-badge pub-link-doi\" target=\"_blank\" rel=\"noopener\">DOI</a>",
            doi
        ));
    }
    if let Some(link) = ctx.asset_link(entry) {
        badges.push(format!(
            "<a href=\"../../{}\" class=\"pub-link-badge pub-link-pdf\" target=\"_blank\" rel=\"noopener\">PDF</a>",
            link
        ));
    }
    match eprint_of(entry) {
        Some((kind, id)) if kind == "researchsquare" => badges.push(format!(
            "<a href=\"https://www.researchsquare.com/article/{}\" class=\"pub-link-badge pub-link-preprint\" target=\"_blank\" rel=\"noopener\">ResearchSquare</a>",
            id
        )),
        Some((kind, id)) if kind == "arxiv" => badges.push(format!(
            "<a href=\"https://arxiv.org/abs/{}\" class=\"pub-link-badge pub-link-preprint\" target=\"_blank\" rel=\"noopener\">arXiv</a>",
            id
        )),
        _ => {}
    }

    let mut lines: Vec<String> = vec![
        "---".to_string(),
        format!("title: \"{}\"", title.replace('\\', "\\\\").replace('"', "\\\"")),
        "toc: false".to_string(),
        "---".to_string(),
        String::new(),
        format!("<span class=\"pub-type-badge\">{}</span>", type_label),
        String::new(),
        // No indentation: Pandoc treats four leading spaces as a code block.
        "<div class=\"pub-meta-card\">".to_string(),
    ];

    let mut row = |label: &str, value: &str| {
        lines.push("<div class=\"pub-meta-row\">".to_string());
        lines.push(format!("<div class=\"pub-meta-label\">{}</div>", label));
        lines.push(format!("<div class=\"pub-meta-value\">{}</div>", value));
        lines.push("</div>".to_string());
    };
    row("AUTHORS", authors.as_str());
    row("PUBLISHED", published.as_str());
    if let Some(details) = &details {
        row("PUBLICATION DETAILS", details.as_str());
    }
    if !badges.is_empty() {
        row("LINKS", badges.join("\n").as_str());
    }

    lines.push("</div>".to_string());
    lines.push(String::new());

    if let Some(abstract_text) = entry.text("abstract") {
        lines.push(abstract_text);
        lines.push(String::new());
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Software
// ---------------------------------------------------------------------------

/// One block per software package.
pub fn render_software(catalog: &Catalog<'_>, ctx: &RenderContext) -> String {
    catalog
        .get(Category::Software)
        .iter()
        .map(|entry| software_block(entry, ctx))
        .collect::<Vec<_>>()
        .join("\n")
}

fn software_block(entry: &Entry, ctx: &RenderContext) -> String {
    let title = entry.text("title").unwrap_or_else(|| "Untitled".to_string());
    let (name, subtitle) = match title.split_once(':') {
        Some((name, subtitle)) => (name.trim().to_string(), subtitle.trim().to_string()),
        None => (title.clone(), String::new()),
    };
    let authors = ctx.authors(entry);
    let url = entry.get("url");
    let eprint = eprint_of(entry);
    let cran = eprint
        .as_ref()
        .filter(|(kind, _)| kind == "cran")
        .map(|(_, id)| *id);
    let github = eprint
        .as_ref()
        .filter(|(kind, _)| kind == "github")
        .map(|(_, id)| *id);

    let mut lines: Vec<String> = Vec::new();

    let pages_repo = url
        .and_then(|u| GITHUB_PAGES.captures(u))
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]));
    match pages_repo {
        Some(repo) => {
            lines.push("<div class=\"pkg-header\">".to_string());
            lines.push(format!(
                "<img src=\"https://raw.githubusercontent.com/{}/main/man/figures/logo.png\" alt=\"{} logo\" class=\"pkg-logo\" onerror=\"this.style.display='none'\">",
                repo, name
            ));
            lines.push("<div class=\"pkg-header-text\">".to_string());
            lines.push(format!("<h2>{}</h2>", name));
            if !subtitle.is_empty() {
                lines.push(format!("\n**{}**\n", subtitle));
            }
            lines.push("</div>".to_string());
            lines.push("</div>\n".to_string());
        }
        None => {
            lines.push(format!("## {}\n", name));
            if !subtitle.is_empty() {
                lines.push(format!("**{}**\n", subtitle));
            }
        }
    }

    if let Some(package) = cran {
        lines.push("<div class=\"pkg-downloads\">".to_string());
        lines.push("<strong>Downloads</strong><br>".to_string());
        lines.push(format!(
            "<a href=\"https://cran.r-project.org/package={p}\"><img src=\"https://cranlogs.r-pkg.org/badges/{p}\" alt=\"monthly downloads\"></a> \
             <a href=\"https://cran.r-project.org/package={p}\"><img src=\"https://cranlogs.r-pkg.org/badges/grand-total/{p}\" alt=\"total downloads\"></a>",
            p = package
        ));
        lines.push("</div>\n".to_string());
    }

    let mut cards: Vec<String> = Vec::new();
    if let Some(package) = cran {
        let blurb = entry
            .text("note")
            .unwrap_or_else(|| "Available on CRAN".to_string());
        cards.push(format!(
            "::: {{.card}}\n\n### [📦 CRAN](https://cran.r-project.org/package={})\n\n{}\n\n:::",
            package, blurb
        ));
    }
    if let Some(repo) = github {
        cards.push(format!(
            "::: {{.card}}\n\n### [🐙 GitHub](https://github.com/{})\n\nSource code repository\n\n:::",
            repo
        ));
    }
    if let Some(url) = url {
        cards.push(format!(
            "::: {{.card}}\n\n### [📖 Documentation]({})\n\nPackage website & vignettes\n\n:::",
            url
        ));
    }
    if !cards.is_empty() {
        lines.push("::: {.card-grid-2}\n".to_string());
        lines.push(cards.join("\n\n"));
        lines.push("\n:::\n".to_string());
    }

    match (authors.is_empty(), doi_of(entry)) {
        (false, Some(doi)) => {
            lines.push(format!("**Authors:** {}\\", authors));
            lines.push(format!("**DOI:** [{}](https://doi.org/{})\n", doi, doi));
        }
        (true, Some(doi)) => lines.push(format!("**DOI:** [{}](https://doi.org/{})\n", doi, doi)),
        (false, None) => lines.push(format!("**Authors:** {}\n", authors)),
        (true, None) => {}
    }

    if let Some(description) = entry.text("abstract") {
        lines.push(collapsible("Description", &description, "", true));
        lines.push(String::new());
    }

    if let Some(package) = cran {
        lines.push(format!(
            "### Installation\n\n```r\ninstall.packages(\"{}\")\n```\n",
            package
        ));
    } else if let Some(repo) = github {
        lines.push(format!(
            "### Installation\n\n```r\n# Install from GitHub\n# install.packages(\"devtools\")\ndevtools::install_github(\"{}\")\n```\n",
            repo
        ));
    }

    lines.push("---\n".to_string());
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Conferences
// ---------------------------------------------------------------------------

/// Section heading used for a timeline category.
fn timeline_heading(category: Category) -> Option<&'static str> {
    match category {
        Category::Presented => Some("## Papers Presented"),
        Category::Poster => Some("## Posters Presented"),
        Category::Attended => Some("## Workshops & Conferences Attended"),
        Category::Publication | Category::Software => None,
    }
}

/// One conference category as a timeline section. Empty when the category
/// has no entries or is not a conference category.
pub fn render_timeline(catalog: &Catalog<'_>, category: Category, ctx: &RenderContext) -> String {
    let Some(heading) = timeline_heading(category) else {
        return String::new();
    };
    let entries = catalog.get(category);
    if entries.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = vec![
        format!("{}\n", heading),
        "::: {.timeline}\n".to_string(),
    ];
    for entry in entries {
        lines.push(timeline_item(entry, ctx));
    }
    lines.push(":::\n".to_string());
    lines.join("\n")
}

/// Presented papers, posters and attended events on one page.
pub fn render_conferences(catalog: &Catalog<'_>, ctx: &RenderContext) -> String {
    [Category::Presented, Category::Poster, Category::Attended]
        .into_iter()
        .map(|category| render_timeline(catalog, category, ctx))
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

fn location_of(entry: &Entry) -> Option<String> {
    entry.text("address").or_else(|| entry.text("location"))
}

fn event_of(entry: &Entry, title: Option<&str>) -> Option<String> {
    entry
        .text("booktitle")
        .or_else(|| entry.text("eventtitle"))
        .filter(|venue| Some(venue.as_str()) != title)
        .or_else(|| entry.text("howpublished"))
}

fn timeline_item(entry: &Entry, ctx: &RenderContext) -> String {
    let title = entry.text("title");
    let date = entry.get("date").map(format_date);
    let place = location_of(entry);

    let mut lines: Vec<String> = vec!["::: {.timeline-item}".to_string()];

    lines.push("::: {.timeline-left}".to_string());
    match (&date, &place) {
        (Some(date), Some(_)) => lines.push(format!("[{}]{{.tl-date}}\\", date)),
        (Some(date), None) => lines.push(format!("[{}]{{.tl-date}}", date)),
        (None, _) => {}
    }
    if let Some(place) = &place {
        lines.push(format!("[{}]{{.tl-place}}", place));
    }
    lines.push(":::".to_string());

    lines.push("::: {.timeline-center}".to_string());
    lines.push(":::".to_string());

    lines.push("::: {.timeline-right}".to_string());
    if let Some(title) = &title {
        lines.push(format!("### {}", title));
    }
    if let Some(event) = event_of(entry, title.as_deref()) {
        lines.push(format!("*{}*", event));
    }
    if let Some(note) = entry
        .text("note")
        .filter(|n| !BOILERPLATE_NOTES.contains(&n.to_lowercase().as_str()))
    {
        lines.push(format!("\n*{}*", note));
    }
    if let Some(abstract_text) = entry.text("abstract") {
        lines.push(format!("\n{}", collapsible("Abstract", &abstract_text, "", false)));
    }
    if let Some(link) = ctx.asset_link(entry) {
        lines.push(format!("\n[📄 Certificate]({}){{.tl-cert}}", link));
    }
    lines.push(":::".to_string());

    lines.push("\n:::\n".to_string());
    lines.join("\n")
}

/// Short numbered lists of presented papers and posters.
pub fn render_pub_conference_list(catalog: &Catalog<'_>) -> String {
    let sections = [
        (Category::Presented, "## Conference Papers Presented\n"),
        (Category::Poster, "## Poster Presentations\n"),
    ];

    let mut lines: Vec<String> = Vec::new();
    for (category, heading) in sections {
        let entries = catalog.get(category);
        if entries.is_empty() {
            continue;
        }
        lines.push(heading.to_string());
        for (i, entry) in entries.iter().enumerate() {
            lines.push(conference_list_item(entry, category, i + 1));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn conference_list_item(entry: &Entry, category: Category, index: usize) -> String {
    let title = entry.text("title").unwrap_or_else(|| "Untitled".to_string());

    let venue: Vec<String> = [
        entry
            .text("booktitle")
            .or_else(|| entry.text("eventtitle"))
            .map(|b| format!("*{}*", b)),
        location_of(entry),
    ]
    .into_iter()
    .flatten()
    .collect();
    let venue = venue.join(", ");
    let date = entry.get("date").map(format_date);

    let mut detail = match (venue.is_empty(), date) {
        (false, Some(date)) => format!("{}. {}.", venue, date),
        (false, None) => format!("{}.", venue),
        (true, Some(date)) => format!("{}.", date),
        (true, None) => String::new(),
    };

    let note = entry.text("note").filter(|n| {
        category != Category::Presented || !n.eq_ignore_ascii_case("paper presented")
    });
    if let Some(note) = note {
        detail.push_str(&format!(" *({})*", note));
    }

    let detail = detail.trim_start();
    if detail.is_empty() {
        format!("{}. **{}**\n", index, title)
    } else {
        format!("{}. **{}**\\\n   {}\n", index, title, detail)
    }
}

// ---------------------------------------------------------------------------
// Research counts
// ---------------------------------------------------------------------------

/// Aggregate counts per kind of research output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResearchCounts {
    pub journal_articles: usize,
    pub preprints: usize,
    pub software: usize,
    pub presented: usize,
    pub posters: usize,
    pub attended: usize,
}

impl ResearchCounts {
    pub fn from_catalog(catalog: &Catalog<'_>) -> Self {
        let pubs = catalog.get(Category::Publication);
        let journal_articles = pubs.iter().filter(|e| is_journal_article(e)).count();
        ResearchCounts {
            journal_articles,
            preprints: pubs.len() - journal_articles,
            software: catalog.count(Category::Software),
            presented: catalog.count(Category::Presented),
            posters: catalog.count(Category::Poster),
            attended: catalog.count(Category::Attended),
        }
    }

    pub fn publications(&self) -> usize {
        self.journal_articles + self.preprints
    }
}

/// Markdown table of research output counts.
pub fn render_research_counts(catalog: &Catalog<'_>) -> String {
    let counts = ResearchCounts::from_catalog(catalog);
    [
        "| Type | Count |".to_string(),
        "|---|---|".to_string(),
        format!("| Publications | {} |", counts.publications()),
        format!("| Peer-reviewed journal articles | {} |", counts.journal_articles),
        format!("| Preprints | {} |", counts.preprints),
        format!("| Software packages | {} |", counts.software),
        format!("| Conference papers presented | {} |", counts.presented),
        format!("| Poster presentations | {} |", counts.posters),
    ]
    .join("\n")
}
