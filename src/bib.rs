//! BibTeX / BibLaTeX parsing.
//!
//! Turns the text of a `.bib` file into [`Entry`] records in file order.
//! Anything outside an `@kind{...}` block is treated as a comment, and
//! `@comment`, `@preamble` and `@string` blocks are skipped. Any structural
//! problem fails the whole parse.

use std::collections::{BTreeMap, HashMap};

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_till1, take_while1};
use nom::character::complete::{anychar, char, multispace0, multispace1, not_line_ending};
use nom::combinator::{cut, eof, peek, recognize};
use nom::multi::{fold_many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;
use thiserror::Error;

use crate::date::PartialDate;
use crate::latex;

/// Errors that make a bibliography unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BibError {
    #[error("line {line}: @{kind}{{{key} is missing its closing brace")]
    Unbalanced {
        kind: String,
        key: String,
        line: usize,
    },

    #[error("line {line}: unexpected '}}' outside of any entry")]
    StrayCloseBrace { line: usize },

    #[error("line {line}: @{kind} entry has no citation key")]
    MissingKey { kind: String, line: usize },

    #[error("line {line}: duplicate citation key '{key}' (first defined on line {first_line})")]
    DuplicateKey {
        key: String,
        line: usize,
        first_line: usize,
    },

    #[error("line {line}: malformed field in entry '{key}': {message}")]
    MalformedField {
        key: String,
        line: usize,
        message: String,
    },

    #[error("line {line}: unterminated value for field '{field}' in entry '{key}'")]
    UnterminatedValue {
        key: String,
        field: String,
        line: usize,
    },
}

impl BibError {
    /// The citation key of the offending entry, when one was read.
    pub fn key(&self) -> Option<&str> {
        match self {
            BibError::Unbalanced { key, .. }
            | BibError::DuplicateKey { key, .. }
            | BibError::MalformedField { key, .. }
            | BibError::UnterminatedValue { key, .. } => {
                Some(key.as_str()).filter(|k| !k.is_empty())
            }
            BibError::StrayCloseBrace { .. } | BibError::MissingKey { .. } => None,
        }
    }

    /// The 1-based line the error was detected on.
    pub fn line(&self) -> usize {
        match self {
            BibError::Unbalanced { line, .. }
            | BibError::StrayCloseBrace { line }
            | BibError::MissingKey { line, .. }
            | BibError::DuplicateKey { line, .. }
            | BibError::MalformedField { line, .. }
            | BibError::UnterminatedValue { line, .. } => *line,
        }
    }
}

/// One bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Lower-cased entry type (`article`, `unpublished`, `misc`, ...)
    pub kind: String,
    /// Citation key, unique within the file
    pub key: String,
    /// 1-based line of the `@` that opened the entry (0 when built in code)
    pub line: usize,
    /// Field values keyed by lower-cased field name. Values have their outer
    /// delimiters removed and whitespace runs collapsed, but are otherwise raw.
    fields: BTreeMap<String, String>,
}

impl Entry {
    pub fn new(kind: &str, key: &str) -> Self {
        Entry {
            kind: kind.to_ascii_lowercase(),
            key: key.to_string(),
            line: 0,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        self.fields
            .insert(name.to_ascii_lowercase(), collapse_whitespace(value));
    }

    /// Raw value of a field. Names are case-insensitive; empty values count
    /// as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Field value with LaTeX markup converted for Markdown output.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(latex::to_markdown)
            .filter(|v| !v.is_empty())
    }

    /// Classification tags from the comma-separated `keywords` field.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.get("keywords")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// The date used for ordering: `date` (start of a range) or else `year`.
    pub fn sort_date(&self) -> Option<PartialDate> {
        self.get("date")
            .and_then(PartialDate::parse)
            .or_else(|| self.get("year").and_then(PartialDate::from_year))
    }

    /// Display year: the `year` field, or the year part of `date`.
    pub fn year(&self) -> Option<String> {
        if let Some(year) = self.text("year") {
            return Some(year);
        }
        self.get("date")
            .and_then(|d| d.split(['-', '/']).next())
            .map(str::trim)
            .filter(|y| !y.is_empty())
            .map(str::to_string)
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a complete bibliography.
///
/// # Errors
///
/// Returns the first structural error found; no entries are returned in
/// that case.
///
/// # Examples
///
/// ```
/// use bib_pages::parse_bib;
///
/// let entries = parse_bib("@article{doe21, title = {A {Title}}, year = 2021}").unwrap();
/// assert_eq!(entries[0].key, "doe21");
/// assert_eq!(entries[0].get("title"), Some("A {Title}"));
/// ```
pub fn parse_bib(input: &str) -> Result<Vec<Entry>, BibError> {
    let mut lines = LineCounter::new(input);
    let mut entries: Vec<Entry> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut rest = input;

    loop {
        rest = free_text(rest).map_or(rest, |(after, _)| after);
        let at = input.len() - rest.len();
        match rest.chars().next() {
            None => break,
            Some('}') => {
                return Err(BibError::StrayCloseBrace {
                    line: lines.line_at(at),
                })
            }
            _ => {}
        }

        let (after_header, kind) = match entry_header(rest) {
            Ok(header) => header,
            Err(_) => {
                // An `@` in free text, not an entry.
                rest = &rest[1..];
                continue;
            }
        };
        let kind = kind.to_ascii_lowercase();
        let line = lines.line_at(at);

        let (after_entry, body) = match braced(after_header) {
            Ok(block) => block,
            Err(_) => {
                return Err(BibError::Unbalanced {
                    key: peek_key(&after_header[1..]),
                    kind,
                    line,
                })
            }
        };
        rest = after_entry;

        if matches!(kind.as_str(), "comment" | "preamble" | "string") {
            continue;
        }

        let entry = parse_entry(kind, body, line)?;
        if let Some(&first_line) = seen.get(&entry.key) {
            return Err(BibError::DuplicateKey {
                key: entry.key,
                line: entry.line,
                first_line,
            });
        }
        seen.insert(entry.key.clone(), entry.line);
        entries.push(entry);
    }

    Ok(entries)
}

/// Maps byte offsets to 1-based lines, counting forward from the last query.
struct LineCounter<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(src: &'a str) -> Self {
        LineCounter {
            src,
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> usize {
        if offset < self.offset {
            return 1 + self.src[..offset].matches('\n').count();
        }
        self.line += self.src[self.offset..offset].matches('\n').count();
        self.offset = offset;
        self.line
    }
}

/// Best-effort citation key of an entry that failed to close.
fn peek_key(after_open: &str) -> String {
    let candidate = after_open
        .split([',', '\n'])
        .next()
        .unwrap_or_default()
        .trim();
    if candidate.contains(['=', '{', '}', '"']) {
        String::new()
    } else {
        candidate.to_string()
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// Text between entries, up to the next `@` or `}`. `%` starts a comment
/// that runs to the end of the line.
fn free_text(input: &str) -> IResult<&str, usize> {
    many0_count(alt((is_not("@}%"), line_comment)))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('%'), not_line_ending))(input)
}

/// `@kind` followed by the opening brace, which is left in the input.
fn entry_header(input: &str) -> IResult<&str, &str> {
    delimited(
        pair(char('@'), multispace0),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        pair(multispace0, peek(char('{'))),
    )(input)
}

/// Content of a `{...}` group. Nested groups are kept verbatim and
/// backslash-escaped braces are not counted. A group that never closes is
/// a `Failure`.
fn braced(input: &str) -> IResult<&str, &str> {
    preceded(
        char('{'),
        cut(terminated(
            recognize(many0_count(alt((
                is_not("{}\\"),
                escaped_char,
                recognize(braced),
            )))),
            char('}'),
        )),
    )(input)
}

/// Content of a `"..."` value. Quotes inside a brace group do not close it.
fn quoted(input: &str) -> IResult<&str, &str> {
    preceded(
        char('"'),
        cut(terminated(
            recognize(many0_count(alt((
                is_not("\"{}\\"),
                escaped_char,
                recognize(braced),
            )))),
            char('"'),
        )),
    )(input)
}

fn escaped_char(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('\\'), anychar))(input)
}

/// A bare number or macro name such as `2020` or `feb`.
fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !",#{}\"".contains(c))(input)
}

/// One or more `#`-joined pieces.
fn field_value(input: &str) -> IResult<&str, String> {
    let (rest, first) = value_piece(input)?;
    fold_many0(
        preceded(delimited(multispace0, char('#'), multispace0), value_piece),
        move || first.to_string(),
        |mut value, piece| {
            value.push_str(piece);
            value
        },
    )(rest)
}

fn value_piece(input: &str) -> IResult<&str, &str> {
    alt((braced, quoted, bare))(input)
}

/// The citation key and the comma after it, if any fields follow.
fn citation_key(input: &str) -> IResult<&str, &str> {
    terminated(
        preceded(
            multispace0,
            take_till1(|c: char| c == ',' || c.is_whitespace() || "={}\"".contains(c)),
        ),
        preceded(multispace0, alt((tag(","), eof))),
    )(input)
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || "_-:.+".contains(c))(input)
}

fn equals(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char('='))(input)
}

/// Whitespace, commas and `%` comment lines between fields.
fn separators(input: &str) -> IResult<&str, usize> {
    many0_count(alt((multispace1, tag(","), line_comment)))(input)
}

fn parse_entry(kind: String, body: &str, line: usize) -> Result<Entry, BibError> {
    let (mut rest, key) = match citation_key(body) {
        Ok(parsed) => parsed,
        Err(_) => return Err(BibError::MissingKey { kind, line }),
    };

    let line_of = |at: &str| line + body[..body.len() - at.len()].matches('\n').count();
    let malformed = |at: &str, message: String| BibError::MalformedField {
        key: key.to_string(),
        line: line_of(at),
        message,
    };

    let mut entry = Entry {
        kind,
        key: key.to_string(),
        line,
        fields: BTreeMap::new(),
    };

    loop {
        rest = separators(rest).map_or(rest, |(after, _)| after);
        if rest.is_empty() {
            break;
        }

        let name_at = rest;
        let (after_name, name) = field_name(rest).map_err(|_| {
            let found = rest.chars().next().unwrap_or_default();
            malformed(rest, format!("expected a field name, found '{}'", found))
        })?;
        let name = name.to_ascii_lowercase();

        let (after_eq, _) = equals(after_name)
            .map_err(|_| malformed(name_at, format!("expected '=' after field '{}'", name)))?;

        let (after_value, value) = match preceded(multispace0, field_value)(after_eq) {
            Ok(parsed) => parsed,
            Err(nom::Err::Failure(_)) => {
                return Err(BibError::UnterminatedValue {
                    key: entry.key,
                    field: name,
                    line: line_of(name_at),
                })
            }
            Err(_) => {
                return Err(malformed(
                    name_at,
                    format!("missing value for field '{}'", name),
                ))
            }
        };

        rest = after_value.trim_start();
        if !rest.is_empty() && !rest.starts_with(',') {
            return Err(malformed(rest, format!("expected ',' after field '{}'", name)));
        }

        entry.fields.insert(name, collapse_whitespace(&value));
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entry() {
        // Given: a single article
        let input = r#"@article{smith2020,
  title = {A Study of Things},
  author = {Smith, John and Doe, Jane},
  year = 2020,
  journal = "Journal of Studies"
}"#;

        // When: we parse it
        let entries = parse_bib(input).unwrap();

        // Then: kind, key and all fields are captured
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.kind, "article");
        assert_eq!(e.key, "smith2020");
        assert_eq!(e.line, 1);
        assert_eq!(e.get("title"), Some("A Study of Things"));
        assert_eq!(e.get("author"), Some("Smith, John and Doe, Jane"));
        assert_eq!(e.get("year"), Some("2020"));
        assert_eq!(e.get("journal"), Some("Journal of Studies"));
    }

    #[test]
    fn test_nested_braces_and_commas_do_not_split_fields() {
        let input = "@misc{k, title = {{RNA}, {DNA}, and more}, note = \"a, {b\"c}, d\"}";

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries[0].get("title"), Some("{RNA}, {DNA}, and more"));
        assert_eq!(entries[0].get("note"), Some("a, {b\"c}, d"));
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        let entries = parse_bib("@Article{k, TITLE = {X}, DoI = {10.1/x}}").unwrap();

        assert_eq!(entries[0].kind, "article");
        assert_eq!(entries[0].get("title"), Some("X"));
        assert_eq!(entries[0].get("doi"), Some("10.1/x"));
        assert_eq!(entries[0].get("DOI"), Some("10.1/x"));
    }

    #[test]
    fn test_multiline_values_collapse_whitespace() {
        let input = "@misc{k,\n  abstract = {First line\n     second line.}\n}";

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries[0].get("abstract"), Some("First line second line."));
    }

    #[test]
    fn test_concatenation_and_bare_values() {
        let input = r#"@misc{k, month = feb, note = "part one " # {part two}}"#;

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries[0].get("month"), Some("feb"));
        assert_eq!(entries[0].get("note"), Some("part one part two"));
    }

    #[test]
    fn test_entries_keep_file_order_and_lines() {
        let input = "% header comment\n\n@misc{b, title={B}}\n\n@article{a, title={A}}\n";

        let entries = parse_bib(input).unwrap();

        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(entries[0].line, 3);
        assert_eq!(entries[1].line, 5);
    }

    #[test]
    fn test_comment_lines_inside_entry_are_skipped() {
        let input = "@misc{k,\n  % title = {Old},\n  title = {New}\n}";

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries[0].get("title"), Some("New"));
    }

    #[test]
    fn test_skips_comment_preamble_and_string_blocks() {
        let input = r#"@comment{ignored {nested} text}
@preamble{"\newcommand{\foo}{bar}"}
@string{jos = "Journal of Stuff"}
@misc{k, title = {Kept}}"#;

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "k");
    }

    #[test]
    fn test_at_sign_in_free_text_is_not_an_entry() {
        let input = "Contact me@example.org for details.\n@misc{k, title={T}}";

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_entry_without_fields() {
        let entries = parse_bib("@misc{lonely}").unwrap();

        assert_eq!(entries[0].key, "lonely");
        assert_eq!(entries[0].get("title"), None);
    }

    #[test]
    fn test_escaped_braces_do_not_nest() {
        let entries = parse_bib(r"@misc{k, title = {Sets \{a, b\} and more}}").unwrap();

        assert_eq!(entries[0].get("title"), Some(r"Sets \{a, b\} and more"));
    }

    #[test]
    fn test_commented_out_entry_is_ignored() {
        let input = "% @misc{old, title = {Gone}}\n% }\n@misc{new, title = {Here}}\n";

        let entries = parse_bib(input).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "new");
        assert_eq!(entries[0].line, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_bib("").unwrap().is_empty());
        assert!(parse_bib("just some notes\n").unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_entry_is_rejected() {
        // Given: an entry whose closing brace is missing
        let input = "@misc{ok, title={Fine}}\n\n@article{k, title = {Foo}\n";

        // When: we parse it
        let err = parse_bib(input).unwrap_err();

        // Then: the error names the entry and its line
        assert_eq!(
            err,
            BibError::Unbalanced {
                kind: "article".to_string(),
                key: "k".to_string(),
                line: 3
            }
        );
        assert!(err.to_string().contains("@article{k"));
    }

    #[test]
    fn test_unbalanced_entry_swallowing_next_entry_is_rejected() {
        let input = "@article{k, title = {Foo}\n@misc{j, title={Bar}}\n";

        let err = parse_bib(input).unwrap_err();

        assert_eq!(err.key(), Some("k"));
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_stray_closing_brace_is_rejected() {
        let input = "@misc{k, title = {Foo}}}\n";

        let err = parse_bib(input).unwrap_err();

        assert_eq!(err, BibError::StrayCloseBrace { line: 1 });
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = parse_bib("@article{, title = {X}}").unwrap_err();
        assert!(matches!(err, BibError::MissingKey { .. }));

        let err = parse_bib("@article{\n  title = {X}\n}").unwrap_err();
        assert!(matches!(err, BibError::MissingKey { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let input = "@misc{k, title={A}}\n@misc{k, title={B}}";

        let err = parse_bib(input).unwrap_err();

        assert_eq!(
            err,
            BibError::DuplicateKey {
                key: "k".to_string(),
                line: 2,
                first_line: 1
            }
        );
    }

    #[test]
    fn test_unterminated_quote_is_rejected() {
        let input = "@misc{k,\n  title = \"no end\n}";

        let err = parse_bib(input).unwrap_err();

        assert_eq!(
            err,
            BibError::UnterminatedValue {
                key: "k".to_string(),
                field: "title".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_missing_equals_is_rejected() {
        let input = "@misc{k,\n  title {X}\n}";

        let err = parse_bib(input).unwrap_err();

        match err {
            BibError::MalformedField { key, line, message } => {
                assert_eq!(key, "k");
                assert_eq!(line, 2);
                assert!(message.contains("'='"), "{}", message);
            }
            other => panic!("Expected MalformedField, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_comma_between_fields_is_rejected() {
        let err = parse_bib("@misc{k, title = {X} year = 2020}").unwrap_err();

        assert!(matches!(err, BibError::MalformedField { .. }));
    }

    #[test]
    fn test_tags_are_trimmed() {
        let entries = parse_bib("@misc{k, keywords = {pub, software ,, present}}").unwrap();

        let tags: Vec<_> = entries[0].tags().collect();
        assert_eq!(tags, ["pub", "software", "present"]);
    }

    #[test]
    fn test_text_unescapes_latex() {
        let entry = Entry::new("misc", "k").with_field("title", r"Caf\'{e} -- {Open}");

        assert_eq!(entry.text("title").as_deref(), Some("Café – Open"));
        assert_eq!(entry.get("title"), Some(r"Caf\'{e} -- {Open}"));
    }

    #[test]
    fn test_empty_field_counts_as_absent() {
        let entry = Entry::new("misc", "k").with_field("doi", "  ");

        assert_eq!(entry.get("doi"), None);
        assert_eq!(entry.text("doi"), None);
    }

    #[test]
    fn test_sort_date_and_year() {
        let dated = Entry::new("misc", "a").with_field("date", "2024-02-06/2024-02-08");
        let yeared = Entry::new("misc", "b").with_field("year", "2021");
        let undated = Entry::new("misc", "c");

        assert_eq!(
            dated.sort_date(),
            Some(PartialDate { year: 2024, month: Some(2), day: Some(6) })
        );
        assert_eq!(dated.year().as_deref(), Some("2024"));
        assert_eq!(yeared.sort_date().map(|d| d.year), Some(2021));
        assert_eq!(yeared.year().as_deref(), Some("2021"));
        assert_eq!(undated.sort_date(), None);
        assert_eq!(undated.year(), None);
    }
}
