//! Integration tests using TOML fixtures.
//!
//! This test harness loads test cases from TOML files in the `fixtures/`
//! directory, runs the full pipeline against a temporary site root, and
//! checks the generated files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use bib_pages::{compile, parse_bib, Config};

/// A test fixture loaded from a TOML file.
#[derive(Debug, Deserialize)]
struct Fixture {
    /// Name of the test case
    name: String,
    /// Input bibliography text
    bib: String,
    /// Author to highlight
    #[serde(default)]
    highlight_author: Option<String>,
    /// Whether detail pages are generated
    #[serde(default = "default_true")]
    detail_pages: bool,
    /// Expectations per generated file (for rendering tests)
    #[serde(default)]
    expect: Vec<FileExpectation>,
    /// Expected error message fragment (for error tests)
    #[serde(default)]
    expected_error: Option<String>,
    /// Expected 1-based line of the error (for error tests)
    #[serde(default)]
    expected_line: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FileExpectation {
    /// Path relative to the site root
    file: PathBuf,
    /// Whether the file must exist at all
    #[serde(default = "default_true")]
    exists: bool,
    /// Fragments that must appear, in this order
    #[serde(default)]
    contains: Vec<String>,
    /// Fragments that must not appear
    #[serde(default)]
    excludes: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Load all fixtures from a directory.
fn load_fixtures(dir: &Path) -> Vec<(String, Fixture)> {
    let mut fixtures = Vec::new();

    if !dir.exists() {
        return fixtures;
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|e| e == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        let content = fs::read_to_string(&path).unwrap();
        let fixture: Fixture = toml::from_str(&content)
            .unwrap_or_else(|e| panic!("invalid fixture {}: {}", path.display(), e));
        let name = path.file_stem().unwrap().to_string_lossy().to_string();
        fixtures.push((name, fixture));
    }

    fixtures
}

/// Run rendering tests - compile the fixture bib and check the output files.
fn run_render_test(name: &str, fixture: &Fixture) {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("reference.bib"), &fixture.bib).unwrap();
    let config = Config {
        highlight_author: fixture.highlight_author.clone(),
        detail_pages: fixture.detail_pages,
        ..Config::default()
    };

    println!("Render test '{}': {}", name, fixture.name);
    compile(root.path(), &config)
        .unwrap_or_else(|e| panic!("Fixture '{}' failed to compile: {}", name, e));

    for expectation in &fixture.expect {
        let path = root.path().join(&expectation.file);
        if !expectation.exists {
            assert!(
                !path.exists(),
                "Fixture '{}': {} should not exist",
                name,
                expectation.file.display()
            );
            continue;
        }

        let content = fs::read_to_string(&path).unwrap_or_else(|e| {
            panic!(
                "Fixture '{}': cannot read {}: {}",
                name,
                expectation.file.display(),
                e
            )
        });

        let mut from = 0;
        for fragment in &expectation.contains {
            match content[from..].find(fragment.as_str()) {
                Some(pos) => from += pos + fragment.len(),
                None => panic!(
                    "Fixture '{}': {} should contain {:?} (in order)\nGot:\n{}",
                    name,
                    expectation.file.display(),
                    fragment,
                    content
                ),
            }
        }
        for fragment in &expectation.excludes {
            assert!(
                !content.contains(fragment.as_str()),
                "Fixture '{}': {} should not contain {:?}\nGot:\n{}",
                name,
                expectation.file.display(),
                fragment,
                content
            );
        }
    }
}

/// Run error tests - verify that malformed input is rejected.
fn run_error_test(name: &str, fixture: &Fixture) {
    let result = parse_bib(&fixture.bib);

    println!("Error test '{}': {}", name, fixture.name);

    let err = match result {
        Ok(entries) => panic!(
            "Fixture '{}' should fail but parsed {} entries",
            name,
            entries.len()
        ),
        Err(e) => e,
    };

    if let Some(expected) = &fixture.expected_error {
        assert!(
            err.to_string().contains(expected.as_str()),
            "Fixture '{}': error should contain {:?}, got: {}",
            name,
            expected,
            err
        );
    }
    if let Some(line) = fixture.expected_line {
        assert_eq!(err.line(), line, "Fixture '{}': wrong error line", name);
    }
}

#[test]
fn test_render_fixtures() {
    let fixtures_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/render");
    let fixtures = load_fixtures(&fixtures_dir);
    assert!(!fixtures.is_empty(), "no render fixtures found");

    for (name, fixture) in fixtures {
        run_render_test(&name, &fixture);
    }
}

#[test]
fn test_error_fixtures() {
    let fixtures_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/errors");
    let fixtures = load_fixtures(&fixtures_dir);
    assert!(!fixtures.is_empty(), "no error fixtures found");

    for (name, fixture) in fixtures {
        run_error_test(&name, &fixture);
    }
}
