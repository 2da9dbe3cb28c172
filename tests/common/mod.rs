//! Shared test constants and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// A small bibliography touching every category once.
///
/// `pkg2024` is tagged both `pub` and `software`; `notes` carries only an
/// unrecognized tag and is left out of every partial.
pub const SAMPLE_BIB: &str = r#"% Personal bibliography

@article{doe2023,
  author   = {Jane Doe and John Smith},
  title    = {Estimating {Bayesian} Models with {St\"{o}ckl} Priors},
  journal  = {Journal of Statistics},
  volume   = {12},
  number   = {3},
  pages    = {100--120},
  date     = {2023-06-15},
  doi      = {https://doi.org/10.1000/xyz123},
  abstract = {We study priors.},
  keywords = {pub}
}

@software{pkg2024,
  author   = {Jane Doe},
  title    = {fastpkg: Fast Things in R},
  date     = {2024-02-01},
  url      = {https://janedoe.github.io/fastpkg},
  eprinttype = {cran},
  eprint   = {fastpkg},
  keywords = {pub, software}
}

@inproceedings{talk2022,
  title     = {Sampling at Scale},
  booktitle = {Joint Statistical Meetings},
  address   = {Boston, USA},
  date      = {2022-08-08/2022-08-10},
  note      = {Paper presented},
  keywords  = {present}
}

@misc{poster2021,
  title    = {A Poster},
  booktitle = {useR! 2021},
  date     = {2021-07-05},
  keywords = {poster}
}

@misc{ws2020,
  title    = {Reproducible Research Workshop},
  location = {Online},
  date     = {2020-11},
  keywords = {part}
}

@misc{notes,
  title    = {Lecture notes},
  keywords = {teaching}
}
"#;

/// Creates a temporary site root holding `reference.bib`.
pub fn site_with_bib(bib: &str) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("reference.bib"), bib).unwrap();
    root
}

/// Reads a generated file relative to the site root.
pub fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", relative, e))
}

/// Single Software/Publication entry plus a presented paper.
pub fn scenario_bib() -> &'static str {
    r#"
@article{k1, title = {Dual Use}, date = {2024-05-01}, keywords = {pub,software}}
@inproceedings{k2, title = {My Talk}, date = {2023-10-01}, keywords = {present}}
"#
}
