//! Tag vocabulary and entry grouping.
//!
//! Entries are routed by the tags in their `keywords` field. The mapping
//! from tag to category is a single table; nothing else in the crate matches
//! on tag strings.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::bib::Entry;

/// An output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Journal articles and preprints (`pub`)
    Publication,
    /// Software packages (`software`)
    Software,
    /// Conference papers presented (`present`)
    Presented,
    /// Poster presentations (`poster`)
    Poster,
    /// Workshops and conferences attended (`part`)
    Attended,
}

/// Tag → category dispatch table. Tags are case-sensitive.
pub const TAG_TABLE: &[(&str, Category)] = &[
    ("pub", Category::Publication),
    ("software", Category::Software),
    ("present", Category::Presented),
    ("poster", Category::Poster),
    ("part", Category::Attended),
];

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Publication,
        Category::Software,
        Category::Presented,
        Category::Poster,
        Category::Attended,
    ];

    pub fn from_tag(tag: &str) -> Option<Category> {
        TAG_TABLE
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, category)| *category)
    }

    pub fn tag(self) -> &'static str {
        TAG_TABLE
            .iter()
            .find(|(_, category)| *category == self)
            .map(|(t, _)| *t)
            .unwrap_or_default()
    }
}

/// The categories an entry belongs to, in table order, without duplicates.
pub fn categories_of(entry: &Entry) -> Vec<Category> {
    let mut found: Vec<Category> = entry.tags().filter_map(Category::from_tag).collect();
    found.sort();
    found.dedup();
    found
}

/// Entries grouped by category, each group in display order.
#[derive(Debug, Clone, Default)]
pub struct Catalog<'a> {
    groups: BTreeMap<Category, Vec<&'a Entry>>,
    unclassified: Vec<&'a Entry>,
}

impl<'a> Catalog<'a> {
    /// Groups entries and sorts every group by descending date.
    ///
    /// The sort is stable: entries with equal dates keep file order, and
    /// entries without a usable date follow all dated ones in file order.
    pub fn build(entries: &'a [Entry]) -> Self {
        let mut catalog = Catalog::default();

        for entry in entries {
            let categories = categories_of(entry);
            if categories.is_empty() {
                catalog.unclassified.push(entry);
                continue;
            }
            for category in categories {
                catalog.groups.entry(category).or_default().push(entry);
            }
        }

        for group in catalog.groups.values_mut() {
            // `None` orders before `Some`, so undated entries land last.
            group.sort_by_key(|e| Reverse(e.sort_date()));
        }

        catalog
    }

    /// Entries in a category, newest first.
    pub fn get(&self, category: Category) -> &[&'a Entry] {
        self.groups
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    /// Entries that matched no known tag, in file order.
    pub fn unclassified(&self) -> &[&'a Entry] {
        &self.unclassified
    }
}
