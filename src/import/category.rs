//! Category path resolution for the Category column.
//!
//! `suggest` drives the incremental picker as the operator types a path such
//! as `Men > Shirts > Fo`; `resolve` maps a finished cell to a category id.
//! Neither guesses: a path that does not resolve exactly yields nothing.

use crate::catalog::Category;
use serde::Serialize;
use std::collections::HashMap;

pub const PATH_SEPARATOR: &str = " > ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySuggestion {
    pub category: Category,
    pub display_text: String,
    pub path_text: String,
    pub is_partial_match: bool,
    pub has_children: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Query<'a> {
    Roots,
    Browse(Vec<&'a str>),
    Filter {
        segments: Vec<&'a str>,
        current: &'a str,
    },
}

fn parse_query(input: &str) -> Query<'_> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Query::Roots;
    }
    if let Some(before) = trimmed.strip_suffix('>') {
        return Query::Browse(split_segments(before));
    }
    let (head, current) = match trimmed.rsplit_once('>') {
        Some((head, current)) => (head, current.trim()),
        None => ("", trimmed),
    };
    Query::Filter {
        segments: split_segments(head),
        current,
    }
}

fn split_segments(text: &str) -> Vec<&str> {
    text.split('>')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

pub fn suggest(input: &str, categories: &[Category]) -> Vec<CategorySuggestion> {
    let mut suggestions = match parse_query(input) {
        Query::Roots => roots(categories)
            .map(|category| suggestion(category, categories, false))
            .collect(),
        Query::Browse(segments) if segments.is_empty() => roots(categories)
            .map(|category| suggestion(category, categories, false))
            .collect(),
        Query::Browse(segments) => match find_by_path(&segments, categories) {
            Some(parent) => children(parent, categories)
                .map(|category| suggestion(category, categories, false))
                .collect(),
            None => Vec::new(),
        },
        Query::Filter { segments, current } => filter(&segments, current, categories),
    };
    suggestions.sort_by_key(|s| s.display_text.to_lowercase());
    suggestions
}

fn filter(segments: &[&str], current: &str, categories: &[Category]) -> Vec<CategorySuggestion> {
    match segments {
        [] => matching(roots(categories), current, categories),
        [first] => match find_root(first, categories) {
            Some(root) => matching(children(root, categories), current, categories),
            // the first segment is still being typed
            None => matching(roots(categories), first, categories),
        },
        [first, ..] => {
            let Some(root) = find_root(first, categories) else {
                return Vec::new();
            };
            let Some(parent) = find_by_path(segments, categories) else {
                return Vec::new();
            };
            let same_branch = children(parent, categories)
                .filter(|c| c.path.first().is_some_and(|head| same_name(head, &root.name)));
            matching(same_branch, current, categories)
        }
    }
}

fn matching<'a>(
    candidates: impl Iterator<Item = &'a Category>,
    needle: &str,
    categories: &[Category],
) -> Vec<CategorySuggestion> {
    candidates
        .filter(|category| contains_ignore_case(&category.name, needle))
        .map(|category| suggestion(category, categories, !same_name(&category.name, needle)))
        .collect()
}

fn suggestion(
    category: &Category,
    categories: &[Category],
    is_partial_match: bool,
) -> CategorySuggestion {
    CategorySuggestion {
        category: category.clone(),
        display_text: category.name.clone(),
        path_text: category.path_text(),
        is_partial_match,
        has_children: categories
            .iter()
            .any(|c| c.parent_id.as_deref() == Some(category.id.as_str())),
    }
}

fn roots(categories: &[Category]) -> impl Iterator<Item = &Category> {
    categories.iter().filter(|category| category.level == 0)
}

fn children<'a>(
    parent: &'a Category,
    categories: &'a [Category],
) -> impl Iterator<Item = &'a Category> {
    categories
        .iter()
        .filter(move |category| category.parent_id.as_deref() == Some(parent.id.as_str()))
}

fn find_root<'a>(name: &str, categories: &'a [Category]) -> Option<&'a Category> {
    roots(categories).find(|category| same_name(&category.name, name))
}

fn find_by_path<'a>(segments: &[&str], categories: &'a [Category]) -> Option<&'a Category> {
    categories.iter().find(|category| {
        category.path.len() == segments.len()
            && category
                .path
                .iter()
                .zip(segments)
                .all(|(name, segment)| same_name(name, segment))
    })
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Lookup table from category text to id, built once per parse.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    direct: HashMap<String, String>,
    normalized: HashMap<String, String>,
    examples: Vec<String>,
}

impl CategoryIndex {
    /// Full paths are keyed before bare names so a path always beats a
    /// same-named category elsewhere in the tree; the first entry per key wins.
    pub fn build(categories: &[Category]) -> Self {
        let mut index = Self::default();
        for category in categories {
            let path = category.path_text();
            index.insert(&path, &category.id);
            index.examples.push(path);
        }
        for category in categories {
            index.insert(&category.name, &category.id);
        }
        index
    }

    fn insert(&mut self, key: &str, id: &str) {
        self.direct
            .entry(key.trim().to_lowercase())
            .or_insert_with(|| id.to_string());
        self.normalized
            .entry(normalize_path(key))
            .or_insert_with(|| id.to_string());
    }

    pub fn resolve(&self, text: &str) -> Option<&str> {
        self.direct
            .get(&text.trim().to_lowercase())
            .or_else(|| self.normalized.get(&normalize_path(text)))
            .map(String::as_str)
    }

    pub fn examples(&self, limit: usize) -> &[String] {
        &self.examples[..self.examples.len().min(limit)]
    }
}

/// Lower-cases and drops all whitespace so `Men>Shirts` matches `Men > Shirts`.
fn normalize_path(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn resolve(path_text: &str, categories: &[Category]) -> Option<String> {
    CategoryIndex::build(categories)
        .resolve(path_text)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    fn tree() -> Vec<Category> {
        MemoryCatalog::demo().snapshot().categories
    }

    fn names(suggestions: &[CategorySuggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.display_text.as_str()).collect()
    }

    fn by_path<'a>(categories: &'a [Category], path: &str) -> &'a Category {
        categories
            .iter()
            .find(|c| c.path_text() == path)
            .expect("category in demo tree")
    }

    #[test]
    fn query_shapes() {
        assert_eq!(parse_query("   "), Query::Roots);
        assert_eq!(parse_query("Men >"), Query::Browse(vec!["Men"]));
        assert_eq!(parse_query(" > "), Query::Browse(vec![]));
        assert_eq!(
            parse_query("Men > Shirts > Fo"),
            Query::Filter {
                segments: vec!["Men", "Shirts"],
                current: "Fo"
            }
        );
        assert_eq!(
            parse_query("Wo"),
            Query::Filter {
                segments: vec![],
                current: "Wo"
            }
        );
    }

    #[test]
    fn empty_input_lists_roots() {
        let categories = tree();
        let out = suggest("", &categories);
        assert_eq!(names(&out), vec!["Accessories", "Men", "Women"]);
        assert!(out.iter().all(|s| !s.is_partial_match && s.has_children));
    }

    #[test]
    fn trailing_separator_browses_children_sorted() {
        let categories = tree();
        let out = suggest("Men > Shirts >", &categories);
        assert_eq!(names(&out), vec!["Casual", "Formal"]);
        assert_eq!(out[1].path_text, "Men > Shirts > Formal");
        assert!(!out[1].has_children);
    }

    #[test]
    fn browse_mode_returns_every_child_of_every_parent() {
        let categories = tree();
        for parent in &categories {
            let mut expected: Vec<&str> = categories
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(parent.id.as_str()))
                .map(|c| c.id.as_str())
                .collect();
            expected.sort();
            let input = format!("{}{}", parent.path_text(), PATH_SEPARATOR);
            let mut got: Vec<String> = suggest(&input, &categories)
                .into_iter()
                .map(|s| s.category.id)
                .collect();
            got.sort();
            assert_eq!(got, expected, "children of {}", parent.path_text());
        }
    }

    #[test]
    fn browse_of_unknown_parent_is_empty() {
        let categories = tree();
        assert!(suggest("Kids >", &categories).is_empty());
        assert!(suggest("Men > Saree >", &categories).is_empty());
    }

    #[test]
    fn root_filter_is_substring_and_case_insensitive() {
        let categories = tree();
        let out = suggest("EN", &categories);
        assert_eq!(names(&out), vec!["Men", "Women"]);
        assert!(out.iter().all(|s| s.is_partial_match));
        let exact = suggest("men", &categories);
        let men = exact.iter().find(|s| s.display_text == "Men").expect("men");
        assert!(!men.is_partial_match);
    }

    #[test]
    fn one_segment_filters_children_of_resolved_root() {
        let categories = tree();
        let out = suggest("women > s", &categories);
        assert_eq!(names(&out), vec!["Dresses", "Saree", "Shirts"]);
        assert!(out.iter().all(|s| s.category.path[0] == "Women"));
    }

    #[test]
    fn unresolved_first_segment_keeps_filtering_roots() {
        let categories = tree();
        let out = suggest("Wom > x", &categories);
        assert_eq!(names(&out), vec!["Women"]);
    }

    #[test]
    fn deep_filter_stays_inside_branch() {
        let categories = tree();
        let out = suggest("Men > Shirts > f", &categories);
        assert_eq!(names(&out), vec!["Formal"]);
        let women = suggest("Women > Shirts > ", &categories);
        assert_eq!(names(&women), vec!["Silk"]);
    }

    #[test]
    fn deep_filter_with_unknown_segment_is_empty() {
        let categories = tree();
        assert!(suggest("Men > Sarees > f", &categories).is_empty());
        assert!(suggest("Kids > Shirts > f", &categories).is_empty());
    }

    #[test]
    fn every_path_resolves_to_its_category() {
        let categories = tree();
        for category in &categories {
            assert_eq!(
                resolve(&category.path_text(), &categories).as_deref(),
                Some(category.id.as_str()),
                "{}",
                category.path_text()
            );
        }
    }

    #[test]
    fn resolve_tolerates_separator_spacing_and_case() {
        let categories = tree();
        let saree = by_path(&categories, "Women > Saree");
        assert_eq!(resolve("women>saree", &categories).as_deref(), Some(saree.id.as_str()));
        assert_eq!(resolve("  WOMEN  >   Saree ", &categories).as_deref(), Some(saree.id.as_str()));
        assert_eq!(resolve("Saree", &categories).as_deref(), Some(saree.id.as_str()));
    }

    #[test]
    fn resolve_never_guesses() {
        let categories = tree();
        assert_eq!(resolve("NoSuchCategory", &categories), None);
        assert_eq!(resolve("Women > Sar", &categories), None);
    }

    #[test]
    fn shared_name_resolves_to_first_in_tree_order() {
        let categories = tree();
        let men_shirts = by_path(&categories, "Men > Shirts");
        let women_shirts = by_path(&categories, "Women > Shirts");
        assert_eq!(resolve("Shirts", &categories).as_deref(), Some(men_shirts.id.as_str()));
        assert_eq!(
            resolve("Women > Shirts", &categories).as_deref(),
            Some(women_shirts.id.as_str())
        );
    }

    #[test]
    fn index_examples_are_capped() {
        let index = CategoryIndex::build(&tree());
        assert_eq!(index.examples(3).len(), 3);
        assert_eq!(index.examples(3)[0], "Men");
        assert!(CategoryIndex::build(&[]).examples(3).is_empty());
    }
}
