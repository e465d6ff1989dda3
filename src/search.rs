//! Catalog search over titles and authors: a regex fast path for queries
//! that parse as one, and a folded substring match for everything else.

use crate::book::Book;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Default cap on the suggestion list.
pub const SUGGESTION_LIMIT: usize = 5;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Case- and diacritic-insensitive form used for substring matching: NFKD
/// decomposition with combining marks stripped, lowercased, whitespace runs
/// collapsed.
fn fold(text: &str) -> String {
    let stripped: String = text.nfkd().filter(|ch| !is_combining_mark(*ch)).collect();
    let lowered = stripped.to_lowercase();
    RE_WHITESPACE.replace_all(lowered.trim(), " ").to_string()
}

/// Books whose title or author matches the query. An empty query keeps the
/// whole catalog. Matching is folded substring search; a query that also
/// parses as a regex matches as one too, case-insensitively, so power users
/// can write patterns without breaking plain-text lookups.
pub fn search_books<'a>(books: &'a [Book], query: &str) -> Vec<&'a Book> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return books.iter().collect();
    }
    let re = RegexBuilder::new(trimmed).case_insensitive(true).build().ok();
    if re.is_some() {
        debug!(query = trimmed, "Query doubles as a regex");
    }
    let needle = fold(trimmed);
    books
        .iter()
        .filter(|book| {
            let by_regex = re
                .as_ref()
                .is_some_and(|re| re.is_match(&book.title) || re.is_match(&book.author));
            by_regex
                || fold(&book.title).contains(&needle)
                || fold(&book.author).contains(&needle)
        })
        .collect()
}

/// Up to `limit` distinct suggestions for a partial query: matching titles
/// first, then matching authors, in catalog order.
pub fn suggestions(books: &[Book], partial: &str, limit: usize) -> Vec<String> {
    let needle = fold(partial);
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut found: Vec<String> = Vec::new();
    let candidates = books
        .iter()
        .map(|book| &book.title)
        .chain(books.iter().map(|book| &book.author));
    for candidate in candidates {
        if candidate.is_empty() || !fold(candidate).contains(&needle) {
            continue;
        }
        if !found.iter().any(|existing| existing == candidate) {
            found.push(candidate.clone());
            if found.len() == limit {
                break;
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::REFERENCE_PAGE_SIZE;
    use std::path::PathBuf;

    fn book(id: u32, title: &str, author: &str) -> Book {
        Book {
            id,
            title: title.to_string(),
            author: author.to_string(),
            background_color: String::new(),
            has_data: true,
            page_size: REFERENCE_PAGE_SIZE,
            table_of_contents: Vec::new(),
            pages: Vec::new(),
            root: PathBuf::new(),
        }
    }

    fn catalog() -> Vec<Book> {
        vec![
            book(1, "Grade 3 English Book", "Ministry of Education"),
            book(2, "Grade 4 English Book", "Ministry of Education"),
            book(3, "Contes choisis", "José Martí"),
        ]
    }

    #[test]
    fn empty_query_keeps_the_whole_catalog() {
        let books = catalog();
        assert_eq!(search_books(&books, "   ").len(), 3);
    }

    #[test]
    fn matches_title_and_author_case_insensitively() {
        let books = catalog();
        let hits = search_books(&books, "grade 3");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        let by_author = search_books(&books, "ministry");
        assert_eq!(by_author.len(), 2);
    }

    #[test]
    fn regex_queries_are_honored() {
        let books = catalog();
        let hits = search_books(&books, "^grade [34]");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn unbalanced_regex_falls_back_to_substring() {
        let mut books = catalog();
        books.push(book(4, "Reading (Draft)", "Unknown"));
        let hits = search_books(&books, "(draft");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 4);
    }

    #[test]
    fn diacritics_fold_away() {
        let books = catalog();
        let hits = search_books(&books, "jose marti");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn suggestions_prefer_titles_then_dedupe_and_cap() {
        let books = catalog();
        let all = suggestions(&books, "english", 5);
        assert_eq!(all, vec!["Grade 3 English Book", "Grade 4 English Book"]);

        let authors = suggestions(&books, "ministry", 5);
        assert_eq!(authors, vec!["Ministry of Education"]);

        let capped = suggestions(&books, "grade", 1);
        assert_eq!(capped.len(), 1);
    }
}
