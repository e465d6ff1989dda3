//! Book catalog model: per-book manifests with pages, narration blocks and
//! table-of-contents sections, plus the library directory scanner.

use crate::geometry::{PageSize, REFERENCE_PAGE_SIZE};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the per-book manifest inside its directory.
pub const MANIFEST_NAME: &str = "book.json";

/// One narrated text segment on a page. List position is playback order; the
/// id keys the highlight metadata and may be non-monotonic with position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Block {
    pub id: u32,
    pub text: String,
    pub audio: PathBuf,
}

/// A page image plus its ordered narration blocks, identified by the page
/// number printed in the book (not its position in the page list).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
    pub image: PathBuf,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocSection {
    pub id: String,
    pub title: String,
    pub page_number: u32,
}

/// A loaded book: manifest metadata with asset paths resolved against the
/// book directory. Books ship without narration data too; those carry
/// `has_data: false` and an empty page list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub background_color: String,
    #[serde(default = "default_has_data")]
    pub has_data: bool,
    #[serde(default = "default_page_size")]
    pub page_size: PageSize,
    #[serde(default)]
    pub table_of_contents: Vec<TocSection>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(skip)]
    pub root: PathBuf,
}

impl Book {
    /// Read `book.json` from a book directory and resolve image and audio
    /// paths against it.
    pub fn load(root: &Path) -> Result<Self> {
        let manifest = root.join(MANIFEST_NAME);
        let contents = fs::read_to_string(&manifest)
            .with_context(|| format!("Reading book manifest {}", manifest.display()))?;
        let mut book: Book = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing book manifest {}", manifest.display()))?;
        book.root = root.to_path_buf();
        for page in &mut book.pages {
            page.image = root.join(&page.image);
            for block in &mut page.blocks {
                block.audio = root.join(&block.audio);
            }
        }
        debug!(
            id = book.id,
            title = %book.title,
            pages = book.pages.len(),
            "Loaded book manifest"
        );
        Ok(book)
    }

    pub fn page_by_number(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|page| page.page_number == page_number)
    }

    pub fn page_index_for_number(&self, page_number: u32) -> Option<usize> {
        self.pages.iter().position(|page| page.page_number == page_number)
    }
}

fn default_has_data() -> bool {
    true
}

fn default_page_size() -> PageSize {
    REFERENCE_PAGE_SIZE
}

/// Catalog of every book found under the library directory.
pub struct Library {
    books: Vec<Book>,
}

impl Library {
    /// Scan the immediate children of `dir` for book manifests. Directories
    /// without one, or with an unreadable one, are logged and skipped so a
    /// single bad book cannot take the catalog down.
    pub fn load(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Reading library directory {}", dir.display()))?;
        let mut books = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("Reading library entry in {}", dir.display()))?;
            let path = entry.path();
            if !path.is_dir() || !path.join(MANIFEST_NAME).exists() {
                continue;
            }
            match Book::load(&path) {
                Ok(book) => books.push(book),
                Err(err) => warn!(path = %path.display(), "Skipping unreadable book: {err:#}"),
            }
        }
        books.sort_by_key(|book| book.id);
        info!(count = books.len(), dir = %dir.display(), "Loaded library");
        Ok(Self { books })
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn book(&self, id: u32) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
