//! Per-block highlight metadata: word timing marks plus page-level word
//! geometry, fetched through a pluggable source and cached by the
//! `HighlightDataStore`.

use crate::geometry::BoundingBox;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Kinds of timing marks emitted by the narration pipeline. Only word marks
/// drive highlighting; everything else is parsed and filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    Word,
    Sentence,
    Viseme,
    Ssml,
    #[serde(other)]
    Other,
}

/// One `{time, type, start, end, value}` record from a block's mark data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeechMark {
    #[serde(rename = "time")]
    pub time_ms: u32,
    #[serde(rename = "type")]
    pub kind: MarkKind,
    #[serde(rename = "start")]
    pub char_start: u32,
    #[serde(rename = "end")]
    pub char_end: u32,
    pub value: String,
}

/// Everything needed to highlight one block: display words, their boxes in
/// reference page coordinates, and word timing marks, index-aligned so entry
/// `i` of each list describes the same word.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHighlightData {
    pub block_id: u32,
    pub text: String,
    pub words: Vec<String>,
    /// `None` entries are words whose geometry was missing or malformed.
    pub bounding_boxes: Vec<Option<BoundingBox>>,
    pub speech_marks: Vec<SpeechMark>,
}

/// Word geometry for one block as it appears in the per-page metadata blob.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockGeometry {
    pub text: String,
    pub words: Vec<String>,
    #[serde(default)]
    pub bounding_boxes: Vec<Option<Vec<[f32; 2]>>>,
}

/// Parsed per-page metadata blob, keyed by stringified block id exactly as
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PageGeometry {
    blocks: HashMap<String, BlockGeometry>,
}

impl PageGeometry {
    pub fn new(blocks: HashMap<String, BlockGeometry>) -> Self {
        Self { blocks }
    }

    pub fn block(&self, block_id: u32) -> Option<&BlockGeometry> {
        self.blocks.get(&block_id.to_string())
    }
}

/// Raw fetch layer behind the store. Implementations return `Ok(None)` when
/// no data exists for the key, reserving `Err` for actual read failures.
pub trait HighlightSource {
    fn block_marks(&self, block_id: u32) -> Result<Option<Vec<SpeechMark>>>;
    fn page_geometry(&self, page_number: u32) -> Result<Option<PageGeometry>>;
}

/// Reads highlight metadata from a book directory: `marks/block_<id>.jsonl`
/// with one mark record per line, and `pages/page_<n>.json` blobs.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn marks_path(&self, block_id: u32) -> PathBuf {
        self.root.join("marks").join(format!("block_{block_id}.jsonl"))
    }

    fn page_path(&self, page_number: u32) -> PathBuf {
        self.root.join("pages").join(format!("page_{page_number}.json"))
    }
}

impl HighlightSource for DirectorySource {
    fn block_marks(&self, block_id: u32) -> Result<Option<Vec<SpeechMark>>> {
        let path = self.marks_path(block_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Reading speech marks from {}", path.display()))?;

        let mut marks = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mark: SpeechMark = serde_json::from_str(line)
                .with_context(|| format!("Parsing speech mark at {}:{}", path.display(), idx + 1))?;
            marks.push(mark);
        }
        Ok(Some(marks))
    }

    fn page_geometry(&self, page_number: u32) -> Result<Option<PageGeometry>> {
        let path = self.page_path(page_number);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Reading page metadata from {}", path.display()))?;
        let geometry = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing page metadata from {}", path.display()))?;
        Ok(Some(geometry))
    }
}

/// In-memory source for embedded catalogs and tests.
#[derive(Default)]
pub struct StaticSource {
    marks: HashMap<u32, Vec<SpeechMark>>,
    pages: HashMap<u32, PageGeometry>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_block_marks(&mut self, block_id: u32, marks: Vec<SpeechMark>) {
        self.marks.insert(block_id, marks);
    }

    pub fn insert_page_geometry(&mut self, page_number: u32, geometry: PageGeometry) {
        self.pages.insert(page_number, geometry);
    }
}

impl HighlightSource for StaticSource {
    fn block_marks(&self, block_id: u32) -> Result<Option<Vec<SpeechMark>>> {
        Ok(self.marks.get(&block_id).cloned())
    }

    fn page_geometry(&self, page_number: u32) -> Result<Option<PageGeometry>> {
        Ok(self.pages.get(&page_number).cloned())
    }
}

/// Caching resolver from `(block id, page number)` to [`BlockHighlightData`].
///
/// Both caches are populated once per key and only ever emptied by
/// [`clear`](Self::clear); lookups that fail at the source are logged and
/// resolve to `None` so playback continues without highlighting.
pub struct HighlightDataStore {
    source: Box<dyn HighlightSource>,
    marks_by_block: HashMap<u32, Vec<SpeechMark>>,
    pages_by_number: HashMap<u32, PageGeometry>,
}

impl HighlightDataStore {
    pub fn new(source: Box<dyn HighlightSource>) -> Self {
        Self {
            source,
            marks_by_block: HashMap::new(),
            pages_by_number: HashMap::new(),
        }
    }

    /// Resolve everything needed to highlight `block_id` on `page_number`.
    ///
    /// Returns `None` when the block has no word timing marks or the page
    /// metadata has no entry for it. Never fails; "no highlight data" is an
    /// expected outcome, not an error.
    pub fn get_block_highlight_data(
        &mut self,
        block_id: u32,
        page_number: u32,
    ) -> Option<BlockHighlightData> {
        self.ensure_marks(block_id);
        self.ensure_page(page_number);

        let marks = self.marks_by_block.get(&block_id)?;
        if marks.is_empty() {
            debug!(block_id, "Block has no word timing marks");
            return None;
        }
        let block = self
            .pages_by_number
            .get(&page_number)
            .and_then(|page| page.block(block_id));
        let Some(block) = block else {
            debug!(block_id, page_number, "Page metadata has no entry for block");
            return None;
        };

        let bounding_boxes = block
            .bounding_boxes
            .iter()
            .map(|entry| entry.as_deref().and_then(corners_to_box))
            .collect();

        Some(BlockHighlightData {
            block_id,
            text: block.text.clone(),
            words: block.words.clone(),
            bounding_boxes,
            speech_marks: marks.clone(),
        })
    }

    /// Drop every cached entry. Subsequent lookups refetch from the source.
    pub fn clear(&mut self) {
        debug!(
            marks = self.marks_by_block.len(),
            pages = self.pages_by_number.len(),
            "Clearing highlight caches"
        );
        self.marks_by_block.clear();
        self.pages_by_number.clear();
    }

    fn ensure_marks(&mut self, block_id: u32) {
        if self.marks_by_block.contains_key(&block_id) {
            return;
        }
        match self.source.block_marks(block_id) {
            Ok(Some(raw)) => {
                self.marks_by_block.insert(block_id, prepare_marks(raw));
            }
            Ok(None) => {
                self.marks_by_block.insert(block_id, Vec::new());
            }
            // Not cached, so a transient read failure is retried next time.
            Err(err) => warn!(block_id, "Failed to load speech marks: {err:#}"),
        }
    }

    fn ensure_page(&mut self, page_number: u32) {
        if self.pages_by_number.contains_key(&page_number) {
            return;
        }
        match self.source.page_geometry(page_number) {
            Ok(Some(geometry)) => {
                self.pages_by_number.insert(page_number, geometry);
            }
            Ok(None) => {
                self.pages_by_number.insert(page_number, PageGeometry::default());
            }
            Err(err) => warn!(page_number, "Failed to load page metadata: {err:#}"),
        }
    }
}

/// Keep only word marks and order them by start time. The highlighter's scan
/// depends on this ordering, so it is enforced here rather than trusted from
/// the source data.
fn prepare_marks(raw: Vec<SpeechMark>) -> Vec<SpeechMark> {
    let mut marks: Vec<SpeechMark> = raw
        .into_iter()
        .filter(|mark| mark.kind == MarkKind::Word)
        .collect();
    marks.sort_by_key(|mark| mark.time_ms);
    marks
}

fn corners_to_box(corners: &[[f32; 2]]) -> Option<BoundingBox> {
    let [x0, y0] = *corners.first()?;
    let [x1, y1] = *corners.get(1)?;
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(BoundingBox::from_corners(x0, y0, x1, y1))
}
