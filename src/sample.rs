//! Generates a small self-contained sample library so the reader can be
//! exercised without shipping real book assets: one book, two pages, with
//! audio, page art, geometry, and speech marks all derived from the block
//! texts.

use crate::book::MANIFEST_NAME;
use crate::geometry::REFERENCE_PAGE_SIZE;
use anyhow::{Context, Result};
use serde_json::json;
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SAMPLE_DIR: &str = "grade-3-english";

const WORD_MS: u32 = 320;
const TAIL_MS: u32 = 240;
const SAMPLE_RATE: u32 = 22_050;

struct SamplePage {
    number: u32,
    blocks: &'static [(u32, &'static str)],
}

const SAMPLE_PAGES: &[SamplePage] = &[
    SamplePage {
        number: 19,
        blocks: &[
            (2, "Listen and say."),
            (9, "I'm in grade three. I'm in grade four."),
            (10, "What grade are you in?"),
        ],
    },
    SamplePage {
        number: 20,
        blocks: &[
            (21, "Listen and say."),
            (22, "Where do you live?"),
            (23, "I live in a small town."),
        ],
    },
];

/// Writes the sample book unless the library already holds one. Returns true
/// when content was generated.
pub fn ensure_sample_library(library_dir: &Path) -> Result<bool> {
    if let Ok(entries) = fs::read_dir(library_dir) {
        for entry in entries.flatten() {
            if entry.path().join(MANIFEST_NAME).is_file() {
                return Ok(false);
            }
        }
    }
    write_sample_library(library_dir)?;
    Ok(true)
}

/// Builds the whole sample book under `library_dir` and returns its directory.
pub fn write_sample_library(library_dir: &Path) -> Result<PathBuf> {
    let book_dir = library_dir.join(SAMPLE_DIR);
    for sub in ["pages", "marks", "audio", "images"] {
        let dir = book_dir.join(sub);
        fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;
    }

    for page in SAMPLE_PAGES {
        write_page_geometry(&book_dir, page)?;
        write_page_image(&book_dir, page.number)?;
        for (id, text) in page.blocks {
            write_block_marks(&book_dir, *id, text)?;
            write_block_audio(&book_dir, *id, text)?;
        }
    }
    write_manifest(&book_dir)?;

    info!(dir = %book_dir.display(), "Generated sample library");
    Ok(book_dir)
}

fn write_manifest(book_dir: &Path) -> Result<()> {
    let pages: Vec<_> = SAMPLE_PAGES
        .iter()
        .map(|page| {
            let blocks: Vec<_> = page
                .blocks
                .iter()
                .map(|(id, text)| {
                    json!({
                        "id": id,
                        "text": text,
                        "audio": format!("audio/block_{id}.wav"),
                    })
                })
                .collect();
            json!({
                "pageNumber": page.number,
                "image": format!("images/page_{}.png", page.number),
                "blocks": blocks,
            })
        })
        .collect();

    let manifest = json!({
        "id": 1,
        "title": "Grade 3 English Book",
        "author": "Ministry of Education",
        "backgroundColor": "#4A90E2",
        "hasData": true,
        "pageSize": { "width": REFERENCE_PAGE_SIZE.width, "height": REFERENCE_PAGE_SIZE.height },
        "tableOfContents": [
            { "id": "unit-4", "title": "Unit 4: What grade are you in?", "pageNumber": 19 },
            { "id": "unit-5", "title": "Unit 5: Where do you live?", "pageNumber": 20 },
        ],
        "pages": pages,
    });

    let path = book_dir.join(MANIFEST_NAME);
    let raw = serde_json::to_string_pretty(&manifest).context("Encoding manifest")?;
    fs::write(&path, raw).with_context(|| format!("Writing {}", path.display()))
}

fn write_page_geometry(book_dir: &Path, page: &SamplePage) -> Result<()> {
    let mut entries = serde_json::Map::new();
    for (row, (id, text)) in page.blocks.iter().enumerate() {
        let spans = word_spans(text);
        let words: Vec<_> = spans.iter().map(|(_, _, word)| word.clone()).collect();
        let boxes: Vec<_> = spans
            .iter()
            .enumerate()
            .map(|(column, (_, _, word))| {
                let rect = word_box(row, column, word);
                json!([[rect[0], rect[1]], [rect[2], rect[3]]])
            })
            .collect();
        entries.insert(
            id.to_string(),
            json!({ "text": text, "words": words, "bounding_boxes": boxes }),
        );
    }

    let path = book_dir.join("pages").join(format!("page_{}.json", page.number));
    let raw = serde_json::to_string_pretty(&entries).context("Encoding page geometry")?;
    fs::write(&path, raw).with_context(|| format!("Writing {}", path.display()))
}

fn write_block_marks(book_dir: &Path, block_id: u32, text: &str) -> Result<()> {
    let mut lines = String::new();
    for (index, (start, end, word)) in word_spans(text).iter().enumerate() {
        let mark = json!({
            "time": index as u32 * WORD_MS,
            "type": "word",
            "start": start,
            "end": end,
            "value": word,
        });
        lines.push_str(&mark.to_string());
        lines.push('\n');
    }

    let path = book_dir.join("marks").join(format!("block_{block_id}.jsonl"));
    fs::write(&path, lines).with_context(|| format!("Writing {}", path.display()))
}

/// A quiet sine tone sized to the block's word timings, so playback position
/// lines up with the marks.
fn write_block_audio(book_dir: &Path, block_id: u32, text: &str) -> Result<()> {
    let words = word_spans(text).len() as u32;
    let duration_ms = words * WORD_MS + TAIL_MS;
    let total_samples = (u64::from(duration_ms) * u64::from(SAMPLE_RATE) / 1000) as u32;
    let frequency = 180.0 + block_id as f32 * 30.0;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let path = book_dir.join("audio").join(format!("block_{block_id}.wav"));
    let mut writer = hound::WavWriter::create(&path, spec)
        .with_context(|| format!("Creating {}", path.display()))?;
    for n in 0..total_samples {
        let t = n as f32 / SAMPLE_RATE as f32;
        let amplitude = (t * frequency * TAU).sin() * 0.1;
        writer
            .write_sample((amplitude * f32::from(i16::MAX)) as i16)
            .with_context(|| format!("Writing samples to {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("Finalizing {}", path.display()))
}

fn write_page_image(book_dir: &Path, page_number: u32) -> Result<()> {
    let width = REFERENCE_PAGE_SIZE.width as u32;
    let height = REFERENCE_PAGE_SIZE.height as u32;
    let art = image::RgbaImage::from_pixel(width, height, image::Rgba([250, 246, 237, 255]));
    let path = book_dir.join("images").join(format!("page_{page_number}.png"));
    art.save(&path)
        .with_context(|| format!("Writing {}", path.display()))
}

/// Byte spans of whitespace-separated words. Sample texts are ASCII, so the
/// spans double as character offsets for the marks.
fn word_spans(text: &str) -> Vec<(u32, u32, String)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s as u32, i as u32, text[s..i].to_string()));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s as u32, text.len() as u32, text[s..].to_string()));
    }
    spans
}

/// Lays words out on a grid: one row band per block, wrapping within the
/// page's printable width.
fn word_box(row: usize, column: usize, word: &str) -> [f32; 4] {
    let width = word.chars().count() as f32 * 13.0;
    let per_line = 5;
    let line = (column / per_line) as f32;
    let slot = (column % per_line) as f32;
    let x = 70.0 + slot * 96.0;
    let y = 110.0 + row as f32 * 120.0 + line * 34.0;
    [x, y, x + width, y + 26.0]
}
