//! Frame-by-frame word highlighting: picks the active word from timing
//! marks, debounces change notifications, and lays out paint-ready
//! rectangles in container coordinates.

use crate::geometry::{BoundingBox, CoordinateScaler, Point};
use crate::highlight_data::{BlockHighlightData, SpeechMark};
use std::time::Duration;

/// Index of the word whose narration most recently began: the largest `i`
/// with `marks[i].time_ms <= current_time`. `None` when playback is inactive
/// or the first word has not started yet.
///
/// Scans in ascending order and exits at the first future mark, so it relies
/// on the sort the store applies when loading marks.
pub fn active_word_index(
    marks: &[SpeechMark],
    is_playing: bool,
    current_time: Duration,
) -> Option<usize> {
    if !is_playing {
        return None;
    }
    let current_ms = current_time.as_millis();
    let mut active = None;
    for (index, mark) in marks.iter().enumerate() {
        if u128::from(mark.time_ms) <= current_ms {
            active = Some(index);
        } else {
            break;
        }
    }
    active
}

/// Debounces active-word changes so the highlight notification fires once
/// per change rather than once per progress tick.
#[derive(Debug, Default)]
pub struct WordTracker {
    last: Option<usize>,
}

impl WordTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest computed index; returns `Some` only when a word
    /// newly became active.
    pub fn observe(&mut self, active: Option<usize>) -> Option<usize> {
        if active == self.last {
            return None;
        }
        self.last = active;
        active
    }

    /// Forget the previous word, e.g. when the block changes.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Visual class of a word relative to the active index. The three classes
/// are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordPhase {
    Current,
    Passed,
    Upcoming,
}

pub fn classify_word(index: usize, active: Option<usize>) -> WordPhase {
    match active {
        Some(active) if index == active => WordPhase::Current,
        Some(active) if index < active => WordPhase::Passed,
        _ => WordPhase::Upcoming,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordRect {
    pub index: usize,
    pub phase: WordPhase,
    pub rect: BoundingBox,
}

/// Paint-ready geometry for one block at one instant, in container
/// coordinates (scaled, then shifted by the centering offset).
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightFrame {
    pub words: Vec<WordRect>,
    /// Union of the drawn word boxes grown by the block padding; `None` when
    /// no word had usable geometry.
    pub block_rect: Option<BoundingBox>,
    /// Whether this block is the one currently being read aloud.
    pub block_active: bool,
}

/// Lay out the rectangles for `data` at the given active index.
///
/// Words are drawn only up to the shorter of the word and mark lists, and a
/// missing or malformed box skips that word alone, never the whole frame.
pub fn render_frame(
    data: &BlockHighlightData,
    active: Option<usize>,
    scaler: &CoordinateScaler,
    offset: Point,
    block_padding: f32,
    block_active: bool,
) -> HighlightFrame {
    let drawable = data.words.len().min(data.speech_marks.len());
    let mut words = Vec::with_capacity(drawable);
    let mut union: Option<BoundingBox> = None;

    for index in 0..drawable {
        let Some(bbox) = data.bounding_boxes.get(index).copied().flatten() else {
            continue;
        };
        let rect = scaler.scale_box(&bbox).translate(offset.x, offset.y);
        union = Some(match union {
            Some(current) => current.union(&rect),
            None => rect,
        });
        words.push(WordRect {
            index,
            phase: classify_word(index, active),
            rect,
        });
    }

    HighlightFrame {
        words,
        block_rect: union.map(|rect| rect.expand(block_padding)),
        block_active,
    }
}
