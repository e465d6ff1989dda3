//! Synchronized read-aloud engine for paged picture books: blocks of page
//! text play strictly in order while word-level timing marks drive a
//! highlight that follows the narration, mapped from reference page
//! coordinates onto whatever surface the page is drawn on.

pub mod audio;
pub mod book;
pub mod config;
pub mod geometry;
pub mod highlight_data;
pub mod highlighter;
pub mod layout;
pub mod playback;
pub mod recent;
pub mod sample;
pub mod search;
pub mod session;

pub use book::{Block, Book, Library, Page, TocSection};
pub use geometry::{BoundingBox, CoordinateScaler, PageSize, Point, REFERENCE_PAGE_SIZE};
pub use highlight_data::{BlockHighlightData, HighlightDataStore, SpeechMark};
pub use playback::{PlaybackEvent, PlaybackState};
pub use session::{ReaderSession, SessionEvent};
