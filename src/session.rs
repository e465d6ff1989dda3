//! One open book on one reading surface. The session owns page navigation,
//! the playback controller for the current page, and the highlight state the
//! UI draws from, all driven by the same tick the controller is.

use crate::audio::AudioBackend;
use crate::book::{Book, Page};
use crate::geometry::{CoordinateScaler, PageSize};
use crate::highlight_data::{BlockHighlightData, HighlightDataStore};
use crate::highlighter::{HighlightFrame, WordTracker, active_word_index, render_frame};
use crate::layout::{ImageLayout, contain_fit};
use crate::playback::{PlaybackController, PlaybackEvent, PlaybackState};
use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything the session reports to its host, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PlaybackStart,
    BlockStart {
        index: usize,
        block_id: u32,
        text: String,
    },
    WordHighlight {
        index: usize,
        value: String,
    },
    BlockComplete {
        index: usize,
    },
    PlaybackComplete,
    PlaybackError {
        message: String,
    },
    PageChanged {
        page_index: usize,
        page_number: u32,
    },
}

pub struct ReaderSession {
    book: Book,
    store: HighlightDataStore,
    controller: PlaybackController,
    highlight_padding: f32,
    page_index: usize,
    /// Bumped on every page change. Highlight data resolved for an earlier
    /// epoch belongs to a page the user has already left and is discarded.
    page_epoch: u64,
    layout: Option<ImageLayout>,
    scaler: Option<CoordinateScaler>,
    highlight: Option<BlockHighlightData>,
    tracker: WordTracker,
    position: Duration,
}

impl ReaderSession {
    pub fn new(
        book: Book,
        backend: Arc<dyn AudioBackend>,
        store: HighlightDataStore,
        highlight_padding: f32,
    ) -> Result<Self> {
        if book.pages.is_empty() {
            bail!("Book '{}' has no page content", book.title);
        }
        let controller = PlaybackController::with_blocks(backend, book.pages[0].blocks.clone());
        Ok(Self {
            book,
            store,
            controller,
            highlight_padding,
            page_index: 0,
            page_epoch: 0,
            layout: None,
            scaler: None,
            highlight: None,
            tracker: WordTracker::new(),
            position: Duration::ZERO,
        })
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn current_page(&self) -> &Page {
        &self.book.pages[self.page_index]
    }

    pub fn page_number(&self) -> u32 {
        self.current_page().page_number
    }

    pub fn page_epoch(&self) -> u64 {
        self.page_epoch
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn current_block_index(&self) -> Option<usize> {
        self.controller.current_block_index()
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    /// Fits the page image into `container` and rebuilds the coordinate
    /// scaler that maps reference-page geometry onto it.
    pub fn set_viewport(&mut self, container: PageSize) -> Result<()> {
        let layout = contain_fit(self.book.page_size, container)?;
        let scaler = CoordinateScaler::new(self.book.page_size, layout.rendered)?;
        debug!(
            scale_x = scaler.scale_x(),
            scale_y = scaler.scale_y(),
            "Viewport changed"
        );
        self.layout = Some(layout);
        self.scaler = Some(scaler);
        Ok(())
    }

    /// Jump to a page by position in the book. Any playback on the old page
    /// stops and its audio resource is released before the switch.
    pub fn set_page(&mut self, index: usize) -> Vec<SessionEvent> {
        if index >= self.book.pages.len() {
            warn!(index, "Ignoring out-of-range page index");
            return Vec::new();
        }
        if index == self.page_index {
            return Vec::new();
        }
        self.page_epoch += 1;
        self.page_index = index;
        self.clear_highlight();
        let page = &self.book.pages[index];
        self.controller.load_content(page.blocks.clone());
        debug!(page_number = page.page_number, "Page changed");
        vec![SessionEvent::PageChanged {
            page_index: index,
            page_number: page.page_number,
        }]
    }

    pub fn next_page(&mut self) -> Vec<SessionEvent> {
        if self.page_index + 1 < self.book.pages.len() {
            self.set_page(self.page_index + 1)
        } else {
            Vec::new()
        }
    }

    pub fn previous_page(&mut self) -> Vec<SessionEvent> {
        if self.page_index > 0 {
            self.set_page(self.page_index - 1)
        } else {
            Vec::new()
        }
    }

    /// Jump to a page by its printed number, the way the table of contents
    /// refers to pages.
    pub fn goto_page_number(&mut self, page_number: u32) -> Vec<SessionEvent> {
        match self.book.page_index_for_number(page_number) {
            Some(index) => self.set_page(index),
            None => {
                warn!(page_number, "No page with that number");
                Vec::new()
            }
        }
    }

    pub fn open_section(&mut self, section_id: &str) -> Vec<SessionEvent> {
        let Some(section) = self
            .book
            .table_of_contents
            .iter()
            .find(|section| section.id == section_id)
        else {
            warn!(section_id, "Unknown table of contents entry");
            return Vec::new();
        };
        let page_number = section.page_number;
        self.goto_page_number(page_number)
    }

    pub fn start_reading(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.start_reading();
        self.handle_events(events)
    }

    pub fn pause(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.pause();
        self.handle_events(events)
    }

    pub fn resume(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.resume();
        self.handle_events(events)
    }

    pub fn stop(&mut self) -> Vec<SessionEvent> {
        self.clear_highlight();
        let events = self.controller.stop();
        self.handle_events(events)
    }

    /// Advance playback by one poll. Call at the configured tick interval.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.tick();
        self.handle_events(events)
    }

    /// Installs highlight data resolved for the page that was current at
    /// `epoch`. Data arriving after the user moved on is dropped.
    pub fn deliver_highlight(&mut self, epoch: u64, data: Option<BlockHighlightData>) {
        if epoch != self.page_epoch {
            debug!("Discarding highlight data from a previous page");
            return;
        }
        self.tracker.reset();
        self.highlight = data;
    }

    /// Rectangles for the block being read, mapped into the viewport set by
    /// [`set_viewport`](Self::set_viewport). `None` while nothing is
    /// highlighted or no viewport is known.
    pub fn frame(&self) -> Option<HighlightFrame> {
        let data = self.highlight.as_ref()?;
        let scaler = self.scaler.as_ref()?;
        let offset = self.layout.as_ref()?.offset;
        let playing = self.controller.state() == PlaybackState::Playing;
        let active = active_word_index(&data.speech_marks, playing, self.position);
        Some(render_frame(
            data,
            active,
            scaler,
            offset,
            self.highlight_padding,
            playing,
        ))
    }

    /// Drops cached marks and page metadata. The next block start refetches.
    pub fn clear_highlight_cache(&mut self) {
        self.store.clear();
    }

    fn handle_events(&mut self, events: Vec<PlaybackEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PlaybackEvent::PlaybackStart => out.push(SessionEvent::PlaybackStart),
                PlaybackEvent::BlockStart { index, text } => {
                    let Some(block_id) = self.controller.block(index).map(|block| block.id)
                    else {
                        warn!(index, "Started block is missing from the current page");
                        continue;
                    };
                    let epoch = self.page_epoch;
                    let page_number = self.page_number();
                    let data = self.store.get_block_highlight_data(block_id, page_number);
                    self.deliver_highlight(epoch, data);
                    out.push(SessionEvent::BlockStart {
                        index,
                        block_id,
                        text,
                    });
                }
                PlaybackEvent::Progress { position, .. } => {
                    self.position = position;
                    if let Some(word) = self.observe_position(position) {
                        out.push(word);
                    }
                }
                PlaybackEvent::BlockComplete { index } => {
                    self.clear_highlight();
                    out.push(SessionEvent::BlockComplete { index });
                }
                PlaybackEvent::PlaybackComplete => {
                    self.clear_highlight();
                    out.push(SessionEvent::PlaybackComplete);
                }
                PlaybackEvent::PlaybackError { message } => {
                    self.clear_highlight();
                    out.push(SessionEvent::PlaybackError { message });
                }
            }
        }
        out
    }

    fn observe_position(&mut self, position: Duration) -> Option<SessionEvent> {
        let data = self.highlight.as_ref()?;
        let playing = self.controller.state() == PlaybackState::Playing;
        let active = active_word_index(&data.speech_marks, playing, position);
        let index = self.tracker.observe(active)?;
        let value = data
            .words
            .get(index)
            .cloned()
            .or_else(|| data.speech_marks.get(index).map(|mark| mark.value.clone()))?;
        Some(SessionEvent::WordHighlight { index, value })
    }

    fn clear_highlight(&mut self) {
        self.highlight = None;
        self.tracker.reset();
        self.position = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, ClipStatus};
    use crate::book::{Block, TocSection};
    use crate::geometry::{BoundingBox, REFERENCE_PAGE_SIZE};
    use crate::highlight_data::{BlockGeometry, MarkKind, PageGeometry, SpeechMark, StaticSource};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Default)]
    struct TestLog {
        opened: usize,
        live: usize,
    }

    struct TestBackend {
        log: Rc<RefCell<TestLog>>,
        polls_per_block: u32,
    }

    struct TestClip {
        log: Rc<RefCell<TestLog>>,
        playing: bool,
        polls_left: u32,
        elapsed: Duration,
        finished_reported: bool,
    }

    impl AudioBackend for TestBackend {
        fn open(&self, _source: &Path) -> anyhow::Result<Box<dyn AudioClip>> {
            let mut log = self.log.borrow_mut();
            log.opened += 1;
            log.live += 1;
            Ok(Box::new(TestClip {
                log: Rc::clone(&self.log),
                playing: false,
                polls_left: self.polls_per_block,
                elapsed: Duration::ZERO,
                finished_reported: false,
            }))
        }
    }

    impl AudioClip for TestClip {
        fn play(&mut self) -> anyhow::Result<()> {
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn stop(&mut self) {
            self.playing = false;
        }

        fn status(&mut self) -> ClipStatus {
            if self.playing && self.polls_left > 0 {
                self.polls_left -= 1;
                self.elapsed += Duration::from_millis(150);
            }
            let finished = self.playing && self.polls_left == 0;
            let did_just_finish = finished && !self.finished_reported;
            if did_just_finish {
                self.finished_reported = true;
            }
            ClipStatus {
                position: self.elapsed,
                duration: None,
                is_loaded: true,
                did_just_finish,
            }
        }
    }

    impl Drop for TestClip {
        fn drop(&mut self) {
            self.log.borrow_mut().live -= 1;
        }
    }

    fn mark(time_ms: u32, value: &str) -> SpeechMark {
        SpeechMark {
            time_ms,
            kind: MarkKind::Word,
            char_start: 0,
            char_end: value.len() as u32,
            value: value.to_string(),
        }
    }

    fn geometry(text: &str, words: &[&str]) -> BlockGeometry {
        let boxes = (0..words.len())
            .map(|i| {
                let x = i as f32 * 120.0;
                Some(vec![[x, 0.0], [x + 100.0, 40.0]])
            })
            .collect();
        BlockGeometry {
            text: text.to_string(),
            words: words.iter().map(|w| w.to_string()).collect(),
            bounding_boxes: boxes,
        }
    }

    fn sample_book() -> Book {
        let page_19 = Page {
            page_number: 19,
            image: PathBuf::from("images/page_19.png"),
            blocks: vec![
                Block {
                    id: 2,
                    text: "Listen and say.".to_string(),
                    audio: PathBuf::from("audio/block_2.wav"),
                },
                Block {
                    id: 3,
                    text: "Grade 3".to_string(),
                    audio: PathBuf::from("audio/block_3.wav"),
                },
            ],
        };
        let page_20 = Page {
            page_number: 20,
            image: PathBuf::from("images/page_20.png"),
            blocks: vec![Block {
                id: 21,
                text: "Where do you live?".to_string(),
                audio: PathBuf::from("audio/block_21.wav"),
            }],
        };
        Book {
            id: 1,
            title: "Grade 3 English Book".to_string(),
            author: "Ministry of Education".to_string(),
            background_color: "#4A90E2".to_string(),
            has_data: true,
            page_size: REFERENCE_PAGE_SIZE,
            table_of_contents: vec![TocSection {
                id: "unit-5".to_string(),
                title: "Unit 5".to_string(),
                page_number: 20,
            }],
            pages: vec![page_19, page_20],
            root: PathBuf::new(),
        }
    }

    fn sample_store() -> HighlightDataStore {
        let mut source = StaticSource::new();
        source.insert_block_marks(
            2,
            vec![mark(0, "Listen"), mark(320, "and"), mark(640, "say.")],
        );
        source.insert_block_marks(3, vec![mark(0, "Grade"), mark(320, "3")]);
        source.insert_block_marks(21, vec![mark(0, "Where"), mark(320, "do")]);

        let mut page_19 = HashMap::new();
        page_19.insert(
            "2".to_string(),
            geometry("Listen and say.", &["Listen", "and", "say."]),
        );
        page_19.insert("3".to_string(), geometry("Grade 3", &["Grade", "3"]));
        let mut page_20 = HashMap::new();
        page_20.insert(
            "21".to_string(),
            geometry("Where do you live?", &["Where", "do", "you", "live?"]),
        );

        source.insert_page_geometry(19, PageGeometry::new(page_19));
        source.insert_page_geometry(20, PageGeometry::new(page_20));
        HighlightDataStore::new(Box::new(source))
    }

    fn session(polls_per_block: u32) -> (ReaderSession, Rc<RefCell<TestLog>>) {
        let log = Rc::new(RefCell::new(TestLog::default()));
        let backend = Arc::new(TestBackend {
            log: Rc::clone(&log),
            polls_per_block,
        });
        let session = ReaderSession::new(sample_book(), backend, sample_store(), 5.0).unwrap();
        (session, log)
    }

    fn run_to_rest(session: &mut ReaderSession) -> Vec<SessionEvent> {
        let mut events = session.start_reading();
        for _ in 0..64 {
            if session.playback_state() != PlaybackState::Playing {
                break;
            }
            events.extend(session.tick());
        }
        assert_ne!(session.playback_state(), PlaybackState::Playing);
        events
    }

    #[test]
    fn rejects_a_book_with_no_pages() {
        let mut book = sample_book();
        book.pages.clear();
        let log = Rc::new(RefCell::new(TestLog::default()));
        let backend = Arc::new(TestBackend {
            log,
            polls_per_block: 1,
        });
        assert!(ReaderSession::new(book, backend, sample_store(), 5.0).is_err());
    }

    #[test]
    fn full_page_run_maps_playback_and_word_events() {
        let (mut session, _log) = session(4);
        let events = run_to_rest(&mut session);

        let expected = vec![
            SessionEvent::PlaybackStart,
            SessionEvent::BlockStart {
                index: 0,
                block_id: 2,
                text: "Listen and say.".to_string(),
            },
            SessionEvent::WordHighlight {
                index: 0,
                value: "Listen".to_string(),
            },
            SessionEvent::WordHighlight {
                index: 1,
                value: "and".to_string(),
            },
            SessionEvent::BlockComplete { index: 0 },
            SessionEvent::BlockStart {
                index: 1,
                block_id: 3,
                text: "Grade 3".to_string(),
            },
            SessionEvent::WordHighlight {
                index: 0,
                value: "Grade".to_string(),
            },
            SessionEvent::WordHighlight {
                index: 1,
                value: "3".to_string(),
            },
            SessionEvent::BlockComplete { index: 1 },
            SessionEvent::PlaybackComplete,
        ];
        assert_eq!(events, expected);
        assert_eq!(session.playback_state(), PlaybackState::Completed);
    }

    #[test]
    fn page_change_mid_playback_stops_audio() {
        let (mut session, log) = session(8);
        session.start_reading();
        session.tick();
        assert_eq!(log.borrow().live, 1);

        let events = session.next_page();
        assert_eq!(
            events,
            vec![SessionEvent::PageChanged {
                page_index: 1,
                page_number: 20,
            }]
        );
        assert_eq!(log.borrow().live, 0);
        assert_eq!(session.playback_state(), PlaybackState::Idle);
        assert!(session.tick().is_empty());
    }

    #[test]
    fn stale_highlight_deliveries_are_discarded() {
        let (mut session, _log) = session(8);
        session.set_viewport(REFERENCE_PAGE_SIZE).unwrap();

        let old_epoch = session.page_epoch();
        session.next_page();

        let data = BlockHighlightData {
            block_id: 21,
            text: "Where do you live?".to_string(),
            words: vec!["Where".to_string()],
            bounding_boxes: vec![Some(BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0))],
            speech_marks: vec![mark(0, "Where")],
        };
        session.deliver_highlight(old_epoch, Some(data.clone()));
        assert!(session.frame().is_none());

        session.deliver_highlight(session.page_epoch(), Some(data));
        assert!(session.frame().is_some());
    }

    #[test]
    fn pages_are_addressed_by_printed_number() {
        let (mut session, _log) = session(1);
        let events = session.goto_page_number(20);
        assert_eq!(
            events,
            vec![SessionEvent::PageChanged {
                page_index: 1,
                page_number: 20,
            }]
        );
        assert_eq!(session.page_number(), 20);

        assert!(session.goto_page_number(999).is_empty());
        assert_eq!(session.page_number(), 20);

        assert!(session.previous_page().len() == 1 && session.page_number() == 19);
        assert!(session.previous_page().is_empty());
    }

    #[test]
    fn table_of_contents_entries_open_their_page() {
        let (mut session, _log) = session(1);
        session.open_section("unit-5");
        assert_eq!(session.page_number(), 20);
        assert!(session.open_section("unit-99").is_empty());
    }

    #[test]
    fn unknown_blocks_read_aloud_without_word_events() {
        let log = Rc::new(RefCell::new(TestLog::default()));
        let backend = Arc::new(TestBackend {
            log,
            polls_per_block: 2,
        });
        let mut book = sample_book();
        book.pages[0].blocks = vec![Block {
            id: 999,
            text: "Off the map".to_string(),
            audio: PathBuf::from("audio/block_999.wav"),
        }];
        let mut session =
            ReaderSession::new(book, backend, sample_store(), 5.0).unwrap();

        let events = run_to_rest(&mut session);
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, SessionEvent::WordHighlight { .. }))
        );
        assert!(events.contains(&SessionEvent::PlaybackComplete));
    }

    #[test]
    fn frame_maps_reference_geometry_into_the_viewport() {
        let (mut session, _log) = session(8);
        session
            .set_viewport(PageSize::new(306.0, 387.0))
            .unwrap();

        session.start_reading();
        session.tick();

        let frame = session.frame().unwrap();
        assert!(frame.block_active);
        let first = frame.words[0].rect;
        assert_eq!(first, BoundingBox::from_corners(0.0, 0.0, 50.0, 20.0));
    }

    #[test]
    fn pause_keeps_highlight_data_without_duplicate_events() {
        let (mut session, _log) = session(8);
        session.set_viewport(REFERENCE_PAGE_SIZE).unwrap();
        session.start_reading();
        session.tick();

        assert!(session.pause().is_empty());
        assert_eq!(session.playback_state(), PlaybackState::Paused);
        let paused_frame = session.frame().unwrap();
        assert!(!paused_frame.block_active);

        assert!(session.resume().is_empty());
        let events = session.tick();
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, SessionEvent::BlockStart { .. }))
        );
    }

    #[test]
    fn stop_clears_highlight_state() {
        let (mut session, _log) = session(8);
        session.set_viewport(REFERENCE_PAGE_SIZE).unwrap();
        session.start_reading();
        session.tick();
        assert!(session.frame().is_some());

        session.stop();
        assert!(session.frame().is_none());
        assert_eq!(session.playback_state(), PlaybackState::Idle);
        assert_eq!(session.position(), Duration::ZERO);
    }
}
