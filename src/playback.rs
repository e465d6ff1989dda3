//! Sequential block playback. `PlaybackController` walks a page's blocks in
//! list order, keeps at most one audio clip alive, and reports everything
//! that happens as batches of [`PlaybackEvent`]s.

use crate::audio::{AudioBackend, AudioClip};
use crate::book::Block;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Controller lifecycle. `Idle`, `Completed` and `Errored` are resting
/// states holding no audio resource; `Errored` is left by calling
/// [`PlaybackController::start_reading`] again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Completed,
    Errored,
}

/// Everything the controller reports to its host, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    PlaybackStart,
    BlockStart {
        index: usize,
        text: String,
    },
    BlockComplete {
        index: usize,
    },
    Progress {
        position: Duration,
        duration: Option<Duration>,
        block_index: usize,
    },
    PlaybackComplete,
    PlaybackError {
        message: String,
    },
}

/// Plays one page's blocks strictly in list order.
///
/// The controller is driven by [`tick`](Self::tick): each call polls the live
/// clip and performs the block-to-block advance when the clip reports natural
/// completion, so block N+1 never starts before block N finished or the
/// controller left `Playing`. Playback failures surface as
/// [`PlaybackEvent::PlaybackError`], never as panics.
pub struct PlaybackController {
    backend: Arc<dyn AudioBackend>,
    blocks: Vec<Block>,
    cursor: usize,
    state: PlaybackState,
    clip: Option<Box<dyn AudioClip>>,
}

impl PlaybackController {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            blocks: Vec::new(),
            cursor: 0,
            state: PlaybackState::Idle,
            clip: None,
        }
    }

    pub fn with_blocks(backend: Arc<dyn AudioBackend>, blocks: Vec<Block>) -> Self {
        let mut controller = Self::new(backend);
        controller.load_content(blocks);
        controller
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Index of the block currently playing or paused.
    pub fn current_block_index(&self) -> Option<usize> {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
            .then_some(self.cursor)
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Replace the block list and rewind to the first block. Never starts
    /// playback; a clip still alive from the previous content is released
    /// first so only one resource ever exists.
    pub fn load_content(&mut self, blocks: Vec<Block>) {
        self.release_clip();
        debug!(count = blocks.len(), "Loading playback content");
        self.blocks = blocks;
        self.cursor = 0;
        self.state = PlaybackState::Idle;
    }

    /// Begin reading from the top, or restart the current block when paused.
    ///
    /// With no content loaded this reports `PlaybackError` instead of
    /// starting; while already playing it is ignored.
    pub fn start_reading(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if self.blocks.is_empty() {
            self.fail("No content loaded".to_string(), &mut events);
            return events;
        }
        match self.state {
            PlaybackState::Playing => {
                debug!("Already reading; ignoring start request");
                return events;
            }
            // Starting over from a pause rewinds to the current block's
            // beginning; resume() is the continue-in-place path.
            PlaybackState::Paused => self.release_clip(),
            PlaybackState::Idle | PlaybackState::Completed | PlaybackState::Errored => {
                self.cursor = 0;
            }
        }
        info!(blocks = self.blocks.len(), start = self.cursor, "Starting read-aloud");
        events.push(PlaybackEvent::PlaybackStart);
        self.begin_block(&mut events);
        events
    }

    /// Suspend the current block's audio, keeping the clip so playback can
    /// continue from the same position. No-op unless playing.
    pub fn pause(&mut self) -> Vec<PlaybackEvent> {
        if self.state != PlaybackState::Playing {
            debug!(state = ?self.state, "Ignoring pause");
            return Vec::new();
        }
        if let Some(clip) = self.clip.as_mut() {
            clip.pause();
        }
        info!(index = self.cursor, "Paused");
        self.state = PlaybackState::Paused;
        Vec::new()
    }

    /// Continue the paused block from its suspended position. No-op unless
    /// paused.
    pub fn resume(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if self.state != PlaybackState::Paused {
            debug!(state = ?self.state, "Ignoring resume");
            return events;
        }
        let Some(clip) = self.clip.as_mut() else {
            self.fail("No paused audio to resume".to_string(), &mut events);
            return events;
        };
        match clip.play() {
            Ok(()) => {
                info!(index = self.cursor, "Resumed");
                self.state = PlaybackState::Playing;
            }
            Err(err) => {
                let message = format!("Failed to resume block playback: {err:#}");
                self.fail(message, &mut events);
            }
        }
        events
    }

    /// Release any audio, rewind to the first block, rest in `Idle`. Safe to
    /// call repeatedly and from any state.
    pub fn stop(&mut self) -> Vec<PlaybackEvent> {
        if self.state != PlaybackState::Idle || self.clip.is_some() {
            info!(state = ?self.state, "Stopping playback");
        }
        self.release_clip();
        self.cursor = 0;
        self.state = PlaybackState::Idle;
        Vec::new()
    }

    /// Teardown entry point for page changes and host shutdown.
    pub fn cleanup(&mut self) {
        self.stop();
    }

    /// Drive the sequence forward one poll. Emits progress while a block
    /// plays; inert in every other state, so a stopped controller never
    /// reports a late completion.
    pub fn tick(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if self.state != PlaybackState::Playing {
            return events;
        }
        let Some(clip) = self.clip.as_mut() else {
            return events;
        };

        let status = clip.status();
        if status.is_loaded {
            events.push(PlaybackEvent::Progress {
                position: status.position,
                duration: status.duration,
                block_index: self.cursor,
            });
        }
        if status.did_just_finish {
            self.release_clip();
            events.push(PlaybackEvent::BlockComplete { index: self.cursor });
            if self.cursor + 1 < self.blocks.len() {
                self.cursor += 1;
                self.begin_block(&mut events);
            } else {
                info!(blocks = self.blocks.len(), "Read-aloud complete");
                self.cursor = 0;
                self.state = PlaybackState::Completed;
                events.push(PlaybackEvent::PlaybackComplete);
            }
        }
        events
    }

    /// Announce and start the block under the cursor. The previous clip must
    /// already be released. On failure the sequence halts in `Errored`.
    fn begin_block(&mut self, events: &mut Vec<PlaybackEvent>) {
        let Some(block) = self.blocks.get(self.cursor) else {
            let message = format!("Block index {} out of range", self.cursor);
            self.fail(message, events);
            return;
        };
        let block_id = block.id;
        let audio = block.audio.clone();

        debug!(index = self.cursor, block_id, "Starting block");
        events.push(PlaybackEvent::BlockStart {
            index: self.cursor,
            text: block.text.clone(),
        });
        let started = self.backend.open(&audio).and_then(|mut clip| {
            clip.play()?;
            Ok(clip)
        });
        match started {
            Ok(clip) => {
                self.clip = Some(clip);
                self.state = PlaybackState::Playing;
            }
            Err(err) => {
                let message = format!("Failed to play block {block_id}: {err:#}");
                self.fail(message, events);
            }
        }
    }

    fn fail(&mut self, message: String, events: &mut Vec<PlaybackEvent>) {
        warn!("Playback error: {message}");
        self.release_clip();
        self.state = PlaybackState::Errored;
        events.push(PlaybackEvent::PlaybackError { message });
    }

    fn release_clip(&mut self) {
        if let Some(mut clip) = self.clip.take() {
            clip.stop();
        }
    }
}
