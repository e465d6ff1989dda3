//! Audio playback behind small trait seams so the engine can be driven by
//! `rodio` in the app and by scripted clips in tests.

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Snapshot of a clip's state, polled once per engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipStatus {
    pub position: Duration,
    pub duration: Option<Duration>,
    pub is_loaded: bool,
    /// True exactly once, on the first poll after the clip finished on its
    /// own. Stopping a clip never sets it.
    pub did_just_finish: bool,
}

/// One playable audio resource. Opened paused; playback starts explicitly.
pub trait AudioClip {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn status(&mut self) -> ClipStatus;
}

/// Creates clips from audio file references.
pub trait AudioBackend {
    fn open(&self, source: &Path) -> Result<Box<dyn AudioClip>>;
}

/// `rodio`-backed output device shared by every clip opened through it.
pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let (_stream, handle) = OutputStream::try_default().context("Opening audio output")?;
        Ok(Self { _stream, handle })
    }
}

impl AudioBackend for RodioBackend {
    fn open(&self, source: &Path) -> Result<Box<dyn AudioClip>> {
        let duration = clip_duration(source);
        let file = File::open(source)
            .with_context(|| format!("Opening audio file {}", source.display()))?;
        let decoder = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Decoding audio file {}", source.display()))?;
        let sink = Sink::try_new(&self.handle).context("Creating audio sink")?;
        sink.pause();
        sink.append(decoder);
        debug!(path = %source.display(), ?duration, "Opened audio clip");
        Ok(Box::new(RodioClip {
            sink,
            duration,
            started_at: None,
            accumulated: Duration::ZERO,
            finished_reported: false,
        }))
    }
}

/// Sink-backed clip. The sink exposes no playhead, so position is tracked
/// with wall-clock arithmetic: time accumulated across earlier play
/// stretches plus the elapsed time of the current one, clamped to the probed
/// duration.
struct RodioClip {
    sink: Sink,
    duration: Option<Duration>,
    started_at: Option<Instant>,
    accumulated: Duration,
    finished_reported: bool,
}

impl RodioClip {
    fn position(&self) -> Duration {
        let mut position = self.accumulated;
        if let Some(started_at) = self.started_at {
            position += started_at.elapsed();
        }
        match self.duration {
            Some(total) => position.min(total),
            None => position,
        }
    }
}

impl AudioClip for RodioClip {
    fn play(&mut self) -> Result<()> {
        self.sink.play();
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.started_at = None;
        self.sink.stop();
    }

    fn status(&mut self) -> ClipStatus {
        let finished = self.started_at.is_some() && self.sink.empty();
        let did_just_finish = finished && !self.finished_reported;
        if did_just_finish {
            self.finished_reported = true;
        }
        ClipStatus {
            position: self.position(),
            duration: self.duration,
            is_loaded: true,
            did_just_finish,
        }
    }
}

/// Probe a clip's total duration with a throwaway decoder. Compressed
/// formats may not report one; the engine treats that as unknown.
fn clip_duration(path: &Path) -> Option<Duration> {
    let file = File::open(path).ok()?;
    Decoder::new(BufReader::new(file))
        .ok()
        .and_then(|decoder| decoder.total_duration())
}
