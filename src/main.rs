//! Entry point for the read-aloud demo.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Make sure the library has at least the generated sample book.
//! - Drive a reading session from the terminal until the book finishes.

use anyhow::{Context, Result, anyhow};
use readalong::PlaybackState;
use readalong::audio::RodioBackend;
use readalong::book::Library;
use readalong::config::{ReaderConfig, load_config};
use readalong::highlight_data::{DirectorySource, HighlightDataStore};
use readalong::recent::RecentBooks;
use readalong::sample::ensure_sample_library;
use readalong::search;
use readalong::session::{ReaderSession, SessionEvent};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        library = %config.library_dir.display(),
        level = %config.log_level,
        "Starting read-aloud demo"
    );

    if ensure_sample_library(&config.library_dir)? {
        info!(dir = %config.library_dir.display(), "No books found; generated the sample library");
    }
    let library = Library::load(&config.library_dir)?;
    if library.is_empty() {
        return Err(anyhow!(
            "No readable books under {}",
            config.library_dir.display()
        ));
    }
    for entry in library.books() {
        info!(id = entry.id, title = %entry.title, author = %entry.author, "Catalog");
    }

    if let Some(query) = args.search {
        print_search(&library, &query);
        return Ok(());
    }

    let book = match args.book_id {
        Some(id) => library
            .book(id)
            .ok_or_else(|| anyhow!("No book with id {id} in the library"))?,
        None => &library.books()[0],
    };
    info!(id = book.id, title = %book.title, pages = book.pages.len(), "Opening book");

    let mut recent = RecentBooks::new(config.recent_capacity);
    recent.record(book.id);
    debug!(recent = ?recent.ids(), "Recent books this run");

    let backend = RodioBackend::new()?;
    let store = HighlightDataStore::new(Box::new(DirectorySource::new(book.root.clone())));
    let mut session = ReaderSession::new(book.clone(), Arc::new(backend), store, config.highlight_padding)?;
    session.set_viewport(config.viewport.size())?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("Installing Ctrl-C handler")?;
    }

    read_book(&mut session, &config, &interrupted)
}

/// Reads every page in order, turning pages as each one finishes, until the
/// book ends or the user interrupts.
fn read_book(
    session: &mut ReaderSession,
    config: &ReaderConfig,
    interrupted: &AtomicBool,
) -> Result<()> {
    let tick = Duration::from_millis(config.tick_interval_ms);
    report(session.start_reading());
    loop {
        if interrupted.load(Ordering::SeqCst) {
            info!("Interrupted; stopping playback");
            session.stop();
            return Ok(());
        }
        report(session.tick());
        match session.playback_state() {
            PlaybackState::Completed => {
                let turned = session.next_page();
                if turned.is_empty() {
                    info!("Reached the end of the book");
                    return Ok(());
                }
                report(turned);
                report(session.start_reading());
            }
            PlaybackState::Errored => {
                warn!("Skipping the rest of the page after a playback error");
                let turned = session.next_page();
                if turned.is_empty() {
                    return Ok(());
                }
                report(turned);
                report(session.start_reading());
            }
            _ => {}
        }
        thread::sleep(tick);
    }
}

fn report(events: Vec<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::PlaybackStart => info!("Reading aloud"),
            SessionEvent::BlockStart {
                index,
                block_id,
                text,
            } => info!(block = index + 1, id = block_id, text = %text, "Starting block"),
            SessionEvent::WordHighlight { index, value } => info!(index, word = %value, "Word"),
            SessionEvent::BlockComplete { index } => debug!(block = index + 1, "Block finished"),
            SessionEvent::PlaybackComplete => info!("Page finished"),
            SessionEvent::PlaybackError { message } => error!(%message, "Playback failed"),
            SessionEvent::PageChanged { page_number, .. } => info!(page_number, "Turned page"),
        }
    }
}

fn print_search(library: &Library, query: &str) {
    let hits = search::search_books(library.books(), query);
    if hits.is_empty() {
        info!(query, "No matching books");
    }
    for book in hits {
        info!(id = book.id, title = %book.title, author = %book.author, "Match");
    }
    let terms = search::suggestions(library.books(), query, search::SUGGESTION_LIMIT);
    if !terms.is_empty() {
        info!(?terms, "Suggestions");
    }
}

struct CliArgs {
    book_id: Option<u32>,
    search: Option<String>,
}

fn parse_args() -> Result<CliArgs> {
    let mut parsed = CliArgs {
        book_id: None,
        search: None,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--search" {
            let query = args
                .next()
                .ok_or_else(|| anyhow!("--search needs a query"))?;
            parsed.search = Some(query);
        } else if let Ok(id) = arg.parse::<u32>() {
            parsed.book_id = Some(id);
        } else {
            return Err(anyhow!("Usage: readalong [book-id] [--search <query>]"));
        }
    }
    Ok(parsed)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
