//! Command-line front end for the reader core.
//!
//! Drives a [`ReaderSession`] from a single-threaded loop, the same way a UI
//! event loop would. Ctrl-C stops whatever is running and tears the session
//! down before exiting.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use readalong::cancellation::CancellationToken;
use readalong::config::{self, AppConfig};
use readalong::conversion::{JobId, JobStatus};
use readalong::logging::{init_tracing, set_log_level};
use readalong::speech::PlaybackState;
use readalong::widgets::PomodoroPhase;
use readalong::{HighlightSpan, ReaderSession};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "readalong", version, about = "Read documents aloud, convert e-books and keep focus timers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Char range of the document to read, parsed from `START:END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Excerpt {
    start: usize,
    end: usize,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Read a document aloud, printing each word as it is spoken
    Read {
        path: PathBuf,
        #[arg(long, value_name = "START:END", value_parser = parse_excerpt)]
        excerpt: Option<Excerpt>,
    },
    /// Convert EPUB/AZW3 books to PDF with ebook-convert
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long = "out", value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Search a document for a literal phrase
    Search {
        path: PathBuf,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Run pomodoro focus cycles
    Pomodoro {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        cycles: u32,
    },
    /// Print the effective configuration as TOML
    #[command(name = "config")]
    ShowConfig,
}

fn main() {
    let reload_handle = init_tracing();
    let config_path = config::config_path_from_env();
    let config = config::load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let cli = Cli::parse();
    if let Err(err) = run(config, cli.command) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(config: AppConfig, command: Command) -> Result<()> {
    if command == Command::ShowConfig {
        print!("{}", config::serialize_config(&config)?);
        return Ok(());
    }
    let interrupted = CancellationToken::new();
    let flag = interrupted.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        if flag.cancel() {
            info!("Received Ctrl+C; stopping");
        }
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let mut session = ReaderSession::new(config);
    let result = match command {
        Command::Read { path, excerpt } => read(
            &mut session,
            path,
            excerpt.map(|e| (e.start, e.end)),
            &interrupted,
        ),
        Command::Convert { inputs, out_dir } => convert(&mut session, inputs, out_dir, &interrupted),
        Command::Search { path, query } => search(&mut session, path, &query.join(" ")),
        Command::Pomodoro { cycles } => pomodoro(&mut session, cycles, &interrupted),
        Command::ShowConfig => Ok(()),
    };
    session.teardown();
    result
}

fn read(
    session: &mut ReaderSession,
    path: PathBuf,
    excerpt: Option<(usize, usize)>,
    interrupted: &CancellationToken,
) -> Result<()> {
    let document = session
        .open_document(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    println!("{} ({} pages)", document.title, document.page_count);
    if !session.read_aloud(excerpt) {
        bail!("Nothing to read in {}", path.display());
    }

    let mut last: Option<HighlightSpan> = None;
    let mut started = false;
    loop {
        if interrupted.is_cancelled() {
            session.stop_reading();
            break;
        }
        let report = session.tick(Instant::now());
        for message in report.speech_errors {
            eprintln!("speech error: {message}");
        }
        let highlight = session.highlight();
        if highlight != last {
            if let (Some(span), Some(document)) = (highlight, session.document()) {
                if let Some(range) = span.byte_range(&document.text) {
                    println!("[{:>5}] {}", span.word_index, &document.text[range]);
                }
            }
            last = highlight;
        }
        match session.speech().state().playback() {
            PlaybackState::Playing | PlaybackState::Paused => started = true,
            PlaybackState::Idle if started => break,
            PlaybackState::Idle => {}
        }
        thread::sleep(TICK);
    }
    Ok(())
}

fn convert(
    session: &mut ReaderSession,
    inputs: Vec<PathBuf>,
    out_dir: PathBuf,
    interrupted: &CancellationToken,
) -> Result<()> {
    let mut ids: Vec<JobId> = Vec::new();
    for input in &inputs {
        match session.conversions_mut().submit(input) {
            Ok(id) => {
                session.conversions_mut().start(&id)?;
                ids.push(id);
            }
            Err(err) => eprintln!("skipping {}: {err}", input.display()),
        }
    }
    if ids.is_empty() {
        bail!("No convertible inputs given");
    }

    let mut shown: Vec<Option<(JobStatus, u8)>> = vec![None; ids.len()];
    while session.conversions().has_active() {
        if interrupted.is_cancelled() {
            warn!("Conversion interrupted; discarding jobs");
            return Ok(());
        }
        session.conversions_mut().pump_blocking(Duration::from_millis(200));
        for (id, last) in ids.iter().zip(shown.iter_mut()) {
            let Some(job) = session.conversions().job(id) else {
                continue;
            };
            let now = Some((job.status(), job.progress()));
            if now != *last {
                println!("{}: {:?} {}%", job.input_file().display(), job.status(), job.progress());
                *last = now;
            }
        }
    }

    let mut failures = 0;
    for id in &ids {
        let Some(job) = session.conversions().job(id) else {
            continue;
        };
        match job.status() {
            JobStatus::Completed => {
                let target = session.conversions().export_artifact(id, &out_dir)?;
                println!("wrote {}", target.display());
            }
            _ => {
                failures += 1;
                eprintln!(
                    "{} failed: {}",
                    job.input_file().display(),
                    job.error().unwrap_or("unknown error")
                );
            }
        }
    }
    if failures > 0 {
        bail!("{failures} conversion(s) failed");
    }
    Ok(())
}

fn search(session: &mut ReaderSession, path: PathBuf, query: &str) -> Result<()> {
    session
        .open_document(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let hits = session.search(query);
    if hits.is_empty() {
        println!("No matches for {query:?}");
    }
    for hit in hits {
        println!("p.{:<4} @{:<8} {}", hit.approx_page, hit.start, hit.snippet);
    }
    Ok(())
}

fn pomodoro(session: &mut ReaderSession, cycles: u32, interrupted: &CancellationToken) -> Result<()> {
    let pomodoro = session.pomodoro_mut();
    pomodoro.start(Instant::now());
    println!("Focus 1 of {cycles}");
    while !interrupted.is_cancelled() {
        if let Some(change) = session.tick(Instant::now()).phase_change {
            println!("{:?} -> {:?}", change.from, change.to);
            if change.to == PomodoroPhase::Focus && change.completed_focus >= cycles {
                break;
            }
        }
        thread::sleep(Duration::from_millis(250));
    }
    Ok(())
}

fn parse_excerpt(value: &str) -> Result<Excerpt, String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {value:?}"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|err| format!("invalid excerpt start: {err}"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|err| format!("invalid excerpt end: {err}"))?;
    if end <= start {
        return Err("excerpt end must be after start".to_string());
    }
    Ok(Excerpt { start, end })
}
