//! Converter backed by Calibre's `ebook-convert` executable.

use super::{ConversionTask, Converter};
use crate::cancellation::CancellationToken;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3})%").expect("valid progress regex"));

const STDERR_TAIL_LINES: usize = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Percentage announced at the start of an `ebook-convert` output line.
pub fn parse_progress(line: &str) -> Option<u8> {
    let caps = PROGRESS_LINE.captures(line)?;
    let value: u16 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.min(100) as u8)
}

#[derive(Debug, Clone)]
pub struct EbookConvert {
    bin: String,
}

impl EbookConvert {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Converter for EbookConvert {
    fn convert(
        &self,
        task: &ConversionTask,
        progress: &mut dyn FnMut(u8),
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        cancel
            .check_cancelled("spawn")
            .map_err(|err| err.to_string())?;
        info!(
            bin = %self.bin,
            input = %task.input.display(),
            output = %task.output.display(),
            "Running ebook-convert"
        );
        let mut child = Command::new(&self.bin)
            .arg(&task.input)
            .arg(&task.output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("failed to run {}: {err}", self.bin))?;

        let stderr_tail = child.stderr.take().map(|stderr| {
            thread::spawn(move || collect_tail(stderr, STDERR_TAIL_LINES))
        });
        let (line_tx, line_rx) = mpsc::channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        loop {
            if cancel.is_cancelled() {
                kill(&mut child);
                return Err("Conversion cancelled".to_string());
            }
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    if let Some(value) = parse_progress(&line) {
                        progress(value);
                    } else {
                        debug!(line = %line.trim_end(), "ebook-convert output");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child
            .wait()
            .map_err(|err| format!("failed to wait for {}: {err}", self.bin))?;
        if status.success() {
            return Ok(());
        }
        let tail = stderr_tail
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let message = if tail.trim().is_empty() {
            format!("{} exited with {status}", self.bin)
        } else {
            tail
        };
        warn!(bin = %self.bin, %status, "ebook-convert failed");
        Err(message)
    }
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!("ebook-convert already exited: {err}");
    }
    let _ = child.wait();
    info!("ebook-convert cancelled");
}

fn collect_tail(stream: impl Read, keep: usize) -> String {
    let mut tail = VecDeque::with_capacity(keep);
    for line in BufReader::new(stream).lines().map_while(Result::ok) {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}
