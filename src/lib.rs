//! Core of the readalong document reader.
//!
//! The crate keeps everything that is not layout: speech playback with
//! word-level highlighting, the EPUB/AZW3 to PDF conversion jobs, document
//! text extraction and search, and the small productivity widgets that sit
//! next to the reader. All shared state lives in [`session::ReaderSession`],
//! which the front end owns and passes around explicitly.

pub mod cancellation;
pub mod config;
pub mod conversion;
pub mod coordinator;
pub mod document;
pub mod logging;
pub mod pagination;
pub mod resources;
pub mod search;
pub mod session;
pub mod speech;
pub mod tracker;
pub mod widgets;

pub use coordinator::{HighlightSpan, ReadingState};
pub use session::ReaderSession;
pub use speech::{PlaybackState, SpeechAdapter, SpeechRequest};
pub use tracker::{WordCursor, WordTracker};
