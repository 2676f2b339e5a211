//! Document text extraction.
//!
//! Opens a file, pulls out its plain text and counts pages. EPUB chapters go
//! through `html2text`; PDFs are handed to the external `pdftotext` tool, whose
//! form-feed separators give the real page count. Everything else gets an
//! approximate count from [`crate::pagination`].

use crate::pagination;
use epub::doc::EpubDoc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Epub,
    Pdf,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentText {
    pub title: String,
    pub format: DocumentFormat,
    pub text: String,
    pub page_count: usize,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document type: {}", .0.display())]
    Unsupported(PathBuf),
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open EPUB at {}: {message}", .path.display())]
    Epub { path: PathBuf, message: String },
    #[error("text extraction failed for {}: {message}", .path.display())]
    Extract { path: PathBuf, message: String },
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    pdftotext_bin: String,
    chars_per_page: usize,
}

impl DocumentLoader {
    pub fn new(pdftotext_bin: impl Into<String>, chars_per_page: usize) -> Self {
        Self {
            pdftotext_bin: pdftotext_bin.into(),
            chars_per_page,
        }
    }

    pub fn load(&self, path: &Path) -> Result<DocumentText, DocumentError> {
        let format = DocumentFormat::from_path(path)
            .ok_or_else(|| DocumentError::Unsupported(path.to_path_buf()))?;
        info!(path = %path.display(), ?format, "Loading document");

        let (title, text, native_pages) = match format {
            DocumentFormat::Text => {
                let text = read_to_string(path)?;
                (file_title(path), text, None)
            }
            DocumentFormat::Markdown => {
                let text = read_to_string(path)?;
                let title = markdown_title(&text).unwrap_or_else(|| file_title(path));
                (title, text, None)
            }
            DocumentFormat::Epub => {
                let (title, text) = load_epub(path)?;
                (title.unwrap_or_else(|| file_title(path)), text, None)
            }
            DocumentFormat::Pdf => {
                let raw = run_pdftotext(&self.pdftotext_bin, path)?;
                let pages = pdf_page_count(&raw);
                (file_title(path), raw.replace(PAGE_BREAK, "\n\n"), Some(pages))
            }
        };

        let text: String = text.nfc().collect();
        let page_count = native_pages
            .unwrap_or_else(|| pagination::page_count(&text, self.chars_per_page))
            .max(1);
        info!(
            title = %title,
            chars = text.chars().count(),
            page_count,
            "Finished loading document"
        );
        Ok(DocumentText {
            title,
            format,
            text,
            page_count,
        })
    }
}

/// Load with the default `pdftotext` executable.
pub fn load_document(path: &Path, chars_per_page: usize) -> Result<DocumentText, DocumentError> {
    DocumentLoader::new("pdftotext", chars_per_page).load(path)
}

fn read_to_string(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

fn load_epub(path: &Path) -> Result<(Option<String>, String), DocumentError> {
    let mut doc = EpubDoc::new(path).map_err(|err| DocumentError::Epub {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let title = doc
        .mdata("title")
        .map(|item| item.value.trim().to_string())
        .filter(|title| !title.is_empty());

    let mut combined = String::new();
    let mut chapters = 0usize;
    loop {
        if let Some((chapter, _mime)) = doc.get_current_str() {
            chapters += 1;
            // Wide wrap width so no hard line breaks end up in the text.
            let plain = match html2text::from_read(chapter.as_bytes(), 10_000) {
                Ok(clean) => clean,
                Err(err) => {
                    warn!(chapter = chapters, "html2text failed: {err}");
                    chapter
                }
            };
            if !plain.trim().is_empty() {
                if !combined.is_empty() {
                    combined.push_str("\n\n");
                }
                combined.push_str(plain.trim_end());
            }
            debug!(chapter = chapters, added_chars = plain.len(), "Parsed chapter");
        }
        if !doc.go_next() {
            break;
        }
    }
    info!(chapters, "Finished reading EPUB spine");
    Ok((title, combined))
}

fn run_pdftotext(bin: &str, path: &Path) -> Result<String, DocumentError> {
    let output = Command::new(bin)
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|err| DocumentError::Extract {
            path: path.to_path_buf(),
            message: format!("failed to start {bin}: {err}"),
        })?;
    if !output.status.success() {
        return Err(DocumentError::Extract {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `pdftotext` ends every page with a form feed.
fn pdf_page_count(raw: &str) -> usize {
    let breaks = raw.matches(PAGE_BREAK).count();
    let trailing = raw.rsplit(PAGE_BREAK).next().unwrap_or_default();
    if trailing.trim().is_empty() {
        breaks
    } else {
        breaks + 1
    }
}
