//! Approximate pagination for sources without native pages.
//!
//! Text is split into chunks of roughly `chars_per_page` characters. Blank
//! lines are paragraph boundaries and paragraphs are never split, so a single
//! very long paragraph can produce an oversized page.

pub const MIN_CHARS_PER_PAGE: usize = 200;
pub const MAX_CHARS_PER_PAGE: usize = 20_000;

pub fn paginate(text: &str, chars_per_page: usize) -> Vec<String> {
    let chars_per_page = chars_per_page.clamp(MIN_CHARS_PER_PAGE, MAX_CHARS_PER_PAGE);
    let paragraphs = split_paragraphs(text);
    if paragraphs.is_empty() {
        return vec![String::new()];
    }

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in paragraphs {
        let para_len = para.chars().count();
        let separator_len = if current.is_empty() { 0 } else { 2 };
        if !current.is_empty() && current_len + separator_len + para_len > chars_per_page {
            pages.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current.is_empty() {
            current = para;
            current_len = para_len;
        } else {
            current.push_str("\n\n");
            current.push_str(&para);
            current_len += 2 + para_len;
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

pub fn page_count(text: &str, chars_per_page: usize) -> usize {
    paginate(text, chars_per_page).len()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join("\n"));
                buffer.clear();
            }
        } else {
            buffer.push(line);
        }
    }
    if !buffer.is_empty() {
        paragraphs.push(buffer.join("\n"));
    }
    paragraphs
}
