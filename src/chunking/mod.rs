//! File chunking: fixed character windows with configurable overlap,
//! optional comment stripping, and lightweight symbol extraction.

pub mod comments;
pub mod elements;

/// One window of a file's text.
#[derive(Debug, Clone)]
pub struct ChunkWindow {
    pub text: String,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
}

/// Split file content into overlapping character windows.
///
/// Windows advance by `chunk_size - chunk_overlap`; the last window may
/// be shorter than `chunk_size`. When `include_comments` is false,
/// comment-only lines are dropped before windowing (best-effort per
/// language; unknown languages pass through unchanged). Line spans
/// always refer to the original file, even after stripping.
///
/// Empty or whitespace-only input produces zero windows. The caller
/// guarantees `chunk_overlap < chunk_size` (validated settings).
pub fn split(
    content: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    include_comments: bool,
    language: &str,
) -> Vec<ChunkWindow> {
    debug_assert!(chunk_overlap < chunk_size);

    // Collect the lines to window over, keeping original line numbers.
    let kept: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| include_comments || !comments::is_comment_line(line, language))
        .collect();

    // Flatten kept lines into a char sequence with a parallel map from
    // char position to original line number. Newline separators belong
    // to the line they terminate.
    let mut chars: Vec<char> = Vec::new();
    let mut line_of: Vec<usize> = Vec::new();
    for (i, (line_no, text)) in kept.iter().enumerate() {
        if i > 0 {
            chars.push('\n');
            line_of.push(kept[i - 1].0);
        }
        for ch in text.chars() {
            chars.push(ch);
            line_of.push(*line_no);
        }
    }

    if chars.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }

    let step = chunk_size - chunk_overlap;
    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(chars.len());
        windows.push(ChunkWindow {
            text: chars[start..end].iter().collect(),
            start_line: line_of[start],
            end_line: line_of[end - 1],
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    windows
}
