//! Line-based chunk driver for fragile low-level parsers.
//!
//! The driver feeds a source text to a callback a few lines at a time. When
//! the callback cannot make progress at the current window it shrinks the
//! window, and once shrinking is exhausted it grows it up to twice the
//! configured size.

use tracing::{debug, trace};

use super::ProcessError;

/// What the low-level parser made of one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutcome {
    /// Byte offset inside the chunk where parsing failed. Asks the driver to
    /// retry the same position with a different window.
    pub retry_offset: Option<usize>,
    /// Byte offset inside the chunk up to which parsing succeeded. The line
    /// containing this offset is the last line consumed.
    pub read_offset: Option<usize>,
    pub errors: Vec<ProcessError>,
}

impl ChunkOutcome {
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn read_up_to(offset: usize) -> Self {
        Self {
            read_offset: Some(offset),
            ..Self::default()
        }
    }

    pub fn retry_at(offset: usize, errors: Vec<ProcessError>) -> Self {
        Self {
            retry_offset: Some(offset),
            read_offset: None,
            errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Shrink,
    Grow,
}

/// Run `callback` over `input` in windows of `chunk_size` lines.
///
/// The callback receives the chunk text and the byte offset of its first
/// line within `input`. Returns the errors of the first unrecoverable
/// failure, or nothing when the whole input was consumed. A failure always
/// ends with a fatal error; the callback's own errors for the failing
/// window come before it. Errors the callback reports alongside a
/// successful read belong to the callback.
pub fn process_in_chunks<F>(input: &str, chunk_size: usize, mut callback: F) -> Vec<ProcessError>
where
    F: FnMut(&str, usize) -> ChunkOutcome,
{
    if input.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let lines: Vec<&str> = input.split('\n').collect();
    let mut offset = 0;
    let mut cursor = 0;

    while cursor < lines.len() {
        match read_at(&lines, cursor, chunk_size, offset, &mut callback) {
            Ok(next) => {
                offset += lines[cursor..next]
                    .iter()
                    .map(|line| line.len() + 1)
                    .sum::<usize>();
                cursor = next;
            }
            Err(errors) => return errors,
        }
    }

    Vec::new()
}

/// Find a window that the callback accepts at `start` and return the index
/// of the first unconsumed line.
fn read_at<F>(
    lines: &[&str],
    start: usize,
    chunk_size: usize,
    offset: usize,
    callback: &mut F,
) -> Result<usize, Vec<ProcessError>>
where
    F: FnMut(&str, usize) -> ChunkOutcome,
{
    let mut size = chunk_size;
    let mut direction = Direction::Shrink;

    loop {
        let end = (start + size).min(lines.len());
        let size_used = end - start;
        let chunk = lines[start..end].join("\n");
        trace!(start, size = size_used, offset, "processing chunk");

        let outcome = callback(&chunk, offset);

        if outcome.retry_offset.is_none() {
            let consumed = match outcome.read_offset {
                None => size_used,
                Some(read) => lines_consumed(&chunk, read, size_used)?,
            };
            return Ok(start + consumed);
        }

        match direction {
            Direction::Shrink => {
                if size_used <= 1 {
                    debug!(start, "shrinking exhausted, growing window");
                    direction = Direction::Grow;
                    size = chunk_size;
                } else {
                    size = size_used - 1;
                }
            }
            Direction::Grow => {
                let next = size_used + 1;
                if start + next > lines.len() || next > chunk_size * 2 {
                    debug!(start, size = size_used, "window growth limit reached");
                    let mut errors = outcome.errors;
                    errors.push(ProcessError::ChunkWindowExhausted { line: start + 1 });
                    return Err(errors);
                }
                size = next;
            }
        }
    }
}

fn lines_consumed(chunk: &str, read_offset: usize, window: usize) -> Result<usize, Vec<ProcessError>> {
    let char_index = byte_offset_to_char_index(chunk, read_offset).ok_or_else(|| {
        vec![ProcessError::UnexpectedCondition(format!(
            "read offset {read_offset} is not a character boundary of the chunk"
        ))]
    })?;

    if char_index == chunk.chars().count() {
        return Ok(window);
    }

    line_number(chunk, char_index).ok_or_else(|| {
        vec![ProcessError::UnexpectedCondition(format!(
            "character index {char_index} is outside the chunk"
        ))]
    })
}

/// Map a UTF-8 byte offset to a character index. `None` when the offset is
/// past the end or falls inside a multi-byte sequence.
pub fn byte_offset_to_char_index(text: &str, byte_offset: usize) -> Option<usize> {
    if !text.is_char_boundary(byte_offset) {
        return None;
    }
    Some(text[..byte_offset].chars().count())
}

/// 1-based line number of the character at `char_index`.
pub fn line_number(text: &str, char_index: usize) -> Option<usize> {
    let mut line = 1;
    for (i, c) in text.chars().enumerate() {
        if i == char_index {
            return Some(line);
        }
        if c == '\n' {
            line += 1;
        }
    }
    None
}
