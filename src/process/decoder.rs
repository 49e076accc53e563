use std::ops::Range;

use crate::process::encoding::Encoding;

/// Incrementally reconstructs text lines from a byte stream.
///
/// Bytes are appended with [`add`](Self::add) as they arrive from a pipe, in
/// chunks of arbitrary size. [`produce_lines`](Self::produce_lines) then emits
/// every complete line found since the last call, decoded to UTF-8.
///
/// `\n` and `\r` are both separators, and runs of them are collapsed, so
/// `\r\n` counts as a single terminator and empty lines are never emitted.
///
/// The full byte sequence is kept so the whole stream can be decoded at once
/// with [`text`](Self::text) after the process has finished.
///
/// # Examples
///
/// ```rust
/// use tcrm_process::process::{decoder::LineDecoder, encoding::Encoding};
///
/// let mut decoder = LineDecoder::new(Encoding::Utf8);
/// let mut lines = Vec::new();
///
/// decoder.add(b"first\r\nsec");
/// decoder.produce_lines(false, |line| lines.push(line));
/// assert_eq!(lines, ["first"]);
///
/// decoder.add(b"ond");
/// decoder.produce_lines(true, |line| lines.push(line));
/// assert_eq!(lines, ["first", "second"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    encoding: Encoding,
    bytes: Vec<u8>,
    offset: usize,
}

impl LineDecoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            bytes: Vec::new(),
            offset: 0,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Appends raw bytes, nothing is decoded yet.
    pub fn add(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Number of bytes accumulated since the stream started.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Position of the first byte that hasn't been consumed as part of a line.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Emits every complete line that can be found in the unconsumed bytes.
    ///
    /// When `finished` is set, the remaining tail is emitted as a last line
    /// even without a terminator. This happens once: afterwards the whole
    /// buffer is consumed and further calls emit nothing until more bytes
    /// are added.
    pub fn produce_lines<F>(&mut self, finished: bool, mut emit: F)
    where
        F: FnMut(String),
    {
        let width = self.encoding.code_unit_width();
        let is_separator: fn(&[u8]) -> bool = match width {
            2 => is_utf16_separator,
            _ => is_byte_separator,
        };

        while let Some(range) = self.next_line(finished, width, is_separator) {
            emit(self.encoding.decode(&self.bytes[range]));
        }
    }

    /// Decodes everything received so far as a single string.
    pub fn text(&self) -> String {
        self.encoding.decode(&self.bytes)
    }

    fn next_line(
        &mut self,
        finished: bool,
        width: usize,
        is_separator: fn(&[u8]) -> bool,
    ) -> Option<Range<usize>> {
        // an incomplete code unit at the end is left for the next add()
        let end = self.bytes.len() - self.bytes.len() % width;

        if self.offset >= end {
            if finished {
                self.offset = self.bytes.len();
            }
            return None;
        }

        let mut start = self.offset;
        let mut p = start;

        while p + width <= end {
            if !is_separator(&self.bytes[p..p + width]) {
                p += width;
                continue;
            }

            let line = start..p;
            while p + width <= end && is_separator(&self.bytes[p..p + width]) {
                p += width;
            }

            self.offset = p;
            if !line.is_empty() {
                return Some(line);
            }

            start = p;
        }

        if !finished {
            return None;
        }

        self.offset = self.bytes.len();
        if start < end { Some(start..end) } else { None }
    }
}

fn is_byte_separator(unit: &[u8]) -> bool {
    matches!(unit[0], b'\n' | b'\r')
}

fn is_utf16_separator(unit: &[u8]) -> bool {
    matches!(u16::from_le_bytes([unit[0], unit[1]]), 0x000A | 0x000D)
}
