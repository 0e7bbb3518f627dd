//! Newline index for byte offset -> line/column mapping.
//!
//! Goals
//! - Single pass over bytes to record '\n' positions.
//! - 1-based external line and column numbers (friendly for diagnostics).
//! - Binary search for byte→line mapping.
//!
//! Notes
//! - An empty buffer has 0 lines.
//! - Columns count characters, not bytes, so multibyte identifiers report
//!   the column an editor would show.

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self {
        let mut nl_positions = Vec::with_capacity(bytes.len() / 48);
        let mut i = 0usize;

        while let Some(pos) = memchr::memchr(b'\n', &bytes[i..]) {
            let abs = i + pos;
            nl_positions.push(abs);
            i = abs + 1;
        }

        Self {
            nl_positions,
            len: bytes.len(),
        }
    }

    /// Total number of logical lines.
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.nl_positions.len() + 1
        }
    }

    /// 1-based line number covering the given byte offset.
    /// Offsets at '\n' belong to the line the newline terminates.
    pub fn line_of_byte(&self, byte: usize) -> usize {
        // Number of '\n' strictly before `byte`
        self.nl_positions.partition_point(|&nl| nl < byte) + 1
    }

    /// Start byte of a 1-based line; `None` when out of range.
    pub fn start_byte_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count().max(1) {
            return None;
        }
        if line1 == 1 {
            return Some(0);
        }
        self.nl_positions
            .get(line1 - 2)
            .map(|&prev_nl| prev_nl + 1)
    }

    /// 1-based (line, column) for a byte offset, clamped to the buffer.
    pub fn position(&self, byte: usize, bytes: &[u8]) -> (usize, usize) {
        let byte = byte.min(self.len);
        let line = self.line_of_byte(byte);
        let start = self.start_byte_of_line(line).unwrap_or(0);
        let column = String::from_utf8_lossy(&bytes[start..byte])
            .chars()
            .count()
            + 1;
        (line, column)
    }
}
