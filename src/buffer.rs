//! Line-buffered stream accumulator.

use tracing::warn;

/// What should happen to the bytes a `PipeEndpoint` just appended.
///
/// Modelled as a small enum rather than a function pointer or trait object:
/// there are exactly two behaviours here and neither is ever registered
/// dynamically.
pub enum DrainAction<'a> {
    /// Extract and dispatch every complete newline-terminated record, then
    /// compact the remainder to the front of the buffer.
    LineDispatch(&'a mut dyn FnMut(&str)),
    /// Discard everything that was just written; the buffer is a reusable
    /// read target, not a retained log.
    Truncate,
}

/// A fixed-capacity byte buffer. Never reallocates after construction.
pub struct Buffer {
    bytes: Vec<u8>,
    used: usize,
    label: &'static str,
}

impl Buffer {
    pub fn with_capacity(capacity: usize, label: &'static str) -> Self {
        Buffer {
            bytes: vec![0u8; capacity],
            used: 0,
            label,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn free(&self) -> usize {
        self.bytes.len() - self.used
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Mutable slice into the unused tail, for a single read syscall to fill.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.used..]
    }

    /// The `n` bytes just written into the tail by a read syscall, before
    /// `commit` advances `used` past them. Used to mirror those same bytes to
    /// a sink without a second read.
    pub fn tail(&self, n: usize) -> &[u8] {
        &self.bytes[self.used..self.used + n]
    }

    /// Records that `n` freshly read bytes now occupy the tail, then performs
    /// `action` on the whole used region.
    pub fn commit(&mut self, n: usize, action: DrainAction<'_>) {
        self.used += n;
        match action {
            DrainAction::Truncate => self.truncate(),
            DrainAction::LineDispatch(on_line) => self.drain_lines(on_line),
        }
    }

    /// Sets `used = 0` without freeing the backing storage.
    pub fn truncate(&mut self) {
        self.used = 0;
    }

    /// Repeatedly extracts complete newline-terminated records and hands each
    /// to `on_line` (without the trailing `\n`), then compacts the
    /// unconsumed suffix to offset zero.
    ///
    /// If no newline is ever found and the buffer is completely full, the
    /// record exceeds the buffer's capacity. Treated as a data error: log
    /// and discard everything buffered so far, rather than leaving the
    /// accumulator stuck forever re-scanning the same bytes.
    pub fn drain_lines(&mut self, mut on_line: impl FnMut(&str)) {
        let mut consumed = 0;
        loop {
            let window = &self.bytes[consumed..self.used];
            match window.iter().position(|&b| b == b'\n') {
                Some(offset) => {
                    let line_end = consumed + offset;
                    let line = String::from_utf8_lossy(&self.bytes[consumed..line_end]);
                    on_line(&line);
                    consumed = line_end + 1;
                }
                None => break,
            }
        }
        if consumed == 0 && self.used == self.bytes.len() {
            warn!(
                buffer = self.label,
                capacity = self.bytes.len(),
                "line exceeds buffer capacity; discarding buffered data"
            );
            self.used = 0;
            return;
        }
        let remaining = self.used - consumed;
        self.bytes.copy_within(consumed..self.used, 0);
        self.used = remaining;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buf: &mut Buffer, data: &[u8]) {
        let n = data.len();
        buf.tail_mut()[..n].copy_from_slice(data);
        buf.commit(n, DrainAction::Truncate);
    }

    #[test]
    fn truncate_discards_bytes() {
        let mut buf = Buffer::with_capacity(32, "t");
        fill(&mut buf, b"hello");
        assert_eq!(buf.used(), 0);
    }

    #[test]
    fn drain_lines_dispatches_complete_records_and_compacts_remainder() {
        let mut buf = Buffer::with_capacity(32, "t");
        let n = b"ab\ncd\nef".len();
        buf.tail_mut()[..n].copy_from_slice(b"ab\ncd\nef");
        let mut seen = Vec::new();
        buf.commit(n, DrainAction::LineDispatch(&mut |l| seen.push(l.to_string())));
        assert_eq!(seen, vec!["ab".to_string(), "cd".to_string()]);
        assert_eq!(buf.used(), 2);
        assert_eq!(&buf.bytes[..2], b"ef");
    }

    #[test]
    fn oversized_line_is_discarded_with_warning() {
        let mut buf = Buffer::with_capacity(8, "t");
        let n = 8;
        buf.tail_mut()[..n].copy_from_slice(b"12345678");
        let mut seen = Vec::new();
        buf.commit(n, DrainAction::LineDispatch(&mut |l| seen.push(l.to_string())));
        assert!(seen.is_empty());
        assert_eq!(buf.used(), 0);
    }

    #[test]
    fn partial_line_is_retained_across_fills() {
        let mut buf = Buffer::with_capacity(32, "t");
        let n1 = b"abc".len();
        buf.tail_mut()[..n1].copy_from_slice(b"abc");
        let mut seen = Vec::new();
        buf.commit(n1, DrainAction::LineDispatch(&mut |l| seen.push(l.to_string())));
        assert!(seen.is_empty());
        assert_eq!(buf.used(), 3);

        let n2 = b"def\n".len();
        buf.tail_mut()[..n2].copy_from_slice(b"def\n");
        buf.commit(n2, DrainAction::LineDispatch(&mut |l| seen.push(l.to_string())));
        assert_eq!(seen, vec!["abcdef".to_string()]);
        assert_eq!(buf.used(), 0);
    }
}
