use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

/// An append-only list of byte segments that can be coalesced into one
/// contiguous segment and truncated wholesale.
///
/// The engine side appends segment by segment; the task side occasionally
/// joins and drains. Joining keeps the coalesced segment stored, so a
/// second join is free.
#[derive(Debug)]
pub(crate) struct Region {
    bufs: VecDeque<Bytes>,
    len: usize,
}

impl Region {
    pub(crate) fn new() -> Region {
        Region {
            bufs: VecDeque::new(),
            len: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a copy of `chunk` as a new segment.
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.bufs.push_back(Bytes::copy_from_slice(chunk));
    }

    /// Coalesces all segments into one contiguous segment and returns it.
    ///
    /// The region keeps its contents until [`clear`](Region::clear).
    pub(crate) fn join(&mut self) -> Bytes {
        match self.bufs.len() {
            0 => Bytes::new(),
            1 => self.bufs[0].clone(),
            _ => {
                let mut all = BytesMut::with_capacity(self.len);
                for seg in &self.bufs {
                    all.extend_from_slice(seg);
                }
                let joined = all.freeze();
                self.bufs.clear();
                self.bufs.push_back(joined.clone());
                joined
            }
        }
    }

    /// Truncates the region to empty.
    pub(crate) fn clear(&mut self) {
        self.bufs.clear();
        self.len = 0;
    }
}

/// A growable byte buffer with separate read and write cursors.
#[derive(Debug)]
pub(crate) struct IBuf {
    buf: BytesMut,
}

impl IBuf {
    pub(crate) fn new() -> IBuf {
        IBuf {
            buf: BytesMut::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends `chunk` at the write cursor.
    pub(crate) fn write(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Copies up to `dst.len()` bytes from the read cursor into `dst` and
    /// advances past them.
    pub(crate) fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buf.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        n
    }

    /// Drops all buffered bytes, rewinding both cursors.
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
    }
}
