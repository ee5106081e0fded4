//! Pull-style input source that seeks between non-contiguous byte ranges of
//! one JPEG file and rewrites restart-marker numbers as it goes.
//!
//! This is the "Fancy Source" of `SPEC_FULL.md` §4.2: it lets a baseline
//! JPEG decoder random-access a handful of MCU rows out of a much larger
//! entropy-coded stream without re-decoding everything before them. It knows
//! nothing about the decoder; `crate::jpeg::ffi` bridges it to libjpeg's
//! source-manager contract, and `crate::jpeg::index` drives it directly (no
//! decoder attached) to scan for restart markers in the first place.

use std::io::{self, Read, Seek, SeekFrom};

/// Size of the pull buffer libjpeg is handed on each `fill_input_buffer` call.
pub const INPUT_BUF_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Emitting bytes `[0, positions[0])` verbatim: the JPEG header.
    Header,
    /// Past the header; jumping between MCU-row segments and rewriting
    /// restart markers as each segment is read.
    Body,
}

/// A restart-marker-aware random-access source over one JPEG file.
///
/// Construct with `positions` empty to get a plain unbounded passthrough —
/// this is the mode [`crate::jpeg::index::index_jpeg`] uses while it is still
/// looking for the restart markers that would populate `positions` in the
/// first place.
pub struct FancySource<R> {
    inner: R,
    positions: Vec<u64>,
    /// Index into `positions` of the first tile row to emit, post-header.
    topleft: i64,
    /// Tiles to emit per row (horizontal extent of the requested window, in
    /// tile units).
    width: u32,
    /// Tiles per row in the underlying file.
    stride: u32,

    buf: Box<[u8; INPUT_BUF_SIZE]>,
    buf_len: usize,
    buf_pos: usize,

    /// Logical tile-row index into `positions` of the segment currently (or
    /// about to be) read.
    next_start_offset: i64,
    /// Exclusive upper bound of the current contiguous segment; `u64::MAX`
    /// stands in for "+∞".
    stop_position: u64,

    phase: Phase,
    next_restart_marker: u8,
    eof_emitted: bool,
    /// Absolute offset of `inner`'s cursor, kept in lock-step with every
    /// read/seek we issue (never re-queried from the OS).
    file_pos: u64,
}

impl<R: Read + Seek> FancySource<R> {
    /// `positions` is the `mcu_starts` table (or empty to disable random
    /// access). `topleft` indexes the first tile to emit; `width` is tiles
    /// per row to emit; `stride` is tiles per row in the file.
    pub fn new(mut inner: R, positions: Vec<u64>, topleft: usize, width: u32, stride: u32) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let stop_position = positions.first().copied().unwrap_or(u64::MAX);
        Ok(Self {
            inner,
            positions,
            topleft: topleft as i64,
            width,
            stride,
            buf: Box::new([0u8; INPUT_BUF_SIZE]),
            buf_len: 0,
            buf_pos: 0,
            next_start_offset: 0,
            stop_position,
            phase: Phase::Header,
            next_restart_marker: 0,
            eof_emitted: false,
            file_pos: 0,
        })
    }

    /// `ftell(file) - bytes_remaining_in_buffer`: the byte offset of the next
    /// byte that has not yet been handed to a consumer. Used to record
    /// `mcu_starts[0]` as "the current file position minus any bytes still
    /// buffered by the decoder's source".
    pub fn position(&self) -> u64 {
        self.file_pos - (self.buf_len - self.buf_pos) as u64
    }

    /// Bytes currently buffered and unconsumed; refills from the underlying
    /// file (possibly jumping to the next segment) if empty.
    pub fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.buf_pos >= self.buf_len {
            self.fill()?;
        }
        Ok(&self.buf[self.buf_pos..self.buf_len])
    }

    pub fn consume(&mut self, amt: usize) {
        self.buf_pos = (self.buf_pos + amt).min(self.buf_len);
    }

    /// Discard `n` bytes, refilling as needed. Correct across segment jumps:
    /// each refill may reset the buffer underneath us.
    pub fn skip(&mut self, mut n: u64) -> io::Result<()> {
        while n > 0 {
            let avail = (self.buf_len - self.buf_pos) as u64;
            if avail == 0 {
                self.fill()?;
                continue;
            }
            let take = avail.min(n);
            self.consume(take as usize);
            n -= take;
        }
        Ok(())
    }

    /// Refill `self.buf`, jumping to the next segment first if the cursor has
    /// reached `stop_position`. Leaves `buf_pos == 0` and `buf_len` set to
    /// whatever came back (synthetic EOI on a genuine mid-stream EOF).
    fn fill(&mut self) -> io::Result<usize> {
        loop {
            if self.stop_position != u64::MAX && self.file_pos >= self.stop_position {
                self.advance_segment()?;
                continue;
            }

            let max_len = if self.stop_position == u64::MAX {
                INPUT_BUF_SIZE
            } else {
                std::cmp::min(INPUT_BUF_SIZE as u64, self.stop_position - self.file_pos) as usize
            };

            let n = self.inner.read(&mut self.buf[..max_len])?;
            if n == 0 {
                self.handle_eof()?;
                return Ok(self.buf_len);
            }

            self.file_pos += n as u64;
            self.buf_len = n;
            self.buf_pos = 0;

            // Never let a marker's FF and Dn land in different fills: if the
            // buffer ends on a bare 0xFF, give it back and re-read it next
            // time. Safe even for a genuine non-marker FF, at the cost of
            // one byte of re-read.
            if self.buf_len > 1 && self.buf[self.buf_len - 1] == 0xFF {
                self.buf_len -= 1;
                self.file_pos -= 1;
                self.inner.seek(SeekFrom::Current(-1))?;
            }

            if self.phase == Phase::Body && !self.positions.is_empty() {
                self.rewrite_restart_markers();
            }

            return Ok(self.buf_len);
        }
    }

    fn advance_segment(&mut self) -> io::Result<()> {
        match self.phase {
            Phase::Header => {
                self.phase = Phase::Body;
                // First post-header call must land on `topleft`.
                self.next_start_offset = self.topleft - self.stride as i64;
                self.advance_to_next_tile_row()
            }
            Phase::Body => self.advance_to_next_tile_row(),
        }
    }

    fn advance_to_next_tile_row(&mut self) -> io::Result<()> {
        self.next_start_offset += self.stride as i64;
        let idx = self.next_start_offset as usize;
        let start = self.positions[idx];
        self.inner.seek(SeekFrom::Start(start))?;
        self.file_pos = start;
        let stop_idx = idx + self.width as usize;
        self.stop_position = self.positions.get(stop_idx).copied().unwrap_or(u64::MAX);
        Ok(())
    }

    fn handle_eof(&mut self) -> io::Result<()> {
        if self.file_pos == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty JPEG input: zero bytes available at start of file",
            ));
        }
        if !self.eof_emitted {
            self.buf[0] = 0xFF;
            self.buf[1] = 0xD9;
            self.buf_len = 2;
            self.eof_emitted = true;
        } else {
            self.buf_len = 0;
        }
        self.buf_pos = 0;
        Ok(())
    }

    /// Rewrite every `FF Dn` (n in 0..=7) found in the freshly read bytes to
    /// the cyclic sequence the decoder actually expects, one marker at a
    /// time across however many fills it takes.
    fn rewrite_restart_markers(&mut self) {
        let mut i = 0;
        while i + 1 < self.buf_len {
            if self.buf[i] == 0xFF && (0xD0..=0xD7).contains(&self.buf[i + 1]) {
                self.buf[i + 1] = 0xD0 | (self.next_restart_marker & 7);
                self.next_restart_marker = self.next_restart_marker.wrapping_add(1) & 7;
                i += 2;
            } else {
                i += 1;
            }
        }
    }
}

impl<R: Read + Seek> Read for FancySource<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let avail = self.fill_buf()?;
        let n = avail.len().min(out.len());
        out[..n].copy_from_slice(&avail[..n]);
        self.consume(n);
        Ok(n)
    }
}
