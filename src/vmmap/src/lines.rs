//! Bounded-memory line splitting over a byte stream.
//!
//! [`for_each_line`] feeds every newline-terminated line of a reader to a
//! callback without allocating: one fixed stack buffer is the hard ceiling
//! on line length. Built for diagnostic paths (crash reporting,
//! out-of-memory handling) where growable buffers and panics are off the
//! table.

use std::io::{self, ErrorKind, Read};

/// Longest supported line: PATH_MAX on every text-source platform (4096)
/// plus room for the leading fields.
pub const MAX_LINE_LEN: usize = 4096 + 1024;

/// A line outgrew the fixed buffer. Continuing would need unbounded
/// memory, so the whole scan is abandoned rather than truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("line does not fit the {}-byte line buffer", MAX_LINE_LEN)]
pub struct LineTooLong;

/// Calls `body` once per newline-terminated line of `src`, in order, with
/// the terminator stripped. A final line missing its trailing newline is
/// still delivered, exactly once. `body` returns `false` to stop early.
///
/// Reads interrupted by a signal are retried. Any other read error is
/// asserted in debug builds and treated as end-of-stream in release
/// builds; diagnostics must degrade, not crash. The reader is consumed, so
/// the underlying handle is closed on every exit path.
pub fn for_each_line<R, F>(mut src: R, mut body: F) -> Result<(), LineTooLong>
where
    R: Read,
    F: FnMut(&[u8]) -> bool,
{
    // One spare byte so a synthesized final newline always fits.
    let mut buf = [0u8; MAX_LINE_LEN + 1];
    let mut start = 0usize; // first unconsumed byte
    let mut end = 0usize; // one past the last filled byte
    let mut eof = false;

    loop {
        if let Some(at) = memchr::memchr(b'\n', &buf[start..end]) {
            if !body(&buf[start..start + at]) {
                return Ok(());
            }
            start += at + 1;
            continue;
        }

        let pending = end - start;

        if eof {
            if pending == 0 {
                return Ok(());
            }
            // Missing trailing newline terminates the last line.
            buf[end] = b'\n';
            end += 1;
            continue;
        }

        if pending == MAX_LINE_LEN {
            return Err(LineTooLong);
        }

        // Compact the unconsumed tail to the front, then refill behind it.
        buf.copy_within(start..end, 0);
        start = 0;
        end = pending;

        let nread = match read_retrying(&mut src, &mut buf[end..MAX_LINE_LEN]) {
            Ok(n) => n,
            Err(err) => {
                debug_assert!(false, "read from mapping source failed: {err}");
                log::debug!("treating read error as end of stream: {err}");
                0
            }
        };
        if nread == 0 {
            eof = true;
        }
        end += nread;
    }
}

/// `read` with EINTR retry.
pub(crate) fn read_retrying<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match src.read(buf) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
