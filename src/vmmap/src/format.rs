//! Canonical textual rendering of mapping records.

use std::io::{self, Write};

use crate::iter::{enumerate, EnumerateError};
use crate::record::MappingRecord;

/// Writes `record` as one conventional maps line: zero-padded hex
/// addresses and offset, the 4-character permission token,
/// `major:minor` derived from the caller-supplied `dev`, decimal inode,
/// then the filename, newline-terminated.
///
/// The canonical record does not track a device, so the caller supplies
/// one (0 when unknown). Sink errors propagate untouched.
pub fn write_record<W: Write>(w: &mut W, record: &MappingRecord<'_>, dev: u64) -> io::Result<()> {
    write!(
        w,
        "{:08x}-{:08x} {} {:08x} {:02x}:{:02x} {} ",
        record.start,
        record.end,
        record.perms,
        record.offset,
        dev / 256,
        dev % 256,
        record.inode,
    )?;
    w.write_all(record.filename)?;
    w.write_all(b"\n")
}

/// Renders every mapping of the calling process to `w`, one line per
/// region with a zero device id, the self-maps dump embedded in heap
/// profiles and crash reports.
pub fn write_self_maps<W: Write>(w: &mut W) -> Result<(), EnumerateError> {
    let mut sink_err = None;
    enumerate(|record| {
        if sink_err.is_none() {
            if let Err(err) = write_record(w, record, 0) {
                sink_err = Some(err);
            }
        }
    })?;
    match sink_err {
        Some(err) => Err(EnumerateError::Sink(err)),
        None => Ok(()),
    }
}

/// Renders the self-maps dump straight to a raw file descriptor, for
/// diagnostic paths that hold nothing but an fd. The descriptor is
/// borrowed and stays open.
#[cfg(unix)]
pub fn write_self_maps_to_fd(fd: std::os::unix::io::RawFd) -> Result<(), EnumerateError> {
    let mut writer = FdWriter { fd };
    write_self_maps(&mut writer)
}

/// `io::Write` over a borrowed descriptor, retrying interrupted writes.
#[cfg(unix)]
struct FdWriter {
    fd: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let written = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
            if written >= 0 {
                return Ok(written as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
