//! Text-source strategy: the self-mappings pseudo-file through the bounded
//! line splitter.

use std::io::Read;

use crate::iter::EnumerateError;
use crate::lines::for_each_line;
use crate::parse::parse_line;
use crate::record::MappingRecord;

#[cfg(any(
    all(
        any(target_os = "linux", target_os = "android"),
        not(feature = "dl-iterate-phdr")
    ),
    target_os = "netbsd"
))]
pub(crate) fn enumerate(f: &mut dyn FnMut(&MappingRecord<'_>)) -> Result<(), EnumerateError> {
    const MAPS_PATH: &str = "/proc/self/maps";

    let file = open_retrying(MAPS_PATH).map_err(|source| EnumerateError::Unavailable {
        path: MAPS_PATH,
        source,
    })?;
    drive(file, f)
}

/// `File::open` with EINTR retry.
#[cfg(any(
    all(
        any(target_os = "linux", target_os = "android"),
        not(feature = "dl-iterate-phdr")
    ),
    target_os = "netbsd"
))]
fn open_retrying(path: &str) -> std::io::Result<std::fs::File> {
    loop {
        match std::fs::File::open(path) {
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Feeds every parsable line of `src` to `f` as one record. A line that
/// fails field extraction is skipped and the scan continues: the pseudo-file
/// can change under the reader, and a best-effort snapshot beats none.
pub(crate) fn drive<R: Read>(
    src: R,
    f: &mut dyn FnMut(&MappingRecord<'_>),
) -> Result<(), EnumerateError> {
    for_each_line(src, |line| {
        match parse_line(line) {
            Ok(parsed) => f(&MappingRecord {
                start: parsed.start,
                end: parsed.end,
                perms: parsed.perms,
                offset: parsed.offset,
                inode: parsed.inode,
                filename: parsed.filename,
            }),
            Err(err) => log::debug!("skipping unparsable maps line: {err}"),
        }
        true
    })?;
    Ok(())
}
