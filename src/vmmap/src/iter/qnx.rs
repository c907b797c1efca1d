//! Text strategy for the QNX pmap format: a header line followed by
//! comma-separated `0x`-prefixed hex fields, path last.

use crate::parse::{number_field, split_field};
use crate::record::Perms;

// <sys/mman.h>. The pmap file stores prot right-shifted by 8.
const PROT_READ: u64 = 0x0100;
const PROT_WRITE: u64 = 0x0200;
const PROT_EXEC: u64 = 0x0400;
const MAP_SHARED: u64 = 0x0001;

/// One parsed pmap line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PmapLine<'a> {
    vaddr: u64,
    size: u64,
    perms: Perms,
    inode: u64,
    offset: u64,
    path: &'a [u8],
}

#[cfg(target_os = "nto")]
pub(crate) fn enumerate(
    f: &mut dyn FnMut(&crate::record::MappingRecord<'_>),
) -> Result<(), crate::iter::EnumerateError> {
    use std::io::ErrorKind;

    use crate::iter::EnumerateError;
    use crate::lines::for_each_line;
    use crate::record::MappingRecord;

    const PMAP_PATH: &str = "/proc/self/pmap";

    let file = loop {
        match std::fs::File::open(PMAP_PATH) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(EnumerateError::Unavailable {
                    path: PMAP_PATH,
                    source,
                })
            }
            Ok(file) => break file,
        }
    };

    for_each_line(file, |line| {
        match parse_pmap_line(line) {
            Some(parsed) => f(&MappingRecord {
                start: parsed.vaddr,
                end: parsed.vaddr.wrapping_add(parsed.size),
                perms: parsed.perms,
                offset: parsed.offset,
                inode: parsed.inode,
                filename: parsed.path,
            }),
            None => log::debug!("skipping unparsable pmap line"),
        }
        true
    })?;
    Ok(())
}

/// Parses one pmap line:
/// `vaddr,size,flags,prot,maxprot,dev,ino,offset,rsv,guardsize,refcnt,mapcnt,path`.
/// The header line and malformed lines report `None`.
fn parse_pmap_line(line: &[u8]) -> Option<PmapLine<'_>> {
    if line.starts_with(b"vaddr,size,") {
        return None;
    }

    let mut fields = [0u64; 12];
    let mut rest = line;
    for slot in fields.iter_mut() {
        let (field, tail) = split_field(rest, b',')?;
        *slot = number_field(field.strip_prefix(b"0x")?, 16)?;
        rest = tail;
    }

    let flags = fields[2];
    let prot = fields[3] << 8; // stored right-shifted by 8; restore it

    Some(PmapLine {
        vaddr: fields[0],
        size: fields[1],
        perms: Perms {
            read: prot & PROT_READ != 0,
            write: prot & PROT_WRITE != 0,
            exec: prot & PROT_EXEC != 0,
            shared: flags & MAP_SHARED != 0,
        },
        inode: fields[6],
        offset: fields[7],
        path: rest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &[u8] = b"0x18000000,0x4000,0x80000071,0x5,0xf,0x802,0x9,0x0,0x0,0x0,0x3,0x1,/usr/lib/ldqnx-64.so.2";

    #[test]
    fn test_parse_pmap_line() {
        let parsed = parse_pmap_line(LINE).unwrap();
        assert_eq!(parsed.vaddr, 0x18000000);
        assert_eq!(parsed.size, 0x4000);
        assert_eq!(parsed.inode, 9);
        assert_eq!(parsed.offset, 0);
        assert_eq!(parsed.path, b"/usr/lib/ldqnx-64.so.2");
        // prot 0x5 restores to PROT_READ | PROT_EXEC; MAP_SHARED clear.
        assert_eq!(&parsed.perms.token(), b"r-xp");
    }

    #[test]
    fn test_parse_pmap_shared_flag() {
        let line = b"0x1000,0x1000,0x1,0x3,0xf,0x1,0x2,0x0,0x0,0x0,0x1,0x1,";
        let parsed = parse_pmap_line(line).unwrap();
        assert_eq!(&parsed.perms.token(), b"rw-s");
        assert!(parsed.path.is_empty());
    }

    #[test]
    fn test_parse_pmap_skips_header() {
        assert_eq!(
            parse_pmap_line(
                b"vaddr,size,flags,prot,maxprot,dev,ino,offset,rsv,guardsize,refcnt,mapcnt,path"
            ),
            None
        );
    }

    #[test]
    fn test_parse_pmap_rejects_malformed() {
        assert_eq!(parse_pmap_line(b"0x1000,0x2000"), None);
        assert_eq!(parse_pmap_line(b"1000,0x1000,0x1,0x3,0xf,0x1,0x2,0x0,0x0,0x0,0x1,0x1,"), None);
        assert_eq!(parse_pmap_line(b""), None);
    }
}
