//! Binary record-stream strategy: fixed-size `prmap` records read straight
//! from the `/proc/self/map` pseudo-file, no text involved.

use crate::record::Perms;

/// prmap_t from `<sys/procfs.h>`, read verbatim off the record stream.
#[repr(C)]
#[allow(dead_code)]
struct PrMap {
    pr_vaddr: u64,
    pr_size: u64,
    pr_mapname: [u8; PRMAPSZ],
    pr_offset: i64,
    pr_mflags: i32,
    pr_pagesize: i32,
    pr_shmid: i32,
    _pr_filler: [i32; 1],
}

const PRMAPSZ: usize = 64;

/// Permission tokens for the 3-bit MA_READ(4)/MA_WRITE(2)/MA_EXEC(1)
/// field, indexed by `pr_mflags & 7`.
const MFLAG_PERMS: [Perms; 8] = [
    perm(false, false, false), // ---
    perm(false, false, true),  // --x
    perm(false, true, false),  // -w-
    perm(false, true, true),   // -wx
    perm(true, false, false),  // r--
    perm(true, false, true),   // r-x
    perm(true, true, false),   // rw-
    perm(true, true, true),    // rwx
];

const fn perm(read: bool, write: bool, exec: bool) -> Perms {
    Perms {
        read,
        write,
        exec,
        shared: false,
    }
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub(crate) fn enumerate(
    f: &mut dyn FnMut(&crate::record::MappingRecord<'_>),
) -> Result<(), crate::iter::EnumerateError> {
    use std::fs::File;
    use std::io::ErrorKind;
    use std::mem;

    use crate::iter::EnumerateError;
    use crate::lines::read_retrying;
    use crate::record::MappingRecord;

    const MAP_PATH: &str = "/proc/self/map";

    let mut file = loop {
        match File::open(MAP_PATH) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(EnumerateError::Unavailable {
                    path: MAP_PATH,
                    source,
                })
            }
            Ok(file) => break file,
        }
    };

    let mut raw = [0u8; mem::size_of::<PrMap>()];
    let mut path_buf = [0u8; 4096];

    loop {
        // Fill one whole record. A short trailing read is asserted in
        // debug builds and ends the scan in release.
        let mut filled = 0usize;
        while filled < raw.len() {
            let nread = match read_retrying(&mut file, &mut raw[filled..]) {
                Ok(n) => n,
                Err(err) => {
                    debug_assert!(false, "read from {MAP_PATH} failed: {err}");
                    log::debug!("treating read error as end of stream: {err}");
                    0
                }
            };
            if nread == 0 {
                debug_assert!(filled == 0, "torn prmap record");
                return Ok(());
            }
            filled += nread;
        }

        let map: PrMap = unsafe { std::ptr::read_unaligned(raw.as_ptr().cast()) };
        let name_len = resolve_object_path(&map.pr_mapname, &mut path_buf);

        f(&MappingRecord {
            start: map.pr_vaddr,
            end: map.pr_vaddr.wrapping_add(map.pr_size),
            perms: MFLAG_PERMS[(map.pr_mflags & 7) as usize],
            offset: map.pr_offset as u64,
            inode: 0,
            filename: &path_buf[..name_len],
        });
    }
}

/// Resolves the record's object name through the `/proc/self/path/<name>`
/// symlink into `out`, returning the resolved length. Resolution failure
/// reports an empty name.
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn resolve_object_path(mapname: &[u8; PRMAPSZ], out: &mut [u8]) -> usize {
    const LINK_PREFIX: &[u8] = b"/proc/self/path/";

    let name_len = mapname.iter().position(|&b| b == 0).unwrap_or(PRMAPSZ);
    if name_len == 0 {
        return 0;
    }

    let mut link = [0u8; LINK_PREFIX.len() + PRMAPSZ + 1];
    link[..LINK_PREFIX.len()].copy_from_slice(LINK_PREFIX);
    link[LINK_PREFIX.len()..LINK_PREFIX.len() + name_len].copy_from_slice(&mapname[..name_len]);

    let resolved = unsafe {
        libc::readlink(
            link.as_ptr().cast(),
            out.as_mut_ptr().cast(),
            out.len(),
        )
    };
    if resolved < 0 {
        0
    } else {
        resolved as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mflag_permission_table() {
        // MA_READ == 4, MA_WRITE == 2, MA_EXEC == 1.
        assert_eq!(&MFLAG_PERMS[0].token(), b"---p");
        assert_eq!(&MFLAG_PERMS[1].token(), b"--xp");
        assert_eq!(&MFLAG_PERMS[2].token(), b"-w-p");
        assert_eq!(&MFLAG_PERMS[3].token(), b"-wxp");
        assert_eq!(&MFLAG_PERMS[4].token(), b"r--p");
        assert_eq!(&MFLAG_PERMS[5].token(), b"r-xp");
        assert_eq!(&MFLAG_PERMS[6].token(), b"rw-p");
        assert_eq!(&MFLAG_PERMS[7].token(), b"rwxp");
    }

    #[test]
    fn test_prmap_record_layout() {
        // The record is read by size; a drifting layout would shear the
        // whole stream.
        assert_eq!(std::mem::size_of::<PrMap>(), 8 + 8 + PRMAPSZ + 8 + 4 * 4);
    }
}
