//! Structural strategy: walk the dynamic linker's loaded-object list
//! through `dl_iterate_phdr` instead of parsing any text.
//!
//! For every loadable program segment the reported range is widened to the
//! segment's alignment, matching what the loader actually maps. No file is
//! opened, so this strategy also works when the proc pseudo-filesystem is
//! not mounted.

use std::ffi::{c_void, CStr};
use std::slice;

use once_cell::sync::Lazy;

use crate::iter::EnumerateError;
use crate::record::{MappingRecord, Perms};

/// The linker reports the main executable with an empty name; it is
/// reported under the process's own invocation path instead. Resolved once
/// up front; the linker callback should not allocate.
static INVOCATION_NAME: Lazy<Vec<u8>> = Lazy::new(|| {
    use std::os::unix::ffi::OsStringExt;
    std::env::current_exe()
        .map(|path| path.into_os_string().into_vec())
        .unwrap_or_default()
});

pub(crate) fn enumerate(f: &mut dyn FnMut(&MappingRecord<'_>)) -> Result<(), EnumerateError> {
    unsafe extern "C" fn walk(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut c_void,
    ) -> libc::c_int {
        let f = &mut *(data as *mut &mut dyn FnMut(&MappingRecord<'_>));
        let info = &*info;

        let filename = if info.dlpi_name.is_null() || *info.dlpi_name == 0 {
            &INVOCATION_NAME[..]
        } else {
            CStr::from_ptr(info.dlpi_name).to_bytes()
        };

        let headers = slice::from_raw_parts(info.dlpi_phdr, info.dlpi_phnum as usize);
        for phdr in headers {
            if phdr.p_type != libc::PT_LOAD {
                continue;
            }
            let (start, end, offset) = loadable_range(
                (info.dlpi_addr as u64).wrapping_add(phdr.p_vaddr as u64),
                phdr.p_filesz as u64,
                phdr.p_offset as u64,
                phdr.p_align as u64,
            );
            f(&MappingRecord {
                start,
                end,
                perms: segment_perms(phdr.p_flags),
                offset,
                inode: 0,
                filename,
            });
        }
        0
    }

    Lazy::force(&INVOCATION_NAME);

    let mut callback: &mut dyn FnMut(&MappingRecord<'_>) = f;
    unsafe {
        libc::dl_iterate_phdr(Some(walk), &mut callback as *mut _ as *mut c_void);
    }
    Ok(())
}

/// Widens a loadable segment to the range the loader maps: start rounded
/// down and end rounded up to the segment alignment, file offset adjusted
/// to match the rounded start. Degenerate alignments leave the nominal
/// range untouched.
fn loadable_range(vaddr: u64, filesz: u64, offset: u64, align: u64) -> (u64, u64, u64) {
    if align <= 1 || !align.is_power_of_two() {
        return (vaddr, vaddr + filesz, offset);
    }
    let start_adj = vaddr & (align - 1);
    let end_adj = vaddr.wrapping_add(filesz).wrapping_neg() & (align - 1);
    (
        vaddr - start_adj,
        vaddr.wrapping_add(filesz).wrapping_add(end_adj),
        offset.wrapping_sub(start_adj),
    )
}

fn segment_perms(flags: u32) -> Perms {
    Perms {
        read: flags & libc::PF_R != 0,
        write: flags & libc::PF_W != 0,
        exec: flags & libc::PF_X != 0,
        shared: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loadable_range_rounds_to_alignment() {
        for (vaddr, filesz, offset, align) in [
            (0x40_1234u64, 0x1000u64, 0x1234u64, 0x1000u64),
            (0x7f00_0000_0fff, 1, 0xfff, 0x1000),
            (0x1000, 0x1000, 0, 0x1000),
            (0x123, 0x456, 0x123, 0x200000),
        ] {
            let (start, end, adj_offset) = loadable_range(vaddr, filesz, offset, align);

            // The rounded region always covers the nominal one.
            assert!(start <= vaddr);
            assert!(end >= vaddr + filesz);
            // And both edges land on alignment boundaries.
            assert_eq!(start % align, 0);
            assert_eq!((end - start) % align, 0);
            // The offset moves in lockstep with the start.
            assert_eq!(vaddr - start, offset - adj_offset);
        }
    }

    #[test]
    fn test_loadable_range_ignores_degenerate_alignment() {
        assert_eq!(loadable_range(0x1234, 0x10, 0x34, 0), (0x1234, 0x1244, 0x34));
        assert_eq!(loadable_range(0x1234, 0x10, 0x34, 1), (0x1234, 0x1244, 0x34));
        assert_eq!(loadable_range(0x1234, 0x10, 0x34, 3), (0x1234, 0x1244, 0x34));
    }

    #[test]
    fn test_segment_perms_flag_bits() {
        let perms = segment_perms(libc::PF_R | libc::PF_X);
        assert_eq!(&perms.token(), b"r-xp");
        let perms = segment_perms(libc::PF_R | libc::PF_W);
        assert_eq!(&perms.token(), b"rw-p");
        assert_eq!(&segment_perms(0).token(), b"---p");
    }

    #[test]
    fn test_enumerate_reports_loaded_objects() {
        let mut count = 0usize;
        let mut main_named = false;
        let probe = test_enumerate_reports_loaded_objects as usize as u64;
        let mut probe_covered = false;

        enumerate(&mut |record: &MappingRecord<'_>| {
            count += 1;
            assert!(record.start <= record.end);
            if !record.filename.is_empty() {
                main_named = true;
            }
            if record.perms.exec && record.start <= probe && probe < record.end {
                probe_covered = true;
            }
        })
        .unwrap();

        assert!(count > 0);
        // The unnamed main object falls back to the invocation path.
        assert!(main_named);
        assert!(probe_covered);
    }
}
