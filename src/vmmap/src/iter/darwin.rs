//! Segment-command strategy: walk the dyld image list and each image's
//! load commands.
//!
//! The image list can change while we walk it (another thread may load or
//! unload a library), so the scan restarts from the current cursor after
//! every delivered record, refetching the image header each time. Worst
//! case that is quadratic in the number of load commands; accepted, the
//! lists are short and correctness under concurrent dyld activity matters
//! more here.

use std::ffi::CStr;
use std::mem;

use crate::iter::EnumerateError;
use crate::record::{MappingRecord, Perms};

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_SEGMENT_64: u32 = 0x19;

#[repr(C)]
struct MachHeader64 {
    magic: u32,
    cputype: i32,
    cpusubtype: i32,
    filetype: u32,
    ncmds: u32,
    sizeofcmds: u32,
    flags: u32,
    reserved: u32,
}

#[repr(C)]
struct LoadCommand {
    cmd: u32,
    cmdsize: u32,
}

#[repr(C)]
struct SegmentCommand64 {
    cmd: u32,
    cmdsize: u32,
    segname: [u8; 16],
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: i32,
    initprot: i32,
    nsects: u32,
    flags: u32,
}

extern "C" {
    fn _dyld_image_count() -> u32;
    fn _dyld_get_image_header(image_index: u32) -> *const MachHeader64;
    fn _dyld_get_image_vmaddr_slide(image_index: u32) -> libc::intptr_t;
    fn _dyld_get_image_name(image_index: u32) -> *const libc::c_char;
}

pub(crate) fn enumerate(f: &mut dyn FnMut(&MappingRecord<'_>)) -> Result<(), EnumerateError> {
    // Count down from the top of the load order. Every supported darwin
    // target loads 64-bit images only.
    let mut image = i64::from(unsafe { _dyld_image_count() });
    let mut load_cmd: i64 = -1;

    'rescan: while image >= 0 {
        let hdr = unsafe { _dyld_get_image_header(image as u32) };
        if hdr.is_null() {
            image -= 1;
            load_cmd = -1;
            continue;
        }
        if load_cmd < 0 {
            // Fresh image: start past its last load command.
            load_cmd = i64::from(unsafe { (*hdr).ncmds });
        }

        load_cmd -= 1;
        while load_cmd >= 0 {
            if let Some(record) = unsafe { segment_at(hdr, image as u32, load_cmd as u32) } {
                f(&record);
                // Restart at the same cursor; the image list may have
                // changed while the callback ran.
                continue 'rescan;
            }
            load_cmd -= 1;
        }

        image -= 1;
        load_cmd = -1;
    }

    Ok(())
}

/// Reports the image's `index`th load command as a record when it maps a
/// 64-bit segment. The command list is rewalked from the top on every
/// call; `hdr` must be the image's current header.
unsafe fn segment_at<'a>(
    hdr: *const MachHeader64,
    image: u32,
    index: u32,
) -> Option<MappingRecord<'a>> {
    if (*hdr).magic != MH_MAGIC_64 {
        return None;
    }

    let mut lc = (hdr as *const u8).add(mem::size_of::<MachHeader64>());
    for _ in 0..index {
        lc = lc.add((*(lc as *const LoadCommand)).cmdsize as usize);
    }
    if (*(lc as *const LoadCommand)).cmd != LC_SEGMENT_64 {
        return None;
    }

    let segment = &*(lc as *const SegmentCommand64);
    let slide = _dyld_get_image_vmaddr_slide(image) as u64;
    let name = _dyld_get_image_name(image);
    let filename = if name.is_null() {
        &[][..]
    } else {
        CStr::from_ptr(name).to_bytes()
    };

    Some(MappingRecord {
        start: segment.vmaddr.wrapping_add(slide),
        end: segment.vmaddr.wrapping_add(segment.vmsize).wrapping_add(slide),
        // Segment protection bits are not exposed at this layer; report
        // the best-effort read/execute token.
        perms: Perms {
            read: true,
            write: false,
            exec: true,
            shared: false,
        },
        offset: segment.fileoff,
        inode: 0,
        filename,
    })
}
