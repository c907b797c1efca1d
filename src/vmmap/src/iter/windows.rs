//! Snapshot strategy: one region per loaded module from a toolhelp module
//! snapshot.

use std::io;
use std::mem;

use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::processthreadsapi::GetCurrentProcessId;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Module32First, Module32Next, MODULEENTRY32, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32,
};

use crate::iter::EnumerateError;
use crate::record::{MappingRecord, Perms};

pub(crate) fn enumerate(f: &mut dyn FnMut(&MappingRecord<'_>)) -> Result<(), EnumerateError> {
    let snapshot = unsafe {
        CreateToolhelp32Snapshot(
            TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32,
            GetCurrentProcessId(),
        )
    };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(EnumerateError::Unavailable {
            path: "toolhelp module snapshot",
            source: io::Error::last_os_error(),
        });
    }

    // Module granularity is all the snapshot exposes: no per-page
    // protection, no offsets. Report each module as one read/execute
    // region.
    let perms = Perms {
        read: true,
        write: false,
        exec: true,
        shared: false,
    };

    let mut entry: MODULEENTRY32 = unsafe { mem::zeroed() };
    entry.dwSize = mem::size_of::<MODULEENTRY32>() as u32;

    let mut more = unsafe { Module32First(snapshot, &mut entry) };
    while more != 0 {
        let base = entry.modBaseAddr as u64;
        let path_len = entry
            .szExePath
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(entry.szExePath.len());
        let filename =
            unsafe { std::slice::from_raw_parts(entry.szExePath.as_ptr().cast::<u8>(), path_len) };

        f(&MappingRecord {
            start: base,
            end: base + u64::from(entry.modBaseSize),
            perms,
            offset: 0,
            inode: 0,
            filename,
        });

        more = unsafe { Module32Next(snapshot, &mut entry) };
    }

    unsafe { CloseHandle(snapshot) };
    Ok(())
}
