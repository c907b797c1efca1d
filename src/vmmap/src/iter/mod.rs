//! Platform enumeration strategies behind one entry point.
//!
//! Each supported platform exposes mapping information through a different
//! mechanism: a text pseudo-file, dynamic-linker metadata, a binary record
//! stream, loader segment commands, or an OS module snapshot. Exactly one
//! strategy is compiled into any given build: the set of mechanisms is
//! fixed per target, so selection happens here with `cfg`, not at runtime.

use std::io;

use crate::record::MappingRecord;

#[cfg(any(
    test,
    all(
        any(target_os = "linux", target_os = "android"),
        not(feature = "dl-iterate-phdr")
    ),
    target_os = "netbsd"
))]
mod text;

#[cfg(any(
    target_os = "freebsd",
    all(
        feature = "dl-iterate-phdr",
        any(target_os = "linux", target_os = "android")
    ),
    all(test, any(target_os = "linux", target_os = "android"))
))]
mod phdr;

#[cfg(any(test, target_os = "solaris", target_os = "illumos"))]
mod solaris;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod darwin;

#[cfg(windows)]
mod windows;

#[cfg(any(test, target_os = "nto"))]
mod qnx;

#[cfg(any(
    all(
        any(target_os = "linux", target_os = "android"),
        not(feature = "dl-iterate-phdr")
    ),
    target_os = "netbsd"
))]
use text as imp;

#[cfg(any(
    target_os = "freebsd",
    all(
        feature = "dl-iterate-phdr",
        any(target_os = "linux", target_os = "android")
    )
))]
use phdr as imp;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
use solaris as imp;

#[cfg(any(target_os = "macos", target_os = "ios"))]
use darwin as imp;

#[cfg(windows)]
use windows as imp;

#[cfg(target_os = "nto")]
use qnx as imp;

/// Targets with no known mapping mechanism report the source unavailable
/// instead of failing the build.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "netbsd",
    target_os = "freebsd",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "macos",
    target_os = "ios",
    target_os = "nto",
    windows
)))]
mod unsupported {
    use crate::iter::EnumerateError;
    use crate::record::MappingRecord;

    pub(crate) fn enumerate(
        _f: &mut dyn FnMut(&MappingRecord<'_>),
    ) -> Result<(), EnumerateError> {
        Err(EnumerateError::Unavailable {
            path: "process mapping source",
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "netbsd",
    target_os = "freebsd",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "macos",
    target_os = "ios",
    target_os = "nto",
    windows
)))]
use unsupported as imp;

/// Whole-scan failure. Per-line parse failures are skipped silently; only
/// conditions that make the snapshot itself unusable surface here.
#[derive(Debug, thiserror::Error)]
pub enum EnumerateError {
    /// The platform's mapping source could not be opened at all.
    #[error("cannot open mapping source {path}: {source}")]
    Unavailable {
        path: &'static str,
        source: io::Error,
    },
    /// A text-source line outgrew the fixed line buffer.
    #[error(transparent)]
    LineTooLong(#[from] crate::lines::LineTooLong),
    /// The output sink failed (self-maps writers only).
    #[error("output sink failure: {0}")]
    Sink(#[from] io::Error),
}

/// Invokes `f` once per region mapped into the calling process.
///
/// Record order follows the underlying source: ascending addresses for
/// the text, record-stream and linker-metadata sources, load order for the
/// image walkers. Each record, including its borrowed `filename`, is
/// valid only for that single invocation of `f`; copy out anything that
/// must persist.
///
/// Every call takes a fresh snapshot; nothing is cached or shared across
/// calls, so concurrent enumerations from different threads are
/// independent. Returns an error only when the mapping source cannot be
/// read at all; individually malformed lines are skipped.
pub fn enumerate<F>(mut f: F) -> Result<(), EnumerateError>
where
    F: FnMut(&MappingRecord<'_>),
{
    imp::enumerate(&mut f)
}
