//! # vmmap
//!
//! Enumerate the virtual-memory mappings of the *calling* process
//! (address ranges, access permissions, backing file, offset, inode) for
//! memory-diagnostics tooling (leak checkers, crash reporters) that must
//! correlate raw addresses with loaded objects.
//!
//! Every platform exposes mapping information differently: a text
//! pseudo-file, a binary record stream, dynamic-linker metadata, loader
//! segment commands, an OS module snapshot. This crate hides all of them
//! behind one record shape and one push-style entry point:
//!
//! ```no_run
//! vmmap::enumerate(|region| {
//!     println!(
//!         "{:#x}-{:#x} {} {}",
//!         region.start,
//!         region.end,
//!         region.perms,
//!         region.filename_lossy(),
//!     );
//! })?;
//! # Ok::<(), vmmap::EnumerateError>(())
//! ```
//!
//! ## Borrowed filenames
//!
//! [`MappingRecord::filename`] borrows storage owned by the enumeration
//! call, either a reused line buffer or loader memory. It is valid only inside
//! the callback; copy it out if it must persist. The borrow checker
//! enforces this: a record cannot escape the closure.
//!
//! ## Diagnostic-path discipline
//!
//! The crate is built to run where ordinary code cannot, such as
//! out-of-memory handlers and crash reporters. The text parser
//! allocates nothing, the line buffer is a fixed-size stack array with a
//! hard length ceiling, and read errors degrade to end-of-stream instead
//! of panicking.

pub mod format;
pub mod iter;
pub mod lines;
pub mod parse;
pub mod record;

// Re-export commonly used items
#[doc(inline)]
pub use format::{write_record, write_self_maps};
#[cfg(unix)]
#[doc(inline)]
pub use format::write_self_maps_to_fd;
#[doc(inline)]
pub use iter::{enumerate, EnumerateError};
#[doc(inline)]
pub use lines::{for_each_line, LineTooLong, MAX_LINE_LEN};
#[doc(inline)]
pub use parse::{parse_line, MapsLine, ParseError};
#[doc(inline)]
pub use record::{MappingRecord, Perms};
