#![allow(unsafe_code)]

//! The one unsafe call this crate makes: mapping the output file.
//!
//! `memmap2::MmapMut::map_mut` is itself `unsafe` because nothing stops
//! another process from truncating or mutating the file concurrently,
//! which would make the mapping dangle. This client mmaps only a file it
//! just created and sized itself, in a single-threaded tool; isolating
//! the call here keeps the crate root's `#![deny(unsafe_code)]` meaningful
//! everywhere else.

use memmap2::MmapMut;
use std::fs::File;
use std::io;

/// Maps `file` for reading and writing.
///
/// # Safety
///
/// Per [`MmapMut::map_mut`]'s contract: `file` must not be concurrently
/// truncated or otherwise modified in a way that invalidates the mapped
/// region for the mapping's lifetime.
pub(crate) fn map_mut(file: &File) -> io::Result<MmapMut> {
    unsafe { MmapMut::map_mut(file) }
}
