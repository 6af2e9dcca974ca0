//! Auto-selection of block size and section size for a pinned file.

/// The largest block size the server will ever choose or accept from the
/// CLI.
pub const MAX_BLOCK_SIZE: u16 = 16384;

const SECTION_SIZE_LADDER: [u32; 4] = [128, 256, 512, 1024];

/// Chooses a block size for a file of `filesize` bytes.
///
/// With no `requested` override, starts at 128 bytes and doubles until
/// `filesize / blk_size <= i16::MAX`, per the auto-sizing policy this
/// module implements. An explicit `requested` size is used as-is,
/// provided it does not exceed [`MAX_BLOCK_SIZE`].
///
/// # Errors
///
/// Returns `Err(())` if `requested` exceeds [`MAX_BLOCK_SIZE`].
pub fn choose_block_size(filesize: u64, requested: Option<u16>) -> Result<u16, BlockSizeError> {
    if let Some(requested) = requested {
        return if requested > MAX_BLOCK_SIZE {
            Err(BlockSizeError::TooLarge(requested))
        } else {
            Ok(requested.max(1))
        };
    }

    let mut blk_size: u32 = 128;
    while filesize / u64::from(blk_size) > u64::from(i16::MAX as u32) && blk_size < u32::from(MAX_BLOCK_SIZE) {
        blk_size *= 2;
    }
    Ok(u16::try_from(blk_size).unwrap_or(MAX_BLOCK_SIZE))
}

/// Chooses a section size (blocks per section) from the power-of-two
/// ladder `{128, 256, 512, 1024}`, picking the smallest rung that is at
/// least `total_blocks`, or `1024` if `total_blocks` exceeds the ladder's
/// top (the file is then served across multiple sections).
#[must_use]
pub fn choose_section_size(total_blocks: u64) -> u16 {
    for candidate in SECTION_SIZE_LADDER {
        if u64::from(candidate) >= total_blocks {
            return candidate as u16;
        }
    }
    *SECTION_SIZE_LADDER.last().expect("non-empty ladder") as u16
}

/// Error returned when a requested block size is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockSizeError {
    /// The requested block size exceeds [`MAX_BLOCK_SIZE`].
    #[error("requested block size {0} exceeds the maximum of {MAX_BLOCK_SIZE}")]
    TooLarge(u16),
}
