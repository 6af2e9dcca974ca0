//! The decoder's production [`decoder::Sink`]: a view into one section's
//! slice of a memory-mapped output file.

use decoder::Sink;
use memmap2::MmapMut;
use std::convert::Infallible;

/// A [`Sink`] that reads/writes blocks directly in a memory-mapped file,
/// at `base + block * blk_size`.
///
/// Ownership of the [`MmapMut`] is handed to a `SectionSink` for the
/// duration of one section's decode and handed back afterwards (see
/// [`Client`](crate::Client)'s per-section loop), rather than shared
/// behind a `RefCell`: sections are decoded strictly one at a time, so
/// there is never a moment two sinks need the mapping concurrently.
pub struct SectionSink {
    pub(crate) mmap: MmapMut,
    base: usize,
    blk_size: usize,
}

impl SectionSink {
    /// Creates a sink for the section starting at byte offset `base`
    /// within `mmap`.
    pub fn new(mmap: MmapMut, base: usize, blk_size: u16) -> Self {
        Self {
            mmap,
            base,
            blk_size: blk_size as usize,
        }
    }

    fn range(&self, block: usize) -> std::ops::Range<usize> {
        let start = self.base + block * self.blk_size;
        start..start + self.blk_size
    }
}

impl Sink for SectionSink {
    type Error = Infallible;

    fn read_block(&mut self, block: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(block);
        buf[..self.blk_size].copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_block(&mut self, block: usize, data: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(block);
        self.mmap[range].copy_from_slice(&data[..self.blk_size]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SectionSink;
    use decoder::Sink;
    use memmap2::MmapMut;

    #[test]
    fn write_then_read_round_trips_within_one_section() {
        let mut mmap = MmapMut::map_anon(64).unwrap();
        mmap.fill(0);
        let mut sink = SectionSink::new(mmap, 16, 4);

        sink.write_block(2, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        sink.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn writes_respect_the_section_base_offset() {
        let mmap = MmapMut::map_anon(64).unwrap();
        let mut sink = SectionSink::new(mmap, 32, 8);
        sink.write_block(0, &[0xAAu8; 8]).unwrap();
        assert_eq!(&sink.mmap[32..40], &[0xAAu8; 8]);
        assert_eq!(&sink.mmap[0..32], &[0u8; 32]);
    }
}
