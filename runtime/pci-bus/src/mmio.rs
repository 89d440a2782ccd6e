//! MMIO Window - virtual window allocation for device register banks
//!
//! This module hands out virtual ranges for BAR mappings from a fixed
//! window. Allocation is a page-granular bump: the offset of the physical
//! address within its page is preserved in the returned virtual address,
//! and the window is never reclaimed (a bus maps a bounded number of BARs
//! over its lifetime; release is tracked by the bus's counters).

use crate::{BusError, Result};

/// Page size (4KB)
pub const PAGE_SIZE: usize = 4096;

/// A mapped register window.
///
/// Owned exclusively by whoever mapped it; returned to the bus through
/// `iounmap`, which consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct MappedRegion {
    /// Virtual address where the region is mapped
    pub vaddr: usize,

    /// Physical address of the region
    pub paddr: usize,

    /// Size in bytes
    pub size: usize,
}

/// MMIO mapper - allocates virtual ranges for physical device regions
pub struct MmioMapper {
    /// Next available virtual address
    next_vaddr: usize,

    /// Base virtual address of the window
    window_base: usize,

    /// Size of the window
    window_size: usize,
}

impl MmioMapper {
    /// Create a new MMIO mapper
    ///
    /// # Arguments
    /// * `base` - Base virtual address for MMIO mappings
    /// * `size` - Total size available for MMIO
    pub fn new(base: usize, size: usize) -> Self {
        Self {
            next_vaddr: base,
            window_base: base,
            window_size: size,
        }
    }

    /// Map a physical MMIO region into the window
    ///
    /// # Returns
    /// [`MappedRegion`] whose `vaddr` preserves the physical address's
    /// offset within its page.
    ///
    /// # Errors
    /// [`BusError::OutOfWindow`] when the window cannot hold the
    /// page-aligned span of the request.
    pub fn map_region(&mut self, paddr: usize, size: usize) -> Result<MappedRegion> {
        let start_offset = paddr % PAGE_SIZE;
        let aligned_size = align_up(size + start_offset);

        if self.next_vaddr + aligned_size > self.window_base + self.window_size {
            return Err(BusError::OutOfWindow {
                requested: aligned_size,
            });
        }

        let vaddr = self.next_vaddr + start_offset;
        self.next_vaddr += aligned_size;

        Ok(MappedRegion { vaddr, paddr, size })
    }

    /// Return a region to the mapper.
    ///
    /// The bump allocator does not reclaim; release accounting lives on
    /// the bus's counters.
    pub fn unmap_region(&mut self, _region: &MappedRegion) {}

    /// Get the next available virtual address
    pub fn next_vaddr(&self) -> usize {
        self.next_vaddr
    }

    /// Get remaining window space
    pub fn available_space(&self) -> usize {
        (self.window_base + self.window_size) - self.next_vaddr
    }
}

/// Helper to calculate number of pages needed
pub fn pages_needed(size: usize) -> usize {
    (size + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Helper to align address down to page boundary
pub fn align_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Helper to align address up to page boundary
pub fn align_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Helper to check if address is page-aligned
pub fn is_aligned(addr: usize) -> bool {
    addr % PAGE_SIZE == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapper_creation() {
        let mapper = MmioMapper::new(0x2000_0000, 256 * 1024 * 1024);
        assert_eq!(mapper.next_vaddr(), 0x2000_0000);
        assert_eq!(mapper.available_space(), 256 * 1024 * 1024);
    }

    #[test]
    fn test_page_alignment() {
        assert_eq!(align_down(0x1234), 0x1000);
        assert_eq!(align_up(0x1234), 0x2000);
        assert_eq!(align_up(0x1000), 0x1000);
        assert!(is_aligned(0x1000));
        assert!(!is_aligned(0x1234));
    }

    #[test]
    fn test_pages_needed() {
        assert_eq!(pages_needed(4096), 1);
        assert_eq!(pages_needed(4097), 2);
        assert_eq!(pages_needed(8192), 2);
        assert_eq!(pages_needed(100), 1);
    }

    #[test]
    fn test_map_region() {
        let mut mapper = MmioMapper::new(0x2000_0000, 1024 * 1024);

        let region = mapper.map_region(0xFEBC_0000, 65536).unwrap();

        assert_eq!(region.paddr, 0xFEBC_0000);
        assert_eq!(region.size, 65536);
        assert!(region.vaddr >= 0x2000_0000);
    }

    #[test]
    fn test_map_region_preserves_page_offset() {
        let mut mapper = MmioMapper::new(0x2000_0000, 1024 * 1024);

        let region = mapper.map_region(0xFEBC_0100, 4000).unwrap();

        assert_eq!(region.paddr, 0xFEBC_0100);
        assert_eq!(region.size, 4000);
        assert_eq!(region.vaddr % PAGE_SIZE, 0x100);
    }

    #[test]
    fn test_map_multiple_regions_do_not_overlap() {
        let mut mapper = MmioMapper::new(0x2000_0000, 1024 * 1024);

        let region1 = mapper.map_region(0xFEBC_0000, 4096).unwrap();
        let region2 = mapper.map_region(0xFEBD_0000, 8192).unwrap();

        assert!(region1.vaddr + region1.size <= region2.vaddr);
    }

    #[test]
    fn test_out_of_window_space() {
        let mut mapper = MmioMapper::new(0x2000_0000, 4096); // one page

        let result = mapper.map_region(0xFEBC_0000, 8192);

        assert!(matches!(result, Err(BusError::OutOfWindow { .. })));
    }
}
