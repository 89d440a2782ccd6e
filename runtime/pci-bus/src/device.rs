//! PCI Device Records - handles, driver data, and BAR mapping
//!
//! The bus owns every attached device record for its own lifetime and
//! hands out copyable [`DeviceHandle`]s. Handles are never reused for a
//! different device, which is what lets driver objects keep one as a
//! non-owning back-reference.

use alloc::vec::Vec;
use bitflags::bitflags;
use log::trace;

use crate::mmio::{MappedRegion, MmioMapper};
use crate::{BusError, Result};

/// Maximum number of base address registers per device
pub const MAX_BARS: usize = 6;

/// Default virtual window for BAR mappings
const MMIO_WINDOW_BASE: usize = 0x2000_0000;
const MMIO_WINDOW_SIZE: usize = 256 * 1024 * 1024;

/// Handle to a bus-enumerated device.
///
/// Copyable weak reference; the bus owns the record it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(usize);

/// Opaque driver-private token, the `pci_set_drvdata` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrvData(pub u64);

bitflags! {
    /// Fault injection switches for exercising driver failure paths.
    ///
    /// Ships in the crate the same way the framework's mock backends do:
    /// real code never arms these, tests do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultInjection: u32 {
        /// Fail the multi-UART engine init step.
        const SUBSYS_INIT = 1 << 0;
        /// Fail BAR window mapping.
        const BAR_MAP = 1 << 1;
    }
}

/// One base address register's physical window
#[derive(Debug, Clone, Copy)]
pub struct BarRegion {
    /// Physical address of the register window
    pub paddr: usize,

    /// Size in bytes
    pub size: usize,
}

/// A bus-enumerated PCI device record
pub struct PciDevice {
    /// PCI vendor ID
    vendor_id: u16,

    /// PCI device ID (the variant identifier drivers dispatch on)
    device_id: u16,

    /// Implemented base address registers
    bars: [Option<BarRegion>; MAX_BARS],

    /// Driver-private pointer, set and cleared by the owning driver
    drvdata: Option<DrvData>,

    /// Armed fault injections (tests only)
    faults: FaultInjection,

    /// Bitmask of UART channel indices that fail construction (tests only)
    failed_ports: u32,
}

impl PciDevice {
    /// Create a device record with no BARs and no faults armed.
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
            bars: [None; MAX_BARS],
            drvdata: None,
            faults: FaultInjection::empty(),
            failed_ports: 0,
        }
    }

    /// Implement BAR `bar` at `paddr` with `size` bytes.
    pub fn with_bar(mut self, bar: usize, paddr: usize, size: usize) -> Self {
        if bar < MAX_BARS {
            self.bars[bar] = Some(BarRegion { paddr, size });
        }
        self
    }

    /// Arm fault injections on this device.
    pub fn with_faults(mut self, faults: FaultInjection) -> Self {
        self.faults = faults;
        self
    }

    /// Mark UART channel indices (bitmask) as failing construction.
    pub fn with_failed_ports(mut self, mask: u32) -> Self {
        self.failed_ports = mask;
        self
    }

    /// PCI vendor ID
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// PCI device ID
    pub fn device_id(&self) -> u16 {
        self.device_id
    }

    /// The physical window of BAR `bar`, if implemented.
    pub fn bar(&self, bar: usize) -> Option<BarRegion> {
        self.bars.get(bar).copied().flatten()
    }

    /// Armed fault injections
    pub fn faults(&self) -> FaultInjection {
        self.faults
    }

    /// Whether channel `index` is marked as failing construction.
    pub fn port_faulted(&self, index: usize) -> bool {
        index < u32::BITS as usize && self.failed_ports & (1 << index) != 0
    }

    /// Current driver-private token, if set.
    pub fn drvdata(&self) -> Option<DrvData> {
        self.drvdata
    }
}

/// Live-resource counters for allocate/release balance checks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Currently mapped BAR windows
    pub mapped_live: usize,

    /// Total successful `iomap` calls
    pub iomap_calls: usize,

    /// Total `iounmap` calls
    pub iounmap_calls: usize,

    /// Currently live multi-UART engine handles
    pub subsys_live: usize,
}

/// The bus framework: owns device records, the MMIO window, and the
/// resource counters.
pub struct PciBus {
    devices: Vec<PciDevice>,
    mapper: MmioMapper,
    stats: BusStats,
}

impl Default for PciBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PciBus {
    /// Create a bus with the default MMIO window.
    pub fn new() -> Self {
        Self::with_window(MMIO_WINDOW_BASE, MMIO_WINDOW_SIZE)
    }

    /// Create a bus with an explicit MMIO window geometry.
    pub fn with_window(base: usize, size: usize) -> Self {
        Self {
            devices: Vec::new(),
            mapper: MmioMapper::new(base, size),
            stats: BusStats::default(),
        }
    }

    /// Attach a device record; the returned handle stays valid for the
    /// bus's lifetime.
    pub fn attach(&mut self, device: PciDevice) -> DeviceHandle {
        let handle = DeviceHandle(self.devices.len());
        trace!(
            "pci: attached {:04x}:{:04x} as {:?}",
            device.vendor_id,
            device.device_id,
            handle
        );
        self.devices.push(device);
        handle
    }

    /// Look up a device record.
    pub fn device(&self, handle: DeviceHandle) -> Result<&PciDevice> {
        self.devices.get(handle.0).ok_or(BusError::UnknownDevice)
    }

    fn device_mut(&mut self, handle: DeviceHandle) -> Result<&mut PciDevice> {
        self.devices
            .get_mut(handle.0)
            .ok_or(BusError::UnknownDevice)
    }

    /// Map BAR `bar` of `handle` into the MMIO window.
    ///
    /// # Errors
    /// [`BusError::UnknownDevice`], [`BusError::MissingBar`] when the BAR
    /// is unimplemented, [`BusError::Faulted`] when fault injection arms
    /// [`FaultInjection::BAR_MAP`], [`BusError::OutOfWindow`] when the
    /// window is exhausted.
    pub fn iomap(&mut self, handle: DeviceHandle, bar: usize) -> Result<MappedRegion> {
        let (faulted, region) = {
            let dev = self.device(handle)?;
            (dev.faults.contains(FaultInjection::BAR_MAP), dev.bar(bar))
        };
        if faulted {
            return Err(BusError::Faulted);
        }
        let region = region.ok_or(BusError::MissingBar { bar })?;

        let mapped = self.mapper.map_region(region.paddr, region.size)?;
        self.stats.iomap_calls += 1;
        self.stats.mapped_live += 1;
        trace!(
            "pci: mapped BAR {} of {:?} at {:#x} ({} bytes)",
            bar,
            handle,
            mapped.vaddr,
            mapped.size
        );
        Ok(mapped)
    }

    /// Release a mapping produced by [`PciBus::iomap`]. Total.
    pub fn iounmap(&mut self, region: MappedRegion) {
        self.mapper.unmap_region(&region);
        self.stats.iounmap_calls += 1;
        self.stats.mapped_live = self.stats.mapped_live.saturating_sub(1);
    }

    /// Publish the driver-private token for `handle`.
    pub fn set_drvdata(&mut self, handle: DeviceHandle, data: DrvData) -> Result<()> {
        self.device_mut(handle)?.drvdata = Some(data);
        Ok(())
    }

    /// Current driver-private token for `handle`, if any.
    pub fn drvdata(&self, handle: DeviceHandle) -> Option<DrvData> {
        self.device(handle).ok().and_then(|dev| dev.drvdata)
    }

    /// Unset the driver-private token for `handle`. Total, so teardown
    /// paths can always run it.
    pub fn clear_drvdata(&mut self, handle: DeviceHandle) {
        if let Ok(dev) = self.device_mut(handle) {
            dev.drvdata = None;
        }
    }

    /// Snapshot of the live-resource counters.
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    /// Note a multi-UART engine handle coming up. Called by the engine
    /// collaborator for leak accounting.
    pub fn subsys_created(&mut self) {
        self.stats.subsys_live += 1;
    }

    /// Note a multi-UART engine handle released.
    pub fn subsys_released(&mut self) {
        self.stats.subsys_live = self.stats.subsys_live.saturating_sub(1);
    }
}
