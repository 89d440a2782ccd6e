//! PCI Bus Collaborator - device handles, driver data, and BAR mapping
//!
//! # Purpose
//! Models the host bus framework side of a PCI driver: it owns the
//! enumerated device records, hands out stable handles, keeps the
//! per-device driver-private pointer (`pci_set_drvdata` equivalent) with
//! a defined set/clear lifecycle, and maps BAR windows into a virtual
//! MMIO window.
//!
//! # Integration Points
//! - Depends on: nothing outside core/alloc
//! - Provides to: driver cores (card lifecycle, subsystem collaborators)
//!
//! # Mock Mode
//! The hardware-touching edges are mock-mode stubs: mapping bumps a
//! virtual window instead of programming page tables, and every device
//! record carries a [`FaultInjection`] descriptor so tests can fail the
//! map or engine-init steps on demand. Live-resource counters on the bus
//! make allocate/release balance observable.
//!
//! # Testing Strategy
//! - Unit tests: window allocation, drvdata lifecycle, iomap accounting
//! - Integration tests: driven from the driver crates that consume this one

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

mod device;
mod mmio;

pub use device::{
    BarRegion, BusStats, DeviceHandle, DrvData, FaultInjection, PciBus, PciDevice, MAX_BARS,
};
pub use mmio::{align_down, align_up, is_aligned, pages_needed, MappedRegion, MmioMapper, PAGE_SIZE};

use thiserror::Error;

/// Error types for bus operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("unknown device handle")]
    UnknownDevice,

    #[error("BAR {bar} is not implemented on this device")]
    MissingBar { bar: usize },

    #[error("out of MMIO window space (requested: {requested} bytes)")]
    OutOfWindow { requested: usize },

    #[error("injected fault")]
    Faulted,
}

pub type Result<T> = core::result::Result<T, BusError>;
