//! SerialFC - multi-port PCI/PCIe serial adapter card lifecycle
//!
//! # Purpose
//! Manages the lifecycle of Fastcom serial expansion adapters: resolving
//! which hardware variant is attached, bringing up the multi-UART engine,
//! mapping the register window, and building one [`Port`] per UART
//! channel — then tearing all of it down symmetrically on detach.
//!
//! # Integration Points
//! - Depends on: pci-bus (device handles, driver data, BAR mapping)
//! - Provides to: the bus framework's attach/detach event handlers via
//!   [`SerialFcDriver`]
//!
//! # Architecture
//! Variant dispatch is an exact lookup in a compiled-in descriptor table
//! ([`board`]). [`Card::create`] acquires resources in a fixed order and
//! unwinds in reverse on any fatal failure; only the port-construction
//! loop is best effort. [`Card::delete`] is total and consumes the card,
//! so a double delete cannot compile.
//!
//! # Testing Strategy
//! - Unit tests: descriptor table, port containment, create failure paths
//! - Integration tests: lifecycle balance, fault injection, multi-device
//!   isolation

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod board;
pub mod card;
pub mod driver;
pub mod pciserial;
pub mod port;

pub use board::{BoardDescriptor, BoardFlags};
pub use card::Card;
pub use driver::SerialFcDriver;
pub use pciserial::{SerialPriv, SubsysError};
pub use port::{Port, PortError};

use thiserror::Error;

/// Fatal failures of the card create path.
///
/// Every variant guarantees that nothing acquired during the failed call
/// is still reachable or allocated when it propagates. The
/// degraded-port-count condition is deliberately not here: it is surfaced
/// through [`Card::skipped_ports`] instead of failing the create.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("card allocation failed")]
    Allocation,

    #[error("unrecognized device variant {vendor:#06x}:{device:#06x}")]
    UnrecognizedVariant { vendor: u16, device: u16 },

    #[error("multi-UART engine init failed: {0}")]
    SubsystemInit(#[source] SubsysError),

    #[error("BAR {bar} mapping failed: {source}")]
    MmioMap {
        bar: usize,
        #[source]
        source: pci_bus::BusError,
    },

    #[error("bus framework error: {0}")]
    Bus(#[from] pci_bus::BusError),
}

pub type Result<T> = core::result::Result<T, CardError>;
