//! Serial Subsystem Collaborator - the multi-UART engine behind a card
//!
//! The engine that actually programs baud-rate and FIFO hardware is
//! external to this core; it is consumed as an opaque handle produced by
//! [`init_ports`] and released by the matching [`remove_ports`]. The
//! handle's id doubles as the driver-private token published on the
//! device, so later lookups by device can recover the engine instance.

use core::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use pci_bus::{DeviceHandle, DrvData, FaultInjection, PciBus};
use thiserror::Error;

use crate::board::BoardDescriptor;

/// Errors from engine init.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubsysError {
    #[error("no such device on the bus")]
    UnknownDevice,

    #[error("device does not implement BAR {bar}")]
    MissingBar { bar: usize },

    #[error("multi-UART engine rejected the configuration")]
    Faulted,
}

/// Monotonic engine handle ids; also the drvdata token value.
static NEXT_PRIV_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle to one device's multi-UART engine instance.
///
/// Owned exclusively by the card that created it; released by passing it
/// back to [`remove_ports`].
#[derive(Debug)]
pub struct SerialPriv {
    id: u64,
    num_ports: usize,
    base_baud: u32,
}

impl SerialPriv {
    /// The opaque token published as the device's driver-private data.
    pub fn token(&self) -> DrvData {
        DrvData(self.id)
    }

    /// Number of channels the engine was configured for.
    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// Base clock the engine was configured for, in Hz.
    pub fn base_baud(&self) -> u32 {
        self.base_baud
    }
}

/// Bring up the multi-UART engine for `device` per `board`.
///
/// # Errors
/// [`SubsysError::MissingBar`] when the descriptor's base BAR is absent
/// on the device, [`SubsysError::Faulted`] when fault injection arms
/// [`FaultInjection::SUBSYS_INIT`].
pub fn init_ports(
    bus: &mut PciBus,
    device: DeviceHandle,
    board: &BoardDescriptor,
) -> Result<SerialPriv, SubsysError> {
    let bar = board.flags.base_bar();
    let dev = bus.device(device).map_err(|_| SubsysError::UnknownDevice)?;

    if dev.faults().contains(FaultInjection::SUBSYS_INIT) {
        return Err(SubsysError::Faulted);
    }
    if dev.bar(bar).is_none() {
        return Err(SubsysError::MissingBar { bar });
    }

    let id = NEXT_PRIV_ID.fetch_add(1, Ordering::Relaxed);
    bus.subsys_created();
    debug!(
        "pciserial: engine {} up for {:?} ({} ports @ {} Hz)",
        id, device, board.num_ports, board.base_baud
    );
    Ok(SerialPriv {
        id,
        num_ports: board.num_ports,
        base_baud: board.base_baud,
    })
}

/// Release an engine handle. Total; every successful [`init_ports`] has
/// exactly one matching call.
pub fn remove_ports(bus: &mut PciBus, handle: SerialPriv) {
    bus.subsys_released();
    trace!("pciserial: engine {} down", handle.id);
}
