//! Port Collaborator - one logical UART channel within a card
//!
//! The per-channel register protocol and interrupt handling live outside
//! this core; a `Port` only pins a channel's index and register bank so
//! later I/O has somewhere to go. Ports are owned by exactly one card and
//! destroyed only through that card's teardown.

use log::trace;
use pci_bus::{MappedRegion, PciDevice};
use thiserror::Error;

/// Errors from port construction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    #[error("port {index}: register bank exceeds the mapped window")]
    OutOfWindow { index: usize },

    #[error("port {index}: channel failed to initialize")]
    Faulted { index: usize },
}

/// One UART channel of a card.
#[derive(Debug)]
pub struct Port {
    index: usize,
    reg_base: usize,
    reg_len: usize,
}

impl Port {
    /// Construct the channel bound to its register bank.
    ///
    /// # Arguments
    /// * `dev` - the parent device, consulted for channel health
    /// * `index` - 0-based channel index
    /// * `reg_base` - virtual base of the channel's register bank
    /// * `reg_len` - length of the bank in bytes
    /// * `window` - the card's mapped BAR window the bank must fit in
    ///
    /// # Errors
    /// [`PortError::OutOfWindow`] when the bank is not contained in
    /// `window`, [`PortError::Faulted`] when the device reports the
    /// channel dead.
    pub fn new(
        dev: &PciDevice,
        index: usize,
        reg_base: usize,
        reg_len: usize,
        window: &MappedRegion,
    ) -> Result<Port, PortError> {
        if dev.port_faulted(index) {
            return Err(PortError::Faulted { index });
        }
        if reg_base < window.vaddr || reg_base + reg_len > window.vaddr + window.size {
            return Err(PortError::OutOfWindow { index });
        }

        trace!(
            "port {}: bank {:#x}..{:#x}",
            index,
            reg_base,
            reg_base + reg_len
        );
        Ok(Port {
            index,
            reg_base,
            reg_len,
        })
    }

    /// 0-based channel index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Virtual base of the channel's register bank.
    pub fn register_base(&self) -> usize {
        self.reg_base
    }

    /// Length of the register bank in bytes.
    pub fn register_len(&self) -> usize {
        self.reg_len
    }

    /// Tear the channel down. Consumes the port.
    pub fn destroy(self) {
        trace!("port {}: destroyed", self.index);
    }
}
