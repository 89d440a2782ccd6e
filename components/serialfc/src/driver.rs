//! Driver Registry - attach/detach entry points over all live cards
//!
//! The bus framework delivers attach and detach events per device; this
//! registry pairs every attach with the card it produced so the matching
//! detach can find it. A detach for a device that never attached (or
//! already detached) falls through to the no-op delete.

use alloc::vec::Vec;

use pci_bus::{DeviceHandle, PciBus};

use crate::card::Card;
use crate::Result;

/// All cards currently managed by the driver.
#[derive(Default)]
pub struct SerialFcDriver {
    cards: Vec<Card>,
}

impl SerialFcDriver {
    pub fn new() -> Self {
        Self { cards: Vec::new() }
    }

    /// Attach event: build and register a card for `device`.
    ///
    /// Returns the number of usable ports on success.
    ///
    /// # Errors
    /// Propagates [`Card::create`] failures; the registry is unchanged on
    /// error.
    pub fn attach(&mut self, bus: &mut PciBus, device: DeviceHandle) -> Result<usize> {
        let card = Card::create(bus, device)?;
        let usable = card.ports().len();
        self.cards.push(card);
        Ok(usable)
    }

    /// Detach event: tear down the card for `device`, if one is live.
    pub fn detach(&mut self, bus: &mut PciBus, device: DeviceHandle) {
        let card = self
            .cards
            .iter()
            .position(|card| card.device() == device)
            .map(|at| self.cards.remove(at));
        Card::delete(bus, card);
    }

    /// The live card for `device`, if any.
    pub fn card(&self, device: DeviceHandle) -> Option<&Card> {
        self.cards.iter().find(|card| card.device() == device)
    }

    /// Number of live cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
