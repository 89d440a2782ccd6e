//! Card Lifecycle - create and delete of one adapter function
//!
//! # Purpose
//! A [`Card`] owns everything one physical adapter function needs: the
//! mapped register window, the ordered port collection, and the
//! multi-UART engine handle. It keeps a non-owning handle to the device
//! record for logging and for publishing/clearing the device's
//! driver-private pointer.
//!
//! # Failure Discipline
//! [`Card::create`] acquires resources in a fixed order; every fatal
//! failure unwinds in reverse order before it propagates, so an `Err`
//! return leaves zero net resource change on the bus. The
//! port-construction loop is the one best-effort stage: a channel that
//! fails to construct is skipped and counted, never fatal.

use alloc::vec::Vec;
use log::{debug, error, warn};
use pci_bus::{DeviceHandle, MappedRegion, PciBus};

use crate::board::BoardDescriptor;
use crate::pciserial::{self, SerialPriv};
use crate::port::Port;
use crate::{CardError, Result};

/// One physical adapter function and everything it owns.
#[derive(Debug)]
pub struct Card {
    /// Non-owning back-reference; the bus owns the device record.
    device: DeviceHandle,

    /// Resolved variant configuration.
    board: &'static BoardDescriptor,

    /// Exclusively owned mapping of the UART register window.
    bar: MappedRegion,

    /// Channels in ascending index order.
    ports: Vec<Port>,

    /// Exclusively owned multi-UART engine handle.
    serial_priv: SerialPriv,

    /// Channels that failed construction and were skipped.
    skipped_ports: usize,
}

impl Card {
    /// Build the card for an attached device.
    ///
    /// Steps, each unwound on failure before the error propagates:
    /// resolve the board descriptor, reserve the port collection, bring
    /// up the multi-UART engine, publish its token as the device's
    /// driver-private data, map the descriptor's base BAR, then construct
    /// one [`Port`] per channel (best effort).
    ///
    /// # Errors
    /// See [`CardError`]; on any error nothing acquired by this call
    /// remains reachable or allocated.
    pub fn create(bus: &mut PciBus, device: DeviceHandle) -> Result<Card> {
        let (vendor, device_id) = {
            let dev = bus.device(device)?;
            (dev.vendor_id(), dev.device_id())
        };

        // Exact variant dispatch; unknown identifiers must never proceed
        // to descriptor dereferences.
        let board = BoardDescriptor::lookup(vendor, device_id).ok_or(
            CardError::UnrecognizedVariant {
                vendor,
                device: device_id,
            },
        )?;

        // Reserve the collection up front so allocator exhaustion is an
        // explicit error instead of an abort mid-build.
        let mut ports: Vec<Port> = Vec::new();
        ports
            .try_reserve_exact(board.num_ports)
            .map_err(|_| CardError::Allocation)?;

        let serial_priv = match pciserial::init_ports(bus, device, board) {
            Ok(handle) => handle,
            Err(source) => {
                error!("serialfc: engine init failed for {:?}: {}", device, source);
                return Err(CardError::SubsystemInit(source));
            }
        };

        // Publish the engine token so later lookups by device recover it.
        if let Err(source) = bus.set_drvdata(device, serial_priv.token()) {
            pciserial::remove_ports(bus, serial_priv);
            return Err(CardError::Bus(source));
        }

        let bar_index = board.flags.base_bar();
        let bar = match bus.iomap(device, bar_index) {
            Ok(region) => region,
            Err(source) => {
                error!(
                    "serialfc: BAR {} mapping failed for {:?}: {}",
                    bar_index, device, source
                );
                // Reverse-order unwind of the publish and init steps.
                bus.clear_drvdata(device);
                pciserial::remove_ports(bus, serial_priv);
                return Err(CardError::MmioMap {
                    bar: bar_index,
                    source,
                });
            }
        };

        // Best-effort channel construction: a failed index is skipped and
        // counted, the rest of the board stays usable.
        let mut skipped_ports = 0;
        match bus.device(device) {
            Ok(dev) => {
                for i in 0..board.num_ports {
                    let reg_base = bar.vaddr + board.uart_offset * i;
                    match Port::new(dev, i, reg_base, board.uart_offset, &bar) {
                        Ok(port) => ports.push(port),
                        Err(e) => {
                            warn!("serialfc: skipping channel on {:?}: {}", device, e);
                            skipped_ports += 1;
                        }
                    }
                }
            }
            // The handle was validated above and devices are never
            // detached from the bus; treat the impossible as all-skipped
            // rather than unwinding a usable engine.
            Err(_) => skipped_ports = board.num_ports,
        }

        if skipped_ports > 0 {
            warn!(
                "serialfc: {:?} degraded: {}/{} channels unusable",
                device, skipped_ports, board.num_ports
            );
        }
        debug!(
            "serialfc: card up on {:?} ({} ports @ {} Hz)",
            device,
            ports.len(),
            board.base_baud
        );

        Ok(Card {
            device,
            board,
            bar,
            ports,
            serial_priv,
            skipped_ports,
        })
    }

    /// Tear down a card produced by [`Card::create`].
    ///
    /// `None` is the detach-without-attach case and is a no-op. Ports are
    /// destroyed first in ascending index order, then the engine handle
    /// is released, the window unmapped, and the device's driver-private
    /// pointer cleared. Total: never fails, including on cards with a
    /// degraded port count. Consuming the card by value makes a second
    /// delete of the same card a compile-time error.
    pub fn delete(bus: &mut PciBus, card: Option<Card>) {
        let Some(mut card) = card else { return };

        // drain() removes each entry as it is visited, so the collection
        // ends empty with no dangling entries whatever happens next.
        for port in card.ports.drain(..) {
            port.destroy();
        }

        pciserial::remove_ports(bus, card.serial_priv);
        bus.iounmap(card.bar);
        bus.clear_drvdata(card.device);
        debug!("serialfc: card down on {:?}", card.device);
    }

    /// The device this card serves.
    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    /// The resolved board descriptor.
    pub fn board(&self) -> &'static BoardDescriptor {
        self.board
    }

    /// The mapped register window.
    pub fn bar(&self) -> &MappedRegion {
        &self.bar
    }

    /// Constructed channels, ascending index order.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Channels skipped during construction.
    pub fn skipped_ports(&self) -> usize {
        self.skipped_ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{self, COMMTECH_VENDOR_ID};
    use pci_bus::PciDevice;

    fn bus_with(device: PciDevice) -> (PciBus, DeviceHandle) {
        let mut bus = PciBus::new();
        let handle = bus.attach(device);
        (bus, handle)
    }

    #[test]
    fn test_create_port_geometry() {
        let (mut bus, h) = bus_with(
            PciDevice::new(COMMTECH_VENDOR_ID, board::FC_232_8_PCI_335_ID)
                .with_bar(0, 0xFEBC_0000, 0x1000),
        );

        let card = Card::create(&mut bus, h).unwrap();

        assert_eq!(card.board().num_ports, 8);
        assert_eq!(card.ports().len(), 8);
        assert_eq!(card.skipped_ports(), 0);
        for (i, port) in card.ports().iter().enumerate() {
            assert_eq!(port.index(), i);
            assert_eq!(
                port.register_base(),
                card.bar().vaddr + card.board().uart_offset * i
            );
        }

        Card::delete(&mut bus, Some(card));
    }

    #[test]
    fn test_create_publishes_drvdata() {
        let (mut bus, h) = bus_with(
            PciDevice::new(COMMTECH_VENDOR_ID, board::FC_422_2_PCI_335_ID)
                .with_bar(0, 0xFEBC_0000, 0x1000),
        );

        let card = Card::create(&mut bus, h).unwrap();
        assert!(bus.drvdata(h).is_some());

        Card::delete(&mut bus, Some(card));
        assert!(bus.drvdata(h).is_none());
    }

    #[test]
    fn test_unrecognized_variant_leaves_no_state() {
        let (mut bus, h) =
            bus_with(PciDevice::new(COMMTECH_VENDOR_ID, 0x7777).with_bar(0, 0xFEBC_0000, 0x1000));

        let result = Card::create(&mut bus, h);

        assert!(matches!(
            result,
            Err(CardError::UnrecognizedVariant {
                vendor: COMMTECH_VENDOR_ID,
                device: 0x7777
            })
        ));
        assert_eq!(bus.stats().subsys_live, 0);
        assert_eq!(bus.stats().mapped_live, 0);
        assert!(bus.drvdata(h).is_none());
    }

    #[test]
    fn test_delete_none_is_noop() {
        let mut bus = PciBus::new();
        Card::delete(&mut bus, None);
    }
}
