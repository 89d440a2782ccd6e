//! Integration tests for the card lifecycle core
//!
//! These tests exercise the end-to-end attach/detach workflows:
//! - Variant dispatch against the descriptor table
//! - Resource acquisition order and reverse-order unwinding
//! - Best-effort port construction and the degraded-port condition
//! - Allocate/release balance across full lifecycles
//! - Isolation between independently managed devices

use pci_bus::{DeviceHandle, FaultInjection, PciBus, PciDevice};
use serialfc::board::{
    COMMTECH_VENDOR_ID, FC_232_8_PCI_335_ID, FC_422_2_PCI_335_ID, FC_422_4_PCIE_ID,
    FC_422_4_PCI_335_ID,
};
use serialfc::{Card, CardError, SerialFcDriver, SubsysError};

fn attach_device(bus: &mut PciBus, device_id: u16, bar0_size: usize) -> DeviceHandle {
    bus.attach(PciDevice::new(COMMTECH_VENDOR_ID, device_id).with_bar(0, 0xFEBC_0000, bar0_size))
}

/// A recognized identifier selects the documented geometry and lays the
/// ports out at `base + uart_offset * i`.
#[test]
fn test_create_selects_documented_geometry() {
    let mut bus = PciBus::new();
    let h = attach_device(&mut bus, FC_422_4_PCIE_ID, 0x1000);

    let card = Card::create(&mut bus, h).expect("create failed");

    assert_eq!(card.board().num_ports, 4);
    assert_eq!(card.board().base_baud, 7_812_500);
    assert_eq!(card.board().uart_offset, 0x400);

    assert_eq!(card.ports().len(), 4);
    for (i, port) in card.ports().iter().enumerate() {
        assert_eq!(port.index(), i);
        assert_eq!(port.register_base(), card.bar().vaddr + 0x400 * i);
    }

    Card::delete(&mut bus, Some(card));
}

/// create followed by delete leaves zero live mappings, zero live engine
/// handles, and a cleared back-reference.
#[test]
fn test_full_lifecycle_releases_everything() {
    let mut bus = PciBus::new();
    let h = attach_device(&mut bus, FC_422_2_PCI_335_ID, 0x1000);

    let card = Card::create(&mut bus, h).expect("create failed");
    assert_eq!(bus.stats().subsys_live, 1);
    assert_eq!(bus.stats().mapped_live, 1);
    assert!(bus.drvdata(h).is_some());

    Card::delete(&mut bus, Some(card));

    let stats = bus.stats();
    assert_eq!(stats.subsys_live, 0);
    assert_eq!(stats.mapped_live, 0);
    assert_eq!(stats.iomap_calls, stats.iounmap_calls);
    assert!(bus.drvdata(h).is_none());
}

#[test]
fn test_unrecognized_variant_is_rejected() {
    let mut bus = PciBus::new();
    let h = attach_device(&mut bus, 0x9999, 0x1000);

    let err = Card::create(&mut bus, h).unwrap_err();

    assert!(matches!(
        err,
        CardError::UnrecognizedVariant {
            vendor: COMMTECH_VENDOR_ID,
            device: 0x9999
        }
    ));
    assert_eq!(bus.stats().subsys_live, 0);
    assert_eq!(bus.stats().mapped_live, 0);
    assert!(bus.drvdata(h).is_none());
}

/// Injected engine-init failure propagates with zero net resource change.
#[test]
fn test_subsystem_init_failure_unwinds() {
    let mut bus = PciBus::new();
    let h = bus.attach(
        PciDevice::new(COMMTECH_VENDOR_ID, FC_422_2_PCI_335_ID)
            .with_bar(0, 0xFEBC_0000, 0x1000)
            .with_faults(FaultInjection::SUBSYS_INIT),
    );

    let err = Card::create(&mut bus, h).unwrap_err();

    assert!(matches!(
        err,
        CardError::SubsystemInit(SubsysError::Faulted)
    ));
    assert_eq!(bus.stats().subsys_live, 0);
    assert_eq!(bus.stats().mapped_live, 0);
    assert!(bus.drvdata(h).is_none());
}

/// Injected BAR-map failure releases the already-initialized engine and
/// the published back-reference before propagating.
#[test]
fn test_mmio_map_failure_unwinds() {
    let mut bus = PciBus::new();
    let h = bus.attach(
        PciDevice::new(COMMTECH_VENDOR_ID, FC_422_2_PCI_335_ID)
            .with_bar(0, 0xFEBC_0000, 0x1000)
            .with_faults(FaultInjection::BAR_MAP),
    );

    let err = Card::create(&mut bus, h).unwrap_err();

    assert!(matches!(err, CardError::MmioMap { bar: 0, .. }));
    assert_eq!(bus.stats().subsys_live, 0);
    assert_eq!(bus.stats().mapped_live, 0);
    assert!(bus.drvdata(h).is_none());
}

#[test]
fn test_delete_absent_card_is_noop() {
    let mut bus = PciBus::new();
    Card::delete(&mut bus, None);

    let mut driver = SerialFcDriver::new();
    let h = attach_device(&mut bus, FC_422_2_PCI_335_ID, 0x1000);
    driver.detach(&mut bus, h); // never attached
    assert!(driver.is_empty());
}

/// An undersized BAR window degrades the card instead of failing it: the
/// channels that fit come up, the rest are counted as skipped.
#[test]
fn test_degraded_port_count_small_bar() {
    let mut bus = PciBus::new();
    // 8-port board, but the window only holds 4 banks of 0x200 bytes.
    let h = attach_device(&mut bus, FC_232_8_PCI_335_ID, 0x800);

    let card = Card::create(&mut bus, h).expect("degraded create must succeed");

    assert_eq!(card.ports().len(), 4);
    assert_eq!(card.skipped_ports(), 4);
    for (i, port) in card.ports().iter().enumerate() {
        assert_eq!(port.index(), i);
    }

    // delete is total over degraded cards too.
    Card::delete(&mut bus, Some(card));
    assert_eq!(bus.stats().subsys_live, 0);
    assert_eq!(bus.stats().mapped_live, 0);
}

/// A single dead channel is skipped and the loop continues: indices stay
/// strictly ascending around the hole.
#[test]
fn test_failed_port_is_skipped() {
    let mut bus = PciBus::new();
    let h = bus.attach(
        PciDevice::new(COMMTECH_VENDOR_ID, FC_422_4_PCI_335_ID)
            .with_bar(0, 0xFEBC_0000, 0x1000)
            .with_failed_ports(0b0010),
    );

    let card = Card::create(&mut bus, h).expect("create failed");

    assert_eq!(card.skipped_ports(), 1);
    let indices: Vec<usize> = card.ports().iter().map(|p| p.index()).collect();
    assert_eq!(indices, vec![0, 2, 3]);

    Card::delete(&mut bus, Some(card));
}

/// Two devices through independent cycles never share or corrupt each
/// other's ports or mappings.
#[test]
fn test_two_devices_are_independent() {
    let mut bus = PciBus::new();
    let mut driver = SerialFcDriver::new();

    let a = bus.attach(
        PciDevice::new(COMMTECH_VENDOR_ID, FC_422_2_PCI_335_ID).with_bar(0, 0xFEBC_0000, 0x1000),
    );
    let b = bus.attach(
        PciDevice::new(COMMTECH_VENDOR_ID, FC_232_8_PCI_335_ID).with_bar(0, 0xFEBD_0000, 0x1000),
    );

    assert_eq!(driver.attach(&mut bus, a).unwrap(), 2);
    assert_eq!(driver.attach(&mut bus, b).unwrap(), 8);
    assert_eq!(driver.len(), 2);
    assert_ne!(bus.drvdata(a), bus.drvdata(b));

    // The two cards' windows must not overlap.
    let (card_a, card_b) = (driver.card(a).unwrap(), driver.card(b).unwrap());
    let a_end = card_a.bar().vaddr + card_a.bar().size;
    assert!(a_end <= card_b.bar().vaddr);

    driver.detach(&mut bus, a);
    assert_eq!(driver.len(), 1);
    assert!(bus.drvdata(a).is_none());

    // Card B is untouched by A's teardown.
    let card_b = driver.card(b).unwrap();
    assert_eq!(card_b.ports().len(), 8);
    assert!(bus.drvdata(b).is_some());

    driver.detach(&mut bus, b);
    assert!(driver.is_empty());
    assert_eq!(bus.stats().subsys_live, 0);
    assert_eq!(bus.stats().mapped_live, 0);
}

/// The driver registry reports usable port counts from attach and serves
/// card lookups by device.
#[test]
fn test_driver_registry_roundtrip() {
    let mut bus = PciBus::new();
    let mut driver = SerialFcDriver::new();
    let h = attach_device(&mut bus, FC_422_4_PCI_335_ID, 0x1000);

    let usable = driver.attach(&mut bus, h).unwrap();
    assert_eq!(usable, 4);
    assert_eq!(driver.card(h).unwrap().device(), h);

    driver.detach(&mut bus, h);
    assert!(driver.card(h).is_none());
}
