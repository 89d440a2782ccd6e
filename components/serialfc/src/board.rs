//! Board Descriptor Table - per-variant timing and geometry configuration
//!
//! One immutable record per supported hardware variant: port count, base
//! clock, register stride/shift/offset, and the flag word naming which
//! BAR carries the UART register banks. Everything here is fixed at
//! compile time.
//!
//! Dispatch is an exact lookup: an identifier not in the table yields
//! `None`, and callers must treat that as a hard failure. Every later
//! lifecycle step dereferences descriptor fields, so proceeding without
//! one is never an option.

use bitflags::bitflags;
use static_assertions::const_assert;

/// Commtech PCI vendor ID.
pub const COMMTECH_VENDOR_ID: u16 = 0x18F7;

/// 2-port RS-422 PCI-335 adapter.
pub const FC_422_2_PCI_335_ID: u16 = 0x0004;
/// 4-port RS-422 PCI-335 adapter.
pub const FC_422_4_PCI_335_ID: u16 = 0x0002;
/// 4-port RS-232 PCI-335 adapter (same board as the RS-422 variant).
pub const FC_232_4_PCI_335_ID: u16 = 0x000A;
/// 8-port RS-232 PCI-335 adapter.
pub const FC_232_8_PCI_335_ID: u16 = 0x000B;
/// 2-port RS-422 PCIe adapter.
pub const FC_422_2_PCIE_ID: u16 = 0x0021;
/// 4-port RS-422 PCIe adapter.
pub const FC_422_4_PCIE_ID: u16 = 0x0020;
/// 8-port RS-422 PCIe adapter.
pub const FC_422_8_PCIE_ID: u16 = 0x0022;

bitflags! {
    /// Descriptor flag word. The low three bits encode which BAR holds
    /// the UART register banks; `FL_BASE0` is the zero value of that
    /// field, not a discrete bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BoardFlags: u32 {
        const FL_BASE0 = 0;
        const FL_BASE1 = 1;
        const FL_BASE2 = 2;
        const FL_BASE3 = 3;
        const FL_BASE_MASK = 0x7;
    }
}

impl BoardFlags {
    /// BAR index of the UART register banks.
    pub const fn base_bar(self) -> usize {
        (self.bits() & Self::FL_BASE_MASK.bits()) as usize
    }
}

/// Immutable per-variant configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardDescriptor {
    /// Flag word; currently only the base-BAR-index field is used.
    pub flags: BoardFlags,

    /// Number of UART channels on the board.
    pub num_ports: usize,

    /// Base clock in Hz.
    pub base_baud: u32,

    /// Byte stride between consecutive channels' register banks.
    pub uart_offset: usize,

    /// Register address shift within a bank.
    pub reg_shift: u32,

    /// Offset of the first channel's bank within the BAR window.
    pub first_offset: usize,
}

/// 2-port PCI-335 boards.
pub const FC_2_PCI_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 2,
    base_baud: 1_152_000,
    uart_offset: 0x200,
    reg_shift: 0,
    first_offset: 0,
};

/// 4-port PCI-335 boards (sold under two device IDs).
pub const FC_4_PCI_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 4,
    base_baud: 1_152_000,
    uart_offset: 0x200,
    reg_shift: 0,
    first_offset: 0,
};

/// 8-port PCI-335 boards.
pub const FC_8_PCI_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 8,
    base_baud: 1_152_000,
    uart_offset: 0x200,
    reg_shift: 0,
    first_offset: 0,
};

/// 2-port PCIe boards: wider register stride, higher clock.
pub const FC_2_PCIE_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 2,
    base_baud: 7_812_500,
    uart_offset: 0x400,
    reg_shift: 0,
    first_offset: 0,
};

/// 4-port PCIe boards.
pub const FC_4_PCIE_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 4,
    base_baud: 7_812_500,
    uart_offset: 0x400,
    reg_shift: 0,
    first_offset: 0,
};

/// 8-port PCIe boards.
pub const FC_8_PCIE_BOARD: BoardDescriptor = BoardDescriptor {
    flags: BoardFlags::FL_BASE0,
    num_ports: 8,
    base_baud: 7_812_500,
    uart_offset: 0x400,
    reg_shift: 0,
    first_offset: 0,
};

const_assert!(FC_2_PCI_BOARD.num_ports > 0);
const_assert!(FC_4_PCI_BOARD.num_ports > 0);
const_assert!(FC_8_PCI_BOARD.num_ports > 0);
const_assert!(FC_2_PCIE_BOARD.num_ports > 0);
const_assert!(FC_4_PCIE_BOARD.num_ports > 0);
const_assert!(FC_8_PCIE_BOARD.num_ports > 0);
const_assert!(FC_2_PCI_BOARD.base_baud > 0 && FC_2_PCI_BOARD.uart_offset > 0);
const_assert!(FC_2_PCIE_BOARD.base_baud > 0 && FC_2_PCIE_BOARD.uart_offset > 0);

impl BoardDescriptor {
    /// Exact lookup of the descriptor for a device-variant identifier.
    ///
    /// Two identifiers may share one descriptor (the 4-port PCI-335 board
    /// ships as both an RS-422 and an RS-232 SKU). Identifiers not in the
    /// table return `None`.
    pub fn lookup(vendor: u16, device: u16) -> Option<&'static BoardDescriptor> {
        if vendor != COMMTECH_VENDOR_ID {
            return None;
        }
        match device {
            FC_422_2_PCI_335_ID => Some(&FC_2_PCI_BOARD),
            FC_422_4_PCI_335_ID | FC_232_4_PCI_335_ID => Some(&FC_4_PCI_BOARD),
            FC_232_8_PCI_335_ID => Some(&FC_8_PCI_BOARD),
            FC_422_2_PCIE_ID => Some(&FC_2_PCIE_BOARD),
            FC_422_4_PCIE_ID => Some(&FC_4_PCIE_BOARD),
            FC_422_8_PCIE_ID => Some(&FC_8_PCIE_BOARD),
            _ => None,
        }
    }
}
