//! Byte-addressable storage device contract.
//!
//! Everything above this layer (the FAT, the interpreter's program fetch)
//! talks to the persistent store exclusively through [`StorageDevice`].
//! Real targets back it with an EEPROM or flash part; tests and hosts use
//! [`RamDevice`].

/// Value of an erased (or factory-fresh) cell.
pub const ERASE_BYTE: u8 = 0xFF;

/// Byte-addressable persistent store.
///
/// Addresses outside `0..len()` are a contract violation; implementations
/// must not panic on them, but may silently drop the access.
pub trait StorageDevice {
    /// Read one byte.
    fn read_byte(&self, addr: usize) -> u8;

    /// Write one byte.
    fn write_byte(&mut self, addr: usize, byte: u8);

    /// Device capacity in bytes.
    fn len(&self) -> usize;

    /// Check if the device has zero capacity.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `[start, start + count)` with the erase value.
    fn erase_range(&mut self, start: usize, count: usize) {
        for addr in start..start.saturating_add(count) {
            self.write_byte(addr, ERASE_BYTE);
        }
    }
}

/// RAM-backed storage device.
///
/// Behaves like a factory-fresh EEPROM: every cell starts out erased.
pub struct RamDevice<const N: usize> {
    cells: [u8; N],
}

impl<const N: usize> RamDevice<N> {
    /// Create a device with all cells erased.
    pub fn new() -> Self {
        RamDevice {
            cells: [ERASE_BYTE; N],
        }
    }
}

impl<const N: usize> Default for RamDevice<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StorageDevice for RamDevice<N> {
    fn read_byte(&self, addr: usize) -> u8 {
        if addr < N {
            self.cells[addr]
        } else {
            log::warn!("[Storage] read past device end: {:#06x}", addr);
            ERASE_BYTE
        }
    }

    fn write_byte(&mut self, addr: usize, byte: u8) {
        if addr < N {
            self.cells[addr] = byte;
        } else {
            log::warn!("[Storage] write past device end: {:#06x}", addr);
        }
    }

    fn len(&self) -> usize {
        N
    }
}
