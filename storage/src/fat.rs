//! File Allocation Table over a byte-addressable store.
//!
//! Layout on the device:
//!
//! ```text
//! byte 0            live entry count (0xFF = never initialized, reads as 0)
//! bytes 1..161      MAX_FILES fixed-size entry slots (16 bytes each)
//! bytes 161..       file data, contiguous per file
//! ```
//!
//! File ranges are pairwise disjoint, lie entirely above the reserved FAT
//! region, and stay within device bounds. Free space is found by sorting
//! the live entries by data address and scanning the gaps in a fixed
//! order: head gap, gaps between consecutive files, tail gap.

use alloc::vec::Vec;

use crate::device::{StorageDevice, ERASE_BYTE};
use crate::FsError;

/// Maximum number of live files.
pub const MAX_FILES: usize = 10;

/// Maximum significant characters in a file name.
pub const NAME_LEN: usize = 11;

/// Device address of the persisted live-entry count.
const COUNT_ADDR: usize = 0;

/// Device address of the first entry slot.
const TABLE_ADDR: usize = 1;

/// First data byte, just past the reserved FAT region.
pub const DATA_START: usize = TABLE_ADDR + MAX_FILES * FatEntry::SIZE;

/// One FAT entry: a named, sized, contiguous byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    /// File name, NUL-padded.
    pub name: [u8; NAME_LEN + 1],
    /// First data byte on the device.
    pub addr: u16,
    /// Range length in bytes.
    pub size: u16,
}

impl FatEntry {
    /// On-disk entry size: name, then address and size big-endian.
    pub const SIZE: usize = 16;

    /// Build an entry. The name must already be validated.
    fn new(name: &str, addr: u16, size: u16) -> Self {
        let mut buf = [0u8; NAME_LEN + 1];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        FatEntry {
            name: buf,
            addr,
            size,
        }
    }

    /// File name as a string slice (up to the first NUL).
    pub fn name_str(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// One-past-the-end data address.
    pub fn end(&self) -> usize {
        self.addr as usize + self.size as usize
    }

    /// Read an entry from the device at `at`.
    fn read_from<D: StorageDevice>(device: &D, at: usize) -> Self {
        let mut name = [0u8; NAME_LEN + 1];
        for (i, cell) in name.iter_mut().enumerate() {
            *cell = device.read_byte(at + i);
        }
        let addr = u16::from_be_bytes([
            device.read_byte(at + NAME_LEN + 1),
            device.read_byte(at + NAME_LEN + 2),
        ]);
        let size = u16::from_be_bytes([
            device.read_byte(at + NAME_LEN + 3),
            device.read_byte(at + NAME_LEN + 4),
        ]);
        FatEntry { name, addr, size }
    }

    /// Write this entry to the device at `at`.
    fn write_to<D: StorageDevice>(&self, device: &mut D, at: usize) {
        for (i, &b) in self.name.iter().enumerate() {
            device.write_byte(at + i, b);
        }
        let addr = self.addr.to_be_bytes();
        let size = self.size.to_be_bytes();
        device.write_byte(at + NAME_LEN + 1, addr[0]);
        device.write_byte(at + NAME_LEN + 2, addr[1]);
        device.write_byte(at + NAME_LEN + 3, size[0]);
        device.write_byte(at + NAME_LEN + 4, size[1]);
    }
}

/// The file allocation table, owning its backing device.
///
/// Mutating operations keep an in-RAM mirror of the live entries and
/// rewrite the persisted table after every change, so the table survives
/// power loss at the granularity of whole operations.
pub struct Fat<D: StorageDevice> {
    device: D,
    entries: Vec<FatEntry>,
}

impl<D: StorageDevice> Fat<D> {
    /// Mount a device, initializing the table if the device is fresh.
    pub fn mount(mut device: D) -> Self {
        let mut count = device.read_byte(COUNT_ADDR) as usize;
        if count == ERASE_BYTE as usize {
            // Never initialized.
            device.write_byte(COUNT_ADDR, 0);
            count = 0;
        }
        let count = count.min(MAX_FILES);

        let mut entries = Vec::with_capacity(count);
        for slot in 0..count {
            entries.push(FatEntry::read_from(
                &device,
                TABLE_ADDR + slot * FatEntry::SIZE,
            ));
        }
        log::debug!("[FAT] Mounted, {} file(s)", entries.len());
        Fat { device, entries }
    }

    /// Number of live files.
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Live entries, in table order.
    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    /// Read one byte of the device (used by the interpreter's fetch).
    pub fn read_byte(&self, addr: usize) -> u8 {
        self.device.read_byte(addr)
    }

    /// The backing device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Unmount, giving the device back.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Find a live entry by name.
    pub fn find_entry(&self, name: &str) -> Option<&FatEntry> {
        self.entries.iter().find(|e| e.name_str() == name)
    }

    /// Store `data` as a new file of `size` bytes.
    ///
    /// Exactly `min(data.len(), size)` bytes are written; the remainder of
    /// the range keeps its prior contents. No state is mutated on failure.
    pub fn store(&mut self, name: &str, size: u16, data: &[u8]) -> Result<(), FsError> {
        if name.is_empty() || name.len() > NAME_LEN {
            return Err(FsError::Argument("file name"));
        }
        if size == 0 {
            return Err(FsError::Argument("size"));
        }
        if self.find_entry(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if self.entries.len() == MAX_FILES {
            return Err(FsError::TableFull);
        }
        let addr = self.find_free(size)?;

        self.entries.push(FatEntry::new(name, addr, size));
        self.flush_table();
        for (i, &b) in data.iter().take(size as usize).enumerate() {
            self.device.write_byte(addr as usize + i, b);
        }
        log::info!("[FAT] Stored \"{}\", {} bytes at {:#06x}", name, size, addr);
        Ok(())
    }

    /// Erase a file: fill its range with the erase value and close the
    /// gap in the entry table.
    pub fn erase(&mut self, name: &str) -> Result<(), FsError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.name_str() == name)
            .ok_or(FsError::NotFound)?;
        let entry = self.entries.remove(pos);
        self.device
            .erase_range(entry.addr as usize, entry.size as usize);
        self.flush_table();
        log::info!("[FAT] Erased \"{}\"", name);
        Ok(())
    }

    /// Read back a file's raw bytes.
    ///
    /// Cells holding the erase value are returned as-is; printing layers
    /// treat them as "no character", so files are effectively ASCII-safe
    /// only.
    pub fn retrieve(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let entry = self.find_entry(name).ok_or(FsError::NotFound)?;
        let mut data = Vec::with_capacity(entry.size as usize);
        for addr in entry.addr as usize..entry.end() {
            data.push(self.device.read_byte(addr));
        }
        Ok(data)
    }

    /// First address of a free run of at least `size` bytes.
    pub fn find_free(&mut self, size: u16) -> Result<u16, FsError> {
        self.sort_entries();
        self.gaps()
            .into_iter()
            .find(|&(_, len)| len >= size as usize)
            .map(|(addr, _)| addr as u16)
            .ok_or(FsError::NoSpace)
    }

    /// Size of the single largest free run (the `freespace` query).
    pub fn max_free(&mut self) -> usize {
        self.sort_entries();
        self.gaps().into_iter().map(|(_, len)| len).max().unwrap_or(0)
    }

    /// Total free bytes across all runs. Not all of this is reachable by
    /// one file if the data region is fragmented.
    pub fn total_free(&mut self) -> usize {
        self.sort_entries();
        self.gaps().into_iter().map(|(_, len)| len).sum()
    }

    /// Sort the live entries in place by ascending data address.
    ///
    /// Precondition for every gap computation; re-run whenever a file is
    /// added or removed.
    fn sort_entries(&mut self) {
        self.entries.sort_unstable_by_key(|e| e.addr);
    }

    /// Free runs as `(address, length)`, in scan order: head gap, gaps
    /// between consecutive files, tail gap. Requires sorted entries.
    fn gaps(&self) -> Vec<(usize, usize)> {
        // Addresses are 16-bit on disk, so cap the usable store.
        let store_end = self.device.len().min(u16::MAX as usize + 1);
        let mut gaps = Vec::new();
        let mut prev_end = DATA_START;
        for entry in &self.entries {
            let addr = entry.addr as usize;
            if addr > prev_end {
                gaps.push((prev_end, addr - prev_end));
            }
            prev_end = entry.end();
        }
        if store_end > prev_end {
            gaps.push((prev_end, store_end - prev_end));
        }
        gaps
    }

    /// Rewrite the persisted count and every entry slot; vacated trailing
    /// slots are blanked with the erase value.
    fn flush_table(&mut self) {
        self.device.write_byte(COUNT_ADDR, self.entries.len() as u8);
        for slot in 0..MAX_FILES {
            let at = TABLE_ADDR + slot * FatEntry::SIZE;
            match self.entries.get(slot) {
                Some(entry) => entry.write_to(&mut self.device, at),
                None => {
                    for i in 0..FatEntry::SIZE {
                        self.device.write_byte(at + i, ERASE_BYTE);
                    }
                }
            }
        }
    }
}
