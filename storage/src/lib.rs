//! Storage subsystem for ByteOS.
//!
//! This crate provides the storage subsystem including:
//! - Byte-addressable storage device contract and a RAM-backed device
//! - File Allocation Table (FAT) over contiguous byte ranges
//!
//! The FAT lives at the head of the store and survives power loss; its
//! live-entry count is the first byte of the device.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod device;
pub mod fat;

pub use device::{RamDevice, StorageDevice, ERASE_BYTE};
pub use fat::{Fat, FatEntry, MAX_FILES, NAME_LEN};

use core::fmt;

/// Storage subsystem error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Missing or malformed argument.
    Argument(&'static str),
    /// No file with the given name.
    NotFound,
    /// A file with the given name already exists.
    AlreadyExists,
    /// The FAT has no free entry slot.
    TableFull,
    /// No contiguous free run of the requested size.
    NoSpace,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Argument(what) => write!(f, "invalid argument: {}", what),
            FsError::NotFound => write!(f, "file not found"),
            FsError::AlreadyExists => write!(f, "file already exists"),
            FsError::TableFull => write!(f, "file table is full"),
            FsError::NoSpace => write!(f, "not enough free space"),
        }
    }
}
