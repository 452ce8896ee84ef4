//! Minimal FAT32 over raw 512-byte blocks.
//!
//! Two block buffers do all the work: [`table::FatCache`] holds one
//! allocation-table block, [`dir_scan::DirBuffer`] holds one directory or data
//! block. Every operation flushes its own mutations before returning, and the
//! `&mut self` receivers keep a second operation from starting in between.

use core::fmt;

use log::warn;

use crate::block::{BlockDevice, BlockError, BLOCK_SIZE};

mod dir_ops;
mod dir_scan;
mod mount;
mod names;
mod table;
mod writer;

#[cfg(test)]
mod tests;

pub use dir_scan::{DirEntry, EntryKind};
pub use mount::{Geometry, MountOptions, MutationPolicy};
pub use names::ShortName;
pub use writer::FileWriter;

use dir_scan::DirBuffer;
use table::FatCache;

const DIR_ENTRY_SIZE: usize = 32;
const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
const FAT_ENTRIES_PER_BLOCK: u32 = (BLOCK_SIZE / 4) as u32;
/// Any link value at or above this ends a chain.
pub const FAT32_EOC: u32 = 0x0FFF_FFF8;
pub const FAT32_EOC_WRITE: u32 = 0x0FFF_FFFF;
const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;
const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_VOLUME: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const DELETED_MARKER: u8 = 0xE5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    Block(BlockError),
    BadSignature,
    UnsupportedPartitionType(u8),
    UnsupportedSectorSize(u16),
    UnsupportedClusterSize(u8),
    /// No free cluster left in the allocation table. Terminal.
    FilesystemFull,
    AlreadyExists,
    NotFound,
    /// Append target exists but holds no data yet.
    Empty,
    LookupFailed,
    BadCluster(u32),
    ClusterChainTooLong,
}

impl From<BlockError> for FsError {
    fn from(value: BlockError) -> Self {
        Self::Block(value)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block(err) => write!(f, "{}", err),
            Self::BadSignature => f.write_str("missing boot signature"),
            Self::UnsupportedPartitionType(ty) => {
                write!(f, "unsupported partition type {:#04x}", ty)
            }
            Self::UnsupportedSectorSize(size) => write!(f, "unsupported sector size {}", size),
            Self::UnsupportedClusterSize(size) => {
                write!(f, "unsupported blocks per cluster {}", size)
            }
            Self::FilesystemFull => f.write_str("filesystem is full"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::NotFound => f.write_str("not found"),
            Self::Empty => f.write_str("file is empty"),
            Self::LookupFailed => f.write_str("new entry lookup failed"),
            Self::BadCluster(cluster) => write!(f, "bad cluster {:#x}", cluster),
            Self::ClusterChainTooLong => f.write_str("cluster chain too long"),
        }
    }
}

impl core::error::Error for FsError {}

/// A mounted FAT32 volume and the process-wide current-directory cursor.
pub struct Volume<D> {
    dev: D,
    geometry: Geometry,
    fat: FatCache,
    dir: DirBuffer,
    cwd: u32,
    options: MountOptions,
}

impl<D: BlockDevice> Volume<D> {
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn options(&self) -> MountOptions {
        self.options
    }

    pub fn current_directory(&self) -> u32 {
        self.cwd
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn into_device(self) -> D {
        self.dev
    }

    /// Applies the mount's mutation policy to a name-based mutation result.
    fn settle(&self, op: &str, result: Result<(), FsError>) -> Result<(), FsError> {
        match (self.options.policy, result) {
            (MutationPolicy::FireAndForget, Err(FsError::Block(err))) => {
                warn!("fat: {} ignored block error {:?}", op, err);
                Ok(())
            }
            (_, result) => result,
        }
    }
}

fn le_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn put_le_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_le_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
