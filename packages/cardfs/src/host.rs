//! Host-side block devices and a FAT32 formatter for tests and tooling.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
    vec,
    vec::Vec,
};

use crate::block::{Block, BlockDevice, BlockError, BLOCK_SIZE};

/// Vec-backed card image.
pub struct RamDisk {
    blocks: Vec<Block>,
    writes: usize,
    fail_writes: bool,
}

impl RamDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; block_count as usize],
            writes: 0,
            fail_writes: false,
        }
    }

    pub fn block(&self, index: u32) -> &Block {
        &self.blocks[index as usize]
    }

    pub fn block_mut(&mut self, index: u32) -> &mut Block {
        &mut self.blocks[index as usize]
    }

    /// Successful block writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Make every following write fail as if the card rejected it.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        let block = self
            .blocks
            .get(index as usize)
            .ok_or(BlockError::ReadFailed)?;
        out.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        if self.fail_writes {
            return Err(BlockError::WriteRejected(0x0D));
        }
        let block = self
            .blocks
            .get_mut(index as usize)
            .ok_or(BlockError::WriteRejected(0))?;
        block.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

/// A raw card image on the host filesystem, e.g. `dd if=/dev/sdX`.
pub struct ImageFile {
    file: File,
    block_count: u32,
}

impl ImageFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let block_count = (file.metadata()?.len() / BLOCK_SIZE as u64) as u32;
        Ok(Self { file, block_count })
    }

    /// Creates (or truncates) a zero-filled image of `block_count` blocks.
    pub fn create(path: impl AsRef<Path>, block_count: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(u64::from(block_count) * BLOCK_SIZE as u64)?;
        Ok(Self { file, block_count })
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    fn seek_to(&mut self, index: u32) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(u64::from(index) * BLOCK_SIZE as u64))
            .map(|_| ())
    }
}

impl BlockDevice for ImageFile {
    fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        if index >= self.block_count {
            return Err(BlockError::ReadFailed);
        }
        self.seek_to(index)
            .and_then(|()| self.file.read_exact(out))
            .map_err(|_| BlockError::ReadFailed)
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        if index >= self.block_count {
            return Err(BlockError::WriteRejected(0));
        }
        self.seek_to(index)
            .and_then(|()| self.file.write_all(data))
            .map_err(|_| BlockError::WriteRejected(0))
    }
}

/// First block of the partition [`format_volume`] lays out.
pub const FORMAT_PARTITION_START: u32 = 8;
const FORMAT_RESERVED_BLOCKS: u32 = 32;
const FORMAT_FAT_COUNT: u32 = 2;
const FORMAT_ROOT_CLUSTER: u32 = 2;

/// Writes an MBR with one FAT32 (LBA) partition and an empty file system.
///
/// The table layout matches what card formatters produce closely enough for
/// the mount path; cluster-count limits of the FAT32 type are not enforced so
/// small test images stay small.
pub fn format_volume<D: BlockDevice>(
    dev: &mut D,
    total_blocks: u32,
    blocks_per_cluster: u8,
) -> Result<(), BlockError> {
    let partition_blocks = total_blocks.saturating_sub(FORMAT_PARTITION_START);
    let bpc = u32::from(blocks_per_cluster.max(1));

    let mut blocks_per_fat = 1u32;
    loop {
        let data = partition_blocks
            .saturating_sub(FORMAT_RESERVED_BLOCKS + FORMAT_FAT_COUNT * blocks_per_fat);
        let clusters = data / bpc;
        let needed = ((clusters + 2) * 4).div_ceil(BLOCK_SIZE as u32);
        if needed <= blocks_per_fat {
            break;
        }
        blocks_per_fat = needed;
    }

    let mut block = [0u8; BLOCK_SIZE];
    let entry = 446;
    block[entry + 4] = 0x0C;
    block[entry + 8..entry + 12].copy_from_slice(&FORMAT_PARTITION_START.to_le_bytes());
    block[entry + 12..entry + 16].copy_from_slice(&partition_blocks.to_le_bytes());
    block[510] = 0x55;
    block[511] = 0xAA;
    dev.write_block(0, &block)?;

    let mut boot = [0u8; BLOCK_SIZE];
    boot[..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    boot[3..11].copy_from_slice(b"CARDFS  ");
    boot[0x0B..0x0D].copy_from_slice(&(BLOCK_SIZE as u16).to_le_bytes());
    boot[0x0D] = bpc as u8;
    boot[0x0E..0x10].copy_from_slice(&(FORMAT_RESERVED_BLOCKS as u16).to_le_bytes());
    boot[0x10] = FORMAT_FAT_COUNT as u8;
    boot[0x15] = 0xF8;
    boot[0x20..0x24].copy_from_slice(&partition_blocks.to_le_bytes());
    boot[0x24..0x28].copy_from_slice(&blocks_per_fat.to_le_bytes());
    boot[0x2C..0x30].copy_from_slice(&FORMAT_ROOT_CLUSTER.to_le_bytes());
    boot[0x30..0x32].copy_from_slice(&1u16.to_le_bytes());
    boot[0x32..0x34].copy_from_slice(&6u16.to_le_bytes());
    boot[0x40] = 0x80;
    boot[0x42] = 0x29;
    boot[0x47..0x52].copy_from_slice(b"NO NAME    ");
    boot[0x52..0x5A].copy_from_slice(b"FAT32   ");
    boot[510] = 0x55;
    boot[511] = 0xAA;
    dev.write_block(FORMAT_PARTITION_START, &boot)?;

    let zero = [0u8; BLOCK_SIZE];
    for reserved in 1..FORMAT_RESERVED_BLOCKS {
        dev.write_block(FORMAT_PARTITION_START + reserved, &zero)?;
    }

    let fat_begin = FORMAT_PARTITION_START + FORMAT_RESERVED_BLOCKS;
    let mut first_fat_block = [0u8; BLOCK_SIZE];
    first_fat_block[0..4].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
    first_fat_block[4..8].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    first_fat_block[8..12].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    for copy in 0..FORMAT_FAT_COUNT {
        let base = fat_begin + copy * blocks_per_fat;
        dev.write_block(base, &first_fat_block)?;
        for offset in 1..blocks_per_fat {
            dev.write_block(base + offset, &zero)?;
        }
    }

    let cluster_begin = fat_begin + FORMAT_FAT_COUNT * blocks_per_fat;
    for offset in 0..bpc {
        dev.write_block(cluster_begin + offset, &zero)?;
    }
    Ok(())
}
