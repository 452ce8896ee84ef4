use super::{
    le_u16, le_u32, put_le_u16, put_le_u32, FatCache, FsError, Geometry, ShortName,
    ATTR_DIRECTORY, ATTR_LONG_NAME, ATTR_VOLUME, DELETED_MARKER, DIR_ENTRIES_PER_BLOCK,
    DIR_ENTRY_SIZE, FAT32_EOC,
};
use crate::block::{Block, BlockDevice, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    LongNameFragment,
    VolumeLabel,
    Deleted,
    EndOfDirectory,
}

/// One decoded 32-byte directory slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: ShortName,
    pub attr: u8,
    /// First cluster; only meaningful for [`EntryKind::Regular`].
    pub cluster: u32,
    pub size: u32,
}

impl DirEntry {
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[..11]);
        let attr = raw[11];
        let kind = match raw[0] {
            DELETED_MARKER => EntryKind::Deleted,
            0x00 => EntryKind::EndOfDirectory,
            _ if attr & ATTR_LONG_NAME == ATTR_LONG_NAME => EntryKind::LongNameFragment,
            _ if attr & ATTR_VOLUME != 0 => EntryKind::VolumeLabel,
            _ => EntryKind::Regular,
        };
        let (cluster, size) = if kind == EntryKind::Regular {
            let cluster = (u32::from(le_u16(raw, 0x14)) << 16) | u32::from(le_u16(raw, 0x1A));
            (cluster, le_u32(raw, 0x1C))
        } else {
            (0, 0)
        };
        Self {
            kind,
            name: ShortName::from_raw(name),
            attr,
            cluster,
            size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Regular && self.attr & ATTR_DIRECTORY != 0
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::Regular && self.attr & ATTR_DIRECTORY == 0
    }
}

pub(super) fn put_cluster(slot: &mut [u8], cluster: u32) {
    put_le_u16(slot, 0x14, (cluster >> 16) as u16);
    put_le_u16(slot, 0x1A, cluster as u16);
}

pub(super) fn put_size(slot: &mut [u8], size: u32) {
    put_le_u32(slot, 0x1C, size);
}

/// Shared buffer for directory and file data blocks.
pub(super) struct DirBuffer {
    index: Option<u32>,
    block: Block,
}

impl DirBuffer {
    pub(super) const fn new() -> Self {
        Self {
            index: None,
            block: [0; BLOCK_SIZE],
        }
    }

    /// Always rereads; data blocks can be rewritten behind the buffer.
    pub(super) fn load<D: BlockDevice>(&mut self, dev: &mut D, index: u32) -> Result<(), FsError> {
        self.index = None;
        dev.read_block(index, &mut self.block)?;
        self.index = Some(index);
        Ok(())
    }

    /// Retargets the buffer at `index` with zeroed contents.
    pub(super) fn reset(&mut self, index: u32) {
        self.block = [0; BLOCK_SIZE];
        self.index = Some(index);
    }

    pub(super) fn flush<D: BlockDevice>(&mut self, dev: &mut D) -> Result<(), FsError> {
        if let Some(index) = self.index {
            dev.write_block(index, &self.block)?;
        }
        Ok(())
    }

    pub(super) fn bytes(&self) -> &Block {
        &self.block
    }

    pub(super) fn bytes_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

/// A slot the scan stopped on, still sitting in the shared buffer.
pub(super) struct DirMatch<'b> {
    buf: &'b mut DirBuffer,
    entry: DirEntry,
    cluster: u32,
    block_offset: u32,
    offset: usize,
}

impl<'b> DirMatch<'b> {
    pub(super) fn entry(&self) -> &DirEntry {
        &self.entry
    }

    /// Cluster holding the slot.
    pub(super) fn cluster(&self) -> u32 {
        self.cluster
    }

    /// Block index of the slot within its cluster.
    pub(super) fn block_offset(&self) -> u32 {
        self.block_offset
    }

    /// Byte offset of the slot within its block.
    pub(super) fn offset(&self) -> usize {
        self.offset
    }

    pub(super) fn slot_mut(&mut self) -> &mut [u8] {
        &mut self.buf.block[self.offset..self.offset + DIR_ENTRY_SIZE]
    }

    pub(super) fn flush<D: BlockDevice>(self, dev: &mut D) -> Result<(), FsError> {
        self.buf.flush(dev)
    }

    pub(super) fn into_buffer(self) -> &'b mut DirBuffer {
        self.buf
    }
}

/// Walks the directory chain starting at `start`, decoding each slot and
/// handing it to `predicate`. Stops at the first slot the predicate accepts,
/// at the end-of-directory slot, or when the chain ends.
pub(super) fn for_each<'b, D, F>(
    buf: &'b mut DirBuffer,
    dev: &mut D,
    fat: &mut FatCache,
    geometry: &Geometry,
    start: u32,
    mut predicate: F,
) -> Result<Option<DirMatch<'b>>, FsError>
where
    D: BlockDevice,
    F: FnMut(&DirEntry) -> bool,
{
    let mut cluster = geometry.resolve(start);
    let mut visited = 0u32;

    loop {
        if visited > geometry.cluster_count.saturating_add(2) {
            return Err(FsError::ClusterChainTooLong);
        }
        visited = visited.saturating_add(1);

        let first = geometry.cluster_block(cluster);
        for block_offset in 0..geometry.blocks_per_cluster {
            buf.load(dev, first + block_offset)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let offset = slot * DIR_ENTRY_SIZE;
                let entry = DirEntry::decode(&buf.block[offset..offset + DIR_ENTRY_SIZE]);
                if predicate(&entry) {
                    return Ok(Some(DirMatch {
                        buf,
                        entry,
                        cluster,
                        block_offset,
                        offset,
                    }));
                }
                if entry.kind == EntryKind::EndOfDirectory {
                    return Ok(None);
                }
            }
        }

        let next = fat.read_next(dev, geometry, cluster)?;
        if next < 2 || next >= FAT32_EOC {
            return Ok(None);
        }
        cluster = next;
    }
}

/// Last cluster of the chain starting at `start`.
pub(super) fn chain_tail<D: BlockDevice>(
    dev: &mut D,
    fat: &mut FatCache,
    geometry: &Geometry,
    start: u32,
) -> Result<u32, FsError> {
    let mut cluster = geometry.resolve(start);
    let mut visited = 0u32;
    loop {
        if visited > geometry.cluster_count.saturating_add(2) {
            return Err(FsError::ClusterChainTooLong);
        }
        visited = visited.saturating_add(1);

        let next = fat.read_next(dev, geometry, cluster)?;
        if next < 2 || next >= FAT32_EOC {
            return Ok(cluster);
        }
        if next > geometry.max_cluster() {
            return Err(FsError::BadCluster(next));
        }
        cluster = next;
    }
}
