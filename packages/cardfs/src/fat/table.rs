use log::{debug, error};

use super::{
    le_u32, put_le_u32, FsError, Geometry, FAT32_EOC, FAT32_EOC_WRITE, FAT_ENTRIES_PER_BLOCK,
    FAT_ENTRY_MASK,
};
use crate::block::{Block, BlockDevice, BLOCK_SIZE};

/// One cached block of the first allocation table. Writes go to every copy.
pub(super) struct FatCache {
    index: Option<u32>,
    block: Block,
}

impl FatCache {
    pub(super) const fn new() -> Self {
        Self {
            index: None,
            block: [0; BLOCK_SIZE],
        }
    }

    fn load<D: BlockDevice>(&mut self, dev: &mut D, index: u32) -> Result<(), FsError> {
        if self.index == Some(index) {
            return Ok(());
        }
        self.index = None;
        dev.read_block(index, &mut self.block)?;
        self.index = Some(index);
        Ok(())
    }

    /// Writes the cached block to every table copy. On failure the cache is
    /// dropped so the next access rereads what the card actually holds.
    fn flush<D: BlockDevice>(&mut self, dev: &mut D, geometry: &Geometry) -> Result<(), FsError> {
        let Some(index) = self.index else {
            return Ok(());
        };
        for copy in 0..geometry.fat_count {
            let mirror = index.saturating_add(copy.saturating_mul(geometry.blocks_per_fat));
            if let Err(err) = dev.write_block(mirror, &self.block) {
                self.index = None;
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Returns one cluster to the free pool.
    pub(super) fn release<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
        cluster: u32,
    ) -> Result<(), FsError> {
        self.write_next(dev, geometry, cluster, 0)
    }

    fn entry(&self, slot: usize) -> u32 {
        le_u32(&self.block, slot * 4)
    }

    fn set_entry(&mut self, slot: usize, value: u32) {
        put_le_u32(&mut self.block, slot * 4, value);
    }

    pub(super) fn read_next<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
        cluster: u32,
    ) -> Result<u32, FsError> {
        let (index, slot) = locate(geometry, geometry.resolve(cluster))?;
        self.load(dev, index)?;
        Ok(self.entry(slot) & FAT_ENTRY_MASK)
    }

    /// Stores the low 28 bits of `value`; the reserved top bits are kept.
    pub(super) fn write_next<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
        cluster: u32,
        value: u32,
    ) -> Result<(), FsError> {
        let (index, slot) = locate(geometry, geometry.resolve(cluster))?;
        self.load(dev, index)?;
        let old = self.entry(slot);
        self.set_entry(slot, (old & !FAT_ENTRY_MASK) | (value & FAT_ENTRY_MASK));
        self.flush(dev, geometry)
    }

    /// Lowest free cluster. Exhaustion is terminal for the logger.
    pub(super) fn find_free<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
    ) -> Result<u32, FsError> {
        let max_cluster = geometry.max_cluster();
        for offset in 0..geometry.blocks_per_fat {
            let first = offset.saturating_mul(FAT_ENTRIES_PER_BLOCK);
            if first > max_cluster {
                break;
            }
            self.load(dev, geometry.fat_begin + offset)?;
            for slot in 0..FAT_ENTRIES_PER_BLOCK as usize {
                let cluster = first + slot as u32;
                if cluster < 2 {
                    continue;
                }
                if cluster > max_cluster {
                    break;
                }
                if self.entry(slot) & FAT_ENTRY_MASK == 0 {
                    return Ok(cluster);
                }
            }
        }
        error!(
            "fat: no free cluster among {} data clusters",
            geometry.cluster_count
        );
        Err(FsError::FilesystemFull)
    }

    /// Finds a free cluster and marks it as a one-cluster chain.
    pub(super) fn allocate<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
    ) -> Result<u32, FsError> {
        let cluster = self.find_free(dev, geometry)?;
        self.write_next(dev, geometry, cluster, FAT32_EOC_WRITE)?;
        debug!("fat: allocated cluster {}", cluster);
        Ok(cluster)
    }

    /// Zeroes every entry of the chain starting at `first`.
    ///
    /// A cached table block is written back only when the walk leaves it or
    /// the chain ends, so a chain inside one block costs one write per copy.
    pub(super) fn clear_chain<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geometry: &Geometry,
        first: u32,
    ) -> Result<(), FsError> {
        if first < 2 || first >= FAT32_EOC {
            return Ok(());
        }

        let max_cluster = geometry.max_cluster();
        let mut cluster = first;
        let mut visited = 0u32;
        loop {
            if visited > geometry.cluster_count.saturating_add(2) {
                self.flush(dev, geometry)?;
                return Err(FsError::ClusterChainTooLong);
            }
            visited = visited.saturating_add(1);

            let (index, slot) = locate(geometry, cluster)?;
            self.load(dev, index)?;
            let next = self.entry(slot) & FAT_ENTRY_MASK;
            self.set_entry(slot, 0);

            let done = next < 2 || next >= FAT32_EOC || next > max_cluster;
            let leaves_block = done
                || match locate(geometry, next) {
                    Ok((next_index, _)) => next_index != index,
                    Err(err) => {
                        // Unwritten zeroes must not outlive the failed walk.
                        self.index = None;
                        return Err(err);
                    }
                };
            if leaves_block {
                self.flush(dev, geometry)?;
            }
            if done {
                break;
            }
            cluster = next;
        }
        debug!("fat: cleared chain from {} ({} clusters)", first, visited);
        Ok(())
    }
}

/// Table block and slot holding the entry for `cluster`.
fn locate(geometry: &Geometry, cluster: u32) -> Result<(u32, usize), FsError> {
    let offset = cluster / FAT_ENTRIES_PER_BLOCK;
    if offset >= geometry.blocks_per_fat {
        return Err(FsError::BadCluster(cluster));
    }
    Ok((
        geometry.fat_begin + offset,
        (cluster % FAT_ENTRIES_PER_BLOCK) as usize,
    ))
}
