use log::{debug, warn};

use super::{
    le_u16, le_u32, DirBuffer, FatCache, FsError, Volume, FAT_ENTRIES_PER_BLOCK, FAT_ENTRY_MASK,
};
use crate::block::{BlockDevice, BLOCK_SIZE};

const MBR_PARTITION_TABLE: usize = 446;
const MBR_PARTITION_ENTRY: usize = 16;
const MBR_PARTITION_SLOTS: u8 = 4;
const BOOT_SIGNATURE: u16 = 0xAA55;
const PARTITION_FAT32_CHS: u8 = 0x0B;
const PARTITION_FAT32_LBA: u8 = 0x0C;

/// Block addresses derived from the boot record, fixed for the mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub partition_begin: u32,
    pub fat_begin: u32,
    pub cluster_begin: u32,
    pub root_cluster: u32,
    pub blocks_per_fat: u32,
    pub blocks_per_cluster: u32,
    pub fat_count: u32,
    /// Data clusters addressable by the table, numbered from 2.
    pub cluster_count: u32,
}

impl Geometry {
    /// Cluster numbers 0 and 1 stand for the root directory.
    pub fn resolve(&self, cluster: u32) -> u32 {
        if cluster < 2 {
            self.root_cluster
        } else {
            cluster & FAT_ENTRY_MASK
        }
    }

    pub fn cluster_block(&self, cluster: u32) -> u32 {
        let index = self.resolve(cluster).saturating_sub(2);
        self.cluster_begin
            .saturating_add(index.saturating_mul(self.blocks_per_cluster))
    }

    pub fn cluster_bytes(&self) -> u32 {
        self.blocks_per_cluster * BLOCK_SIZE as u32
    }

    pub fn max_cluster(&self) -> u32 {
        self.cluster_count.saturating_add(1)
    }
}

/// What create, rename and delete do with a failed block transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Log the block error and report success.
    #[default]
    FireAndForget,
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Primary partition slot in the MBR, 0..=3.
    pub partition: u8,
    pub policy: MutationPolicy,
}

impl MountOptions {
    pub const fn strict(mut self) -> Self {
        self.policy = MutationPolicy::Strict;
        self
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Reads the MBR and the FAT32 boot record and sets the cursor to root.
    pub fn mount(mut dev: D, options: MountOptions) -> Result<Self, FsError> {
        let mut block = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut block)?;
        if le_u16(&block, 510) != BOOT_SIGNATURE {
            return Err(FsError::BadSignature);
        }
        if options.partition >= MBR_PARTITION_SLOTS {
            return Err(FsError::UnsupportedPartitionType(0));
        }

        let entry = MBR_PARTITION_TABLE + MBR_PARTITION_ENTRY * options.partition as usize;
        let part_type = block[entry + 4];
        if part_type != PARTITION_FAT32_CHS && part_type != PARTITION_FAT32_LBA {
            return Err(FsError::UnsupportedPartitionType(part_type));
        }
        let partition_begin = le_u32(&block, entry + 8);

        dev.read_block(partition_begin, &mut block)?;
        let geometry = parse_boot_record(partition_begin, &block)?;
        debug!(
            "fat: mounted partition={} fat_begin={} cluster_begin={} root={} bpc={} clusters={}",
            options.partition,
            geometry.fat_begin,
            geometry.cluster_begin,
            geometry.root_cluster,
            geometry.blocks_per_cluster,
            geometry.cluster_count
        );

        Ok(Self {
            dev,
            geometry,
            fat: FatCache::new(),
            dir: DirBuffer::new(),
            cwd: geometry.root_cluster,
            options,
        })
    }
}

fn parse_boot_record(partition_begin: u32, boot: &[u8]) -> Result<Geometry, FsError> {
    let bytes_per_sector = le_u16(boot, 0x0B);
    if bytes_per_sector != BLOCK_SIZE as u16 {
        return Err(FsError::UnsupportedSectorSize(bytes_per_sector));
    }
    if le_u16(boot, 510) != BOOT_SIGNATURE {
        return Err(FsError::BadSignature);
    }

    let blocks_per_cluster = boot[0x0D];
    if blocks_per_cluster == 0 || !blocks_per_cluster.is_power_of_two() {
        return Err(FsError::UnsupportedClusterSize(blocks_per_cluster));
    }
    let fat_count = boot[0x10];
    if fat_count != 2 {
        warn!("fat: boot record lists {} tables, expected 2", fat_count);
    }
    let fat_count = u32::from(fat_count.max(1));

    let reserved = u32::from(le_u16(boot, 0x0E));
    let blocks_per_fat = le_u32(boot, 0x24);
    let root_cluster = le_u32(boot, 0x2C);
    let total_16 = u32::from(le_u16(boot, 0x13));
    let total_blocks = if total_16 != 0 {
        total_16
    } else {
        le_u32(boot, 0x20)
    };

    let fat_begin = partition_begin.saturating_add(reserved);
    let tables = blocks_per_fat.saturating_mul(fat_count);
    let cluster_begin = fat_begin.saturating_add(tables);
    let data_blocks = total_blocks.saturating_sub(reserved.saturating_add(tables));
    let cluster_count = (data_blocks / u32::from(blocks_per_cluster)).min(
        blocks_per_fat
            .saturating_mul(FAT_ENTRIES_PER_BLOCK)
            .saturating_sub(2),
    );

    Ok(Geometry {
        partition_begin,
        fat_begin,
        cluster_begin,
        root_cluster,
        blocks_per_fat,
        blocks_per_cluster: u32::from(blocks_per_cluster),
        fat_count,
        cluster_count,
    })
}
