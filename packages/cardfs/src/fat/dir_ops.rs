use log::{debug, info, warn};

use super::dir_scan::{self, put_cluster, put_size, DirEntry, EntryKind};
use super::{
    FsError, ShortName, Volume, ATTR_DIRECTORY, DELETED_MARKER, DIR_ENTRY_SIZE, FAT32_EOC,
    FAT32_EOC_WRITE,
};
use crate::block::{BlockDevice, BLOCK_SIZE};

fn named(target: ShortName) -> impl FnMut(&DirEntry) -> bool {
    move |entry| entry.kind == EntryKind::Regular && entry.name == target
}

fn reusable(entry: &DirEntry) -> bool {
    matches!(entry.kind, EntryKind::Deleted | EntryKind::EndOfDirectory)
}

impl<D: BlockDevice> Volume<D> {
    /// Looks `name` up in the current directory.
    pub fn lookup(&mut self, name: &str) -> Result<Option<DirEntry>, FsError> {
        self.lookup_short(ShortName::new(name))
    }

    pub fn exists(&mut self, name: &str) -> Result<bool, FsError> {
        Ok(self.lookup(name)?.is_some())
    }

    pub(super) fn lookup_short(&mut self, name: ShortName) -> Result<Option<DirEntry>, FsError> {
        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;
        let found = dir_scan::for_each(dir, dev, fat, geometry, *cwd, named(name))?;
        Ok(found.map(|slot| *slot.entry()))
    }

    /// Visits every live entry of the current directory in on-disk order.
    pub fn list<F>(&mut self, mut visit: F) -> Result<(), FsError>
    where
        F: FnMut(&DirEntry),
    {
        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;
        dir_scan::for_each(dir, dev, fat, geometry, *cwd, |entry| {
            if entry.kind == EntryKind::Regular {
                visit(entry);
            }
            false
        })?;
        Ok(())
    }

    /// Largest number the name of a current-directory entry starts with, 0 if none.
    pub fn highest_numeric_name(&mut self) -> Result<u32, FsError> {
        let mut highest = 0u32;
        self.list(|entry| {
            if let Some(number) = entry.name.leading_number() {
                highest = highest.max(number);
            }
        })?;
        Ok(highest)
    }

    /// Adds an empty file entry. Does not check for an existing entry.
    pub fn create(&mut self, name: &str) -> Result<(), FsError> {
        let result = self.create_short(ShortName::new(name));
        self.settle("create", result)
    }

    pub(super) fn create_short(&mut self, name: ShortName) -> Result<(), FsError> {
        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;

        let found = dir_scan::for_each(dir, dev, fat, geometry, *cwd, reusable)?;
        let mut slot = match found {
            Some(slot) => slot,
            None => {
                // Every slot of the chain is live: grow it by one zeroed cluster.
                let tail = dir_scan::chain_tail(dev, fat, geometry, *cwd)?;
                let fresh = fat.allocate(dev, geometry)?;
                fat.write_next(dev, geometry, tail, fresh)?;
                let first = geometry.cluster_block(fresh);
                for block in 0..geometry.blocks_per_cluster {
                    dir.reset(first + block);
                    dir.flush(dev)?;
                }
                dir_scan::for_each(dir, dev, fat, geometry, *cwd, reusable)?
                    .ok_or(FsError::LookupFailed)?
            }
        };

        let was_end = slot.entry().kind == EntryKind::EndOfDirectory;
        let dir_cluster = slot.cluster();
        let block_offset = slot.block_offset();
        let next_offset = slot.offset() + DIR_ENTRY_SIZE;
        {
            let raw = slot.slot_mut();
            raw.fill(0);
            raw[..11].copy_from_slice(name.as_bytes());
            put_cluster(raw, FAT32_EOC_WRITE);
            put_size(raw, 0);
        }
        debug!("fat: create {} in cluster {}", name, dir_cluster);

        if !was_end {
            return slot.flush(dev);
        }

        let buf = slot.into_buffer();
        if next_offset < BLOCK_SIZE {
            buf.bytes_mut()[next_offset] = 0x00;
            return buf.flush(dev);
        }

        // The terminator moves to the start of the next block.
        buf.flush(dev)?;
        let next_block = if block_offset + 1 < geometry.blocks_per_cluster {
            geometry.cluster_block(dir_cluster) + block_offset + 1
        } else {
            let fresh = fat.allocate(dev, geometry)?;
            fat.write_next(dev, geometry, dir_cluster, fresh)?;
            geometry.cluster_block(fresh)
        };
        buf.reset(next_block);
        buf.flush(dev)
    }

    /// Renames a current-directory entry. Blank targets and missing sources
    /// are ignored.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), FsError> {
        let new = ShortName::new(new);
        if new.is_blank() {
            return Ok(());
        }
        let result = self.rename_short(ShortName::new(old), new);
        self.settle("rename", result)
    }

    fn rename_short(&mut self, old: ShortName, new: ShortName) -> Result<(), FsError> {
        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;
        let Some(mut slot) = dir_scan::for_each(dir, dev, fat, geometry, *cwd, named(old))? else {
            return Ok(());
        };
        slot.slot_mut()[..11].copy_from_slice(new.as_bytes());
        debug!("fat: rename {} -> {}", old, new);
        slot.flush(dev)
    }

    /// Deletes a file and frees its clusters. Directories are left alone.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let result = self.delete_short(ShortName::new(name));
        self.settle("delete", result)
    }

    fn delete_short(&mut self, name: ShortName) -> Result<(), FsError> {
        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;
        let Some(mut slot) = dir_scan::for_each(dir, dev, fat, geometry, *cwd, named(name))? else {
            return Ok(());
        };
        let entry = *slot.entry();
        if !entry.is_file() {
            return Ok(());
        }
        if entry.cluster >= 2 && entry.cluster < FAT32_EOC {
            fat.clear_chain(dev, geometry, entry.cluster)?;
        }
        slot.slot_mut()[0] = DELETED_MARKER;
        debug!("fat: delete {} ({} bytes)", name, entry.size);
        slot.flush(dev)
    }

    /// Moves the cursor into a subdirectory, or up with `..`.
    pub fn change_directory(&mut self, name: &str) -> Result<(), FsError> {
        let entry = self
            .lookup(name)?
            .filter(DirEntry::is_dir)
            .ok_or(FsError::NotFound)?;
        self.cwd = self.geometry.resolve(entry.cluster);
        debug!("fat: cd {} -> cluster {}", name, self.cwd);
        Ok(())
    }

    /// Claims a cluster, then adds the entry for `name`. A failed entry write
    /// hands the cluster back.
    pub(super) fn allocate_for_entry(&mut self, name: ShortName) -> Result<u32, FsError> {
        let fresh = {
            let Self {
                dev, geometry, fat, ..
            } = &mut *self;
            fat.allocate(dev, geometry)?
        };
        if let Err(err) = self.create_short(name) {
            let Self {
                dev, geometry, fat, ..
            } = self;
            if let Err(release_err) = fat.release(dev, geometry, fresh) {
                warn!("fat: leaked cluster {} ({:?})", fresh, release_err);
            }
            return Err(err);
        }
        Ok(fresh)
    }

    /// Creates a subdirectory with `.` and `..` entries. The cursor stays put.
    pub fn make_directory(&mut self, name: &str) -> Result<(), FsError> {
        let short = ShortName::new(name);
        if self.lookup_short(short)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let fresh = self.allocate_for_entry(short)?;

        let Self {
            dev,
            geometry,
            fat,
            dir,
            cwd,
            ..
        } = self;
        let parent = *cwd;
        let Some(mut slot) = dir_scan::for_each(dir, dev, fat, geometry, parent, named(short))?
        else {
            return Err(FsError::LookupFailed);
        };
        {
            let raw = slot.slot_mut();
            raw[11] = ATTR_DIRECTORY;
            put_cluster(raw, fresh);
        }
        slot.flush(dev)?;

        let first = geometry.cluster_block(fresh);
        for block in 1..geometry.blocks_per_cluster {
            dir.reset(first + block);
            dir.flush(dev)?;
        }
        dir.reset(first);
        let block = dir.bytes_mut();
        write_dot_entry(&mut block[..DIR_ENTRY_SIZE], ShortName::DOT, fresh);
        // A parent at the root is recorded as cluster 0.
        let parent_on_disk = if parent == geometry.root_cluster {
            0
        } else {
            parent
        };
        write_dot_entry(
            &mut block[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE],
            ShortName::DOTDOT,
            parent_on_disk,
        );
        dir.flush(dev)?;
        info!("fat: mkdir {} at cluster {}", short, fresh);
        Ok(())
    }

    /// Streams the contents of a current-directory file to `visit`, one
    /// block-sized chunk at a time. Returns the file size.
    pub fn read_file<F>(&mut self, name: &str, mut visit: F) -> Result<u32, FsError>
    where
        F: FnMut(&[u8]),
    {
        let entry = self
            .lookup(name)?
            .filter(DirEntry::is_file)
            .ok_or(FsError::NotFound)?;
        if entry.size == 0 {
            return Ok(0);
        }

        let Self {
            dev,
            geometry,
            fat,
            dir,
            ..
        } = self;
        let mut remaining = entry.size as usize;
        let mut cluster = entry.cluster;
        let mut visited = 0u32;
        loop {
            if cluster < 2 || cluster > geometry.max_cluster() {
                return Err(FsError::BadCluster(cluster));
            }
            if visited > geometry.cluster_count {
                return Err(FsError::ClusterChainTooLong);
            }
            visited = visited.saturating_add(1);

            let first = geometry.cluster_block(cluster);
            for block in 0..geometry.blocks_per_cluster {
                dir.load(dev, first + block)?;
                let take = remaining.min(BLOCK_SIZE);
                visit(&dir.bytes()[..take]);
                remaining -= take;
                if remaining == 0 {
                    return Ok(entry.size);
                }
            }
            cluster = fat.read_next(dev, geometry, cluster)?;
        }
    }
}

fn write_dot_entry(raw: &mut [u8], name: ShortName, cluster: u32) {
    raw[..11].copy_from_slice(name.as_bytes());
    raw[11] = ATTR_DIRECTORY;
    put_cluster(raw, cluster);
}
