use log::{debug, info};

use super::dir_scan::{self, chain_tail, put_cluster, put_size, DirEntry, EntryKind};
use super::{FsError, ShortName, Volume, FAT32_EOC, FAT32_EOC_WRITE};
use crate::block::{Block, BlockDevice, BLOCK_SIZE};

/// Streaming writer for one file in the current directory.
///
/// Holds the volume exclusively, so no other filesystem operation can run
/// until [`FileWriter::finish`] has recorded the final size.
pub struct FileWriter<'v, D> {
    volume: &'v mut Volume<D>,
    buf: Block,
    name: ShortName,
    dir_cluster: u32,
    first_cluster: u32,
    cluster: u32,
    block_offset: u32,
    offset: usize,
    size: u32,
}

impl<D: BlockDevice> Volume<D> {
    /// Creates `name` and positions a writer at its first byte.
    ///
    /// The first cluster is claimed before the entry is written, so a full
    /// card leaves no empty entry behind.
    pub fn start_new(&mut self, name: &str) -> Result<FileWriter<'_, D>, FsError> {
        let short = ShortName::new(name);
        if self.lookup_short(short)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let first = self.allocate_for_entry(short)?;
        let dir_cluster = self.cwd;
        debug!("writer: new {} first cluster {}", short, first);

        Ok(FileWriter {
            volume: self,
            buf: [0; BLOCK_SIZE],
            name: short,
            dir_cluster,
            first_cluster: first,
            cluster: first,
            block_offset: 0,
            offset: 0,
            size: 0,
        })
    }

    /// Positions a writer just past the last byte of an existing file.
    pub fn start_append(&mut self, name: &str) -> Result<FileWriter<'_, D>, FsError> {
        let short = ShortName::new(name);
        let entry = self
            .lookup_short(short)?
            .filter(DirEntry::is_file)
            .ok_or(FsError::NotFound)?;
        if entry.size == 0 {
            return Err(FsError::Empty);
        }
        if entry.cluster < 2 || entry.cluster >= FAT32_EOC {
            return Err(FsError::BadCluster(entry.cluster));
        }

        let mut buf = [0u8; BLOCK_SIZE];
        let (last, block_offset) = {
            let Self {
                dev, geometry, fat, ..
            } = &mut *self;
            let last = chain_tail(dev, fat, geometry, entry.cluster)?;
            let block_offset =
                ((entry.size - 1) / BLOCK_SIZE as u32) % geometry.blocks_per_cluster;
            dev.read_block(geometry.cluster_block(last) + block_offset, &mut buf)?;
            (last, block_offset)
        };
        // An exact multiple of the block size leaves the loaded block full.
        let offset = match entry.size as usize % BLOCK_SIZE {
            0 => BLOCK_SIZE,
            rem => rem,
        };
        let dir_cluster = self.cwd;
        debug!(
            "writer: append {} size {} last cluster {} block {}",
            short, entry.size, last, block_offset
        );

        Ok(FileWriter {
            volume: self,
            buf,
            name: short,
            dir_cluster,
            first_cluster: entry.cluster,
            cluster: last,
            block_offset,
            offset,
            size: entry.size,
        })
    }
}

impl<'v, D: BlockDevice> FileWriter<'v, D> {
    pub fn name(&self) -> &ShortName {
        &self.name
    }

    /// Bytes in the file so far, including anything still buffered.
    pub fn len(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn append(&mut self, mut bytes: &[u8]) -> Result<(), FsError> {
        while !bytes.is_empty() {
            if self.offset >= BLOCK_SIZE {
                self.advance()?;
            }
            let take = bytes.len().min(BLOCK_SIZE - self.offset);
            self.buf[self.offset..self.offset + take].copy_from_slice(&bytes[..take]);
            self.offset += take;
            self.size = self.size.saturating_add(take as u32);
            bytes = &bytes[take..];
        }
        Ok(())
    }

    /// Writes the buffered block and records size and first cluster in the
    /// directory entry. Returns the final size.
    pub fn finish(mut self) -> Result<u32, FsError> {
        self.flush_block()?;
        let Volume {
            dev,
            geometry,
            fat,
            dir,
            ..
        } = &mut *self.volume;
        fat.write_next(dev, geometry, self.cluster, FAT32_EOC_WRITE)?;

        let target = self.name;
        let found = dir_scan::for_each(dir, dev, fat, geometry, self.dir_cluster, |entry| {
            entry.kind == EntryKind::Regular && entry.name == target
        })?;
        let Some(mut slot) = found else {
            return Err(FsError::NotFound);
        };
        let raw = slot.slot_mut();
        put_size(raw, self.size);
        put_cluster(raw, self.first_cluster);
        slot.flush(dev)?;
        info!("writer: closed {} size {}", self.name, self.size);
        Ok(self.size)
    }

    fn flush_block(&mut self) -> Result<(), FsError> {
        let Volume { dev, geometry, .. } = &mut *self.volume;
        let index = geometry.cluster_block(self.cluster) + self.block_offset;
        dev.write_block(index, &self.buf)?;
        Ok(())
    }

    /// Flushes the full block and moves to the next one, growing the chain
    /// at a cluster boundary. State only changes once the move succeeded.
    fn advance(&mut self) -> Result<(), FsError> {
        self.flush_block()?;
        let Volume {
            dev, geometry, fat, ..
        } = &mut *self.volume;
        let mut next_block = self.block_offset + 1;
        if next_block >= geometry.blocks_per_cluster {
            let fresh = fat.allocate(dev, geometry)?;
            fat.write_next(dev, geometry, self.cluster, fresh)?;
            self.cluster = fresh;
            next_block = 0;
        }
        self.block_offset = next_block;
        self.offset = 0;
        self.buf = [0; BLOCK_SIZE];
        Ok(())
    }
}
