use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use cardfs::{
    host::{format_volume, ImageFile},
    session, DirEntry, MountOptions, Volume,
};

use crate::logging::Logger;

pub struct ImageOptions {
    pub image: PathBuf,
    /// Slash-separated directory path to enter after mounting.
    pub dir: Option<String>,
    pub strict: bool,
    pub partition: u8,
}

pub struct FormatOptions {
    pub image: PathBuf,
    pub blocks: u32,
    pub cluster_blocks: u8,
}

pub fn open_volume(options: &ImageOptions) -> Result<Volume<ImageFile>> {
    let image = ImageFile::open(&options.image)
        .with_context(|| format!("open image {}", options.image.display()))?;
    let mut mount_options = MountOptions {
        partition: options.partition,
        ..MountOptions::default()
    };
    if options.strict {
        mount_options = mount_options.strict();
    }
    let mut volume = Volume::mount(image, mount_options)
        .with_context(|| format!("mount {}", options.image.display()))?;

    if let Some(dir) = &options.dir {
        for part in dir.split('/').filter(|part| !part.is_empty()) {
            volume
                .change_directory(part)
                .with_context(|| format!("enter directory `{part}`"))?;
        }
    }
    Ok(volume)
}

pub fn run_format(logger: &mut Logger, options: FormatOptions) -> Result<()> {
    if options.image.exists() {
        logger.warn(format!("Overwriting {}", options.image.display()));
    }
    let mut image = ImageFile::create(&options.image, options.blocks)
        .with_context(|| format!("create image {}", options.image.display()))?;
    format_volume(&mut image, options.blocks, options.cluster_blocks)
        .context("write file system")?;
    logger.info(format!(
        "Formatted {} ({} blocks, {} blocks per cluster)",
        options.image.display(),
        image.block_count(),
        options.cluster_blocks
    ));
    Ok(())
}

pub fn list_entries(options: &ImageOptions) -> Result<Vec<DirEntry>> {
    let mut volume = open_volume(options)?;
    let mut entries = Vec::new();
    volume
        .list(|entry| entries.push(*entry))
        .context("list directory")?;
    Ok(entries)
}

pub fn run_ls(logger: &mut Logger, options: &ImageOptions) -> Result<()> {
    for entry in list_entries(options)? {
        if entry.is_dir() {
            logger.info(format!("{:>10}  {}", "<DIR>", entry.name));
        } else {
            logger.info(format!("{:>10}  {}", entry.size, entry.name));
        }
    }
    Ok(())
}

pub fn run_mkdir(logger: &mut Logger, options: &ImageOptions, name: &str) -> Result<()> {
    let mut volume = open_volume(options)?;
    volume
        .make_directory(name)
        .with_context(|| format!("mkdir `{name}`"))?;
    logger.info(format!("Created directory {name}"));
    Ok(())
}

fn default_name(src: &Path) -> Result<String> {
    src.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .with_context(|| format!("no file name in {}", src.display()))
}

pub fn run_put(
    logger: &mut Logger,
    options: &ImageOptions,
    src: &Path,
    name: Option<&str>,
) -> Result<u32> {
    let data = fs::read(src).with_context(|| format!("read {}", src.display()))?;
    let name = match name {
        Some(name) => name.to_owned(),
        None => default_name(src)?,
    };
    let mut volume = open_volume(options)?;
    let size = write_new(&mut volume, &name, &data)?;
    logger.info(format!("Wrote {name} ({size} bytes)"));
    Ok(size)
}

fn write_new(volume: &mut Volume<ImageFile>, name: &str, data: &[u8]) -> Result<u32> {
    let mut writer = volume
        .start_new(name)
        .with_context(|| format!("create `{name}`"))?;
    writer.append(data).with_context(|| format!("write `{name}`"))?;
    Ok(writer.finish()?)
}

pub fn run_append(
    logger: &mut Logger,
    options: &ImageOptions,
    src: &Path,
    name: &str,
) -> Result<u32> {
    let data = fs::read(src).with_context(|| format!("read {}", src.display()))?;
    let mut volume = open_volume(options)?;
    let mut writer = volume
        .start_append(name)
        .with_context(|| format!("open `{name}` for append"))?;
    writer.append(&data).with_context(|| format!("write `{name}`"))?;
    let size = writer.finish()?;
    logger.info(format!("Appended {} bytes to {name} ({size} bytes)", data.len()));
    Ok(size)
}

pub fn run_cat(options: &ImageOptions, name: &str, out: &mut impl Write) -> Result<u32> {
    let mut volume = open_volume(options)?;
    let mut write_result = Ok(());
    let size = volume
        .read_file(name, |chunk| {
            if write_result.is_ok() {
                write_result = out.write_all(chunk);
            }
        })
        .with_context(|| format!("read `{name}`"))?;
    write_result.context("write output")?;
    Ok(size)
}

pub fn run_rm(logger: &mut Logger, options: &ImageOptions, name: &str) -> Result<()> {
    let mut volume = open_volume(options)?;
    match volume.lookup(name)? {
        None => bail!("no such entry `{name}`"),
        Some(entry) if entry.is_dir() => bail!("`{name}` is a directory"),
        Some(_) => {}
    }
    volume
        .delete(name)
        .with_context(|| format!("delete `{name}`"))?;
    logger.info(format!("Deleted {name}"));
    Ok(())
}

pub fn run_mv(logger: &mut Logger, options: &ImageOptions, from: &str, to: &str) -> Result<()> {
    let mut volume = open_volume(options)?;
    if !volume.exists(from)? {
        bail!("no such entry `{from}`");
    }
    volume
        .rename(from, to)
        .with_context(|| format!("rename `{from}` to `{to}`"))?;
    logger.info(format!("Renamed {from} to {to}"));
    Ok(())
}

/// Opens the next numbered session, copies `files` into it and leaves it.
pub fn run_session(logger: &mut Logger, options: &ImageOptions, files: &[PathBuf]) -> Result<u32> {
    let mut volume = open_volume(options)?;
    let number = session::open_next_session(&mut volume).context("open session")?;
    for src in files {
        let data = fs::read(src).with_context(|| format!("read {}", src.display()))?;
        let name = default_name(src)?;
        write_new(&mut volume, &name, &data)?;
    }
    session::close_session(&mut volume).context("close session")?;
    logger.info(format!("Session {number} ({} files)", files.len()));
    Ok(number)
}
