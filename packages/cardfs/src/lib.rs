#![no_std]

#[cfg(any(test, feature = "host"))]
extern crate std;

pub mod block;
pub mod fat;
#[cfg(any(test, feature = "host"))]
pub mod host;
pub mod probe;
pub mod session;

pub use block::{Block, BlockDevice, BlockError, BLOCK_SIZE};
pub use fat::{
    DirEntry, EntryKind, FileWriter, FsError, Geometry, MountOptions, MutationPolicy, ShortName,
    Volume,
};
pub use probe::{InitError, SdCard};
