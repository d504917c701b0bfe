// fatkit-filesystems: read/write driver for the FAT12/16/32 family over a
// single block-addressable image file.

pub mod device_io;
pub mod fat;

pub use fat::volume::FatVolume;
pub use fatkit_core::{FatError, FatVersion, FileInfo, VolumeInfo};
