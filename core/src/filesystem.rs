use serde::{Deserialize, Serialize};
use std::fmt;

/// Which member of the FAT family a mounted volume uses.
///
/// The variant is determined solely by the total cluster count of the
/// volume, never by the textual filesystem-type label in the boot sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatVersion {
    Fat12,
    Fat16,
    Fat32,
}

impl fmt::Display for FatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatVersion::Fat12 => write!(f, "FAT12"),
            FatVersion::Fat16 => write!(f, "FAT16"),
            FatVersion::Fat32 => write!(f, "FAT32"),
        }
    }
}

/// Capacity summary of a mounted volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub fs_type: FatVersion,
    pub label: Option<String>,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub cluster_size: u32,
}

/// One record of a directory listing.
///
/// Timestamps are epoch seconds composed in local civil time; the access
/// stamp has date resolution only, so its time-of-day is always midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub created: i64,
    pub modified: i64,
    pub accessed: i64,
    pub size: u64,
    pub is_directory: bool,
}
