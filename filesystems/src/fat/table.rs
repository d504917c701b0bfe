// The in-memory file allocation table.
//
// The buffer holds the PRIMARY FAT copy and is authoritative for the whole
// session: every mutation lands here first and reaches the disk (all
// copies) when the volume flushes. The three entry encodings are dispatched
// on the variant tag behind one get/set/find_free/is_end_of_chain surface.

use fatkit_core::{FatError, FatVersion};
use log::trace;

/// Cluster value for a free entry.
pub const FREE_CLUSTER: u32 = 0;

/// First cluster index that can hold data.
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// End-of-chain boundary per variant; any value at or above it terminates
/// a chain.
pub fn end_of_chain_boundary(version: FatVersion) -> u32 {
    match version {
        FatVersion::Fat12 => 0x0FF8,
        FatVersion::Fat16 => 0xFFF8,
        FatVersion::Fat32 => 0x0FFF_FFF8,
    }
}

/// Bad-cluster marker per variant; terminates a chain but is never handed
/// out by the allocator.
pub fn bad_cluster_marker(version: FatVersion) -> u32 {
    match version {
        FatVersion::Fat12 => 0x0FF7,
        FatVersion::Fat16 => 0xFFF7,
        FatVersion::Fat32 => 0x0FFF_FFF7,
    }
}

pub struct FatTable {
    data: Vec<u8>,
    version: FatVersion,
    /// Highest cluster index get/set/find_free will touch.
    max_cluster: u32,
}

impl FatTable {
    /// Wrap a raw FAT buffer; every entry the buffer can hold is
    /// addressable.
    pub fn new(data: Vec<u8>, version: FatVersion) -> Self {
        let max_cluster = Self::buffer_entries(data.len(), version).saturating_sub(1);
        Self {
            data,
            version,
            max_cluster,
        }
    }

    /// Wrap a raw FAT buffer, additionally capping the addressable range at
    /// `max_cluster` (the volume's last data cluster). The buffer routinely
    /// has slack entries past the data region; they must never be handed
    /// out.
    pub fn with_cluster_limit(data: Vec<u8>, version: FatVersion, max_cluster: u32) -> Self {
        let mut table = Self::new(data, version);
        table.max_cluster = table.max_cluster.min(max_cluster);
        table
    }

    fn buffer_entries(len: usize, version: FatVersion) -> u32 {
        match version {
            FatVersion::Fat12 => (len * 2 / 3) as u32,
            FatVersion::Fat16 => (len / 2) as u32,
            FatVersion::Fat32 => (len / 4) as u32,
        }
    }

    pub fn version(&self) -> FatVersion {
        self.version
    }

    pub fn max_cluster(&self) -> u32 {
        self.max_cluster
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check_range(&self, cluster: u32) -> Result<(), FatError> {
        if cluster > self.max_cluster {
            return Err(FatError::InvalidFormat(format!(
                "cluster {} outside the FAT (max {})",
                cluster, self.max_cluster
            )));
        }
        Ok(())
    }

    /// Decode the next-link of cluster `n`.
    ///
    /// FAT12 entries are 12 bits packed two-per-three-bytes: the 16-bit
    /// word at byte offset `n + n/2` holds entry `n` in its low 12 bits
    /// when `n` is even and in its high 12 bits when `n` is odd. FAT32
    /// entries mask off their 4 reserved high bits.
    pub fn get(&self, cluster: u32) -> Result<u32, FatError> {
        self.check_range(cluster)?;
        let n = cluster as usize;
        Ok(match self.version {
            FatVersion::Fat12 => {
                let offset = n + n / 2;
                let word = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
                if n % 2 == 0 {
                    (word & 0x0FFF) as u32
                } else {
                    (word >> 4) as u32
                }
            }
            FatVersion::Fat16 => {
                u16::from_le_bytes([self.data[n * 2], self.data[n * 2 + 1]]) as u32
            }
            FatVersion::Fat32 => {
                let raw = u32::from_le_bytes([
                    self.data[n * 4],
                    self.data[n * 4 + 1],
                    self.data[n * 4 + 2],
                    self.data[n * 4 + 3],
                ]);
                raw & 0x0FFF_FFFF
            }
        })
    }

    /// Encode `value` as the next-link of cluster `n`.
    ///
    /// FAT12 rewrites only the 12 bits belonging to `n`; FAT32 preserves
    /// the 4 reserved high bits of the raw entry.
    pub fn set(&mut self, cluster: u32, value: u32) -> Result<(), FatError> {
        self.check_range(cluster)?;
        let n = cluster as usize;
        match self.version {
            FatVersion::Fat12 => {
                let offset = n + n / 2;
                let word = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
                let word = if n % 2 == 0 {
                    (word & 0xF000) | (value as u16 & 0x0FFF)
                } else {
                    (word & 0x000F) | ((value as u16 & 0x0FFF) << 4)
                };
                self.data[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
            }
            FatVersion::Fat16 => {
                self.data[n * 2..n * 2 + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
            FatVersion::Fat32 => {
                let raw = u32::from_le_bytes([
                    self.data[n * 4],
                    self.data[n * 4 + 1],
                    self.data[n * 4 + 2],
                    self.data[n * 4 + 3],
                ]);
                let raw = (raw & 0xF000_0000) | (value & 0x0FFF_FFFF);
                self.data[n * 4..n * 4 + 4].copy_from_slice(&raw.to_le_bytes());
            }
        }
        trace!("fat: set entry {} = {:#x}", cluster, value);
        Ok(())
    }

    /// First free cluster strictly above `start` (never below cluster 2).
    pub fn find_free(&self, start: u32) -> Result<u32, FatError> {
        let begin = (start + 1).max(FIRST_DATA_CLUSTER);
        for cluster in begin..=self.max_cluster {
            if self.get(cluster)? == FREE_CLUSTER {
                return Ok(cluster);
            }
        }
        Err(FatError::NoSpace)
    }

    /// True when a decoded entry value terminates a chain: at or beyond the
    /// end-of-chain boundary, or the reserved bad-cluster marker.
    pub fn is_end_of_chain(&self, value: u32) -> bool {
        value >= end_of_chain_boundary(self.version) || value == bad_cluster_marker(self.version)
    }

    /// Number of free entries in the addressable data-cluster range.
    pub fn count_free(&self) -> u32 {
        let mut free = 0;
        for cluster in FIRST_DATA_CLUSTER..=self.max_cluster {
            if matches!(self.get(cluster), Ok(FREE_CLUSTER)) {
                free += 1;
            }
        }
        free
    }
}
