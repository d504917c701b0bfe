// Volume geometry derived from the BPB at mount time.

use fatkit_core::{FatError, FatVersion};
use log::debug;

use super::structures::{BiosParameterBlock, DIR_ENTRY_SIZE};

/// Cluster counts below these thresholds select FAT12 / FAT16; anything
/// else is FAT32.
const FAT12_MAX_CLUSTERS: u32 = 4085;
const FAT16_MAX_CLUSTERS: u32 = 65525;

/// Region boundaries and cluster math, computed once per mount.
///
/// All sector numbers are absolute (sector 0 is the boot sector); cluster 2
/// is the first cluster of the data region.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub version: FatVersion,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub sectors_per_fat: u32,
    pub fat_region_sectors: u32,
    pub first_fat_sector: u32,
    pub first_root_dir_sector: u32,
    pub root_dir_sectors: u32,
    pub first_data_sector: u32,
    pub total_sectors: u32,
    pub total_clusters: u32,
}

impl Geometry {
    pub fn from_bpb(bpb: &BiosParameterBlock) -> Result<Self, FatError> {
        bpb.validate()?;

        let bytes_per_sector = bpb.bytes_per_sector as u32;
        let sectors_per_cluster = bpb.sectors_per_cluster as u32;
        let bytes_per_cluster = bytes_per_sector * sectors_per_cluster;

        let sectors_per_fat = bpb.sectors_per_fat();
        let fat_region_sectors = bpb.number_of_fats as u32 * sectors_per_fat;
        let first_fat_sector = bpb.reserved_sectors as u32;
        let first_root_dir_sector = first_fat_sector + fat_region_sectors;

        // Zero root entries (FAT32) make this region empty.
        let root_dir_sectors = (bpb.root_dir_entries as u32 * DIR_ENTRY_SIZE as u32
            + bytes_per_sector
            - 1)
            / bytes_per_sector;
        let first_data_sector = first_root_dir_sector + root_dir_sectors;

        let total_sectors = bpb.total_sectors();
        if total_sectors <= first_data_sector {
            return Err(FatError::InvalidFormat(format!(
                "data region starts at sector {} but the volume has only {} sectors",
                first_data_sector, total_sectors
            )));
        }
        let total_clusters = (total_sectors - first_data_sector) / sectors_per_cluster;

        let version = if total_clusters < FAT12_MAX_CLUSTERS {
            FatVersion::Fat12
        } else if total_clusters < FAT16_MAX_CLUSTERS {
            FatVersion::Fat16
        } else {
            FatVersion::Fat32
        };

        debug!(
            "geometry: {} clusters ({}), {} bytes/cluster, FAT at sector {}, \
             root at sector {}, data at sector {}",
            total_clusters,
            version,
            bytes_per_cluster,
            first_fat_sector,
            first_root_dir_sector,
            first_data_sector
        );

        Ok(Self {
            version,
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster,
            sectors_per_fat,
            fat_region_sectors,
            first_fat_sector,
            first_root_dir_sector,
            root_dir_sectors,
            first_data_sector,
            total_sectors,
            total_clusters,
        })
    }

    /// Highest addressable cluster index.
    pub fn max_cluster(&self) -> u32 {
        self.total_clusters + 1
    }

    /// Absolute byte offset of a data cluster.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        let sector = self.first_data_sector as u64
            + (cluster as u64 - 2) * self.sectors_per_cluster as u64;
        sector * self.bytes_per_sector as u64
    }

    /// Absolute byte offset of the fixed FAT12/16 root directory region.
    pub fn root_dir_offset(&self) -> u64 {
        self.first_root_dir_sector as u64 * self.bytes_per_sector as u64
    }

    /// Byte size of the fixed FAT12/16 root directory region.
    pub fn root_dir_bytes(&self, root_dir_entries: u16) -> usize {
        root_dir_entries as usize * DIR_ENTRY_SIZE
    }

    /// Absolute byte offset of FAT copy `k`.
    pub fn fat_copy_offset(&self, copy: u32) -> u64 {
        (self.first_fat_sector as u64 + copy as u64 * self.sectors_per_fat as u64)
            * self.bytes_per_sector as u64
    }

    /// Byte size of one FAT copy.
    pub fn fat_bytes(&self) -> usize {
        self.sectors_per_fat as usize * self.bytes_per_sector as usize
    }
}
