// The mounted volume and its public operations.
//
// One `FatVolume` owns the image handle and the in-memory FAT for its whole
// session. Mutating operations update the FAT in memory first, write the
// affected directory and data clusters, and finish by flushing the FAT to
// every on-disk copy; a failed write surfaces as an I/O error and may leave
// the copies partially updated.

use std::path::Path;

use fatkit_core::{FatError, FatVersion, FileInfo, VolumeInfo};
use log::{debug, info, trace};

use crate::device_io::ImageFile;

use super::directory::{dot_entries, entries_to_bytes, parse_entries, DirLocation};
use super::geometry::Geometry;
use super::names;
use super::structures::{
    BiosParameterBlock, DirEntry, FatAttributes, DIR_ENTRY_SIZE, ENTRY_DELETED,
};
use super::table::{FatTable, FIRST_DATA_CLUSTER, FREE_CLUSTER};
use super::timestamps;

/// A path resolved down to its final directory entry plus the directory
/// that holds it.
struct Resolved {
    entry: DirEntry,
    parent: DirLocation,
}

pub struct FatVolume {
    image: ImageFile,
    bpb: BiosParameterBlock,
    geometry: Geometry,
    fat: FatTable,
    /// FAT entry #1 masked to the variant width; written at chain tails.
    end_of_chain: u32,
}

impl FatVolume {
    /// Mount an image: parse the BPB, derive the geometry and load the
    /// primary FAT. Fails without side effects.
    pub fn mount<P: AsRef<Path>>(path: P) -> Result<Self, FatError> {
        let mut image = ImageFile::open(path)?;
        let sector0 = image.read_at(0, 512)?;
        let bpb = BiosParameterBlock::parse(&sector0)?;
        let geometry = Geometry::from_bpb(&bpb)?;

        let raw_fat = image.read_at(geometry.fat_copy_offset(0), geometry.fat_bytes())?;
        let fat = FatTable::with_cluster_limit(raw_fat, geometry.version, geometry.max_cluster());
        let end_of_chain = fat.get(1)?;

        info!(
            "mounted {} volume: {} clusters, {} bytes per cluster, {} FAT copies",
            geometry.version, geometry.total_clusters, geometry.bytes_per_cluster,
            bpb.number_of_fats
        );

        Ok(Self {
            image,
            bpb,
            geometry,
            fat,
            end_of_chain,
        })
    }

    pub fn version(&self) -> FatVersion {
        self.geometry.version
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.geometry.bytes_per_cluster
    }

    pub fn total_clusters(&self) -> u32 {
        self.geometry.total_clusters
    }

    /// The volume label from the extended BPB record, or `None` when blank.
    pub fn label(&self) -> Option<String> {
        let raw = match self.geometry.version {
            FatVersion::Fat32 => &self.bpb.ext32.volume_label,
            _ => &self.bpb.ext16.volume_label,
        };
        let end = raw
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map(|p| p + 1)?;
        Some(raw[..end].iter().map(|&b| b as char).collect())
    }

    /// Number of allocatable clusters currently free.
    pub fn free_clusters(&self) -> u32 {
        self.fat.count_free()
    }

    /// Capacity summary of the data region.
    pub fn info(&self) -> VolumeInfo {
        let cluster_size = self.geometry.bytes_per_cluster;
        VolumeInfo {
            fs_type: self.geometry.version,
            label: self.label(),
            total_bytes: self.geometry.total_clusters as u64 * cluster_size as u64,
            free_bytes: self.free_clusters() as u64 * cluster_size as u64,
            cluster_size,
        }
    }

    /// Enumerate a directory. `"\"` names the root; long-filename entries
    /// are opaque at this layer and are not listed.
    pub fn read_directory(&mut self, path: &str) -> Result<Vec<FileInfo>, FatError> {
        let components = names::split_path(path)?;
        let raw = if components.is_empty() {
            let root = self.root_location();
            self.read_raw_at(&root)?
        } else {
            let resolved = self.resolve(&components, true)?;
            let location = self.location_for_dir_entry(&resolved.entry);
            self.read_raw_at(&location)?
        };

        Ok(raw
            .iter()
            .filter(|e| !e.is_long_name())
            .map(file_info)
            .collect())
    }

    /// Read a whole file into memory.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>, FatError> {
        let components = names::split_path(path)?;
        if components.is_empty() {
            return Err(FatError::FileNotFound(path.to_string()));
        }
        let resolved = self.resolve(&components, false)?;
        if resolved.entry.is_directory() {
            return Err(FatError::FileNotFound(path.to_string()));
        }

        let size = resolved.entry.file_size as usize;
        let first = self.first_cluster_of(&resolved.entry);
        if size == 0 || first < FIRST_DATA_CLUSTER {
            return Ok(Vec::new());
        }

        let mut data = self.read_chain_data(first)?;
        data.truncate(size);
        Ok(data)
    }

    /// Create a file with the given contents. The path must not resolve
    /// yet; overwriting is rejected.
    pub fn create_file(&mut self, path: &str, data: &[u8]) -> Result<(), FatError> {
        let components = names::split_path(path)?;
        if components.is_empty() {
            return Err(FatError::AlreadyExists(path.to_string()));
        }
        self.ensure_absent(&components, path)?;

        let leaf = components[components.len() - 1];
        names::validate_short_name(&leaf)?;
        let parent = self.parent_location(&components)?;

        if data.len() > u32::MAX as usize {
            // The on-disk size field is 32 bits wide.
            return Err(FatError::NoSpace);
        }

        let bpc = self.geometry.bytes_per_cluster as usize;
        let cluster_count = (data.len() + bpc - 1) / bpc;
        let chain = self.allocate_chain(cluster_count)?;
        debug!(
            "create {}: {} bytes over {} clusters",
            path,
            data.len(),
            chain.len()
        );

        let (date, time) = timestamps::now_fat_datetime();
        let entry = DirEntry::new(
            leaf,
            FatAttributes::ARCHIVE,
            chain.first().copied().unwrap_or(0),
            data.len() as u32,
            date,
            time,
        );
        self.insert_entry(&parent, entry)?;

        for (i, &cluster) in chain.iter().enumerate() {
            let start = i * bpc;
            let end = (start + bpc).min(data.len());
            self.write_cluster(cluster, &data[start..end])?;
        }

        self.flush_fat()
    }

    /// Create an empty directory seeded with its `.` and `..` entries.
    pub fn create_directory(&mut self, path: &str) -> Result<(), FatError> {
        let components = names::split_path(path)?;
        if components.is_empty() {
            return Err(FatError::AlreadyExists(path.to_string()));
        }
        self.ensure_absent(&components, path)?;

        let leaf = components[components.len() - 1];
        names::validate_short_name(&leaf)?;
        let parent = self.parent_location(&components)?;

        let cluster = self.fat.find_free(1)?;
        self.fat.set(cluster, self.end_of_chain)?;
        debug!("create directory {} at cluster {}", path, cluster);

        let (date, time) = timestamps::now_fat_datetime();
        let entry = DirEntry::new(leaf, FatAttributes::DIRECTORY, cluster, 0, date, time);
        self.insert_entry(&parent, entry)?;

        // `..` carries 0 when the parent is the fixed FAT12/16 root.
        let parent_cluster = match parent {
            DirLocation::FixedRoot => 0,
            DirLocation::Chain(c) => c,
        };
        let (dot, dotdot) = dot_entries(cluster, parent_cluster, date, time);
        let seed = entries_to_bytes(&[dot, dotdot], bpc_entries(self.geometry.bytes_per_cluster));
        self.image
            .write_at(self.geometry.cluster_offset(cluster), &seed)?;

        self.flush_fat()
    }

    /// Remove a file's directory entry and free its cluster chain.
    pub fn delete_entry(&mut self, path: &str) -> Result<(), FatError> {
        self.remove_entry(path, false)
    }

    /// Remove a file like [`delete_entry`], additionally overwriting every
    /// data cluster of the chain with zeros before freeing it.
    ///
    /// [`delete_entry`]: FatVolume::delete_entry
    pub fn erase_entry(&mut self, path: &str) -> Result<(), FatError> {
        self.remove_entry(path, true)
    }

    fn remove_entry(&mut self, path: &str, wipe: bool) -> Result<(), FatError> {
        let components = names::split_path(path)?;
        if components.is_empty() {
            return Err(FatError::FileNotFound(path.to_string()));
        }
        let resolved = self.resolve(&components, false)?;
        if resolved.entry.is_directory() {
            // Files only; recursive removal is a policy this layer does not
            // define.
            return Err(FatError::FileNotFound(path.to_string()));
        }

        let first = self.first_cluster_of(&resolved.entry);
        if first >= FIRST_DATA_CLUSTER {
            let chain = self.cluster_chain(first)?;
            for &cluster in &chain {
                if wipe {
                    let zeros = vec![0u8; self.geometry.bytes_per_cluster as usize];
                    self.image
                        .write_at(self.geometry.cluster_offset(cluster), &zeros)?;
                }
                self.fat.set(cluster, FREE_CLUSTER)?;
            }
            debug!("freed {} clusters of {}", chain.len(), path);
        }

        let leaf = components[components.len() - 1];
        let mut entries = self.read_raw_at(&resolved.parent)?;
        for e in entries.iter_mut() {
            if !e.is_long_name() && !e.is_directory() && e.short_name() == leaf {
                if wipe {
                    *e = DirEntry::from_bytes(&[0u8; DIR_ENTRY_SIZE]);
                }
                e.name[0] = ENTRY_DELETED;
                break;
            }
        }
        self.write_dir_entries(&resolved.parent, &entries)?;
        self.flush_fat()
    }

    // ------------------------------------------------------------------
    // Path resolution
    // ------------------------------------------------------------------

    fn root_location(&self) -> DirLocation {
        match self.geometry.version {
            FatVersion::Fat32 => DirLocation::Chain(self.bpb.ext32.root_cluster),
            _ => DirLocation::FixedRoot,
        }
    }

    /// First cluster of an entry with the variant's view applied: FAT12/16
    /// ignore the high 16 bits.
    fn first_cluster_of(&self, entry: &DirEntry) -> u32 {
        match self.geometry.version {
            FatVersion::Fat32 => entry.first_cluster(),
            _ => entry.first_cluster_low as u32,
        }
    }

    fn location_for_dir_entry(&self, entry: &DirEntry) -> DirLocation {
        let cluster = self.first_cluster_of(entry);
        if cluster == 0 {
            // `..` of a first-level subdirectory references the root.
            self.root_location()
        } else {
            DirLocation::Chain(cluster)
        }
    }

    /// Descend from the root matching each component by its 11-byte form.
    /// Non-terminal components must be directories; the terminal one must
    /// be when `expect_dir` is set.
    fn resolve(
        &mut self,
        components: &[[u8; names::SHORT_NAME_LEN]],
        expect_dir: bool,
    ) -> Result<Resolved, FatError> {
        let mut parent = self.root_location();

        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            trace!("resolve component {:?}", names::to_long_name(component));

            let entries = self.read_raw_at(&parent)?;
            let entry = match entries
                .iter()
                .find(|e| !e.is_long_name() && e.short_name() == *component)
            {
                Some(e) => *e,
                None => {
                    let name = names::to_long_name(component);
                    return Err(if last && !expect_dir {
                        FatError::FileNotFound(name)
                    } else {
                        FatError::DirectoryNotFound(name)
                    });
                }
            };

            if (!last || expect_dir) && !entry.is_directory() {
                return Err(FatError::NotADirectory(names::to_long_name(component)));
            }
            if last {
                return Ok(Resolved { entry, parent });
            }
            parent = self.location_for_dir_entry(&entry);
        }

        Err(FatError::InvalidPath("path has no components".to_string()))
    }

    /// Fail `AlreadyExists` when the path resolves to anything; propagate
    /// every failure except a missing leaf.
    fn ensure_absent(
        &mut self,
        components: &[[u8; names::SHORT_NAME_LEN]],
        path: &str,
    ) -> Result<(), FatError> {
        match self.resolve(components, false) {
            Ok(_) => Err(FatError::AlreadyExists(path.to_string())),
            Err(FatError::FileNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn parent_location(
        &mut self,
        components: &[[u8; names::SHORT_NAME_LEN]],
    ) -> Result<DirLocation, FatError> {
        if components.len() == 1 {
            return Ok(self.root_location());
        }
        let resolved = self.resolve(&components[..components.len() - 1], true)?;
        Ok(self.location_for_dir_entry(&resolved.entry))
    }

    // ------------------------------------------------------------------
    // Directory I/O
    // ------------------------------------------------------------------

    fn read_raw_at(&mut self, location: &DirLocation) -> Result<Vec<DirEntry>, FatError> {
        let bytes = match *location {
            DirLocation::FixedRoot => self.image.read_at(
                self.geometry.root_dir_offset(),
                self.geometry.root_dir_bytes(self.bpb.root_dir_entries),
            )?,
            DirLocation::Chain(first) => self.read_chain_data(first)?,
        };
        Ok(parse_entries(&bytes))
    }

    /// Append one entry to a directory, growing its cluster chain when the
    /// new sequence crosses a cluster boundary.
    fn insert_entry(&mut self, location: &DirLocation, entry: DirEntry) -> Result<(), FatError> {
        let mut entries = self.read_raw_at(location)?;
        entries.push(entry);
        self.write_dir_entries(location, &entries)
    }

    /// Write a full entry sequence back to its directory.
    ///
    /// The fixed root is rewritten in place and bounded by
    /// `root_dir_entries`; a chained directory is extended by one fresh
    /// cluster per missing cluster, old tail linked to the new one.
    fn write_dir_entries(
        &mut self,
        location: &DirLocation,
        entries: &[DirEntry],
    ) -> Result<(), FatError> {
        match *location {
            DirLocation::FixedRoot => {
                let capacity = self.bpb.root_dir_entries as usize;
                if entries.len() > capacity {
                    return Err(FatError::DirectoryFull);
                }
                let bytes = entries_to_bytes(entries, capacity);
                self.image.write_at(self.geometry.root_dir_offset(), &bytes)
            }
            DirLocation::Chain(first) => {
                let bpc = self.geometry.bytes_per_cluster as usize;
                let mut chain = self.cluster_chain(first)?;
                let needed = (entries.len() * DIR_ENTRY_SIZE + bpc - 1) / bpc;
                while needed > chain.len() {
                    let tail = *chain.last().unwrap();
                    let fresh = self.fat.find_free(1)?;
                    self.fat.set(tail, fresh)?;
                    self.fat.set(fresh, self.end_of_chain)?;
                    chain.push(fresh);
                    debug!(
                        "directory at cluster {} grew to {} clusters",
                        first,
                        chain.len()
                    );
                }

                let bytes =
                    entries_to_bytes(entries, chain.len() * bpc_entries(bpc as u32));
                for (i, &cluster) in chain.iter().enumerate() {
                    self.image.write_at(
                        self.geometry.cluster_offset(cluster),
                        &bytes[i * bpc..(i + 1) * bpc],
                    )?;
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Cluster and FAT I/O
    // ------------------------------------------------------------------

    /// Follow a chain from `first` to its end-of-chain marker.
    fn cluster_chain(&self, first: u32) -> Result<Vec<u32>, FatError> {
        let mut chain = Vec::new();
        let mut current = first;
        loop {
            if current < FIRST_DATA_CLUSTER || current > self.fat.max_cluster() {
                return Err(FatError::InvalidFormat(format!(
                    "cluster chain references cluster {} outside the data region",
                    current
                )));
            }
            if chain.len() > self.geometry.total_clusters as usize {
                return Err(FatError::InvalidFormat(
                    "cluster chain does not terminate".to_string(),
                ));
            }
            chain.push(current);
            let next = self.fat.get(current)?;
            if self.fat.is_end_of_chain(next) {
                break;
            }
            current = next;
        }
        Ok(chain)
    }

    fn read_chain_data(&mut self, first: u32) -> Result<Vec<u8>, FatError> {
        let chain = self.cluster_chain(first)?;
        let bpc = self.geometry.bytes_per_cluster as usize;
        let mut data = Vec::with_capacity(chain.len() * bpc);
        for &cluster in &chain {
            let bytes = self
                .image
                .read_at(self.geometry.cluster_offset(cluster), bpc)?;
            data.extend_from_slice(&bytes);
        }
        Ok(data)
    }

    /// Allocate `count` clusters as one linked chain ending in the
    /// end-of-chain marker. Each link is found strictly above its
    /// predecessor.
    fn allocate_chain(&mut self, count: usize) -> Result<Vec<u32>, FatError> {
        let mut chain = Vec::with_capacity(count);
        let mut previous = 1u32;
        for _ in 0..count {
            let cluster = self.fat.find_free(previous)?;
            if let Some(&tail) = chain.last() {
                self.fat.set(tail, cluster)?;
            }
            self.fat.set(cluster, self.end_of_chain)?;
            chain.push(cluster);
            previous = cluster;
        }
        Ok(chain)
    }

    /// Write one cluster's worth of data, zero-padded to the cluster size.
    fn write_cluster(&mut self, cluster: u32, data: &[u8]) -> Result<(), FatError> {
        let bpc = self.geometry.bytes_per_cluster as usize;
        debug_assert!(data.len() <= bpc);
        let mut buf = vec![0u8; bpc];
        buf[..data.len()].copy_from_slice(data);
        self.image
            .write_at(self.geometry.cluster_offset(cluster), &buf)
    }

    /// Write the in-memory FAT to every on-disk copy. Copies are written in
    /// reverse order so the primary lands last and a failed flush localizes
    /// damage to the mirrors.
    fn flush_fat(&mut self) -> Result<(), FatError> {
        for copy in (0..self.bpb.number_of_fats as u32).rev() {
            self.image
                .write_at(self.geometry.fat_copy_offset(copy), self.fat.as_bytes())?;
        }
        self.image.flush()
    }
}

impl Drop for FatVolume {
    fn drop(&mut self) {
        // Best effort; every mutating operation has already flushed.
        let _ = self.image.flush();
    }
}

/// Directory entries that fit in one cluster.
fn bpc_entries(bytes_per_cluster: u32) -> usize {
    bytes_per_cluster as usize / DIR_ENTRY_SIZE
}

fn file_info(entry: &DirEntry) -> FileInfo {
    FileInfo {
        name: names::to_long_name(&entry.short_name()),
        created: timestamps::fat_datetime_to_unix(entry.creation_date, entry.creation_time),
        modified: timestamps::fat_datetime_to_unix(
            entry.last_modification_date,
            entry.last_modification_time,
        ),
        accessed: timestamps::fat_datetime_to_unix(entry.last_access_date, 0),
        size: entry.file_size as u64,
        is_directory: entry.is_directory(),
    }
}
