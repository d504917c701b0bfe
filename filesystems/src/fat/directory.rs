// Raw directory-entry sequences.
//
// A directory on disk is a run of 32-byte entries ending at the first
// entry whose name starts with 0x00. Deleted entries (0xE5) drop out of
// the live sequence; long-filename entries stay in it verbatim so a
// rewrite reproduces them byte for byte.

use super::structures::{DirEntry, FatAttributes, DIR_ENTRY_SIZE};

/// Where a directory's entries live on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLocation {
    /// The fixed root region of a FAT12/16 volume.
    FixedRoot,
    /// A cluster chain starting here (FAT32 root and every subdirectory).
    Chain(u32),
}

/// Decode the live entry sequence from raw directory bytes: stop at the
/// 0x00 terminator, skip deleted entries, keep everything else in order.
pub fn parse_entries(bytes: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    for chunk in bytes.chunks_exact(DIR_ENTRY_SIZE) {
        let entry = DirEntry::from_bytes(chunk.try_into().unwrap());
        if entry.is_terminator() {
            break;
        }
        if entry.is_deleted() {
            continue;
        }
        entries.push(entry);
    }
    entries
}

/// Serialize an entry sequence, zero-padding to `pad_to_entries` slots so
/// the scan terminator and the region tail are well-defined.
pub fn entries_to_bytes(entries: &[DirEntry], pad_to_entries: usize) -> Vec<u8> {
    debug_assert!(entries.len() <= pad_to_entries);
    let mut bytes = Vec::with_capacity(pad_to_entries * DIR_ENTRY_SIZE);
    for entry in entries {
        bytes.extend_from_slice(&entry.to_bytes());
    }
    bytes.resize(pad_to_entries * DIR_ENTRY_SIZE, 0);
    bytes
}

/// The `.` and `..` seed entries of a freshly created subdirectory.
///
/// `.` points at the directory itself; `..` points at the parent, which is
/// 0 when the parent is the fixed FAT12/16 root.
pub fn dot_entries(
    self_cluster: u32,
    parent_cluster: u32,
    date: u16,
    time: u16,
) -> (DirEntry, DirEntry) {
    let dot = DirEntry::new(
        *b".          ",
        FatAttributes::DIRECTORY,
        self_cluster,
        0,
        date,
        time,
    );
    let dotdot = DirEntry::new(
        *b"..         ",
        FatAttributes::DIRECTORY,
        parent_cluster,
        0,
        date,
        time,
    );
    (dot, dotdot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &[u8; 11]) -> DirEntry {
        DirEntry::new(*name, FatAttributes::ARCHIVE, 2, 0, 0, 0)
    }

    #[test]
    fn stops_at_the_terminator_and_skips_deleted() {
        let a = named(b"A          ");
        let mut deleted = named(b"B          ");
        deleted.name[0] = 0xE5;
        let c = named(b"C          ");
        let after_end = named(b"GHOST      ");

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&a.to_bytes());
        bytes.extend_from_slice(&deleted.to_bytes());
        bytes.extend_from_slice(&c.to_bytes());
        bytes.extend_from_slice(&[0u8; DIR_ENTRY_SIZE]);
        bytes.extend_from_slice(&after_end.to_bytes());

        let entries = parse_entries(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].short_name(), a.short_name());
        assert_eq!(entries[1].short_name(), c.short_name());
    }

    #[test]
    fn long_name_entries_survive_a_rewrite_byte_exactly() {
        // A plausible LFN record: attribute 0x0F, arbitrary UCS-2 payload.
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[0] = 0x41;
        raw[11] = FatAttributes::LONG_NAME;
        for (i, b) in raw.iter_mut().enumerate().skip(13) {
            *b = i as u8;
        }
        let mut bytes = raw.to_vec();
        bytes.extend_from_slice(&named(b"REAL    TXT").to_bytes());

        let entries = parse_entries(&bytes);
        assert!(entries[0].is_long_name());
        let rewritten = entries_to_bytes(&entries, 4);
        assert_eq!(&rewritten[..DIR_ENTRY_SIZE], &raw);
    }

    #[test]
    fn serialization_pads_with_zeroed_slots() {
        let bytes = entries_to_bytes(&[named(b"ONLY       ")], 3);
        assert_eq!(bytes.len(), 3 * DIR_ENTRY_SIZE);
        assert!(bytes[DIR_ENTRY_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn dot_seed_entries_reference_self_and_parent() {
        let (dot, dotdot) = dot_entries(9, 4, 0, 0);
        assert_eq!(dot.short_name(), *b".          ");
        assert_eq!(dot.first_cluster(), 9);
        assert!(dot.is_directory());
        assert_eq!(dotdot.short_name(), *b"..         ");
        assert_eq!(dotdot.first_cluster(), 4);
        assert_eq!(dot.file_size, 0);
    }
}
