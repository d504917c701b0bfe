// 8.3 name handling and path splitting.
//
// Everything here works on byte slices with ASCII-only case mapping; FAT
// short names predate any notion of locale-aware folding.

use fatkit_core::FatError;

use super::structures::{ENTRY_DELETED, ENTRY_KANJI_ESCAPE};

/// Length of the packed name + extension form.
pub const SHORT_NAME_LEN: usize = 11;

/// Characters the on-disk format forbids in an 8.3 name.
const FORBIDDEN: &[u8] = b"\"*+,/:;<=>?[\\]|";

/// Convert one path component to its 11-byte 8.3 form: split on the last
/// dot, pad name to 8 and extension to 3 with spaces, uppercase ASCII.
///
/// The literals `.` and `..` map to their fixed directory-entry forms. A
/// leading 0xE5 byte is stored as 0x05 so it is not read back as a
/// deleted-entry marker.
pub fn to_short_name(component: &str) -> [u8; SHORT_NAME_LEN] {
    let mut short = [b' '; SHORT_NAME_LEN];

    if component == "." {
        short[0] = b'.';
        return short;
    }
    if component == ".." {
        short[0] = b'.';
        short[1] = b'.';
        return short;
    }

    let bytes = component.as_bytes();
    let (base, ext) = match component.rfind('.') {
        Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
        None => (bytes, &bytes[..0]),
    };

    for (i, &b) in base.iter().take(8).enumerate() {
        short[i] = b.to_ascii_uppercase();
    }
    for (i, &b) in ext.iter().take(3).enumerate() {
        short[8 + i] = b.to_ascii_uppercase();
    }

    if short[0] == ENTRY_DELETED {
        short[0] = ENTRY_KANJI_ESCAPE;
    }
    short
}

/// Convert an 11-byte 8.3 form back to the user-visible name. `.` and `..`
/// are returned as themselves.
pub fn to_long_name(short: &[u8; SHORT_NAME_LEN]) -> String {
    if short[0] == b'.' {
        if short[1] == b'.' {
            return "..".to_string();
        }
        return ".".to_string();
    }

    let mut name = String::new();
    for (i, &b) in short[..8].iter().enumerate() {
        if b == b' ' {
            break;
        }
        if i == 0 && b == ENTRY_KANJI_ESCAPE {
            name.push(ENTRY_DELETED as char);
        } else {
            name.push(b as char);
        }
    }

    if short[8..].iter().any(|&b| b != b' ') {
        name.push('.');
        for &b in &short[8..] {
            if b == b' ' {
                break;
            }
            name.push(b as char);
        }
    }

    name
}

/// Check an 11-byte form against the on-disk naming rules before it is
/// written into a directory.
pub fn validate_short_name(short: &[u8; SHORT_NAME_LEN]) -> Result<(), FatError> {
    if short[0] == b' ' {
        return Err(FatError::InvalidPath(
            "name must not start with a space".to_string(),
        ));
    }
    for (i, &b) in short.iter().enumerate() {
        if i == 0 && b == ENTRY_KANJI_ESCAPE {
            continue;
        }
        if b < 0x20 || FORBIDDEN.contains(&b) {
            return Err(FatError::InvalidPath(format!(
                "name contains forbidden byte {:#04x}",
                b
            )));
        }
    }
    Ok(())
}

/// Split a backslash-separated path into normalized 8.3 components.
///
/// A leading backslash denotes the root; empty components are dropped, so
/// `"\"` yields no components at all. Forward slashes are never path
/// separators here and reject the whole path.
pub fn split_path(path: &str) -> Result<Vec<[u8; SHORT_NAME_LEN]>, FatError> {
    if path.contains('/') {
        return Err(FatError::InvalidPath(
            "forward slash in path; directories are separated by backslashes".to_string(),
        ));
    }
    if path.trim().is_empty() {
        return Err(FatError::InvalidPath("path is empty".to_string()));
    }

    Ok(path
        .split('\\')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(to_short_name)
        .collect())
}
