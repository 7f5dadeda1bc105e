//! Zip packaging for multi-entry exports.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::ArchiveError;

/// A named blob destined for an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File name inside the archive.
    pub name: String,
    /// Entry contents.
    pub bytes: Vec<u8>,
}

/// A finished in-memory archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packed {
    /// Zip bytes.
    pub bytes: Vec<u8>,
    /// Entry names as written, in order.
    pub names: Vec<String>,
}

/// Pack `entries` into an in-memory zip archive.
///
/// Entries are stored uncompressed since every payload is already a
/// compressed image. Duplicate names get a numeric suffix before the
/// extension.
///
/// # Errors
///
/// Returns [`ArchiveError`] if the zip writer fails.
pub fn pack<'a>(
    entries: impl IntoIterator<Item = &'a ArchiveEntry>,
) -> Result<Packed, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut used = HashSet::new();
    let mut names = Vec::new();

    for entry in entries {
        let name = unique_name(&entry.name, &mut used);
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&entry.bytes)?;
        names.push(name);
    }

    let bytes = writer.finish()?.into_inner();
    tracing::debug!(entries = names.len(), bytes = bytes.len(), "packed archive");
    Ok(Packed { bytes, names })
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_owned()) {
        return name.to_owned();
    }
    let (stem, ext) = name
        .rfind('.')
        .filter(|&i| i > 0)
        .map_or((name, ""), |i| name.split_at(i));
    let mut n = 1_u32;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use super::*;

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn entries_are_readable() {
        let entries = [entry("a_16x16.ico", b"first"), entry("a_32x32.ico", b"second")];
        let packed = pack(&entries).unwrap();
        assert_eq!(&packed.bytes[..2], b"PK");
        assert_eq!(packed.names, ["a_16x16.ico", "a_32x32.ico"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(packed.bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        archive
            .by_name("a_32x32.ico")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "second");
    }

    #[test]
    fn duplicate_names_are_suffixed() {
        let entries = [entry("x.png", b"1"), entry("x.png", b"2"), entry("x.png", b"3")];
        let packed = pack(&entries).unwrap();
        assert_eq!(packed.names, ["x.png", "x_1.png", "x_2.png"]);
        let archive = zip::ZipArchive::new(Cursor::new(packed.bytes)).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, ["x.png", "x_1.png", "x_2.png"]);
    }
}
