// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk download archives (`.tar.gz`).

use std::collections::HashSet;
use std::io::Write;

use billvault_core::BillvaultError;
use flate2::{write::GzEncoder, Compression};

/// One file to place in an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Pack `entries` into a gzip-compressed tar archive, in order.
///
/// Repeated filenames are disambiguated as `name (2).ext`, `name (3).ext`, ...
pub fn build_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>, BillvaultError> {
    let mtime = chrono::Utc::now().timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(Vec::new());
    let mut names = UniqueNames::default();

    for entry in entries {
        let name = names.claim(&entry.filename);
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(entry.bytes.len() as u64);
        header.set_mtime(mtime);
        builder
            .append_data(&mut header, &name, entry.bytes.as_slice())
            .map_err(BillvaultError::storage)?;
    }

    builder.finish().map_err(BillvaultError::storage)?;
    let tar_bytes = builder.into_inner().map_err(BillvaultError::storage)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).map_err(BillvaultError::storage)?;
    encoder.finish().map_err(BillvaultError::storage)
}

#[derive(Default)]
struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    fn claim(&mut self, filename: &str) -> String {
        if self.taken.insert(filename.to_string()) {
            return filename.to_string();
        }
        let (stem, ext) = match filename.rfind('.') {
            Some(dot) if dot > 0 => filename.split_at(dot),
            _ => (filename, ""),
        };
        let mut n = 2;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn unpack(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let decoder = flate2::read::GzDecoder::new(archive);
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes).unwrap();
                (name, bytes)
            })
            .collect()
    }

    #[test]
    fn duplicate_names_get_counters() {
        let entries = vec![
            ArchiveEntry { filename: "bill.pdf".into(), bytes: b"one".to_vec() },
            ArchiveEntry { filename: "bill.pdf".into(), bytes: b"two".to_vec() },
            ArchiveEntry { filename: "bill.pdf".into(), bytes: b"three".to_vec() },
            ArchiveEntry { filename: "README".into(), bytes: b"r1".to_vec() },
            ArchiveEntry { filename: "README".into(), bytes: b"r2".to_vec() },
        ];
        let files = unpack(&build_archive(&entries).unwrap());
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["bill.pdf", "bill (2).pdf", "bill (3).pdf", "README", "README (2)"]
        );
        assert_eq!(files[1].1, b"two");
    }

    #[test]
    fn dotfile_names_keep_leading_dot() {
        let mut names = UniqueNames::default();
        assert_eq!(names.claim(".env"), ".env");
        assert_eq!(names.claim(".env"), ".env (2)");
    }

    #[test]
    fn empty_archive_is_valid() {
        assert!(unpack(&build_archive(&[]).unwrap()).is_empty());
    }
}
