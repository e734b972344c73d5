// src/utils/archive.rs

use std::collections::HashMap;
use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// One file to be placed in a zip bundle.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Builds a deflated zip archive in memory.
///
/// Entries keep their input order. When two entries share a name the later
/// one's bytes replace the earlier one, so extraction yields the last write.
/// Colliding names are therefore collapsed into one entry rather than
/// written twice: `zip` refuses duplicate names, and readers that accept
/// them also extract only the last one.
pub fn build_zip(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, zip::result::ZipError> {
    let entries = last_write_wins(entries);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in &entries {
        writer.start_file(entry.name.as_str(), options)?;
        writer.write_all(&entry.data)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn last_write_wins(entries: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ArchiveEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(&entry.name) {
            Some(&idx) => unique[idx].data = entry.data,
            None => {
                positions.insert(entry.name.clone(), unique.len());
                unique.push(entry);
            }
        }
    }

    unique
}
