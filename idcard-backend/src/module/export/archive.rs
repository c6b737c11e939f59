///! In-memory archive of exported card images

use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Named entries kept in insertion order. Inserting an existing name
/// replaces that entry's bytes in place.
#[derive(Debug, Default)]
pub struct CardArchive {
    entries: Vec<(String, Vec<u8>)>,
    positions: HashMap<String, usize>,
    compress: bool,
}

impl CardArchive {
    pub fn new(compress: bool) -> Self {
        Self {
            compress,
            ..Default::default()
        }
    }

    /// Entry name for a member's card image
    pub fn entry_name(display_name: &str) -> String {
        let stem: String = display_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let stem = if stem.is_empty() { "_".to_string() } else { stem };
        format!("{}.png", stem)
    }

    pub fn insert(&mut self, name: String, bytes: Vec<u8>) {
        match self.positions.get(&name) {
            Some(&pos) => {
                tracing::warn!("Archive entry {} already exists, overwriting", name);
                self.entries[pos].1 = bytes;
            }
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, bytes));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Serialize to a zip file
    pub fn finish(self) -> zip::result::ZipResult<Vec<u8>> {
        let method = if self.compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default().compression_method(method);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}
