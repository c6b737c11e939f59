///! Member CSV parser
///!
///! Converts the raw member list into `MemberRecord`s. Malformed rows are
///! dropped, never reported as errors.

use super::types::{ColumnMap, MemberRecord, SchemaVersion};

/// Split one line into trimmed fields.
///
/// Double quotes toggle a quoted span and are always stripped, wherever
/// they appear. Commas inside a quoted span are kept literally. An
/// unterminated span simply runs to the end of the line.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Member list parser with a fixed column layout.
#[derive(Debug, Clone)]
pub struct MemberParser {
    schema: SchemaVersion,
    min_columns: usize,
}

impl Default for MemberParser {
    fn default() -> Self {
        Self::new(SchemaVersion::default(), 6)
    }
}

impl MemberParser {
    pub fn new(schema: SchemaVersion, min_columns: usize) -> Self {
        Self { schema, min_columns }
    }

    /// Parse the full member list text. Never fails; the first non-blank
    /// line is the header and is skipped.
    pub fn parse(&self, text: &str) -> Vec<MemberRecord> {
        let mut lines = text.split('\n').filter(|l| !l.trim().is_empty());

        let Some(header) = lines.next() else {
            return Vec::new();
        };
        let columns = self.column_map(header);

        let mut records = Vec::new();
        let mut dropped = 0usize;

        for (line_no, line) in lines.enumerate() {
            let fields = split_fields(line);
            if fields.len() < self.min_columns {
                dropped += 1;
                tracing::debug!(
                    "Dropping member row {} ({} of {} columns)",
                    line_no + 2,
                    fields.len(),
                    self.min_columns
                );
                continue;
            }
            records.push(columns.to_record(&fields));
        }

        tracing::debug!("Parsed {} member rows, {} dropped", records.len(), dropped);
        records
    }

    fn column_map(&self, header: &str) -> ColumnMap {
        match self.schema {
            SchemaVersion::V1 => ColumnMap::V1,
            SchemaVersion::V2 => ColumnMap::V2,
            SchemaVersion::Header => ColumnMap::from_header(&split_fields(header)).unwrap_or_else(|| {
                tracing::warn!("No name column found in header, falling back to v2 layout");
                ColumnMap::V2
            }),
        }
    }
}
