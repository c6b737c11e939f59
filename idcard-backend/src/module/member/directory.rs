///! Read-only member directory, loaded once at startup

use anyhow::{Context, Result};
use std::path::Path;

use super::parser::MemberParser;
use super::types::MemberRecord;

/// Immutable list of parsed members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    members: Vec<MemberRecord>,
}

impl Directory {
    pub fn new(members: Vec<MemberRecord>) -> Self {
        Self { members }
    }

    pub fn from_text(text: &str, parser: &MemberParser) -> Self {
        Self::new(parser.parse(text))
    }

    /// Load from CSV file
    pub async fn load(csv_path: impl AsRef<Path>, parser: &MemberParser) -> Result<Self> {
        let csv_path = csv_path.as_ref();
        tracing::info!("Loading member directory from: {}", csv_path.display());

        let content = tokio::fs::read_to_string(csv_path)
            .await
            .with_context(|| format!("Failed to read member file: {}", csv_path.display()))?;

        let directory = Self::from_text(&content, parser);
        if directory.is_empty() {
            tracing::warn!("Member directory is empty, exports will be disabled");
        } else {
            tracing::info!("Loaded {} members", directory.len());
        }

        Ok(directory)
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    pub fn get(&self, index: usize) -> Option<&MemberRecord> {
        self.members.get(index)
    }

    /// First member with an exactly matching display name
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.display_name == name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
