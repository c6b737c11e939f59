///! Member directory data types

use serde::{Deserialize, Serialize};

/// One row of the member directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Shown prominently on the card; also the export file / archive entry key
    pub display_name: String,
    /// Phonetic reading of the name (v2 schema only)
    pub reading: String,
    /// Header band color, empty when absent
    pub accent_color: String,
    /// Membership generation label, e.g. "15期"
    pub cohort: String,
    pub region: String,
    /// Relative to the photo directory; existence is not checked here
    pub image_file_name: String,
    pub ability_text: String,
    pub team: bool,
}

/// Positional column layout of the member CSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// name, color, generation, region, image, ability
    V1,
    /// name, reading, color, generation, image, region, ability, team
    #[default]
    V2,
    /// Indices resolved from header names
    Header,
}

/// Field index for every `MemberRecord` column. `None` means the
/// column does not exist in this layout and the field stays empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub display_name: usize,
    pub reading: Option<usize>,
    pub accent_color: Option<usize>,
    pub cohort: Option<usize>,
    pub region: Option<usize>,
    pub image_file_name: Option<usize>,
    pub ability_text: Option<usize>,
    pub team: Option<usize>,
}

impl ColumnMap {
    pub const V1: ColumnMap = ColumnMap {
        display_name: 0,
        reading: None,
        accent_color: Some(1),
        cohort: Some(2),
        region: Some(3),
        image_file_name: Some(4),
        ability_text: Some(5),
        team: None,
    };

    pub const V2: ColumnMap = ColumnMap {
        display_name: 0,
        reading: Some(1),
        accent_color: Some(2),
        cohort: Some(3),
        image_file_name: Some(4),
        region: Some(5),
        ability_text: Some(6),
        team: Some(7),
    };

    /// Resolve column indices from header names.
    ///
    /// Matching is case-insensitive against a small alias table. Returns
    /// `None` when no column can be identified as the display name.
    pub fn from_header(header: &[String]) -> Option<ColumnMap> {
        let find = |aliases: &[&str]| {
            header.iter().position(|h| {
                let h = h.trim().to_lowercase();
                aliases.iter().any(|a| h == *a)
            })
        };

        let display_name = find(&["name", "nickname", "display_name", "displayname", "ニックネーム", "名前"])?;

        Some(ColumnMap {
            display_name,
            reading: find(&["reading", "kana", "ふりがな", "よみ"]),
            accent_color: find(&["color", "colour", "accent", "accent_color", "カラー", "色"]),
            cohort: find(&["generation", "cohort", "期", "leaders期"]),
            region: find(&["region", "area", "地域"]),
            image_file_name: find(&["image", "photo", "img", "image_file", "画像", "写真"]),
            ability_text: find(&["ability", "skill", "特殊能力"]),
            team: find(&["team", "チーム"]),
        })
    }

    /// Build a record from one tokenized row. Missing trailing columns
    /// yield empty strings.
    pub fn to_record(&self, fields: &[String]) -> MemberRecord {
        let get = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .cloned()
                .unwrap_or_default()
        };

        MemberRecord {
            display_name: get(Some(self.display_name)),
            reading: get(self.reading),
            accent_color: get(self.accent_color),
            cohort: get(self.cohort),
            region: get(self.region),
            image_file_name: get(self.image_file_name),
            ability_text: get(self.ability_text),
            team: parse_flag(&get(self.team)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "○"
    )
}
