///! Member card renderer
///!
///! Maps one member record to an SVG card document. Interactive cards
///! reference their photo by URL; export cards embed the photo bytes so
///! the document is complete before it is snapshotted.

use anyhow::{Context, Result};
use base64::Engine;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use crate::config::{CardConfig, CardLabels};
use crate::module::member::MemberRecord;

const CARD_SVG_TEMPLATE: &str = include_str!("../../../resources/card_template.svg");

static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("valid color regex")
});

/// How the card photo is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Photo referenced by URL, loaded lazily by the viewer
    Interactive,
    /// Photo read from disk and embedded; ready once rendering returns
    Export,
}

/// A rendered card
#[derive(Debug, Clone)]
pub struct CardView {
    pub display_name: String,
    pub mode: RenderMode,
    /// True when the photo is part of the document (export mode) or
    /// referenced (interactive mode); false means the placeholder is shown
    pub photo_ready: bool,
    pub svg: String,
}

/// Card renderer
pub struct CardRenderer {
    template: String,
    photo_base: PathBuf,
    photo_url_prefix: String,
    font_family: String,
    brand_color: String,
    institution_name: String,
    card_title: String,
    issue_date: String,
    labels: CardLabels,
    certification: String,
    principal: String,
}

impl CardRenderer {
    pub const WIDTH: f32 = 600.0;
    pub const HEIGHT: f32 = 350.0;
    const HEADER_HEIGHT: f32 = 64.0;
    const PADDING: f32 = 32.0;
    const PHOTO_SIZE: f32 = 176.0;

    const X_LABEL: f32 = 248.0;
    const X_VALUE: f32 = 366.0;
    const Y_NAME: f32 = 112.0;
    const ROW_HEIGHT: f32 = 30.0;
    const ABILITY_LINE_HEIGHT: f32 = 20.0;
    const ABILITY_MAX_LINES: usize = 3;
    /// Line width in full-width character units
    const ABILITY_LINE_UNITS: f32 = 12.0;

    pub fn new(config: &CardConfig) -> Result<Self> {
        let template = match &config.template_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read card template: {}", path.display()))?,
            None => CARD_SVG_TEMPLATE.to_string(),
        };

        let issue_date = config
            .issue_date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y 年 %m 月 %d 日").to_string());

        Ok(Self {
            template,
            photo_base: config.photo_base.clone(),
            photo_url_prefix: config.photo_url_prefix.trim_end_matches('/').to_string(),
            font_family: config.font_family.clone(),
            brand_color: config.brand_color.clone(),
            institution_name: config.institution_name.clone(),
            card_title: config.card_title.clone(),
            issue_date,
            labels: config.labels.clone(),
            certification: config.certification.clone(),
            principal: config.principal.clone(),
        })
    }

    pub fn issue_date(&self) -> &str {
        &self.issue_date
    }

    /// Institution name and card title, e.g. "Flashami学園 学生証"
    pub fn title(&self) -> String {
        format!("{} {}", self.institution_name, self.card_title)
    }

    pub async fn render(&self, record: &MemberRecord, mode: RenderMode) -> CardView {
        match mode {
            RenderMode::Interactive => self.render_interactive(record),
            RenderMode::Export => self.render_export(record).await,
        }
    }

    /// Render for on-screen display
    pub fn render_interactive(&self, record: &MemberRecord) -> CardView {
        let href = self.photo_url(&record.image_file_name);
        let photo = href.as_deref().map(Self::photo_element);
        self.build(record, RenderMode::Interactive, photo)
    }

    /// Render for snapshotting. The photo is read eagerly and embedded.
    pub async fn render_export(&self, record: &MemberRecord) -> CardView {
        let photo = self
            .load_photo(&record.image_file_name)
            .await
            .map(|data_uri| Self::photo_element(&data_uri));
        self.build(record, RenderMode::Export, photo)
    }

    /// Photo URL for interactive mode, `None` when no photo is set
    pub fn photo_url(&self, file_name: &str) -> Option<String> {
        if file_name.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.photo_url_prefix, urlencoding::encode(file_name)))
    }

    /// Resolve a photo file name against the photo directory. Absolute
    /// paths and parent components are refused.
    pub fn photo_path(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty() {
            return None;
        }
        let relative = Path::new(file_name);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.photo_base.join(relative))
    }

    async fn load_photo(&self, file_name: &str) -> Option<String> {
        let path = self.photo_path(file_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Some(format!("data:{};base64,{}", mime_for(&path), encoded))
            }
            Err(e) => {
                tracing::warn!("Photo {:?} unavailable, rendering placeholder: {}", path, e);
                None
            }
        }
    }

    fn photo_element(href: &str) -> String {
        format!(
            r#"    <image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="xMidYMin slice" clip-path="url(#photo-clip)" href="{}" />"#,
            Self::PADDING,
            Self::photo_y(),
            Self::PHOTO_SIZE,
            Self::PHOTO_SIZE,
            escape_xml(href)
        )
    }

    fn photo_y() -> f32 {
        Self::HEADER_HEIGHT + (Self::HEIGHT - Self::HEADER_HEIGHT - Self::PHOTO_SIZE) / 2.0
    }

    fn build(&self, record: &MemberRecord, mode: RenderMode, photo: Option<String>) -> CardView {
        let photo_ready = photo.is_some();
        let accent = self.accent_for(record);

        let svg = fill_template(
            &self.template,
            &[
                ("WIDTH", Self::WIDTH.to_string()),
                ("HEIGHT", Self::HEIGHT.to_string()),
                ("HEADER_HEIGHT", Self::HEADER_HEIGHT.to_string()),
                ("PHOTO_X", Self::PADDING.to_string()),
                ("PHOTO_Y", Self::photo_y().to_string()),
                ("PHOTO_SIZE", Self::PHOTO_SIZE.to_string()),
                ("FONT_FAMILY", escape_xml(&self.font_family)),
                ("ACCENT", accent.to_string()),
                ("INSTITUTION", escape_xml(&self.institution_name)),
                ("TITLE", escape_xml(&self.card_title)),
                ("PHOTO", photo.unwrap_or_default()),
                ("BADGE", self.team_badge(record, accent)),
                ("FIELDS", self.fields(record)),
                ("CERTIFICATION", escape_xml(&self.certification)),
                ("PRINCIPAL", escape_xml(&self.principal)),
            ],
        );

        CardView {
            display_name: record.display_name.clone(),
            mode,
            photo_ready,
            svg,
        }
    }

    /// Record color when it is a valid hex color, brand color otherwise
    fn accent_for<'a>(&'a self, record: &'a MemberRecord) -> &'a str {
        let color = record.accent_color.trim();
        if COLOR_RE.is_match(color) {
            color
        } else {
            if !color.is_empty() {
                tracing::debug!("Invalid accent color {:?} for {}, using brand color", color, record.display_name);
            }
            &self.brand_color
        }
    }

    fn team_badge(&self, record: &MemberRecord, accent: &str) -> String {
        if !record.team {
            return String::new();
        }
        let x = Self::PADDING + Self::PHOTO_SIZE - 52.0;
        let y = Self::photo_y() + 6.0;
        format!(
            r#"    <rect x="{}" y="{}" width="46" height="18" rx="9" fill="{}" />
    <text x="{}" y="{}" class="badge-text" text-anchor="middle">{}</text>"#,
            x,
            y,
            accent,
            x + 23.0,
            y + 13.0,
            escape_xml(&self.labels.team)
        )
    }

    fn fields(&self, record: &MemberRecord) -> String {
        let mut out = String::new();
        let mut y = Self::Y_NAME;

        out.push_str(&self.field_row(&self.labels.name, &record.display_name, y, "value-large"));
        y += Self::ROW_HEIGHT + 6.0;

        for (label, value) in [
            (&self.labels.cohort, &record.cohort),
            (&self.labels.region, &record.region),
            (&self.labels.issued, &self.issue_date),
        ] {
            out.push_str(&self.field_row(label, value, y, "value"));
            y += Self::ROW_HEIGHT;
        }

        out.push_str(&format!(
            r#"    <text x="{}" y="{}" class="label">{}</text>
"#,
            Self::X_LABEL,
            y,
            escape_xml(&self.labels.ability)
        ));
        for (i, line) in wrap_text(&record.ability_text, Self::ABILITY_LINE_UNITS, Self::ABILITY_MAX_LINES)
            .iter()
            .enumerate()
        {
            out.push_str(&format!(
                r#"    <text x="{}" y="{}" class="value">{}</text>
"#,
                Self::X_VALUE,
                y + i as f32 * Self::ABILITY_LINE_HEIGHT,
                escape_xml(line)
            ));
        }

        out
    }

    fn field_row(&self, label: &str, value: &str, y: f32, class: &str) -> String {
        format!(
            r#"    <text x="{}" y="{}" class="label">{}</text>
    <text x="{}" y="{}" class="{}">{}</text>
"#,
            Self::X_LABEL,
            y,
            escape_xml(label),
            Self::X_VALUE,
            y,
            class,
            escape_xml(value)
        )
    }
}

/// Replace every `{{KEY}}` in one pass, so substituted values are never
/// scanned again. Unknown keys are left as-is.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

/// Greedy wrap where ASCII counts as half a unit. Overflow past
/// `max_lines` is cut with an ellipsis.
fn wrap_text(text: &str, line_units: f32, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;

    for c in text.trim().chars() {
        if c == '\n' {
            lines.push(std::mem::take(&mut current));
            width = 0.0;
            continue;
        }
        let w = if c.is_ascii() { 0.5 } else { 1.0 };
        if width + w > line_units && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(c);
        width += w;
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.pop();
            last.push('…');
        }
    }

    lines
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, image: &str) -> MemberRecord {
        MemberRecord {
            display_name: name.to_string(),
            reading: String::new(),
            accent_color: String::new(),
            cohort: "15期".to_string(),
            region: "関東".to_string(),
            image_file_name: image.to_string(),
            ability_text: "レシートを集める".to_string(),
            team: false,
        }
    }

    fn renderer(photo_base: &Path) -> CardRenderer {
        let config = CardConfig {
            photo_base: photo_base.to_path_buf(),
            issue_date: Some("2026 年 02 月 16 日".to_string()),
            ..Default::default()
        };
        CardRenderer::new(&config).unwrap()
    }

    #[test]
    fn test_interactive_card_fields() {
        let r = renderer(Path::new("public/member"));
        let view = r.render_interactive(&record("みるく", "milk,1.jpg"));

        assert_eq!(view.mode, RenderMode::Interactive);
        assert!(view.photo_ready);
        assert!(view.svg.contains("みるく"));
        assert!(view.svg.contains("15期"));
        assert!(view.svg.contains("関東"));
        assert!(view.svg.contains("2026 年 02 月 16 日"));
        assert!(view.svg.contains("Flashami学園"));
        assert!(view.svg.contains(r##"fill="#EBC700""##));
        assert!(view.svg.contains(r#"href="/member/milk%2C1.jpg""#));
        assert!(!view.svg.contains("{{"));
    }

    #[test]
    fn test_accent_color_validation() {
        let r = renderer(Path::new("."));
        let mut rec = record("a", "");
        rec.accent_color = "#3366ff".to_string();
        assert!(r.render_interactive(&rec).svg.contains(r##"fill="#3366ff""##));

        rec.accent_color = "red\" onload=\"x".to_string();
        let svg = r.render_interactive(&rec).svg;
        assert!(svg.contains(r##"fill="#EBC700""##));
        assert!(!svg.contains("onload"));
    }

    #[test]
    fn test_text_is_escaped() {
        let r = renderer(Path::new("."));
        let view = r.render_interactive(&record("<A&B>", ""));
        assert!(view.svg.contains("&lt;A&amp;B&gt;"));
        assert!(!view.photo_ready);
    }

    #[test]
    fn test_values_not_rescanned_for_placeholders() {
        let r = renderer(Path::new("."));
        let view = r.render_interactive(&record("{{ACCENT}}", ""));
        assert!(view.svg.contains("{{ACCENT}}"));
    }

    #[test]
    fn test_team_badge() {
        let r = renderer(Path::new("."));
        let mut rec = record("a", "");
        assert!(!r.render_interactive(&rec).svg.contains("TEAM"));
        rec.team = true;
        assert!(r.render_interactive(&rec).svg.contains("TEAM"));
    }

    #[tokio::test]
    async fn test_export_embeds_photo() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("milk.png"), b"not-really-a-png").await.unwrap();
        let r = renderer(tmp.path());

        let view = r.render(&record("みるく", "milk.png"), RenderMode::Export).await;
        assert_eq!(view.mode, RenderMode::Export);
        assert!(view.photo_ready);
        assert!(view.svg.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_export_missing_photo_uses_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let r = renderer(tmp.path());

        let view = r.render_export(&record("みるく", "missing.jpg")).await;
        assert!(!view.photo_ready);
        assert!(!view.svg.contains("<image"));
        assert!(view.svg.contains("#e5e7eb"));
    }

    #[test]
    fn test_photo_path_rejects_traversal() {
        let r = renderer(Path::new("photos"));
        assert_eq!(r.photo_path("a.jpg"), Some(PathBuf::from("photos/a.jpg")));
        assert!(r.photo_path("../secret.jpg").is_none());
        assert!(r.photo_path("/etc/passwd").is_none());
        assert!(r.photo_path("").is_none());
    }

    #[test]
    fn test_wrap_text() {
        assert!(wrap_text("", 12.0, 3).is_empty());
        assert_eq!(wrap_text("あいう", 2.0, 3), vec!["あい", "う"]);
        assert_eq!(wrap_text("abcd", 1.0, 3), vec!["ab", "cd"]);
        assert_eq!(wrap_text("あいうえおか", 2.0, 2), vec!["あい", "う…"]);
    }

    #[test]
    fn test_fill_template() {
        let out = fill_template("a{{X}}b{{Y}}c{{", &[("X", "1".to_string())]);
        assert_eq!(out, "a1b{{Y}}c{{");
    }
}
