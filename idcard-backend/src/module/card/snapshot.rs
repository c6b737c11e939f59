///! Card rasterization

use async_trait::async_trait;
use resvg::tiny_skia;
use resvg::usvg::{fontdb, Options, Tree};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::renderer::CardView;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to parse card SVG: {0}")]
    Parse(String),

    #[error("invalid pixmap size {width}x{height}")]
    PixmapSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("rasterizer task failed: {0}")]
    Task(String),
}

/// Turns a rendered card into raster image bytes.
#[async_trait]
pub trait Snapshotter: Send + Sync {
    async fn snapshot(&self, card: &CardView) -> Result<Vec<u8>, SnapshotError>;
}

/// PNG snapshotter backed by resvg
pub struct ResvgSnapshotter {
    fontdb: Arc<fontdb::Database>,
    font_family: String,
    pixel_ratio: f32,
}

impl ResvgSnapshotter {
    /// Load fonts from `fonts_dir` plus the system fonts.
    pub fn new(fonts_dir: impl AsRef<Path>, font_family: &str, pixel_ratio: f32) -> Self {
        let mut db = fontdb::Database::new();
        db.load_fonts_dir(fonts_dir.as_ref());
        let bundled = db.len();
        db.load_system_fonts();
        tracing::debug!(
            "Loaded {} font faces ({} from {:?})",
            db.len(),
            bundled,
            fonts_dir.as_ref()
        );

        Self::with_fontdb(Arc::new(db), font_family, pixel_ratio)
    }

    pub fn with_fontdb(fontdb: Arc<fontdb::Database>, font_family: &str, pixel_ratio: f32) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            tracing::warn!("Invalid pixel ratio {}, defaulting to 1.0", pixel_ratio);
            1.0
        };

        Self {
            fontdb,
            font_family: font_family.to_string(),
            pixel_ratio,
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn rasterize(
        svg: &str,
        fontdb: Arc<fontdb::Database>,
        font_family: String,
        scale: f32,
    ) -> Result<Vec<u8>, SnapshotError> {
        let mut options = Options::default();
        options.font_family = font_family;
        options.fontdb = fontdb;

        let tree = Tree::from_str(svg, &options).map_err(|e| SnapshotError::Parse(e.to_string()))?;

        let size = tree.size();
        let width = (size.width() * scale).ceil() as u32;
        let height = (size.height() * scale).ceil() as u32;

        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(SnapshotError::PixmapSize { width, height })?;

        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        pixmap.encode_png().map_err(|e| SnapshotError::Encode(e.to_string()))
    }
}

#[async_trait]
impl Snapshotter for ResvgSnapshotter {
    async fn snapshot(&self, card: &CardView) -> Result<Vec<u8>, SnapshotError> {
        let svg = card.svg.clone();
        let fontdb = self.fontdb.clone();
        let font_family = self.font_family.clone();
        let scale = self.pixel_ratio;

        let png = tokio::task::spawn_blocking(move || Self::rasterize(&svg, fontdb, font_family, scale))
            .await
            .map_err(|e| SnapshotError::Task(e.to_string()))??;

        tracing::debug!("Snapshotted card for {} ({} bytes)", card.display_name, png.len());
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::card::RenderMode;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    fn view(svg: &str) -> CardView {
        CardView {
            display_name: "test".to_string(),
            mode: RenderMode::Export,
            photo_ready: false,
            svg: svg.to_string(),
        }
    }

    fn snapshotter(ratio: f32) -> ResvgSnapshotter {
        ResvgSnapshotter::with_fontdb(Arc::new(fontdb::Database::new()), "serif", ratio)
    }

    #[tokio::test]
    async fn test_snapshot_scales_by_pixel_ratio() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="60" height="35"><rect width="60" height="35" fill="#EBC700"/></svg>"##;
        let png = snapshotter(2.0).snapshot(&view(svg)).await.unwrap();

        assert!(png.starts_with(PNG_MAGIC));
        // IHDR width/height
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        assert_eq!((width, height), (120, 70));
    }

    #[tokio::test]
    async fn test_invalid_svg_fails() {
        let err = snapshotter(2.0).snapshot(&view("<not-svg")).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(_)));
    }

    #[test]
    fn test_invalid_ratio_defaults() {
        assert_eq!(snapshotter(0.0).pixel_ratio(), 1.0);
        assert_eq!(snapshotter(f32::NAN).pixel_ratio(), 1.0);
        assert_eq!(snapshotter(3.0).pixel_ratio(), 3.0);
    }
}
