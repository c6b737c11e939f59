///! Card controller - the state behind every user-facing surface
///!
///! Owns the directory, the active selection and the exporter. Surfaces
///! hold it by reference (`Arc`) instead of reaching for globals.

use anyhow::Result;
use std::sync::{Arc, RwLock};

use crate::config::AppConfig;
use super::card::{CardRenderer, CardView, ResvgSnapshotter, Snapshotter};
use super::export::{ExportArtifact, ExportError, ExportOptions, ExportOrchestrator, ExportStatus};
use super::member::{Directory, MemberParser, MemberRecord};
use super::selection::Selection;

pub struct CardController {
    directory: Arc<Directory>,
    selection: RwLock<Selection>,
    renderer: Arc<CardRenderer>,
    exporter: ExportOrchestrator,
}

impl CardController {
    pub fn new(
        directory: Arc<Directory>,
        renderer: Arc<CardRenderer>,
        snapshotter: Arc<dyn Snapshotter>,
        options: ExportOptions,
    ) -> Self {
        let selection = RwLock::new(Selection::initial(&directory));
        let exporter = ExportOrchestrator::new(renderer.clone(), snapshotter, options);
        Self {
            directory,
            selection,
            renderer,
            exporter,
        }
    }

    /// Load the directory and build the production renderer/snapshotter
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let parser = MemberParser::new(config.directory.schema, config.directory.min_columns);
        let directory = Directory::load(&config.directory.csv_path, &parser).await?;
        let renderer = CardRenderer::new(&config.card)?;
        let snapshotter = ResvgSnapshotter::new(
            &config.card.fonts_dir,
            &config.card.font_family,
            config.export.pixel_ratio,
        );

        Ok(Self::new(
            Arc::new(directory),
            Arc::new(renderer),
            Arc::new(snapshotter),
            ExportOptions::from(&config.export),
        ))
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn members(&self) -> &[MemberRecord] {
        self.directory.members()
    }

    pub fn renderer(&self) -> &CardRenderer {
        &self.renderer
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.read_selection().active_index()
    }

    pub fn selected(&self) -> Option<&MemberRecord> {
        self.read_selection().active(&self.directory)
    }

    pub fn select(&self, index: usize) -> bool {
        let mut selection = self.selection.write().unwrap_or_else(|e| e.into_inner());
        selection.select(&self.directory, index)
    }

    pub fn select_by_name(&self, name: &str) -> bool {
        match self.directory.position_by_name(name) {
            Some(index) => self.select(index),
            None => false,
        }
    }

    /// Interactive render of the active member
    pub fn render_selected(&self) -> Option<CardView> {
        self.selected().map(|record| self.renderer.render_interactive(record))
    }

    pub fn render_member(&self, index: usize) -> Option<CardView> {
        self.directory.get(index).map(|record| self.renderer.render_interactive(record))
    }

    /// Exports are offered only when there is something to export
    pub fn exports_enabled(&self) -> bool {
        !self.directory.is_empty()
    }

    pub fn export_status(&self) -> ExportStatus {
        self.exporter.status()
    }

    /// Export the member selected at the time of the call
    pub async fn export_selected(&self) -> Result<ExportArtifact, ExportError> {
        let record = self.selected().ok_or(ExportError::NothingSelected)?;
        self.exporter.export_one(record).await
    }

    pub async fn export_all(&self) -> Result<ExportArtifact, ExportError> {
        self.exporter.export_all(self.directory.members()).await
    }

    fn read_selection(&self) -> Selection {
        *self.selection.read().unwrap_or_else(|e| e.into_inner())
    }
}
