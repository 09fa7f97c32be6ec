//! Interaction state: what a canvas click means right now, which image is
//! shown, and the free-text editor bound to it.
//!
//! All mutation goes through `Session` from the UI thread. Worker results
//! are tagged with the batch generation they were requested for and are
//! dropped if a new batch has been loaded since.

use serde_json::Value;
use std::path::PathBuf;

use crate::error::{AnnotateError, Result};
use crate::export::{self, JsonExport};
use crate::images::{Direction, ImageSet};
use crate::model::{AnnotationRecord, Axis, ClickPoint, ImageEntry, LegendDef, PointKind, ProcessDataRequest};
use crate::service::PreAnnotation;
use crate::store::{self, AnnotationStore};

/// What the next canvas click records.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Action {
    #[default]
    Idle,
    SetOrigin,
    SetXPoints,
    SetYMin,
    SetYMax,
    PlaceLegend(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Idle => "None",
            Action::SetOrigin => "Origin",
            Action::SetXPoints => "X points",
            Action::SetYMin => "Y min",
            Action::SetYMax => "Y max",
            Action::PlaceLegend(_) => "Legend",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

/// A Y bound click waiting for the user to type its value.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingValue {
    pub bound: Bound,
    pub image: usize,
    pub x: f32,
    pub y: f32,
    pub axis: Axis,
}

impl PendingValue {
    pub fn prompt(&self) -> &'static str {
        match self.bound {
            Bound::Min => "Enter value for Y Min",
            Bound::Max => "Enter value for Y Max",
        }
    }

    pub fn default_input(&self) -> &'static str {
        match self.bound {
            Bound::Min => "0",
            Bound::Max => "",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ClickOutcome {
    Ignored,
    Recorded(ClickPoint),
    NeedsValue(PendingValue),
}

#[derive(Default)]
pub struct Session {
    pub images: ImageSet,
    pub store: AnnotationStore,
    pub action: Action,
    /// Keep the action armed after a click.
    pub continuous: bool,
    /// Axis assigned to new points and legends.
    pub axis: Axis,
    /// Free-text editor for the current image's pre-annotation.
    pub editor: String,
    /// Read-only result of the last `process-data` call.
    pub service_result: Option<String>,
    /// Inline error from the last export attempt.
    pub error_message: Option<String>,
}

impl Session {
    // ── Images ──────────────────────────────────────────────────────────────

    /// Replace the image set; every annotation of the previous batch is dropped.
    pub fn load_batch(&mut self, entries: Vec<ImageEntry>) {
        let count = entries.len();
        self.images.replace(entries);
        self.store.reset(count);
        self.action = Action::Idle;
        self.editor.clear();
        self.service_result = None;
        self.error_message = None;
        log::info!("loaded {count} images");
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.images.is_empty()).then(|| self.images.current_index())
    }

    pub fn current_record(&self) -> Option<&AnnotationRecord> {
        self.store.record(self.current_index()?)
    }

    pub fn current_image(&self) -> Option<&ImageEntry> {
        self.images.current()
    }

    pub fn navigate(&mut self, direction: Direction) -> bool {
        self.flush_editor();
        let moved = self.images.navigate(direction).is_some();
        self.after_switch(moved)
    }

    pub fn select_image(&mut self, index: usize) -> bool {
        self.flush_editor();
        let moved = self.images.select(index).is_some();
        self.after_switch(moved)
    }

    fn after_switch(&mut self, moved: bool) -> bool {
        if moved {
            self.editor = self
                .current_record()
                .map(|r| r.pre_annotate_data.clone())
                .unwrap_or_default();
            self.service_result = None;
            self.error_message = None;
        }
        moved
    }

    /// Keep unsaved editor text with the image it was typed for.
    pub fn flush_editor(&mut self) {
        if let Some(index) = self.current_index() {
            if let Some(record) = self.store.record_mut(index) {
                record.pre_annotate_data = self.editor.clone();
            }
        }
    }

    // ── Modes ───────────────────────────────────────────────────────────────

    pub fn select_action(&mut self, action: Action) {
        self.action = action;
        self.continuous = true;
    }

    /// Arm the legend for clicks, or disarm it if it already is.
    pub fn toggle_legend(&mut self, label: &str) {
        if matches!(&self.action, Action::PlaceLegend(active) if active == label) {
            self.action = Action::Idle;
            return;
        }
        if self.current_record().and_then(|r| r.legend(label)).is_some() {
            self.select_action(Action::PlaceLegend(label.to_string()));
        }
    }

    pub fn active_legend(&self) -> Option<&str> {
        match &self.action {
            Action::PlaceLegend(label) => Some(label.as_str()),
            _ => None,
        }
    }

    fn finish_action(&mut self) {
        if !self.continuous {
            self.action = Action::Idle;
        }
    }

    // ── Clicks ──────────────────────────────────────────────────────────────

    /// Interpret a click at image coordinates `(x, y)`.
    pub fn click(&mut self, x: f32, y: f32) -> Result<ClickOutcome> {
        let Some(index) = self.current_index() else {
            return Ok(ClickOutcome::Ignored);
        };
        let (kind, color, axis) = match &self.action {
            Action::Idle => return Ok(ClickOutcome::Ignored),
            Action::SetOrigin => (PointKind::Origin, None, self.axis),
            Action::SetXPoints => (PointKind::XTick(String::new()), None, self.axis),
            Action::SetYMin | Action::SetYMax => {
                let bound = if self.action == Action::SetYMin {
                    Bound::Min
                } else {
                    Bound::Max
                };
                return Ok(ClickOutcome::NeedsValue(PendingValue {
                    bound,
                    image: index,
                    x,
                    y,
                    axis: self.axis,
                }));
            }
            Action::PlaceLegend(label) => {
                let Some(legend) = self.current_record().and_then(|r| r.legend(label)) else {
                    log::warn!("legend {label:?} is not defined on this image");
                    return Ok(ClickOutcome::Ignored);
                };
                (
                    PointKind::Legend(legend.label.clone()),
                    Some(legend.color),
                    legend.axis,
                )
            }
        };
        let point = self.store.add_point(index, x, y, kind, color, axis)?;
        self.finish_action();
        Ok(ClickOutcome::Recorded(point))
    }

    /// Record a pending Y bound with the value the user typed.
    pub fn commit_value(&mut self, pending: &PendingValue, input: &str) -> Result<ClickPoint> {
        let value: f64 = input
            .trim()
            .parse()
            .map_err(|_| AnnotateError::InvalidInput(format!("{:?} is not a number", input.trim())))?;
        if !value.is_finite() {
            return Err(AnnotateError::InvalidInput(format!("{value} is not a finite number")));
        }
        let kind = match pending.bound {
            Bound::Min => PointKind::YMin(value),
            Bound::Max => PointKind::YMax(value),
        };
        let point = self
            .store
            .add_point(pending.image, pending.x, pending.y, kind, None, pending.axis)?;
        self.finish_action();
        Ok(point)
    }

    // ── Record edits ────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<ClickPoint> {
        self.store.undo(self.current_index()?)
    }

    pub fn clear(&mut self) {
        if let Some(index) = self.current_index() {
            self.store.clear(index);
            if matches!(self.action, Action::PlaceLegend(_)) {
                self.action = Action::Idle;
            }
        }
        self.service_result = None;
    }

    /// Image a new legend prompt is opened for.
    pub fn legend_target(&self) -> Result<usize> {
        self.require_image()
    }

    /// Add a legend to image `index`, which need not be the one on screen.
    pub fn add_legend(&mut self, index: usize, label: &str) -> Result<LegendDef> {
        self.store.add_legend(index, label, self.axis)
    }

    /// The current image and the text to pre-fill its X label prompt with.
    /// Fails when there is nothing to relabel.
    pub fn begin_relabel(&self) -> Result<(usize, String)> {
        let index = self
            .current_index()
            .ok_or_else(|| AnnotateError::InvalidSequence("You need to set X points first.".into()))?;
        let record = self
            .store
            .record(index)
            .ok_or_else(|| AnnotateError::InvalidSequence("You need to set X points first.".into()))?;
        if record.x_tick_count() == 0 {
            return Err(AnnotateError::InvalidSequence("No X points have been set.".into()));
        }
        Ok((index, record.axis_labels.join(";")))
    }

    /// Apply the `;`-separated labels to image `index`. Empty input changes nothing.
    pub fn relabel_x(&mut self, index: usize, input: &str) -> Result<usize> {
        if input.trim().is_empty() {
            return Ok(0);
        }
        self.store.relabel_x_points(index, &store::parse_x_labels(input))
    }

    fn require_image(&self) -> Result<usize> {
        self.current_index()
            .ok_or_else(|| AnnotateError::InvalidSequence("Upload and select an image first.".into()))
    }

    // ── Remote results ──────────────────────────────────────────────────────

    /// Where a pre-annotation request for the current image should go.
    pub fn chart_target(&self) -> Result<(u64, usize, PathBuf)> {
        let index = self.require_image()?;
        let entry = self
            .images
            .get(index)
            .ok_or_else(|| AnnotateError::InvalidSequence("Upload and select an image first.".into()))?;
        Ok((self.images.generation(), index, entry.path.clone()))
    }

    /// Store a pre-annotation for the image it was requested for. Returns
    /// false if it belongs to a batch that has since been replaced.
    pub fn apply_pre_annotation(&mut self, generation: u64, index: usize, pre: PreAnnotation) -> bool {
        if generation != self.images.generation() {
            log::debug!("dropping pre-annotation for stale batch {generation}");
            return false;
        }
        let is_current = self.current_index() == Some(index);
        let Some(record) = self.store.record_mut(index) else {
            return false;
        };
        record.pre_annotate_data = pre.text;
        record.axis_labels = pre.axis_labels;
        if is_current {
            self.editor = record.pre_annotate_data.clone();
        }
        true
    }

    pub fn process_data_request(&self) -> Result<(u64, usize, ProcessDataRequest)> {
        let index = self.require_image()?;
        let record = self
            .store
            .record(index)
            .ok_or_else(|| AnnotateError::InvalidSequence("No image selected.".into()))?;
        Ok((self.images.generation(), index, ProcessDataRequest::from(record)))
    }

    /// Show a `process-data` result if it is for the image on screen.
    pub fn apply_service_result(&mut self, generation: u64, index: usize, result: Result<Value>) {
        if generation != self.images.generation() || self.current_index() != Some(index) {
            return;
        }
        self.service_result = Some(match result {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            Err(err) => {
                log::error!("process-data failed: {err}");
                format!("Failed to process data: {err}")
            }
        });
    }

    // ── Export ──────────────────────────────────────────────────────────────

    /// Validate the editor text for export, setting the inline error on failure.
    pub fn prepare_export(&mut self) -> Option<JsonExport> {
        self.error_message = None;
        let file_name = self.current_image()?.file_name.clone();
        match export::prepare(&self.editor, &file_name) {
            Ok(export) => Some(export),
            Err(err) => {
                log::warn!("export of {file_name} rejected: {err}");
                self.error_message = Some(err.to_string());
                None
            }
        }
    }
}
