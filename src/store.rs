//! Per-image annotation records.
//!
//! Records are index-aligned with the loaded image set. Every operation takes
//! the image index explicitly and touches only that record.

use crate::error::{AnnotateError, Result};
use crate::model::{AnnotationRecord, Axis, ClickPoint, HexColor, LegendDef, PointKind};

#[derive(Debug, Default)]
pub struct AnnotationStore {
    records: Vec<AnnotationRecord>,
}

impl AnnotationStore {
    /// Discard everything and start `count` empty records.
    pub fn reset(&mut self, count: usize) {
        self.records = vec![AnnotationRecord::default(); count];
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, index: usize) -> Option<&AnnotationRecord> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut AnnotationRecord> {
        self.records.get_mut(index)
    }

    fn existing(&mut self, index: usize) -> Result<&mut AnnotationRecord> {
        self.records
            .get_mut(index)
            .ok_or_else(|| AnnotateError::InvalidSequence("Load an image first.".into()))
    }

    /// Append a click. Without an explicit color the kind's default is used,
    /// falling back to black for kinds that have none.
    pub fn add_point(
        &mut self,
        index: usize,
        x: f32,
        y: f32,
        kind: PointKind,
        color: Option<HexColor>,
        axis: Axis,
    ) -> Result<ClickPoint> {
        let record = self.existing(index)?;
        let color = color
            .or_else(|| kind.default_color())
            .unwrap_or(HexColor::rgb(0, 0, 0));
        let point = ClickPoint {
            x,
            y,
            kind,
            color,
            axis,
        };
        record.operations.push(point.clone());
        log::debug!("image {index}: {} points", record.operations.len());
        Ok(point)
    }

    /// Remove the most recent click of this image. Returns what was removed.
    pub fn undo(&mut self, index: usize) -> Option<ClickPoint> {
        self.records.get_mut(index)?.operations.pop()
    }

    /// Rename X ticks in click order. Returns how many were relabelled.
    pub fn relabel_x_points(&mut self, index: usize, labels: &[String]) -> Result<usize> {
        let record = self.existing(index)?;
        if record.x_tick_count() == 0 {
            return Err(AnnotateError::InvalidSequence(
                "No X points have been set.".into(),
            ));
        }
        let mut renamed = 0;
        let ticks = record
            .operations
            .iter_mut()
            .filter(|p| p.kind.is_x_tick());
        for (point, label) in ticks.zip(labels) {
            point.kind = PointKind::XTick(label.clone());
            renamed += 1;
        }
        Ok(renamed)
    }

    /// Empty the clicks and legends of this image. Pre-annotation text stays.
    pub fn clear(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.operations.clear();
            record.legends.clear();
        }
    }

    pub fn add_legend(&mut self, index: usize, label: &str, axis: Axis) -> Result<LegendDef> {
        let label = label.trim();
        if label.is_empty() {
            return Err(AnnotateError::InvalidInput("legend label is empty".into()));
        }
        let record = self.existing(index)?;
        if record.legend(label).is_some() {
            return Err(AnnotateError::InvalidInput(format!(
                "legend {label:?} already exists"
            )));
        }
        let color = HexColor::for_legend(record.legends.len());
        let legend = LegendDef {
            label: label.to_string(),
            color,
            axis,
        };
        record.legends.push(legend.clone());
        Ok(legend)
    }
}

/// Split the `;`-separated X label prompt input into trimmed labels.
pub fn parse_x_labels(input: &str) -> Vec<String> {
    input.split(';').map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(count: usize) -> AnnotationStore {
        let mut store = AnnotationStore::default();
        store.reset(count);
        store
    }

    fn x_tick(store: &mut AnnotationStore, index: usize, x: f32) {
        store
            .add_point(index, x, 10.0, PointKind::XTick(String::new()), None, Axis::Left)
            .unwrap();
    }

    #[test]
    fn add_then_undo_restores_record() {
        let mut store = store_with(1);
        store.add_point(0, 1.0, 2.0, PointKind::Origin, None, Axis::Left).unwrap();
        let before = store.record(0).unwrap().clone();

        store
            .add_point(0, 3.0, 4.0, PointKind::YMax(5.0), None, Axis::Right)
            .unwrap();
        let removed = store.undo(0).unwrap();

        assert_eq!(removed.kind, PointKind::YMax(5.0));
        assert_eq!(store.record(0).unwrap(), &before);
    }

    #[test]
    fn undo_on_empty_record_is_noop() {
        let mut store = store_with(1);
        assert!(store.undo(0).is_none());
        assert!(store.undo(7).is_none());
    }

    #[test]
    fn default_and_explicit_colors() {
        let mut store = store_with(1);
        let p = store
            .add_point(0, 0.0, 0.0, PointKind::XTick(String::new()), None, Axis::Left)
            .unwrap();
        assert_eq!(p.color, HexColor::BLUE);

        let custom = HexColor::rgb(1, 2, 3);
        let p = store
            .add_point(0, 0.0, 0.0, PointKind::Legend("a".into()), Some(custom), Axis::Left)
            .unwrap();
        assert_eq!(p.color, custom);
    }

    #[test]
    fn add_point_without_images_fails() {
        let mut store = AnnotationStore::default();
        let err = store
            .add_point(0, 0.0, 0.0, PointKind::Origin, None, Axis::Left)
            .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidSequence(_)));
    }

    #[test]
    fn relabel_more_labels_than_points() {
        let mut store = store_with(1);
        x_tick(&mut store, 0, 50.0);
        store.add_point(0, 0.0, 0.0, PointKind::Origin, None, Axis::Left).unwrap();
        x_tick(&mut store, 0, 80.0);

        let labels = parse_x_labels("a; b ;c");
        assert_eq!(store.relabel_x_points(0, &labels).unwrap(), 2);

        let ops = &store.record(0).unwrap().operations;
        assert_eq!(ops[0].label(), "X=a");
        assert_eq!(ops[1].label(), "Origin");
        assert_eq!(ops[2].label(), "X=b");
    }

    #[test]
    fn relabel_fewer_labels_than_points() {
        let mut store = store_with(1);
        for x in [10.0, 20.0, 30.0] {
            x_tick(&mut store, 0, x);
        }
        let labels = vec!["2019".to_string()];
        assert_eq!(store.relabel_x_points(0, &labels).unwrap(), 1);

        let labels: Vec<String> = store
            .record(0)
            .unwrap()
            .operations
            .iter()
            .map(|p| p.label())
            .collect();
        assert_eq!(labels, ["X=2019", "X=", "X="]);
    }

    #[test]
    fn relabel_without_x_points_is_rejected() {
        let mut store = store_with(1);
        store.add_point(0, 0.0, 0.0, PointKind::Origin, None, Axis::Left).unwrap();
        let before = store.record(0).unwrap().clone();

        let err = store.relabel_x_points(0, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidSequence(_)));
        assert_eq!(store.record(0).unwrap(), &before);
    }

    #[test]
    fn clear_only_touches_one_image() {
        let mut store = store_with(2);
        for i in 0..2 {
            x_tick(&mut store, i, 1.0);
            store.add_legend(i, "series", Axis::Left).unwrap();
            store.record_mut(i).unwrap().pre_annotate_data = "{}".into();
        }
        let other = store.record(1).unwrap().clone();

        store.clear(0);

        let cleared = store.record(0).unwrap();
        assert!(cleared.operations.is_empty());
        assert!(cleared.legends.is_empty());
        assert_eq!(cleared.pre_annotate_data, "{}");
        assert_eq!(store.record(1).unwrap(), &other);
    }

    #[test]
    fn legends_get_distinct_colors_and_unique_labels() {
        let mut store = store_with(1);
        let first = store.add_legend(0, " cost ", Axis::Left).unwrap();
        assert_eq!(first.label, "cost");
        let second = store.add_legend(0, "profit", Axis::Right).unwrap();
        assert_ne!(first.color, second.color);
        assert_eq!(second.axis, Axis::Right);

        assert!(store.add_legend(0, "cost", Axis::Left).is_err());
        assert!(store.add_legend(0, "   ", Axis::Left).is_err());
        assert_eq!(store.record(0).unwrap().legends.len(), 2);
    }
}
