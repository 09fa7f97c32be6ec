//! The ordered set of loaded chart images and the current selection.

use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};
use crate::model::ImageEntry;
use crate::service::ChartService;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

#[derive(Default)]
pub struct ImageSet {
    entries: Vec<ImageEntry>,
    current: usize,
    generation: u64,
}

impl ImageSet {
    /// Swap in a whole new batch and select its first image.
    pub fn replace(&mut self, entries: Vec<ImageEntry>) {
        self.entries = entries;
        self.current = 0;
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&ImageEntry> {
        self.entries.get(self.current)
    }

    pub fn get(&self, index: usize) -> Option<&ImageEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageEntry> {
        self.entries.iter()
    }

    /// Bumped on every `replace`, so late results for an old batch can be told apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Step one image back or forward. Returns the new index if it moved.
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let target = match direction {
            Direction::Prev => self.current.checked_sub(1)?,
            Direction::Next => self.current + 1,
        };
        self.select(target)
    }

    /// Jump to `index`. Returns it if it is valid and differs from the current one.
    pub fn select(&mut self, index: usize) -> Option<usize> {
        if index >= self.entries.len() || index == self.current {
            return None;
        }
        self.current = index;
        Some(index)
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reorder `paths` to follow `sorted_names`.
///
/// Names unknown to the batch are skipped; batch files the order does not
/// mention keep their relative input order at the end.
pub fn order_by_names(paths: Vec<PathBuf>, sorted_names: &[String]) -> Vec<PathBuf> {
    let mut remaining: Vec<Option<PathBuf>> = paths.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for name in sorted_names {
        let slot = remaining
            .iter_mut()
            .find(|slot| slot.as_deref().is_some_and(|p| file_name_of(p) == *name));
        match slot.and_then(Option::take) {
            Some(path) => ordered.push(path),
            None => log::warn!("sort order names unknown file {name:?}"),
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}

/// Order a batch (through the service when one is given) and decode it.
///
/// A failed sort request falls back to the input order.
pub fn load(paths: Vec<PathBuf>, sorter: Option<&dyn ChartService>) -> Result<Vec<ImageEntry>> {
    let paths = match sorter {
        Some(service) => {
            let names: Vec<String> = paths.iter().map(|p| file_name_of(p)).collect();
            match service.sort_files(&names) {
                Ok(sorted) => order_by_names(paths, &sorted),
                Err(err) => {
                    log::warn!("sort_files failed, keeping input order: {err}");
                    paths
                }
            }
        }
        None => paths,
    };
    decode_batch(&paths)
}

/// Decode every file of the batch. Any failure fails the whole batch.
pub fn decode_batch(paths: &[PathBuf]) -> Result<Vec<ImageEntry>> {
    paths.par_iter().map(|path| decode_one(path)).collect()
}

fn decode_one(path: &Path) -> Result<ImageEntry> {
    let file_name = file_name_of(path);
    let image = image::open(path).map_err(|source| AnnotateError::ImageDecode {
        file: file_name.clone(),
        source,
    })?;
    log::debug!("decoded {} ({}x{})", file_name, image.width(), image.height());
    Ok(ImageEntry {
        file_name,
        path: path.to_path_buf(),
        image,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::ProcessDataRequest;
    use crate::service::{ChartRequest, ChartResponse};
    use image::{DynamicImage, RgbaImage};
    use serde_json::Value;
    use tempfile::tempdir;

    /// Sorts names in reverse, or fails when `fail` is set.
    struct ReverseSorter {
        fail: bool,
    }

    impl ChartService for ReverseSorter {
        fn sort_files(&self, files: &[String]) -> Result<Vec<String>> {
            if self.fail {
                return Err(AnnotateError::Service("unreachable".into()));
            }
            let mut sorted = files.to_vec();
            sorted.sort();
            sorted.reverse();
            Ok(sorted)
        }

        fn process_chart(&self, _request: &ChartRequest) -> Result<ChartResponse> {
            Ok(ChartResponse::default())
        }

        fn process_data(&self, _request: &ProcessDataRequest) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn write_batch(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                RgbaImage::new(2, 2).save(&path).unwrap();
                path
            })
            .collect()
    }

    pub(crate) fn entry(name: &str) -> ImageEntry {
        ImageEntry {
            file_name: name.to_string(),
            path: PathBuf::from(name),
            image: DynamicImage::ImageRgba8(RgbaImage::new(4, 3)),
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| file_name_of(p)).collect()
    }

    #[test]
    fn order_follows_sorted_names() {
        let input = vec![
            PathBuf::from("/a/c10.png"),
            PathBuf::from("/a/c2.png"),
            PathBuf::from("/a/c1.png"),
        ];
        let sorted = vec!["c1.png".to_string(), "c2.png".into(), "c10.png".into()];
        assert_eq!(
            names(&order_by_names(input, &sorted)),
            ["c1.png", "c2.png", "c10.png"]
        );
    }

    #[test]
    fn order_tolerates_unknown_and_missing_names() {
        let input = vec![
            PathBuf::from("a.png"),
            PathBuf::from("b.png"),
            PathBuf::from("c.png"),
        ];
        let sorted = vec!["c.png".to_string(), "ghost.png".into()];
        assert_eq!(
            names(&order_by_names(input, &sorted)),
            ["c.png", "a.png", "b.png"]
        );
    }

    #[test]
    fn order_with_empty_response_keeps_input() {
        let input = vec![PathBuf::from("z.png"), PathBuf::from("y.png")];
        assert_eq!(names(&order_by_names(input, &[])), ["z.png", "y.png"]);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut set = ImageSet::default();
        set.replace(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(set.navigate(Direction::Prev), None);
        assert_eq!(set.navigate(Direction::Next), Some(1));
        assert_eq!(set.navigate(Direction::Next), Some(2));
        assert_eq!(set.navigate(Direction::Next), None);
        assert_eq!(set.current().unwrap().file_name, "c");
        assert_eq!(set.select(0), Some(0));
        assert_eq!(set.select(0), None);
        assert_eq!(set.select(3), None);
    }

    #[test]
    fn replace_resets_selection_and_bumps_generation() {
        let mut set = ImageSet::default();
        set.replace(vec![entry("a"), entry("b")]);
        set.select(1);
        let generation = set.generation();

        set.replace(vec![entry("x")]);
        assert_eq!(set.current_index(), 0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.generation(), generation + 1);
    }

    #[test]
    fn decode_keeps_batch_order() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, name) in ["b.png", "a.png", "c.png"].iter().enumerate() {
            let path = dir.path().join(name);
            RgbaImage::new(i as u32 + 1, 2).save(&path).unwrap();
            paths.push(path);
        }

        let entries = decode_batch(&paths).unwrap();
        let got: Vec<_> = entries.iter().map(|e| (e.file_name.as_str(), e.image.width())).collect();
        assert_eq!(got, [("b.png", 1), ("a.png", 2), ("c.png", 3)]);
    }

    #[test]
    fn load_follows_service_order() {
        let dir = tempdir().unwrap();
        let paths = write_batch(dir.path(), &["a.png", "c.png", "b.png"]);
        let entries = load(paths, Some(&ReverseSorter { fail: false })).unwrap();
        let got: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(got, ["c.png", "b.png", "a.png"]);
    }

    #[test]
    fn load_keeps_input_order_when_sort_fails_or_is_off() {
        let dir = tempdir().unwrap();
        let paths = write_batch(dir.path(), &["a.png", "c.png", "b.png"]);

        let failed = load(paths.clone(), Some(&ReverseSorter { fail: true })).unwrap();
        let bypassed = load(paths, None).unwrap();
        for entries in [failed, bypassed] {
            let got: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
            assert_eq!(got, ["a.png", "c.png", "b.png"]);
        }
    }

    #[test]
    fn one_bad_file_fails_the_batch() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbaImage::new(2, 2).save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();

        let err = decode_batch(&[good, bad]).err().unwrap();
        assert!(matches!(err, AnnotateError::ImageDecode { ref file, .. } if file == "bad.png"));
    }
}
