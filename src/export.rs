use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A validated export, ready to be written.
#[derive(Debug, PartialEq)]
pub struct JsonExport {
    pub file_name: String,
    pub contents: String,
}

/// Validate the edited pre-annotation text and re-serialize it with
/// two-space indentation. Invalid JSON yields an error and nothing to write.
pub fn prepare(text: &str, image_file_name: &str) -> Result<JsonExport> {
    let value: Value = serde_json::from_str(text)?;
    Ok(JsonExport {
        file_name: json_file_name(image_file_name),
        contents: serde_json::to_string_pretty(&value)?,
    })
}

/// `chart.final.png` becomes `chart.final.json` and `.hidden` becomes
/// `.json`; a name without extension gets `.json` appended.
pub fn json_file_name(image_file_name: &str) -> String {
    match image_file_name.rfind('.') {
        Some(dot) if dot + 1 < image_file_name.len() => {
            format!("{}.json", &image_file_name[..dot])
        }
        _ => format!("{image_file_name}.json"),
    }
}

pub fn write(export: &JsonExport, path: &Path) -> Result<()> {
    std::fs::write(path, &export.contents)?;
    log::info!("exported {}", path.display());
    Ok(())
}

/// Ask where to save, proposing the derived name next to the source image.
pub fn pick_destination(export: &JsonExport, image_path: &Path) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new()
        .add_filter("JSON", &["json"])
        .set_file_name(&export.file_name);
    if let Some(dir) = image_path.parent() {
        dialog = dialog.set_directory(dir);
    }
    dialog.save_file()
}
