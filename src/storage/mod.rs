//! Output of extracted records and page captures
//!
//! Records are streamed through a [`RecordSink`] as soon as they are
//! extracted; the binary uses [`JsonLinesWriter`] over stdout.

pub mod jsonl;

pub use jsonl::JsonLinesWriter;

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::models::ItemRecord;

/// Destination of extracted records
pub trait RecordSink {
    /// Emit one record; called once per record added to the result set
    fn write_record(&mut self, record: &ItemRecord) -> crate::error::Result<()>;
}

impl RecordSink for Vec<ItemRecord> {
    fn write_record(&mut self, record: &ItemRecord) -> crate::error::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Write a captured image to `path`
///
/// The bytes go to a temporary file in the same directory which is then
/// renamed over `path`, so an interrupted write never leaves a truncated
/// image behind.
pub fn write_screenshot(path: &Path, image: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).context("Failed to create screenshot directory")?;

    let file_name = path
        .file_name()
        .context("Screenshot path has no file name")?
        .to_string_lossy();
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(image)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    drop(file);

    fs::rename(&tmp, path).with_context(|| format!("Failed to move screenshot to {}", path.display()))?;

    tracing::info!(path = %path.display(), bytes = image.len(), "Screenshot written");
    Ok(())
}
