//! Flash image layout
//!
//! The ordered set of build artifacts and the flash offsets they are merged
//! at. Offsets must strictly increase in flash order and segments must not
//! overlap.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// One artifact placed in the merged image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Segment {
    /// Component name (bootloader, partition table, application...)
    pub name: String,
    /// File name relative to the build directory
    pub file: String,
    /// Base address inside the flash
    pub offset: u64,
}

impl Segment {
    fn new(name: &str, file: &str, offset: u64) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
            offset,
        }
    }
}

/// Segments plus total flash size
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlashImageLayout {
    /// Total flash size in bytes; the merged image is padded to it
    #[serde(default = "default_flash_size")]
    pub flash_size: u64,

    /// Segments in flash order
    #[serde(default = "default_segments")]
    pub segments: Vec<Segment>,
}

impl Default for FlashImageLayout {
    fn default() -> Self {
        Self {
            flash_size: default_flash_size(),
            segments: default_segments(),
        }
    }
}

fn default_flash_size() -> u64 {
    8 * MIB
}

fn default_segments() -> Vec<Segment> {
    vec![
        Segment::new("bootloader", "bootloader.bin", 0x1000),
        Segment::new("partition-table", "partitions.bin", 0x8000),
        Segment::new("application", "firmware.bin", 0x10000),
    ]
}

impl FlashImageLayout {
    /// Check ordering and bounds that don't need the artifacts on disk
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(Error::Layout("at least one segment is required".to_string()));
        }

        if self.flash_size == 0 || self.flash_size % MIB != 0 {
            return Err(Error::Layout(format!(
                "flash size {:#x} is not a whole number of MiB",
                self.flash_size
            )));
        }

        for pair in self.segments.windows(2) {
            if pair[1].offset <= pair[0].offset {
                return Err(Error::Layout(format!(
                    "'{}' at {:#x} must come after '{}' at {:#x}",
                    pair[1].name, pair[1].offset, pair[0].name, pair[0].offset
                )));
            }
        }

        if let Some(last) = self.segments.last() {
            if last.offset >= self.flash_size {
                return Err(Error::Layout(format!(
                    "'{}' at {:#x} lies outside the {} MiB flash",
                    last.name,
                    last.offset,
                    self.flash_size_mb()
                )));
            }
        }

        Ok(())
    }

    /// Check that artifacts present in `build_dir` fit before the next segment
    ///
    /// Missing files are skipped; the merge tool reports those itself.
    pub fn check_fits(&self, build_dir: &Path) -> Result<()> {
        for (i, segment) in self.segments.iter().enumerate() {
            let Ok(meta) = std::fs::metadata(build_dir.join(&segment.file)) else {
                continue;
            };

            let limit = self
                .segments
                .get(i + 1)
                .map(|next| next.offset)
                .unwrap_or(self.flash_size);
            let end = segment.offset + meta.len();

            if end > limit {
                return Err(Error::Layout(format!(
                    "'{}' ({} bytes at {:#x}) overruns {:#x}",
                    segment.name,
                    meta.len(),
                    segment.offset,
                    limit
                )));
            }
        }
        Ok(())
    }

    pub fn flash_size_mb(&self) -> u64 {
        self.flash_size / MIB
    }

    /// `<offset> <path>` argument pairs in flash order
    pub fn segment_args(&self, build_dir: &Path) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|s| {
                [
                    format!("{:#x}", s.offset),
                    build_dir.join(&s.file).display().to_string(),
                ]
            })
            .collect()
    }
}
