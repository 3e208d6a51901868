//! Zip packaging of rendered blocks as `part_<n>.<ext>` entries.

use crate::error::Result;
use crate::exporters::{ExportFormat, ExportOptions};
use crate::messages::Block;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Download name for the archive
pub const ARCHIVE_NAME: &str = "split_result.zip";

/// Entry name for the 1-based block index
pub fn part_name(index: usize, format: ExportFormat) -> String {
    format!("part_{}.{}", index, format.extension())
}

/// Render every block and pack them into one deflated archive
pub fn build_archive(blocks: &[Block<'_>], format: ExportFormat, opts: &ExportOptions) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (i, block) in blocks.iter().enumerate() {
        let name = part_name(i + 1, format);
        let body = format.render(block, opts)?;
        debug!("Writing {} ({} messages, {} bytes)", name, block.len(), body.len());
        zip.start_file(name, options)?;
        zip.write_all(&body)?;
    }

    Ok(zip.finish()?.into_inner())
}
