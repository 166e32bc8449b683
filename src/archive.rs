//! Thin wrapper over the `s-zip` streaming ZIP reader.
//!
//! Container unzipping is treated as an external collaborator: this module
//! only adapts `s-zip`'s entry API to the shape the rest of the crate needs —
//! list entries, read one fully into memory, or open one as a forward-only
//! `Read` stream for a second/third pass over the same part.

use crate::error::{ExcelError, Result};
use s_zip::StreamingZip;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A single archive entry's logical path (e.g. `"xl/worksheets/sheet1.xml"`).
pub struct Entry {
    pub name: String,
}

/// Opens an xlsx (ZIP) container and lets callers re-open any entry as a
/// fresh decompression stream, since the underlying compressed bytes are not
/// randomly accessible.
pub struct Archive {
    inner: StreamingZip<File>,
    entries: Vec<Entry>,
}

impl Archive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| ExcelError::MalformedArchive(format!("cannot open {}: {e}", path.as_ref().display())))?;
        let inner = StreamingZip::open(file)
            .map_err(|e| ExcelError::MalformedArchive(format!("cannot read zip central directory: {e}")))?;
        let entries = inner
            .entry_names()
            .into_iter()
            .map(|name| Entry { name })
            .collect();
        Ok(Archive { inner, entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Read an entry fully into memory. Used for small, random-access parts
    /// (workbook.xml, rels, shared strings below the spill threshold).
    pub fn read_entry_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        self.inner
            .read_to_vec(name)
            .map_err(|e| ExcelError::MalformedArchive(format!("missing part {name}: {e}")))
    }

    /// Open an entry as a forward-only decompression stream. Each call opens
    /// a fresh stream — re-reading the same part means decompressing it
    /// again, there is no seeking back into an already-consumed stream.
    pub fn read_entry_streaming_by_name<'a>(&'a mut self, name: &str) -> Result<Box<dyn Read + 'a>> {
        self.inner
            .open_stream(name)
            .map_err(|e| ExcelError::MalformedArchive(format!("missing part {name}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture_zip(path: &std::path::Path, parts: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn reads_entries_back_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.xlsx");
        write_fixture_zip(
            &path,
            &[("xl/workbook.xml", "<workbook/>"), ("xl/sharedStrings.xml", "<sst/>")],
        );

        let mut archive = Archive::open(&path).unwrap();
        assert!(archive.contains("xl/workbook.xml"));
        let data = archive.read_entry_by_name("xl/workbook.xml").unwrap();
        assert_eq!(data, b"<workbook/>");
    }
}
