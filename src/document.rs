//! `XlsxDocument`: the public façade over the shared archive, workbook
//! index, shared-string table and style table, and exposes the
//! consumer-facing query/query_range/get_dimensions surface.

use crate::archive::Archive;
use crate::cell_ref::CellRef;
use crate::config::ReaderOptions;
use crate::dimension::{self, Mode};
use crate::error::{ExcelError, Result};
use crate::merge_map::MergeMap;
use crate::sheet_streamer::{ColumnMode, RangeFilter, SheetStreamer, StreamParams};
use crate::shared_strings::SharedStringStore;
use crate::style_table::StyleTable;
use crate::workbook_index::WorkbookIndex;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct SheetDimension {
    pub sheet: String,
    pub max_row: u32,
    pub max_col: u32,
    pub start_cell: String,
    pub end_cell: String,
}

/// Owns the read-only state shared across every query against one workbook:
/// the archive handle, the sheet directory, and (built lazily, on first
/// use) the shared-string table and style table.
pub struct XlsxDocument {
    archive: Archive,
    workbook: WorkbookIndex,
    sst: Option<SharedStringStore>,
    styles: Option<StyleTable>,
}

impl XlsxDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut archive = Archive::open(path)?;
        let workbook_xml = archive.read_entry_by_name("xl/workbook.xml")?;
        let rels_xml = archive.read_entry_by_name("xl/_rels/workbook.xml.rels").ok();
        let workbook = WorkbookIndex::parse(&workbook_xml, rels_xml.as_deref())?;

        Ok(XlsxDocument {
            archive,
            workbook,
            sst: None,
            styles: None,
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.names()
    }

    fn ensure_shared_strings(&mut self, opts: &ReaderOptions) -> Result<()> {
        if self.sst.is_some() {
            return Ok(());
        }
        let store = match self.archive.read_entry_by_name("xl/sharedStrings.xml") {
            Ok(bytes) => SharedStringStore::build(
                &bytes,
                opts.enable_shared_string_cache,
                opts.shared_string_cache_size,
            )?,
            Err(_) => {
                log::debug!("no xl/sharedStrings.xml part, all string cells must be inline");
                SharedStringStore::empty()
            }
        };
        self.sst = Some(store);
        Ok(())
    }

    fn ensure_styles(&mut self) {
        if self.styles.is_some() {
            return;
        }
        let table = match self.archive.read_entry_by_name("xl/styles.xml") {
            Ok(bytes) => StyleTable::parse(&bytes),
            Err(_) => StyleTable::empty(),
        };
        self.styles = Some(table);
    }

    fn part_path(&self, sheet: Option<&str>, dynamic_sheets: &std::collections::HashMap<String, String>) -> Result<String> {
        let descriptor = match sheet {
            Some(name) => self.workbook.resolve(name, dynamic_sheets)?,
            None => self
                .workbook
                .active_sheet()
                .ok_or_else(|| ExcelError::MalformedArchive("workbook has no sheets".to_string()))?,
        };
        descriptor
            .part_path
            .clone()
            .ok_or_else(|| ExcelError::MalformedArchive(format!("no part resolved for sheet {}", descriptor.name)))
    }

    /// Opens a fresh decompression stream over `part_path` and reads it
    /// fully. Used only for the pre-pass scans (dimension probing,
    /// merge-region detection) that need to see the whole worksheet part
    /// before the row-streaming pass can begin; the stream this returns is
    /// dropped as soon as those scans finish, distinct from the stream
    /// `SheetStreamer` itself reads incrementally.
    fn read_part_streaming(&mut self, part_path: &str) -> Result<String> {
        let mut stream = self.archive.read_entry_streaming_by_name(part_path)?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| ExcelError::MalformedArchive(format!("cannot read part {part_path}: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    /// `query(useHeaderRow, sheetName?, startCell) → lazy sequence of Row`.
    pub fn query<'a>(
        &'a mut self,
        opts: &ReaderOptions,
        use_header_row: bool,
        sheet: Option<&str>,
        start_cell: Option<&str>,
    ) -> Result<RangeFilter<'a>> {
        self.query_range(opts, use_header_row, sheet, start_cell, None)
    }

    /// `queryRange(useHeaderRow, sheetName?, startCell, endCell) → lazy sequence of Row`.
    pub fn query_range<'a>(
        &'a mut self,
        opts: &ReaderOptions,
        use_header_row: bool,
        sheet: Option<&str>,
        start_cell: Option<&str>,
        end_cell: Option<&str>,
    ) -> Result<RangeFilter<'a>> {
        self.ensure_shared_strings(opts)?;
        self.ensure_styles();

        let part_path = self.part_path(sheet, &opts.dynamic_sheets)?;

        // Dimension probing and merge-region scanning both need to see
        // the whole worksheet part before the row-streaming pass can
        // start, since a `<dimension>` tag or a merged region can appear
        // anywhere in `sheetData`. This is a transient full read over its
        // own fresh stream, dropped once these two scans complete — it is
        // not the buffer the row iterator below reads from.
        let probe_xml = self.read_part_streaming(&part_path)?;
        let dims = dimension::probe(&probe_xml);
        let merges = if opts.fill_merged_cells {
            MergeMap::build(&probe_xml)
        } else {
            MergeMap::empty()
        };
        drop(probe_xml);

        let (start_row, start_col) = match start_cell {
            Some(c) if !c.is_empty() => {
                let r = CellRef::parse(c)?;
                (r.row.saturating_sub(1), r.col)
            }
            _ => (0, 1),
        };
        let (end_row, end_col) = match end_cell {
            Some(c) if !c.is_empty() => {
                let r = CellRef::parse(c)?;
                (Some(r.row.saturating_sub(1)), Some(r.col))
            }
            _ => (None, None),
        };

        let column_mode = match dims.mode {
            Mode::Referenced => ColumnMode::Referenced,
            Mode::ReferenceLess => ColumnMode::ReferenceLess,
        };

        let params = StreamParams {
            use_header_row,
            start_row,
            start_col,
            max_col: (dims.max_col + 1).max(start_col),
            column_mode,
            ignore_empty_rows: opts.ignore_empty_rows,
            fill_merged_cells: opts.fill_merged_cells,
            enable_convert_byte_array: opts.enable_convert_byte_array,
            trim_column_names: opts.trim_column_names,
            date1904: opts.date1904,
        };

        // Fresh stream for the row pass itself: `SheetStreamer` reads this
        // incrementally and never holds the whole worksheet part at once.
        let row_source = self.archive.read_entry_streaming_by_name(&part_path)?;
        let sst = self.sst.as_mut().expect("ensured above");
        let styles = self.styles.as_mut().expect("ensured above");
        let streamer = SheetStreamer::new(row_source, sst, styles, merges, params);
        Ok(RangeFilter::new(streamer, end_row, end_col))
    }

    /// `getDimensions() → list of (sheet, maxRow, maxCol, startCell, endCell)`.
    pub fn get_dimensions(&mut self) -> Result<Vec<SheetDimension>> {
        let names = self.workbook.names();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let part_path = self.part_path(Some(name.as_str()), &Default::default())?;
            let sheet_xml = self.read_part_streaming(&part_path)?;
            let dims = dimension::probe(&sheet_xml);
            let end_cell = CellRef::new(dims.max_col + 1, dims.max_row + 1).to_a1();
            out.push(SheetDimension {
                sheet: name,
                max_row: dims.max_row,
                max_col: dims.max_col,
                start_cell: "A1".to_string(),
                end_cell,
            });
        }
        Ok(out)
    }
}
