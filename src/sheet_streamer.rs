//! Per-row worksheet streaming: `SheetStreamer` and the `RangeFilter` adapter.

use crate::cell_ref::{column_index_to_letters, CellRef};
use crate::error::Result;
use crate::merge_map::MergeMap;
use crate::shared_strings::SharedStringStore;
use crate::style_table::StyleTable;
use crate::types::{CellValue, Row};
use std::collections::VecDeque;
use std::io::Read;

/// Read size for topping up the lookahead buffer from the underlying
/// decompression stream.
const CHUNK_SIZE: usize = 64 * 1024;

/// Once the scanned-past prefix exceeds this many bytes, drop it so the
/// buffer never grows past roughly one row's worth of lookahead.
const COMPACT_AT: usize = 256 * 1024;

/// Positional vs. referenced column addressing, decided once per sheet by
/// [`crate::dimension::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    Referenced,
    ReferenceLess,
}

pub struct StreamParams {
    pub use_header_row: bool,
    pub start_row: u32,
    pub start_col: u32,
    pub max_col: u32,
    pub column_mode: ColumnMode,
    pub ignore_empty_rows: bool,
    pub fill_merged_cells: bool,
    pub enable_convert_byte_array: bool,
    pub trim_column_names: bool,
    pub date1904: bool,
}

/// Lazily yields [`Row`]s from one worksheet's decompressed XML.
///
/// Reads the underlying decompression stream incrementally into a
/// lookahead buffer, compacted once the scanned-past prefix grows past
/// [`COMPACT_AT`] — the full worksheet part is never resident at once,
/// only a bounded window around the current scan position. The cursor
/// never moves backward, so dropping the iterator early (consumer
/// `break`s out of a `for` loop) simply stops scanning — no explicit
/// cancellation signal is needed, `Drop` releases everything.
pub struct SheetStreamer<'a> {
    source: Box<dyn Read + 'a>,
    buf: Vec<u8>,
    pos: usize,
    source_exhausted: bool,
    sst: &'a mut SharedStringStore,
    styles: &'a mut StyleTable,
    merges: MergeMap,
    params: StreamParams,
    byte_blob_parts: Option<&'a dyn Fn(&str) -> Option<Vec<u8>>>,

    running_row_index: u32,
    last_yielded: Option<u32>,
    header: Option<Vec<String>>,
    header_consumed: bool,
    pending: VecDeque<Row>,
    exhausted: bool,
}

impl<'a> SheetStreamer<'a> {
    pub fn new(
        source: Box<dyn Read + 'a>,
        sst: &'a mut SharedStringStore,
        styles: &'a mut StyleTable,
        merges: MergeMap,
        params: StreamParams,
    ) -> Self {
        SheetStreamer {
            source,
            buf: Vec::new(),
            pos: 0,
            source_exhausted: false,
            sst,
            styles,
            merges,
            params,
            byte_blob_parts: None,
            running_row_index: 0,
            last_yielded: None,
            header: None,
            header_consumed: false,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Pulls one more chunk from the source into `buf`. Returns `false`
    /// once the source is exhausted (so callers can stop retrying).
    fn fill_more(&mut self) -> bool {
        if self.source_exhausted {
            return false;
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        match self.source.read(&mut chunk) {
            Ok(0) => {
                self.source_exhausted = true;
                false
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                true
            }
            Err(_) => {
                self.source_exhausted = true;
                false
            }
        }
    }

    /// Finds `needle` at or after absolute offset `from`, topping up the
    /// buffer from the source as needed. `None` once the source is
    /// exhausted and `needle` still hasn't appeared.
    fn find_from(&mut self, from: usize, needle: &[u8]) -> Option<usize> {
        loop {
            if let Some(rel) = find_bytes(&self.buf[from.min(self.buf.len())..], needle) {
                return Some(from + rel);
            }
            if !self.fill_more() {
                return None;
            }
        }
    }

    /// Drops the already-scanned prefix once it exceeds [`COMPACT_AT`],
    /// so the buffer stays bounded to roughly one row's lookahead instead
    /// of growing to the size of the whole worksheet part.
    fn compact(&mut self) {
        if self.pos > COMPACT_AT {
            self.buf.drain(0..self.pos);
            self.pos = 0;
        }
    }

    /// Installs the `"@@@fileid@@@,<path>"` resolver used when
    /// `enable_convert_byte_array` is set. Kept separate from `new` since
    /// most callers never need it.
    pub fn with_byte_blob_resolver(mut self, resolver: &'a dyn Fn(&str) -> Option<Vec<u8>>) -> Self {
        self.byte_blob_parts = Some(resolver);
        self
    }

    fn column_labels(&self) -> Vec<String> {
        if let Some(header) = &self.header {
            return header.clone();
        }
        (self.params.start_col..=self.params.max_col.max(self.params.start_col))
            .map(column_index_to_letters)
            .collect()
    }

    /// Emit empty rows for the gap between the last yielded index and
    /// `upto` (exclusive). Only called when
    /// `ignore_empty_rows` is false.
    fn fill_gap(&mut self, upto: u32) {
        let from = match self.last_yielded {
            Some(last) => last + 1,
            None => self.params.start_row,
        };
        let columns = self.column_labels();
        for idx in from..upto {
            self.pending.push_back(Row::new(idx, columns.clone()));
            self.last_yielded = Some(idx);
        }
    }

    /// Advance the cursor to (and past) the next `<row ...>` element,
    /// returning its declared index and inner XML body. `None` at end of
    /// document. Pulls from the source stream one chunk at a time rather
    /// than requiring the whole part to already be buffered.
    fn next_row_element(&mut self) -> Option<(u32, String)> {
        let start = self.find_from(self.pos, b"<row")?;
        let tag_end = self.find_from(start, b">")?;
        let self_closing = self.buf[tag_end - 1] == b'/';
        let tag = String::from_utf8_lossy(&self.buf[start..tag_end]).into_owned();

        let declared_row: Option<u32> = extract_attr(&tag, "r").and_then(|s| s.parse().ok());
        let row_index = match declared_row {
            Some(r) => r.saturating_sub(1),
            None => self.running_row_index,
        };
        self.running_row_index = row_index + 1;

        if self_closing {
            self.pos = tag_end + 1;
            self.compact();
            return Some((row_index, String::new()));
        }

        let body_start = tag_end + 1;
        let body = match self.find_from(body_start, b"</row>") {
            Some(body_end) => {
                let body = String::from_utf8_lossy(&self.buf[body_start..body_end]).into_owned();
                self.pos = body_end + "</row>".len();
                body
            }
            None => {
                let body = String::from_utf8_lossy(&self.buf[body_start..]).into_owned();
                self.pos = self.buf.len();
                body
            }
        };
        self.compact();
        Some((row_index, body))
    }

    fn build_row(&mut self, row_index: u32, body: &str) -> Row {
        let columns = self.column_labels();
        let mut row = Row::new(row_index, columns);
        let mut ordinal = 0u32;

        let mut pos = 0;
        while let Some(rel) = body[pos..].find("<c").map(|i| pos + i) {
            let start = rel;
            let tag_end = match body[start..].find('>') {
                Some(i) => start + i,
                None => break,
            };
            let self_closing = body.as_bytes()[tag_end - 1] == b'/';
            let tag_header = &body[start..tag_end];

            let (cell_end, inner) = if self_closing {
                (tag_end + 1, "")
            } else {
                let body_start = tag_end + 1;
                match body[body_start..].find("</c>") {
                    Some(i) => (body_start + i + "</c>".len(), &body[body_start..body_start + i]),
                    None => break,
                }
            };

            let cell_ref = extract_attr(tag_header, "r").and_then(|r| CellRef::parse(&r).ok());
            let column_index = match self.params.column_mode {
                ColumnMode::ReferenceLess => {
                    let c = ordinal + 1;
                    ordinal += 1;
                    c
                }
                ColumnMode::Referenced => cell_ref.map(|c| c.col).unwrap_or_else(|| {
                    let c = ordinal + 1;
                    ordinal += 1;
                    c
                }),
            };

            if column_index < self.params.start_col {
                pos = cell_end;
                continue;
            }

            let style = extract_attr(tag_header, "s").and_then(|s| s.parse::<u32>().ok());
            let cell_type = extract_attr(tag_header, "t").unwrap_or_default();
            let mut value = self.resolve_cell_value(&cell_type, inner);

            if let Some(xf) = style {
                if let CellValue::Number(n) = &value {
                    value = self.styles.classify(xf, &n.to_string(), self.params.date1904);
                } else if let CellValue::Raw(raw) = &value {
                    value = self.styles.classify(xf, raw, self.params.date1904);
                }
            }

            if self.params.fill_merged_cells && !self.merges.is_empty() {
                if let Some(r) = cell_ref {
                    value = self.merges.apply(r, value);
                }
            }

            let label = column_index_to_letters(column_index);
            row.set(&label, value);
            pos = cell_end;
        }

        row
    }

    fn resolve_cell_value(&mut self, cell_type: &str, inner: &str) -> CellValue {
        match cell_type {
            "s" => {
                let idx_text = extract_tag_text(inner, "v").unwrap_or_default();
                match idx_text.parse::<usize>().ok().and_then(|i| self.sst.get(i)) {
                    Some(s) => CellValue::Text(s),
                    None => CellValue::Null,
                }
            }
            "inlineStr" => {
                let text = extract_inline_string(inner);
                self.maybe_byte_blob(text)
            }
            "str" => {
                let text = extract_tag_text(inner, "v").unwrap_or_default();
                self.maybe_byte_blob(decode_xml_entities(&text))
            }
            "b" => {
                let raw = extract_tag_text(inner, "v").unwrap_or_default();
                CellValue::Bool(raw == "1")
            }
            "d" => {
                let raw = extract_tag_text(inner, "v").unwrap_or_default();
                parse_iso_date(&raw).unwrap_or(CellValue::Raw(raw))
            }
            "e" => CellValue::Raw(extract_tag_text(inner, "v").unwrap_or_default()),
            _ => match extract_tag_text(inner, "v") {
                Some(raw) => match raw.parse::<f64>() {
                    Ok(n) => CellValue::Number(n),
                    Err(_) => CellValue::Raw(raw),
                },
                None => CellValue::Null,
            },
        }
    }

    fn maybe_byte_blob(&self, text: String) -> CellValue {
        if self.params.enable_convert_byte_array {
            if let Some(path) = text.strip_prefix("@@@fileid@@@,") {
                if let Some(resolver) = self.byte_blob_parts {
                    if let Some(bytes) = resolver(path) {
                        return CellValue::Bytes(bytes);
                    }
                }
            }
        }
        CellValue::Text(text)
    }

    fn apply_header(&mut self, columns: Vec<String>) {
        let columns = if self.params.trim_column_names {
            columns.iter().map(|c| c.trim().to_string()).collect()
        } else {
            columns
        };
        self.header = Some(columns);
    }
}

impl<'a> Iterator for SheetStreamer<'a> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.exhausted {
                return None;
            }

            let (row_index, body) = match self.next_row_element() {
                Some(pair) => pair,
                None => {
                    self.exhausted = true;
                    continue;
                }
            };

            if row_index < self.params.start_row {
                continue;
            }

            if !self.params.ignore_empty_rows {
                self.fill_gap(row_index);
            }

            if self.params.use_header_row && !self.header_consumed {
                self.header_consumed = true;
                let seeded = self.build_row(row_index, &body);
                self.apply_header(seeded.to_strings());
                self.last_yielded = Some(row_index);
                continue;
            }

            let row = self.build_row(row_index, &body);
            self.last_yielded = Some(row_index);

            if self.params.ignore_empty_rows && row.is_empty() {
                continue;
            }

            return Some(Ok(row));
        }
    }
}

/// Wraps a [`SheetStreamer`] to additionally bound the scan by an end
/// column/row. An absent bound disables that dimension.
pub struct RangeFilter<'a> {
    inner: SheetStreamer<'a>,
    end_row: Option<u32>,
    end_col: Option<u32>,
}

impl<'a> RangeFilter<'a> {
    pub fn new(inner: SheetStreamer<'a>, end_row: Option<u32>, end_col: Option<u32>) -> Self {
        RangeFilter {
            inner,
            end_row,
            end_col,
        }
    }
}

impl<'a> Iterator for RangeFilter<'a> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.inner.next()?;
        let row = match row {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };

        if let Some(end_row) = self.end_row {
            if row.index > end_row {
                return None;
            }
        }

        let row = match self.end_col {
            Some(end_col) => truncate_to_end_col(row, self.inner.params.start_col, end_col),
            None => row,
        };

        Some(Ok(row))
    }
}

fn truncate_to_end_col(mut row: Row, start_col: u32, end_col: u32) -> Row {
    if end_col < start_col {
        row.columns.clear();
        row.cells.clear();
        return row;
    }
    let keep = (end_col - start_col + 1) as usize;
    if row.columns.len() > keep {
        let dropped: Vec<String> = row.columns.split_off(keep);
        for col in dropped {
            row.cells.remove(&col);
        }
    }
    row
}

/// Plain substring search over bytes — every needle this module searches
/// for (`<row`, `>`, `</row>`, ...) is ASCII, so a byte-level scan is safe
/// even though the buffer may contain non-ASCII UTF-8 cell text elsewhere.
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(decode_xml_entities(&xml[start..end]))
}

/// `<is>` inline strings may hold a single `<t>` or a run sequence `<r><t>`.
fn extract_inline_string(xml: &str) -> String {
    if let Some(text) = extract_tag_text(xml, "t") {
        return text;
    }
    let mut out = String::new();
    let mut pos = 0;
    while let Some(rel) = xml[pos..].find("<t>") {
        let start = pos + rel + 3;
        let end = match xml[start..].find("</t>") {
            Some(i) => start + i,
            None => break,
        };
        out.push_str(&decode_xml_entities(&xml[start..end]));
        pos = end + 4;
    }
    out
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `t="d"` cells parse only `yyyy-MM-dd`; any other shape is kept raw
/// (resolved open question, see DESIGN.md).
fn parse_iso_date(raw: &str) -> Option<CellValue> {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let year: i32 = raw[0..4].parse().ok()?;
    let month: u32 = raw[5..7].parse().ok()?;
    let day: u32 = raw[8..10].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(CellValue::DateTime(crate::excel_date::CivilDateTime {
        year,
        month,
        day,
        hour: 0,
        minute: 0,
        second: 0,
        millisecond: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StreamParams {
        StreamParams {
            use_header_row: false,
            start_row: 0,
            start_col: 1,
            max_col: 3,
            column_mode: ColumnMode::Referenced,
            ignore_empty_rows: false,
            fill_merged_cells: true,
            enable_convert_byte_array: false,
            trim_column_names: true,
            date1904: false,
        }
    }

    #[test]
    fn streams_sparse_cells_with_gaps_filled() {
        let xml = r#"<sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1"><v>5</v></c></row>
        </sheetData>"#;
        let mut sst = SharedStringStore::build(b"<sst><si><t>hi</t></si></sst>", false, 0).unwrap();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.start_col = 1;
        p.max_col = 3;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("A"), Some(&CellValue::Text("hi".to_string())));
        assert_eq!(rows[0].get("B"), Some(&CellValue::Null));
        assert_eq!(rows[0].get("C"), Some(&CellValue::Number(5.0)));
    }

    #[test]
    fn emits_empty_rows_for_gaps_when_not_ignored() {
        let xml = r#"<sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
            <row r="4"><c r="A4"><v>4</v></c></row>
        </sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.start_col = 1;
        p.max_col = 1;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[1].is_empty());
        assert!(rows[2].is_empty());
    }

    #[test]
    fn header_row_is_consumed_not_yielded() {
        let xml = r#"<sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c></row>
            <row r="2"><c r="A2" t="inlineStr"><is><t>Alice</t></is></c></row>
        </sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.use_header_row = true;
        p.start_col = 1;
        p.max_col = 1;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Name"), Some(&CellValue::Text("Alice".to_string())));
    }

    #[test]
    fn gap_before_header_row_is_filled() {
        let xml = r#"<sheetData>
            <row r="5"><c r="A5" t="inlineStr"><is><t>Name</t></is></c></row>
            <row r="6"><c r="A6" t="inlineStr"><is><t>Alice</t></is></c></row>
        </sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.use_header_row = true;
        p.start_col = 1;
        p.max_col = 1;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        // Header sits at row index 4 (XML row 5); the four rows ahead of
        // it must still surface as empty rows instead of being dropped.
        assert_eq!(rows.len(), 5);
        for empty_row in &rows[..4] {
            assert!(empty_row.is_empty());
        }
        assert_eq!(rows[4].get("Name"), Some(&CellValue::Text("Alice".to_string())));
    }

    #[test]
    fn range_filter_truncates_columns_and_stops_at_end_row() {
        let xml = r#"<sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="B1"><v>2</v></c><c r="C1"><v>3</v></c></row>
            <row r="2"><c r="A2"><v>4</v></c></row>
            <row r="3"><c r="A3"><v>5</v></c></row>
        </sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.start_col = 1;
        p.max_col = 3;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let filtered = RangeFilter::new(streamer, Some(1), Some(2));
        let rows: Vec<Row> = filtered.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn d_type_cell_parses_iso_date_only() {
        let xml = r#"<sheetData><row r="1"><c r="A1" t="d"><v>2024-01-15</v></c></row></sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.start_col = 1;
        p.max_col = 1;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        match rows[0].get("A").unwrap() {
            CellValue::DateTime(dt) => assert_eq!((dt.year, dt.month, dt.day), (2024, 1, 15)),
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn d_type_cell_falls_back_to_raw_on_non_iso_text() {
        let xml = r#"<sheetData><row r="1"><c r="A1" t="d"><v>not-a-date</v></c></row></sheetData>"#;
        let mut sst = SharedStringStore::empty();
        let mut styles = StyleTable::empty();
        let merges = MergeMap::empty();
        let mut p = params();
        p.start_col = 1;
        p.max_col = 1;
        let streamer = SheetStreamer::new(Box::new(xml.as_bytes()), &mut sst, &mut styles, merges, p);
        let rows: Vec<Row> = streamer.map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].get("A"), Some(&CellValue::Raw("not-a-date".to_string())));
    }
}
