//! Number-format table (`xl/styles.xml`).
//!
//! Maps a cell's style index (`s="..."` attribute) through to a parsed
//! [`Format`] and uses it to reinterpret a raw numeric cell value as a date,
//! a duration, or a plain number.

use crate::excel_date::ExcelDate;
use crate::format::{Format, SectionType};
use crate::types::CellValue;
use indexmap::IndexMap;
use std::collections::HashMap;

pub struct StyleTable {
    /// `xf` index (as it appears in `s="..."`) -> resolved format code string.
    cell_formats: Vec<String>,
    /// Format code string -> parsed, classified `Format`. Parsing a format
    /// mini-language string is pure and small, but xlsx files commonly reuse
    /// the same handful of codes across thousands of cells.
    parsed: IndexMap<String, Format>,
}

impl StyleTable {
    pub fn empty() -> Self {
        StyleTable {
            cell_formats: Vec::new(),
            parsed: IndexMap::new(),
        }
    }

    pub fn parse(xml: &[u8]) -> Self {
        let text = String::from_utf8_lossy(xml);
        let custom = parse_custom_num_fmts(&text);
        let xf_num_fmt_ids = parse_cell_xfs(&text);

        let cell_formats = xf_num_fmt_ids
            .into_iter()
            .map(|id| resolve_format_code(id, &custom))
            .collect();

        StyleTable {
            cell_formats,
            parsed: IndexMap::new(),
        }
    }

    fn format_for(&mut self, xf: u32) -> &Format {
        let code = self
            .cell_formats
            .get(xf as usize)
            .map(String::as_str)
            .unwrap_or("General");
        if !self.parsed.contains_key(code) {
            let parsed = if code == "General" {
                Format::general()
            } else {
                Format::parse(code)
            };
            self.parsed.insert(code.to_string(), parsed);
        }
        self.parsed.get(code).unwrap()
    }

    /// Reinterpret `raw` (the cell's `<v>` text) under style `xf`.
    ///
    /// Dates become [`CellValue::DateTime`]; durations and plain numbers both
    /// stay [`CellValue::Number`] since the data model has no separate
    /// duration variant — only the *display* format distinguishes them, the
    /// stored value is the same elapsed-time float either way. Non-numeric
    /// `raw` is returned untouched as text: a style can only reinterpret a
    /// value that is already numeric.
    pub fn classify(&mut self, xf: u32, raw: &str, date1904: bool) -> CellValue {
        let value: f64 = match raw.parse() {
            Ok(v) => v,
            Err(_) => return CellValue::Text(raw.to_string()),
        };
        let format = self.format_for(xf);
        match format.select_section(crate::format::ValueKind::Number(value)) {
            Some(section) if section.section_type == SectionType::Date => {
                CellValue::DateTime(ExcelDate::from_ole(value, date1904).datetime)
            }
            _ => CellValue::Number(value),
        }
    }
}

const BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

fn resolve_format_code(num_fmt_id: u32, custom: &HashMap<u32, String>) -> String {
    if let Some(code) = custom.get(&num_fmt_id) {
        return code.clone();
    }
    BUILTIN_FORMATS
        .iter()
        .find(|(id, _)| *id == num_fmt_id)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| "General".to_string())
}

fn parse_custom_num_fmts(xml: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let mut pos = 0;
    while let Some(rel) = xml[pos..].find("<numFmt ") {
        let start = pos + rel;
        let tag_end = match xml[start..].find('>') {
            Some(i) => start + i + 1,
            None => break,
        };
        let tag = &xml[start..tag_end];
        if let (Some(id), Some(code)) = (extract_attr(tag, "numFmtId"), extract_attr(tag, "formatCode")) {
            if let Ok(id) = id.parse() {
                map.insert(id, unescape_attr(&code));
            }
        }
        pos = tag_end;
    }
    map
}

/// Returns `cellXfs/xf[i].numFmtId` in order, one entry per style index.
fn parse_cell_xfs(xml: &str) -> Vec<u32> {
    let section_start = match xml.find("<cellXfs") {
        Some(i) => i,
        None => return Vec::new(),
    };
    let section_end = xml[section_start..]
        .find("</cellXfs>")
        .map(|i| section_start + i)
        .unwrap_or(xml.len());
    let section = &xml[section_start..section_end];

    let mut ids = Vec::new();
    let mut pos = 0;
    while let Some(rel) = section[pos..].find("<xf ") {
        let start = pos + rel;
        let tag_end = match section[start..].find('>') {
            Some(i) => start + i + 1,
            None => break,
        };
        let tag = &section[start..tag_end];
        let id = extract_attr(tag, "numFmtId")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        ids.push(id);
        pos = tag_end;
    }
    ids
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_date_format_classifies_as_datetime() {
        const XML: &str = r#"<styleSheet><cellXfs count="1"><xf numFmtId="14" fontId="0"/></cellXfs></styleSheet>"#;
        let mut styles = StyleTable::parse(XML.as_bytes());
        match styles.classify(0, "1", false) {
            CellValue::DateTime(dt) => assert_eq!((dt.year, dt.month, dt.day), (1900, 1, 1)),
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn builtin_general_format_stays_number() {
        const XML: &str = r#"<styleSheet><cellXfs count="1"><xf numFmtId="0" fontId="0"/></cellXfs></styleSheet>"#;
        let mut styles = StyleTable::parse(XML.as_bytes());
        assert_eq!(styles.classify(0, "42.5", false), CellValue::Number(42.5));
    }

    #[test]
    fn custom_format_overrides_builtin_id() {
        const XML: &str = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
            <cellXfs count="1"><xf numFmtId="164" fontId="0"/></cellXfs>
        </styleSheet>"#;
        let mut styles = StyleTable::parse(XML.as_bytes());
        match styles.classify(0, "1", false) {
            CellValue::DateTime(_) => {}
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_raw_is_returned_as_text() {
        const XML: &str = r#"<styleSheet><cellXfs count="1"><xf numFmtId="14" fontId="0"/></cellXfs></styleSheet>"#;
        let mut styles = StyleTable::parse(XML.as_bytes());
        assert_eq!(styles.classify(0, "N/A", false), CellValue::Text("N/A".to_string()));
    }

    #[test]
    fn out_of_range_xf_falls_back_to_general() {
        let mut styles = StyleTable::empty();
        assert_eq!(styles.classify(7, "3.5", false), CellValue::Number(3.5));
    }
}
