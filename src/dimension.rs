//! Worksheet dimension detection.
//!
//! Run once per sheet, before the real streaming pass, so `SheetStreamer`
//! knows up front whether it is in reference-bearing or reference-less mode
//! and how far the sheet actually extends.

use crate::cell_ref::parse_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cells carry an explicit `r="..."` attribute.
    Referenced,
    /// Cells omit `r`; column index is positional (cell ordinal within its row).
    ReferenceLess,
}

#[derive(Debug, Clone, Copy)]
pub struct Dimensions {
    pub mode: Mode,
    pub max_row: u32,
    pub max_col: u32,
}

/// Scans `sheet_xml` for the first of `<dimension ref=...>` or `<c ...>`,
/// whichever comes first, then follows the dimension-detection decision tree below.
pub fn probe(sheet_xml: &str) -> Dimensions {
    let dim_pos = sheet_xml.find("<dimension");
    let first_cell_pos = sheet_xml.find("<c ").or_else(|| sheet_xml.find("<c>"));

    let dimension_found_first = match (dim_pos, first_cell_pos) {
        (Some(d), Some(c)) => d < c,
        (Some(_), None) => true,
        _ => false,
    };

    if dimension_found_first {
        if let Some(d) = dim_pos {
            if let Some(dims) = parse_dimension_tag(&sheet_xml[d..]) {
                return dims;
            }
        }
    }

    // No usable <dimension> tag: fall back to scanning cells. If the first
    // <c> has no `r`, the whole sheet is treated as reference-less.
    if let Some(c) = first_cell_pos {
        let tag_end = sheet_xml[c..]
            .find('>')
            .map(|i| c + i)
            .unwrap_or(sheet_xml.len());
        let tag = &sheet_xml[c..tag_end];
        if !tag.contains(" r=\"") {
            return scan_reference_less(sheet_xml);
        }
    }
    scan_referenced(sheet_xml)
}

fn parse_dimension_tag(from_dimension: &str) -> Option<Dimensions> {
    let tag_end = from_dimension.find('>')?;
    let tag = &from_dimension[..tag_end];
    let ref_start = tag.find("ref=\"")? + 5;
    let ref_end = tag[ref_start..].find('"')? + ref_start;
    let range = &tag[ref_start..ref_end];
    let (_, end) = parse_range(range).ok()?;
    Some(Dimensions {
        mode: Mode::Referenced,
        max_row: end.row.saturating_sub(1),
        max_col: end.col.saturating_sub(1),
    })
}

/// Stream once over all rows, counting cells per row (max_col) and rows
/// (max_row), since there is no `r` attribute to read a position from.
fn scan_reference_less(sheet_xml: &str) -> Dimensions {
    let mut max_row = 0u32;
    let mut max_col = 0u32;
    let mut row_index = 0u32;
    let mut pos = 0;
    while let Some(rel) = sheet_xml[pos..].find("<row") {
        let row_start = pos + rel;
        let row_end = match sheet_xml[row_start..].find("</row>") {
            Some(i) => row_start + i + "</row>".len(),
            None => break,
        };
        let row_body = &sheet_xml[row_start..row_end];
        let cell_count = row_body.matches("<c").count() as u32;
        max_col = max_col.max(cell_count.saturating_sub(1));
        max_row = row_index;
        row_index += 1;
        pos = row_end;
    }
    Dimensions {
        mode: Mode::ReferenceLess,
        max_row,
        max_col,
    }
}

/// Track the furthest `r="..."` reference seen across every `<c>`.
fn scan_referenced(sheet_xml: &str) -> Dimensions {
    let mut max_row = 0u32;
    let mut max_col = 0u32;
    let mut pos = 0;
    while let Some(rel) = sheet_xml[pos..].find("<c ") {
        let start = pos + rel;
        let tag_end = match sheet_xml[start..].find('>') {
            Some(i) => start + i,
            None => break,
        };
        let tag = &sheet_xml[start..tag_end];
        if let Some(r_start) = tag.find("r=\"") {
            let r_start = r_start + 3;
            if let Some(r_end) = tag[r_start..].find('"') {
                if let Ok(cell) = crate::cell_ref::CellRef::parse(&tag[r_start..r_start + r_end]) {
                    max_row = max_row.max(cell.row.saturating_sub(1));
                    max_col = max_col.max(cell.col.saturating_sub(1));
                }
            }
        }
        pos = tag_end;
    }
    Dimensions {
        mode: Mode::Referenced,
        max_row,
        max_col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dimension_tag_wins() {
        let xml = r#"<worksheet><dimension ref="A1:D10"/><sheetData><row r="1"><c r="A1"/></row></sheetData></worksheet>"#;
        let dims = probe(xml);
        assert_eq!(dims.mode, Mode::Referenced);
        assert_eq!((dims.max_row, dims.max_col), (9, 3));
    }

    #[test]
    fn reference_less_cells_are_scanned_positionally() {
        let xml = r#"<worksheet><sheetData>
            <row><c><v>1</v></c><c><v>2</v></c></row>
            <row><c><v>3</v></c></row>
        </sheetData></worksheet>"#;
        let dims = probe(xml);
        assert_eq!(dims.mode, Mode::ReferenceLess);
        assert_eq!(dims.max_row, 1);
        assert_eq!(dims.max_col, 1);
    }

    #[test]
    fn referenced_cells_without_dimension_tag_are_tracked() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"/><c r="C1"/></row>
            <row r="5"><c r="B5"/></row>
        </sheetData></worksheet>"#;
        let dims = probe(xml);
        assert_eq!(dims.mode, Mode::Referenced);
        assert_eq!((dims.max_row, dims.max_col), (4, 2));
    }

    #[test]
    fn single_cell_dimension_ref_is_honoured() {
        let xml = r#"<worksheet><dimension ref="B2"/><sheetData></sheetData></worksheet>"#;
        let dims = probe(xml);
        assert_eq!((dims.max_row, dims.max_col), (1, 1));
    }
}
