//! Merged-cell value propagation.
//!
//! Built from a pre-pass over `<mergeCell ref="A1:B3">` elements before the
//! main per-row pass starts, since a slave cell's fill value may come from
//! an anchor the streamer has not reached yet.

use crate::cell_ref::{parse_range, CellRef};
use crate::types::CellValue;
use std::collections::HashMap;

pub struct MergeMap {
    values: HashMap<CellRef, CellValue>,
    slaves: HashMap<CellRef, CellRef>,
}

impl MergeMap {
    pub fn empty() -> Self {
        MergeMap {
            values: HashMap::new(),
            slaves: HashMap::new(),
        }
    }

    /// Scan a worksheet's raw XML for `<mergeCell ref="...">` elements.
    pub fn build(sheet_xml: &str) -> Self {
        let mut map = MergeMap::empty();
        let mut pos = 0;
        while let Some(rel) = sheet_xml[pos..].find("<mergeCell ") {
            let start = pos + rel;
            let tag_end = match sheet_xml[start..].find("/>") {
                Some(i) => start + i + 2,
                None => break,
            };
            let tag = &sheet_xml[start..tag_end];
            if let Some(range) = extract_ref(tag) {
                if let Ok((anchor, end)) = parse_range(&range) {
                    map.register(anchor, end);
                }
            }
            pos = tag_end;
        }
        map
    }

    fn register(&mut self, anchor: CellRef, end: CellRef) {
        self.values.entry(anchor).or_insert(CellValue::Null);
        for row in anchor.row..=end.row {
            for col in anchor.col..=end.col {
                let cell = CellRef::new(col, row);
                if cell != anchor {
                    self.slaves.insert(cell, anchor);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply merge semantics to a freshly-read cell at `r`. An anchor cell
    /// records its value for later slaves; a slave cell is replaced by
    /// whatever the anchor currently holds (possibly still `Null` if the
    /// anchor has not been emitted yet — benign, since an anchor
    /// always precedes its slaves in document order).
    pub fn apply(&mut self, r: CellRef, value: CellValue) -> CellValue {
        if let Some(slot) = self.values.get_mut(&r) {
            *slot = value.clone();
            return value;
        }
        if let Some(anchor) = self.slaves.get(&r) {
            return self.values.get(anchor).cloned().unwrap_or(CellValue::Null);
        }
        value
    }
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn extract_ref(tag: &str) -> Option<String> {
    extract_attr(tag, "ref")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_value_propagates_to_slaves() {
        let mut map = MergeMap::build(r#"<mergeCell ref="A1:B3"/>"#);
        let a1 = CellRef::parse("A1").unwrap();
        let b1 = CellRef::parse("B1").unwrap();
        let a3 = CellRef::parse("A3").unwrap();

        let applied = map.apply(a1, CellValue::Text("header".to_string()));
        assert_eq!(applied, CellValue::Text("header".to_string()));

        assert_eq!(
            map.apply(b1, CellValue::Null),
            CellValue::Text("header".to_string())
        );
        assert_eq!(
            map.apply(a3, CellValue::Null),
            CellValue::Text("header".to_string())
        );
    }

    #[test]
    fn slave_read_before_anchor_is_null_not_an_error() {
        let mut map = MergeMap::build(r#"<mergeCell ref="A1:A2"/>"#);
        let a2 = CellRef::parse("A2").unwrap();
        assert_eq!(map.apply(a2, CellValue::Null), CellValue::Null);
    }

    #[test]
    fn non_merged_cell_passes_through_unchanged() {
        let mut map = MergeMap::build(r#"<mergeCell ref="A1:A2"/>"#);
        let c5 = CellRef::parse("C5").unwrap();
        assert_eq!(
            map.apply(c5, CellValue::Number(9.0)),
            CellValue::Number(9.0)
        );
    }

    #[test]
    fn multiple_merge_regions_are_independent() {
        let mut map = MergeMap::build(r#"<mergeCell ref="A1:A2"/><mergeCell ref="C1:D1"/>"#);
        let c1 = CellRef::parse("C1").unwrap();
        let d1 = CellRef::parse("D1").unwrap();
        map.apply(c1, CellValue::Text("wide".to_string()));
        assert_eq!(
            map.apply(d1, CellValue::Null),
            CellValue::Text("wide".to_string())
        );
    }
}
