//! Workbook-level sheet directory (`xl/workbook.xml` + its `.rels`).

use crate::error::{ExcelError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetState {
    Visible,
    Hidden,
    VeryHidden,
}

#[derive(Debug, Clone)]
pub struct SheetDescriptor {
    pub name: String,
    pub sheet_id: String,
    pub rel_id: String,
    pub state: SheetState,
    /// Archive path, e.g. `"xl/worksheets/sheet1.xml"`, resolved from `rel_id`
    /// via the rels part. `None` if the rels part had no matching entry.
    pub part_path: Option<String>,
}

pub struct WorkbookIndex {
    pub sheets: Vec<SheetDescriptor>,
    /// `bookViews/workbookView/@activeTab`, 0 if absent.
    pub active_tab: usize,
}

impl WorkbookIndex {
    pub fn parse(workbook_xml: &[u8], rels_xml: Option<&[u8]>) -> Result<Self> {
        let text = String::from_utf8_lossy(workbook_xml);
        let active_tab = parse_active_tab(&text);
        let mut sheets = parse_sheets(&text);

        if let Some(rels) = rels_xml {
            let rels_text = String::from_utf8_lossy(rels);
            for sheet in &mut sheets {
                sheet.part_path = resolve_target(&rels_text, &sheet.rel_id);
            }
        }

        if sheets.is_empty() {
            return Err(ExcelError::MalformedArchive(
                "workbook.xml declares no sheets".to_string(),
            ));
        }

        Ok(WorkbookIndex { sheets, active_tab })
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Resolve a sheet by exact name, or through a `dynamic_sheets` alias
    /// table if the exact name does not match.
    pub fn resolve<'a>(
        &'a self,
        requested: &str,
        dynamic_sheets: &std::collections::HashMap<String, String>,
    ) -> Result<&'a SheetDescriptor> {
        if let Some(found) = self.sheets.iter().find(|s| s.name == requested) {
            return Ok(found);
        }
        if let Some(real_name) = dynamic_sheets.get(requested) {
            if let Some(found) = self.sheets.iter().find(|s| &s.name == real_name) {
                return Ok(found);
            }
        }
        Err(ExcelError::UnknownSheet(requested.to_string()))
    }

    pub fn active_sheet(&self) -> Option<&SheetDescriptor> {
        self.sheets.get(self.active_tab).or_else(|| self.sheets.first())
    }
}

fn parse_active_tab(xml: &str) -> usize {
    if let Some(start) = xml.find("<workbookView") {
        let end = xml[start..].find('>').map(|i| start + i).unwrap_or(xml.len());
        if let Some(v) = extract_attr(&xml[start..end], "activeTab") {
            return v.parse().unwrap_or(0);
        }
    }
    0
}

fn parse_sheets(xml: &str) -> Vec<SheetDescriptor> {
    let mut sheets = Vec::new();
    let mut pos = 0;
    while let Some(rel) = xml[pos..].find("<sheet ") {
        let start = pos + rel;
        let tag_end = match xml[start..].find("/>").or_else(|| xml[start..].find('>')) {
            Some(i) => start + i + if xml[start + i..].starts_with("/>") { 2 } else { 1 },
            None => break,
        };
        let tag = &xml[start..tag_end];

        let name = extract_attr(tag, "name").unwrap_or_default();
        let sheet_id = extract_attr(tag, "sheetId").unwrap_or_default();
        let rel_id = extract_attr(tag, "r:id").unwrap_or_default();
        let state = match extract_attr(tag, "state").as_deref() {
            Some("hidden") => SheetState::Hidden,
            Some("veryHidden") => SheetState::VeryHidden,
            _ => SheetState::Visible,
        };

        sheets.push(SheetDescriptor {
            name,
            sheet_id,
            rel_id,
            state,
            part_path: None,
        });
        pos = tag_end;
    }
    sheets
}

fn resolve_target(rels_xml: &str, rel_id: &str) -> Option<String> {
    if rel_id.is_empty() {
        return None;
    }
    let needle = format!("Id=\"{rel_id}\"");
    let id_pos = rels_xml.find(&needle)?;
    let tag_start = rels_xml[..id_pos].rfind("<Relationship")?;
    let tag_end = rels_xml[id_pos..].find("/>").map(|i| id_pos + i + 2)?;
    let tag = &rels_xml[tag_start..tag_end];
    let target = extract_attr(tag, "Target")?;
    if target.starts_with('/') {
        Some(target.trim_start_matches('/').to_string())
    } else {
        Some(format!("xl/{target}"))
    }
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}
