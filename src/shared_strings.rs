//! Shared string table (`xl/sharedStrings.xml`).
//!
//! Cells referencing string values store an index into this table rather
//! than the text itself. Built once per document and shared read-only
//! across every query.

use crate::error::Result;
use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom, Write as _};

/// A single `si` entry's resolved text plus its byte span within the
/// original `xl/sharedStrings.xml` payload, used only to decide which
/// storage strategy to pick.
struct Entry {
    text: String,
}

enum Strategy {
    InMemory(Vec<String>),
    /// Length-prefixed (`u32` little-endian) UTF-8 records appended to a
    /// spill file; `index[i]` is that record's byte offset. Each `get`
    /// reopens and seeks rather than keeping the whole table resident.
    DiskBacked { file: File, index: Vec<u64> },
}

pub struct SharedStringStore {
    strategy: Strategy,
    len: usize,
}

impl SharedStringStore {
    /// An empty store — used when the workbook has no `sharedStrings.xml`
    /// part at all (every string cell is then `inlineStr`).
    pub fn empty() -> Self {
        SharedStringStore {
            strategy: Strategy::InMemory(Vec::new()),
            len: 0,
        }
    }

    pub fn build(xml: &[u8], enable_cache: bool, cache_size_threshold: usize) -> Result<Self> {
        let text = String::from_utf8_lossy(xml);
        let entries = parse_entries(&text);
        let len = entries.len();

        if enable_cache && xml.len() >= cache_size_threshold {
            log::debug!(
                "shared string table ({} bytes, {} entries) exceeds cache threshold, spilling to disk",
                xml.len(),
                len
            );
            let mut file = tempfile::tempfile()?;
            let mut index = Vec::with_capacity(len);
            for entry in entries {
                index.push(file.stream_position()?);
                let bytes = entry.text.as_bytes();
                file.write_all(&(bytes.len() as u32).to_le_bytes())?;
                file.write_all(bytes)?;
            }
            file.flush()?;
            return Ok(SharedStringStore {
                strategy: Strategy::DiskBacked { file, index },
                len,
            });
        }

        Ok(SharedStringStore {
            strategy: Strategy::InMemory(entries.into_iter().map(|e| e.text).collect()),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Out-of-range indices return `None`, never an error — a cell
    /// referencing a shared string past the table's end is malformed input
    /// the streamer recovers from rather than raises as an error.
    pub fn get(&mut self, i: usize) -> Option<String> {
        match &mut self.strategy {
            Strategy::InMemory(v) => v.get(i).cloned(),
            Strategy::DiskBacked { file, index } => {
                let offset = *index.get(i)?;
                file.seek(SeekFrom::Start(offset)).ok()?;
                let mut len_bytes = [0u8; 4];
                file.read_exact(&mut len_bytes).ok()?;
                let len = u32::from_le_bytes(len_bytes) as usize;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).ok()?;
                String::from_utf8(buf).ok()
            }
        }
    }
}

fn parse_entries(xml: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while let Some(rel_start) = xml[pos..].find("<si") {
        let start = pos + rel_start;
        let tag_end = match xml[start..].find('>') {
            Some(i) => start + i,
            None => break,
        };
        if xml.as_bytes()[tag_end - 1] == b'/' {
            // Self-closing <si/> — an explicitly empty entry.
            entries.push(Entry { text: String::new() });
            pos = tag_end + 1;
            continue;
        }
        let body_start = tag_end + 1;
        let close = match xml[body_start..].find("</si>") {
            Some(i) => body_start + i,
            None => break,
        };
        let block = &xml[body_start..close];
        entries.push(Entry { text: extract_runs(block) });
        pos = close + "</si>".len();
    }
    entries
}

/// Concatenate every `<t>` run's text within one `si` block, whether it is a
/// single direct `<t>` leaf or a sequence of `<r><t>` rich-text runs.
fn extract_runs(block: &str) -> String {
    let mut out = String::new();
    let mut pos = 0;
    while let Some(rel) = block[pos..].find("<t") {
        let start = pos + rel;
        let tag_end = match block[start..].find('>') {
            Some(i) => start + i,
            None => break,
        };
        if block.as_bytes()[tag_end - 1] == b'/' {
            pos = tag_end + 1;
            continue;
        }
        let text_start = tag_end + 1;
        let text_end = match block[text_start..].find("</t>") {
            Some(i) => text_start + i,
            None => break,
        };
        out.push_str(&decode_xml_text(&block[text_start..text_end]));
        pos = text_end + "</t>".len();
    }
    out
}

/// Decodes standard XML entities plus Excel's `_x00HH_` hex-escape
/// convention for control characters that are not otherwise legal in XML.
fn decode_xml_text(text: &str) -> String {
    let unescaped = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    decode_hex_escapes(&unescaped)
}

fn decode_hex_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if text[i..].starts_with("_x") && bytes.len() - i >= 7 && bytes[i + 6] == b'_' {
            let hex = &text[i + 2..i + 6];
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                    i += 7;
                    continue;
                }
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_t_leaves() {
        let xml = b"<sst><si><t>Hello</t></si><si><t>World</t></si></sst>";
        let mut store = SharedStringStore::build(xml, false, 0).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0), Some("Hello".to_string()));
        assert_eq!(store.get(1), Some("World".to_string()));
    }

    #[test]
    fn concatenates_rich_text_runs() {
        let xml = b"<sst><si><r><t>Foo</t></r><r><t>Bar</t></r></si></sst>";
        let mut store = SharedStringStore::build(xml, false, 0).unwrap();
        assert_eq!(store.get(0), Some("FooBar".to_string()));
    }

    #[test]
    fn decodes_entities_and_hex_escapes() {
        let xml = b"<sst><si><t>A &amp; B_x000A_C</t></si></sst>";
        let mut store = SharedStringStore::build(xml, false, 0).unwrap();
        assert_eq!(store.get(0), Some("A & B\nC".to_string()));
    }

    #[test]
    fn out_of_range_is_none_not_error() {
        let xml = b"<sst><si><t>only</t></si></sst>";
        let mut store = SharedStringStore::build(xml, false, 0).unwrap();
        assert_eq!(store.get(5), None);
    }

    #[test]
    fn disk_backed_strategy_round_trips() {
        let xml = b"<sst><si><t>alpha</t></si><si><t>beta</t></si><si><t>gamma</t></si></sst>";
        let mut store = SharedStringStore::build(xml, true, 1).unwrap();
        assert_eq!(store.get(0), Some("alpha".to_string()));
        assert_eq!(store.get(2), Some("gamma".to_string()));
        assert_eq!(store.get(1), Some("beta".to_string()));
    }

    #[test]
    fn self_closing_entry_is_empty_string() {
        let xml = b"<sst><si/><si><t>x</t></si></sst>";
        let mut store = SharedStringStore::build(xml, false, 0).unwrap();
        assert_eq!(store.get(0), Some(String::new()));
        assert_eq!(store.get(1), Some("x".to_string()));
    }
}
