//! Reader configuration surface.

use std::collections::HashMap;

/// Builder-style options controlling how a query streams rows.
///
/// A consuming builder: each setter takes and returns `Self` so options can
/// be chained. Loading these from a config file or CLI is out of scope —
/// this struct is the in-process configuration surface.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub fill_merged_cells: bool,
    pub ignore_empty_rows: bool,
    pub enable_shared_string_cache: bool,
    pub shared_string_cache_size: usize,
    pub enable_convert_byte_array: bool,
    pub trim_column_names: bool,
    pub dynamic_sheets: HashMap<String, String>,
    pub date1904: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            fill_merged_cells: true,
            ignore_empty_rows: false,
            enable_shared_string_cache: false,
            shared_string_cache_size: 50 * 1024 * 1024,
            enable_convert_byte_array: false,
            trim_column_names: true,
            dynamic_sheets: HashMap::new(),
            date1904: false,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_merged_cells(mut self, value: bool) -> Self {
        self.fill_merged_cells = value;
        self
    }

    pub fn ignore_empty_rows(mut self, value: bool) -> Self {
        self.ignore_empty_rows = value;
        self
    }

    pub fn enable_shared_string_cache(mut self, value: bool) -> Self {
        self.enable_shared_string_cache = value;
        self
    }

    pub fn shared_string_cache_size(mut self, bytes: usize) -> Self {
        self.shared_string_cache_size = bytes;
        self
    }

    pub fn enable_convert_byte_array(mut self, value: bool) -> Self {
        self.enable_convert_byte_array = value;
        self
    }

    pub fn trim_column_names(mut self, value: bool) -> Self {
        self.trim_column_names = value;
        self
    }

    pub fn dynamic_sheet(mut self, alias: impl Into<String>, real_name: impl Into<String>) -> Self {
        self.dynamic_sheets.insert(alias.into(), real_name.into());
        self
    }

    pub fn date1904(mut self, value: bool) -> Self {
        self.date1904 = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let opts = ReaderOptions::default();
        assert!(opts.fill_merged_cells);
        assert!(!opts.ignore_empty_rows);
        assert!(!opts.date1904);
    }

    #[test]
    fn builder_chains() {
        let opts = ReaderOptions::new()
            .ignore_empty_rows(true)
            .date1904(true)
            .dynamic_sheet("Raw", "Data");
        assert!(opts.ignore_empty_rows);
        assert!(opts.date1904);
        assert_eq!(opts.dynamic_sheets.get("Raw"), Some(&"Data".to_string()));
    }
}
