//! Streaming xlsx sheet reader.
//!
//! Reconstructs rows from the sparse, out-of-order `<c>` elements an xlsx
//! worksheet part actually contains, resolving shared strings, number
//! formats and merged-cell fills along the way. Row reconstruction itself
//! reads its decompression stream incrementally — `SheetStreamer` never
//! holds more than a bounded lookahead window of the worksheet XML, not
//! the whole part. Dimension probing and merge-region detection are a
//! separate pre-pass over their own fresh stream and do read the part in
//! full, since a `<dimension>` tag or a merged region can appear anywhere
//! in `sheetData` and there is no way to bound that lookahead in advance.
//!
//! ```no_run
//! use excelstream::{ReaderOptions, XlsxDocument};
//!
//! let mut doc = XlsxDocument::open("report.xlsx")?;
//! for sheet in doc.sheet_names() {
//!     for row in doc.query(&ReaderOptions::default(), false, Some(sheet.as_str()), None)? {
//!         let row = row?;
//!         println!("{:?}", row.to_strings());
//!     }
//! }
//! # Ok::<(), excelstream::ExcelError>(())
//! ```

pub mod archive;
pub mod cell_ref;
pub mod config;
pub mod dimension;
pub mod error;
pub mod excel_date;
pub mod format;
pub mod merge_map;
pub mod sheet_streamer;
pub mod shared_strings;
pub mod style_table;
pub mod types;
pub mod workbook_index;

mod document;

pub use cell_ref::CellRef;
pub use config::ReaderOptions;
pub use document::{SheetDimension, XlsxDocument};
pub use error::{ExcelError, Result};
pub use excel_date::{CivilDateTime, ExcelDate};
pub use types::{CellValue, Row};
