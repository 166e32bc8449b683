//! Open a workbook and print every row of its first sheet.
//!
//! Run with: `cargo run --example basic_read -- path/to/workbook.xlsx`

use excelstream::{ReaderOptions, XlsxDocument};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let path = env::args().nth(1).expect("usage: basic_read <path.xlsx>");

    let mut doc = XlsxDocument::open(&path)?;
    let sheet = doc.sheet_names().first().cloned();

    let opts = ReaderOptions::default();
    for row in doc.query(&opts, false, sheet.as_deref(), None)? {
        let row = row?;
        println!("{}: {:?}", row.index, row.to_strings());
    }

    Ok(())
}
