//! Query a bounded rectangle of a sheet with a header row.
//!
//! Run with: `cargo run --example range_query -- path/to/workbook.xlsx Sheet1 B2 D10`

use excelstream::{ReaderOptions, XlsxDocument};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let path = args.next().expect("usage: range_query <path.xlsx> <sheet> <start> <end>");
    let sheet = args.next().expect("missing sheet name");
    let start = args.next().expect("missing start cell");
    let end = args.next().expect("missing end cell");

    let mut doc = XlsxDocument::open(&path)?;
    let opts = ReaderOptions::default();
    for row in doc.query_range(&opts, true, Some(sheet.as_str()), Some(start.as_str()), Some(end.as_str()))? {
        let row = row?;
        println!("{}: {:?}", row.index, row.to_strings());
    }

    Ok(())
}
