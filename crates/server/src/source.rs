//! Source-file parser
//!
//! A data source is a UTF-8 text file with one `ioc,metadata` pair per
//! line; the first comma separates the indicator from its metadata blob
//! (typically JSON). Blank lines and lines without a comma are skipped.
//! When an indicator repeats, the last occurrence wins.

use std::fs;
use std::io;
use std::path::Path;

/// Parse source text into `(ioc, metadata)` pairs.
pub fn parse_source(body: &str) -> Vec<(String, Vec<u8>)> {
    body.lines()
        .filter_map(|raw| {
            let line = raw.trim();
            if line.is_empty() {
                return None;
            }
            let (ioc, meta) = line.split_once(',')?;
            let ioc = ioc.trim();
            if ioc.is_empty() {
                return None;
            }
            Some((ioc.to_string(), meta.trim().as_bytes().to_vec()))
        })
        .collect()
}

/// Read and parse a source file from disk.
pub fn read_source_file(path: &Path) -> io::Result<Vec<(String, Vec<u8>)>> {
    Ok(parse_source(&fs::read_to_string(path)?))
}
