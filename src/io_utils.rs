//! I/O utilities for source detection, CSV reading and text decoding.
//!
//! All source-file access in db-importer flows through this module:
//!
//! - **Format detection**: extension-based (`.csv` → CSV, `.xlsx`/`.xls`/... →
//!   spreadsheet).
//! - **Encoding**: CSV bytes are decoded via `encoding_rs`, defaulting to
//!   UTF-8. Any malformed sequence is an error rather than a replacement
//!   character, since it usually means the wrong encoding was chosen.
//! - **Reader construction**: header-less, strict-width CSV readers. Spaces
//!   at the start of an unquoted field are dropped before parsing, so
//!   `a, "b, c"` reads as two fields and quoted content keeps its spaces.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

pub fn detect_format(path: &Path) -> Option<SourceFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext == "csv" {
        Some(SourceFormat::Csv)
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceFormat::Spreadsheet)
    } else {
        None
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
) -> Result<csv::Reader<SkipInitialSpace<BufReader<File>>>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let source = SkipInitialSpace::new(BufReader::new(file), DEFAULT_CSV_DELIMITER);
    Ok(open_csv_reader(source, DEFAULT_CSV_DELIMITER))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    /// A quote seen inside a quoted field: either an escaped `""` or the
    /// closing quote.
    QuoteInQuoted,
}

/// Byte filter dropping `b' '` at the start of every unquoted field.
/// Tabs and bytes inside quotes pass through untouched.
pub struct SkipInitialSpace<R> {
    inner: R,
    delimiter: u8,
    state: FieldState,
}

impl<R: Read> SkipInitialSpace<R> {
    pub fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: FieldState::Start,
        }
    }

    fn keep(&mut self, byte: u8) -> bool {
        let ends_field = byte == self.delimiter || byte == b'\n' || byte == b'\r';
        self.state = match self.state {
            FieldState::Start if byte == b' ' => return false,
            FieldState::Start if byte == b'"' => FieldState::Quoted,
            FieldState::Quoted if byte == b'"' => FieldState::QuoteInQuoted,
            FieldState::Quoted => FieldState::Quoted,
            FieldState::QuoteInQuoted if byte == b'"' => FieldState::Quoted,
            _ if ends_field => FieldState::Start,
            _ => FieldState::Unquoted,
        };
        true
    }
}

impl<R: Read> Read for SkipInitialSpace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = self.inner.read(buf)?;
            if read == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for idx in 0..read {
                let byte = buf[idx];
                if self.keep(byte) {
                    buf[kept] = byte;
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::BIG5;
    use std::path::PathBuf;

    #[test]
    fn detect_format_is_case_insensitive() {
        assert_eq!(
            detect_format(&PathBuf::from("a/Report.XLSX")),
            Some(SourceFormat::Spreadsheet)
        );
        assert_eq!(
            detect_format(&PathBuf::from("orders.csv")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(detect_format(&PathBuf::from("notes.txt")), None);
        assert_eq!(detect_format(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn resolve_encoding_accepts_common_labels() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some("big5")).unwrap(), BIG5);
        assert_eq!(resolve_encoding(Some(" gbk ")).unwrap().name(), "GBK");
        assert!(resolve_encoding(Some("klingon")).is_err());
    }

    #[test]
    fn decode_bytes_reports_malformed_input() {
        let err = decode_bytes(&[0xff, 0xfe, 0x41], UTF_8).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    fn records(input: &str) -> Vec<Vec<String>> {
        let source = SkipInitialSpace::new(input.as_bytes(), DEFAULT_CSV_DELIMITER);
        open_csv_reader(source, DEFAULT_CSV_DELIMITER)
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn only_unquoted_leading_spaces_are_skipped() {
        assert_eq!(
            records("a,  b,\tc\n x, \" y, z\",\"\"\"q\"\" ,r\"\n"),
            vec![
                vec!["a", "b", "\tc"],
                vec!["x", " y, z", "\"q\" ,r"],
            ]
        );
    }

    #[test]
    fn decode_bytes_handles_big5() {
        let (encoded, _, _) = BIG5.encode("資料");
        assert_eq!(decode_bytes(&encoded, BIG5).unwrap(), "資料");
    }
}
