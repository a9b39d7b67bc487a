use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::df_utils::format_float_columns;
use crate::error::SummarySplitError;

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = compression_ext(path);
    if let Some(ext) = ext {
        let tmp = decompress_to_temp(path, ext)?;
        return read_table_plain(tmp.path())
            .with_context(|| format!("read decompressed {}", path.display()));
    }
    read_table_plain(path)
}

/// Returns `gz` or `bz2` when the file name carries a compression suffix.
pub fn compression_ext(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "gz" => Some("gz"),
        "bz2" => Some("bz2"),
        _ => None,
    }
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        return read_table_whitespace(BufReader::new(file))
            .with_context(|| format!("read {}", path.display()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))?;
    Ok(df)
}

/// Reads a header plus rows split on runs of whitespace. Every column comes
/// back as a string column; missing tokens become nulls.
pub fn read_table_whitespace<R: Read>(reader: R) -> Result<DataFrame> {
    let mut reader = BufReader::new(reader);
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(anyhow::anyhow!("empty file"));
        }
        if !header_line.trim().is_empty() {
            break;
        }
    }
    let headers = split_quoted_whitespace(&header_line);
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_quoted_whitespace(&line);
        if parts.len() > headers.len() {
            return Err(SummarySplitError::Parse(format!(
                "line {} has {} fields but the header has {}",
                lineno + 2,
                parts.len(),
                headers.len()
            ))
            .into());
        }
        for (i, col) in columns.iter_mut().enumerate() {
            col.push(parts.get(i).and_then(|v| normalize_missing_token(v)));
        }
    }

    let cols: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::from(Series::new(name.as_str().into(), values)))
        .collect();
    let df = DataFrame::new(cols)?;
    Ok(df)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)
        .with_context(|| format!("decompress {}", path.display()))?;
    Ok(tmp)
}

fn split_quoted_whitespace(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for c in line.chars() {
        if c == '"' {
            in_quote = !in_quote;
            continue;
        }
        if c.is_whitespace() && !in_quote {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn normalize_missing_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if upper == "NA" || upper == "NAN" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Writes a single-space delimited table with header. Float columns use `%g`.
pub fn write_table(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut out = format_float_columns(df.clone())?;
    CsvWriter::new(&mut writer)
        .include_header(true)
        .with_separator(b' ')
        .with_null_value("NA".to_string())
        .finish(&mut out)
        .with_context(|| format!("write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
