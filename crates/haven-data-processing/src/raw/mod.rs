use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "download_data")]
pub mod fetch;

pub use super::error::Result;

/// Number of physical column-title lines at the top of the listing.
pub const DEFAULT_HEADER_ROWS: usize = 2;
/// Columns read per row. Extra trailing fields are dropped, missing ones read as empty.
pub const DEFAULT_TABLE_WIDTH: usize = 9;

/// One physical row of the source table: ordered, trimmed string fields.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<String>,
}

impl RawRow {
    /// Trims every field and strips one enclosing pair of double quotes.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|field| normalize_field(field.as_ref()))
                .collect(),
        }
    }

    /// Fields the CSV reader has already unquoted; only whitespace is trimmed.
    fn from_decoded<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| f.trim().to_string()).collect(),
        }
    }

    /// Field at `index`, or `""` when the row is shorter than that.
    #[must_use]
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", String::as_str)
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(String::is_empty)
    }
}

impl<S: AsRef<str>> FromIterator<S> for RawRow {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

fn normalize_field(field: &str) -> String {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(field)
        .trim()
        .to_string()
}

/// Where the raw listing comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// Delimited text file on disk.
    File(PathBuf),
    /// Delimited text held in memory.
    Inline(String),
    /// Delimited text fetched over HTTP(S). Requires the `download_data` feature.
    Url(String),
}

impl TableSource {
    /// `http://` and `https://` locations become [`TableSource::Url`], anything else a file path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline(text) => format!("<inline, {} bytes>", text.len()),
            Self::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Non-blank lines skipped before the first data row.
    pub header_rows: usize,
    pub width: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            header_rows: DEFAULT_HEADER_ROWS,
            width: DEFAULT_TABLE_WIDTH,
        }
    }
}

/// Fetch the raw table and decode it into rows, preserving source order.
///
/// Any failure here means the source is unavailable; no partial row list is returned.
#[instrument(name = "Fetch raw table", skip_all, fields(source = %source.describe()), level = "info")]
pub async fn fetch_raw_table(source: &TableSource, options: &TableOptions) -> Result<Vec<RawRow>> {
    let bytes = match source {
        TableSource::Inline(text) => text.clone().into_bytes(),
        TableSource::File(path) => tokio::fs::read(path).await?,
        TableSource::Url(url) => download(url).await?,
    };
    debug!(bytes = bytes.len(), "Raw table read");

    let options = options.clone();
    let rows = tokio::task::spawn_blocking(move || decode_table(&bytes, &options)).await??;
    info!(rows = rows.len(), "Raw table decoded");
    Ok(rows)
}

#[cfg(feature = "download_data")]
async fn download(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::Client::new();
    let table_file = fetch::download_to_temp_file(&client, url).await?;
    Ok(tokio::fs::read(table_file.path()).await?)
}

#[cfg(not(feature = "download_data"))]
async fn download(url: &str) -> Result<Vec<u8>> {
    Err(crate::DataError::DownloadDisabled(url.to_string()))
}

/// Decode delimited text into rows with polars' CSV reader.
///
/// Every column is read as a string; quoted fields may contain commas and
/// invalid UTF-8 is replaced rather than rejected. When the table does not
/// parse as a whole it is decoded line by line, so a malformed line becomes one
/// row of plain fields instead of failing the load.
pub fn decode_table(bytes: &[u8], options: &TableOptions) -> Result<Vec<RawRow>> {
    let body = skip_header_lines(bytes, options.header_rows);
    if body.iter().all(u8::is_ascii_whitespace) || options.width == 0 {
        return Ok(Vec::new());
    }

    match read_csv(body, options.width) {
        Ok(df) => rows_from_frame(&df),
        Err(error) => {
            warn!(%error, "Table did not parse as a whole, decoding line by line");
            decode_lines(body, options.width)
        }
    }
}

fn read_csv(body: &[u8], width: usize) -> PolarsResult<DataFrame> {
    let schema = Schema::from_iter(
        (0..width).map(|idx| (PlSmallStr::from(format!("column_{idx}")), DataType::String)),
    );
    CsvReadOptions::default()
        .with_has_header(false)
        .with_schema(Some(Arc::new(schema)))
        .with_parse_options(
            CsvParseOptions::default()
                .with_encoding(CsvEncoding::LossyUtf8)
                .with_truncate_ragged_lines(true)
                .with_missing_is_null(true),
        )
        .into_reader_with_file_handle(Cursor::new(body.to_vec()))
        .finish()
}

fn decode_lines(body: &[u8], width: usize) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for line in body.split(|&b| b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let unbalanced = line.iter().filter(|&&b| b == b'"').count() % 2 == 1;
        if unbalanced {
            rows.push(split_plain_line(line, width));
            continue;
        }
        match read_csv(line, width) {
            Ok(df) => rows.extend(rows_from_frame(&df)?),
            Err(error) => {
                debug!(%error, "Keeping malformed line as plain fields");
                rows.push(split_plain_line(line, width));
            }
        }
    }
    Ok(rows)
}

/// Comma split with stray quotes dropped, for lines the CSV reader rejects.
fn split_plain_line(line: &[u8], width: usize) -> RawRow {
    let text = String::from_utf8_lossy(line);
    RawRow::from_decoded(
        text.trim_end_matches(['\r', '\n'])
            .split(',')
            .take(width)
            .map(|field| field.trim().trim_matches('"')),
    )
}

fn rows_from_frame(df: &DataFrame) -> Result<Vec<RawRow>> {
    let columns = df
        .get_columns()
        .iter()
        .map(Column::str)
        .collect::<PolarsResult<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|idx| {
            RawRow::from_decoded(columns.iter().map(|ca| ca.get(idx).unwrap_or_default()))
        })
        .collect())
}

/// Drops the first `header_rows` non-blank lines.
fn skip_header_lines(bytes: &[u8], header_rows: usize) -> &[u8] {
    let mut remaining = bytes;
    let mut skipped = 0;
    while skipped < header_rows && !remaining.is_empty() {
        let line_end = remaining
            .iter()
            .position(|&b| b == b'\n')
            .map_or(remaining.len(), |pos| pos + 1);
        let (line, rest) = remaining.split_at(line_end);
        if !line.iter().all(u8::is_ascii_whitespace) {
            skipped += 1;
        }
        remaining = rest;
    }
    remaining
}
