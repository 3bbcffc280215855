//! IDEB school index: download, spreadsheet extraction and preparation
//!
//! INEP publishes the per-school IDEB results as an XLSX file inside a ZIP
//! archive. The sheet starts with a six-row banner; the row after it holds
//! the column headers. Two of the columns used here have no header and are
//! addressed by position.

use super::columns::{IDEB, PASS_RATE, SCHOOL_CODE, STANDARDIZED_SCORE};
use super::frame::{format_code, read_csv, text_values, CsvSource};
use crate::error::{AnalysisError, Result};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use polars::prelude::*;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

/// Banner rows above the header row
pub const BANNER_ROWS: usize = 6;

/// Header of the school code column
pub const SCHOOL_CODE_HEADER: &str = "Código da Escola";

/// Position of the (unnamed) pass-rate indicator column
pub const PASS_RATE_INDEX: usize = 12;

/// Position of the (unnamed) standardized score column
pub const STANDARDIZED_SCORE_INDEX: usize = 15;

/// Marker INEP uses for missing values
const MISSING_MARKER: &str = "-";

/// Spreadsheet cell, reduced to what the preparation needs
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl Cell {
    fn header_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => format_code(*n),
            Cell::Text(s) => s.trim().to_string(),
        }
    }

    /// School code as text; numeric cells lose their `.0`
    fn as_key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(format_code(*n)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == MISSING_MARKER {
                    return None;
                }
                // keys stored as text may still carry a float suffix
                match trimmed.parse::<f64>() {
                    Ok(n) if n.fract() == 0.0 => Some(format_code(n)),
                    _ => Some(trimmed.to_string()),
                }
            }
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed == MISSING_MARKER {
                    None
                } else {
                    trimmed.replace(',', ".").parse().ok()
                }
            }
        }
    }
}

/// Header plus data rows of the first worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    /// Build from all sheet rows, skipping `banner` rows before the header
    pub fn from_rows<I>(rows: I, banner: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        let mut iter = rows.into_iter().skip(banner);
        let header = iter
            .next()
            .ok_or_else(|| {
                AnalysisError::Spreadsheet(format!("sheet has no header after {} rows", banner))
            })?
            .iter()
            .map(Cell::header_text)
            .collect();

        Ok(Self {
            header,
            rows: iter.collect(),
        })
    }

    fn position(&self, predicate: impl Fn(&str) -> bool) -> Option<usize> {
        self.header.iter().position(|h| predicate(h))
    }
}

/// Download the IDEB archive, reusing a cached copy when present
pub async fn fetch_ideb_archive(url: &str, cache_dir: &Path) -> Result<Vec<u8>> {
    let file_name = url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("ideb.zip");
    let cached = cache_dir.join(file_name);

    if cached.exists() {
        info!("Using cached IDEB archive {}", cached.display());
        return Ok(tokio::fs::read(&cached).await?);
    }

    info!("Downloading IDEB archive from {}", url);
    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(cache_dir).await?;
    tokio::fs::write(&cached, &bytes).await?;
    info!(
        "IDEB archive downloaded ({} bytes) to {}",
        bytes.len(),
        cached.display()
    );

    Ok(bytes.to_vec())
}

/// Extract the worksheet `entry` from the zipped archive
pub fn read_ideb_sheet(archive: &[u8], entry: &str) -> Result<RawSheet> {
    let mut zip = ::zip::ZipArchive::new(Cursor::new(archive))?;
    let mut xlsx_bytes = Vec::new();
    zip.by_name(entry)?.read_to_end(&mut xlsx_bytes)?;
    debug!("Extracted {} ({} bytes)", entry, xlsx_bytes.len());

    let mut workbook = open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(xlsx_bytes))
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalysisError::Spreadsheet(format!("{} has no worksheet", entry)))?
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;

    // the used range may not start at A1; pad so positions match the sheet
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let banner = BANNER_ROWS.saturating_sub(first_row as usize);
    let rows = range.rows().map(|row| {
        std::iter::repeat(Cell::Empty)
            .take(first_col as usize)
            .chain(row.iter().map(Cell::from))
            .collect::<Vec<_>>()
    });

    RawSheet::from_rows(rows, banner)
}

/// Select, rename and clean the IDEB columns
///
/// Output columns: `CO_ESCOLA` (text), `IN_RENDIMENTO`, `NT_PADRONIZADA`,
/// `IDEB` (floats, `-` read as missing). Rows without a school code are
/// dropped.
pub fn prepare_ideb(sheet: &RawSheet) -> Result<DataFrame> {
    let key_idx = sheet
        .position(|h| h == SCHOOL_CODE_HEADER)
        .ok_or_else(|| AnalysisError::MissingColumn(SCHOOL_CODE_HEADER.to_string()))?;
    let ideb_idx = sheet
        .position(|h| h.starts_with(IDEB))
        .ok_or_else(|| AnalysisError::MissingColumn(IDEB.to_string()))?;

    let mut keys = Vec::new();
    let mut pass_rate = Vec::new();
    let mut standardized = Vec::new();
    let mut ideb = Vec::new();

    let number_at = |row: &[Cell], idx: usize| row.get(idx).and_then(Cell::as_number);

    for row in &sheet.rows {
        let row = row.as_slice();
        let Some(key) = row.get(key_idx).and_then(Cell::as_key) else {
            continue;
        };
        keys.push(key);
        pass_rate.push(number_at(row, PASS_RATE_INDEX));
        standardized.push(number_at(row, STANDARDIZED_SCORE_INDEX));
        ideb.push(number_at(row, ideb_idx));
    }

    info!(
        "IDEB preparation kept {} of {} rows",
        keys.len(),
        sheet.rows.len()
    );

    Ok(DataFrame::new(vec![
        Series::new(SCHOOL_CODE, keys),
        Series::new(PASS_RATE, pass_rate),
        Series::new(STANDARDIZED_SCORE, standardized),
        Series::new(IDEB, ideb),
    ])?)
}

/// Load an IDEB table written by a previous preparation
pub fn load_prepared_ideb(path: &Path) -> Result<DataFrame> {
    let mut df = read_csv(CsvSource::new(path))?;
    let keys = text_values(&df, SCHOOL_CODE)?;
    df.with_column(Series::new(SCHOOL_CODE, keys))?;
    info!("Loaded prepared IDEB table with {} schools", df.height());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::float_values;
    use std::io::Write;
    use tempfile::TempDir;
    use ::zip::write::SimpleFileOptions;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn data_row(key: Cell, pass: Cell, standardized: Cell, ideb: Cell) -> Vec<Cell> {
        let mut row = vec![Cell::Empty; 18];
        row[2] = key;
        row[PASS_RATE_INDEX] = pass;
        row[STANDARDIZED_SCORE_INDEX] = standardized;
        row[17] = ideb;
        row
    }

    fn sheet() -> RawSheet {
        let mut header = vec![String::new(); 18];
        header[0] = "Sigla da UF".to_string();
        header[2] = SCHOOL_CODE_HEADER.to_string();
        header[17] = "IDEB\n2017\n(N x P)".to_string();

        RawSheet {
            header,
            rows: vec![
                data_row(
                    Cell::Number(11000023.0),
                    Cell::Number(0.85),
                    Cell::Number(4.9),
                    Cell::Number(4.2),
                ),
                data_row(text("11000040"), text("-"), text("-"), text("-")),
                data_row(Cell::Empty, Cell::Number(0.5), Cell::Empty, Cell::Empty),
                vec![text("Fonte: MEC/INEP")],
            ],
        }
    }

    #[test]
    fn test_prepare_ideb_selects_and_cleans() {
        let df = prepare_ideb(&sheet()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            text_values(&df, SCHOOL_CODE).unwrap(),
            vec![Some("11000023".to_string()), Some("11000040".to_string())]
        );
        assert_eq!(float_values(&df, PASS_RATE).unwrap(), vec![Some(0.85), None]);
        assert_eq!(float_values(&df, STANDARDIZED_SCORE).unwrap(), vec![Some(4.9), None]);
        assert_eq!(float_values(&df, IDEB).unwrap(), vec![Some(4.2), None]);
    }

    #[test]
    fn test_prepare_ideb_requires_school_code_header() {
        let mut bad = sheet();
        bad.header[2] = "Escola".to_string();
        assert!(matches!(
            prepare_ideb(&bad),
            Err(AnalysisError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_raw_sheet_skips_banner() {
        let mut rows = vec![vec![text("banner")]; BANNER_ROWS];
        rows.push(vec![text(" Código da Escola "), Cell::Number(2017.0)]);
        rows.push(vec![Cell::Number(1.0), Cell::Number(2.0)]);

        let sheet = RawSheet::from_rows(rows, BANNER_ROWS).unwrap();
        assert_eq!(sheet.header, vec![SCHOOL_CODE_HEADER.to_string(), "2017".to_string()]);
        assert_eq!(sheet.rows.len(), 1);

        assert!(RawSheet::from_rows(vec![vec![text("only banner")]], BANNER_ROWS).is_err());
    }

    #[test]
    fn test_cell_parsing() {
        assert_eq!(text("12,5").as_number(), Some(12.5));
        assert_eq!(text(" - ").as_number(), None);
        assert_eq!(text("11000023.0").as_key(), Some("11000023".to_string()));
        assert_eq!(text("-").as_key(), None);
        assert_eq!(Cell::from(&Data::Int(7)), Cell::Number(7.0));
    }

    fn zip_with(entry: &str, content: &[u8]) -> Vec<u8> {
        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(entry, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_sheet_missing_entry() {
        let archive = zip_with("other.txt", b"hello");
        let result = read_ideb_sheet(&archive, "divulgacao.xlsx");
        assert!(matches!(result, Err(AnalysisError::Zip(_))));
    }

    #[test]
    fn test_read_sheet_rejects_invalid_workbook() {
        let archive = zip_with("divulgacao.xlsx", b"not a workbook");
        let result = read_ideb_sheet(&archive, "divulgacao.xlsx");
        assert!(matches!(result, Err(AnalysisError::Spreadsheet(_))));
    }

    fn column_letter(idx: usize) -> char {
        (b'A' + idx as u8) as char
    }

    fn inline_cell(idx: usize, row: usize, value: &str) -> String {
        format!(
            r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            column_letter(idx),
            row,
            value
        )
    }

    fn number_cell(idx: usize, row: usize, value: f64) -> String {
        format!(r#"<c r="{}{}"><v>{}</v></c>"#, column_letter(idx), row, value)
    }

    /// Minimal workbook whose used range starts at B2: banner in B2..B6,
    /// header on row 7, one school on row 8
    fn workbook_bytes() -> Vec<u8> {
        let mut rows: Vec<String> = (2..=6)
            .map(|r| format!(r#"<row r="{}">{}</row>"#, r, inline_cell(1, r, "INEP")))
            .collect();
        rows.push(format!(
            r#"<row r="7">{}{}{}</row>"#,
            inline_cell(1, 7, "Sigla da UF"),
            inline_cell(2, 7, SCHOOL_CODE_HEADER),
            inline_cell(17, 7, "IDEB 2017 (N x P)")
        ));
        rows.push(format!(
            r#"<row r="8">{}{}{}{}{}</row>"#,
            inline_cell(1, 8, "RO"),
            number_cell(2, 8, 11000023.0),
            number_cell(PASS_RATE_INDEX, 8, 0.85),
            number_cell(STANDARDIZED_SCORE_INDEX, 8, 4.9),
            number_cell(17, 8, 4.2)
        ));
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            rows.concat()
        );

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Escolas" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet),
        ];

        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_sheet_pads_offset_range() {
        let archive = zip_with("divulgacao.xlsx", &workbook_bytes());
        let sheet = read_ideb_sheet(&archive, "divulgacao.xlsx").unwrap();

        assert_eq!(sheet.header[1], "Sigla da UF");
        assert_eq!(sheet.header[2], SCHOOL_CODE_HEADER);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][PASS_RATE_INDEX], Cell::Number(0.85));
        assert_eq!(sheet.rows[0][STANDARDIZED_SCORE_INDEX], Cell::Number(4.9));

        let df = prepare_ideb(&sheet).unwrap();
        assert_eq!(
            text_values(&df, SCHOOL_CODE).unwrap(),
            vec![Some("11000023".to_string())]
        );
        assert_eq!(float_values(&df, PASS_RATE).unwrap(), vec![Some(0.85)]);
        assert_eq!(float_values(&df, STANDARDIZED_SCORE).unwrap(), vec![Some(4.9)]);
        assert_eq!(float_values(&df, IDEB).unwrap(), vec![Some(4.2)]);
    }

    /// Serve one canned HTTP response per connection
    async fn serve(responses: Vec<(&'static str, &'static [u8])>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let read = socket.read(&mut buf).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..read]);
                }
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(body).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_downloads_then_caches() {
        let temp_dir = TempDir::new().unwrap();
        let base = serve(vec![
            ("404 Not Found", &b"missing"[..]),
            ("200 OK", &b"archive"[..]),
        ])
        .await;
        let url = format!("{}/microdados/ideb.zip", base);

        let result = fetch_ideb_archive(&url, temp_dir.path()).await;
        assert!(matches!(result, Err(AnalysisError::Http(_))));
        assert!(!temp_dir.path().join("ideb.zip").exists());

        let bytes = fetch_ideb_archive(&url, temp_dir.path()).await.unwrap();
        assert_eq!(bytes, b"archive".to_vec());
        assert_eq!(
            std::fs::read(temp_dir.path().join("ideb.zip")).unwrap(),
            b"archive".to_vec()
        );

        // served from the cache; the listener has no responses left
        let again = fetch_ideb_archive(&url, temp_dir.path()).await.unwrap();
        assert_eq!(again, b"archive".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_uses_cache() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("ideb.zip"), b"cached").unwrap();

        let bytes = fetch_ideb_archive("http://localhost:9/path/ideb.zip?x=1", temp_dir.path())
            .await
            .unwrap();
        assert_eq!(bytes, b"cached".to_vec());
    }

    #[test]
    fn test_load_prepared_ideb_normalizes_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ideb.csv");
        std::fs::write(
            &path,
            "CO_ESCOLA,IN_RENDIMENTO,NT_PADRONIZADA,IDEB\n11000023,0.9,5.0,4.5\n11000040,,,\n",
        )
        .unwrap();

        let df = load_prepared_ideb(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            text_values(&df, SCHOOL_CODE).unwrap()[0],
            Some("11000023".to_string())
        );
        assert_eq!(float_values(&df, PASS_RATE).unwrap()[1], None);
    }
}
