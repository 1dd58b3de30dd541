//! Tabular decoding of uploaded files
//!
//! Delimited text is keyed by its first line. Workbooks are searched for the
//! header row, since exported templates often carry title or vendor rows
//! above it. Fully blank rows never leave this module.

use std::borrow::Cow;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::debug;

use crate::config::ImportConfig;
use crate::errors::{ImportError, ImportResult};
use crate::ingestor::dates;
use crate::models::{CellValue, ValidationError};
use crate::utils::text::fold_label;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// First-cell labels that mark the header row of a workbook sheet
const HEADER_ROW_LABELS: &[&str] = &["fecha_reserva", "fecha reserva", "fecha de reserva"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            Self::Workbook
        } else {
            Self::Delimited
        }
    }
}

/// One non-blank source row with its 1-based position in the file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub row_number: usize,
    pub cells: Vec<CellValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    pub rows: Vec<DecodedRow>,
    pub blank_rows_dropped: usize,
}

impl DecodedTable {
    fn push(&mut self, row_number: usize, cells: Vec<CellValue>) {
        if cells.iter().all(CellValue::is_blank) {
            self.blank_rows_dropped += 1;
        } else {
            self.rows.push(DecodedRow { row_number, cells });
        }
    }
}

/// Where to look for data inside a workbook
#[derive(Debug, Clone)]
pub struct WorkbookLayout {
    pub preferred_sheet: String,
    pub header_scan_rows: usize,
}

impl WorkbookLayout {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            preferred_sheet: config.preferred_sheet.clone(),
            header_scan_rows: config.header_scan_rows,
        }
    }

    /// The sheet named like the record type, else the first sheet
    pub fn pick_sheet(&self, sheet_names: &[String]) -> Option<usize> {
        sheet_names
            .iter()
            .position(|name| name.trim().eq_ignore_ascii_case(&self.preferred_sheet))
            .or_else(|| (!sheet_names.is_empty()).then_some(0))
    }

    fn is_header_cell(cell: &Data) -> bool {
        match cell {
            Data::String(label) => {
                let folded = fold_label(label);
                HEADER_ROW_LABELS.iter().any(|known| folded.contains(known))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TabularDecoder {
    layout: WorkbookLayout,
}

impl TabularDecoder {
    pub fn new(layout: WorkbookLayout) -> Self {
        Self { layout }
    }

    pub fn decode(&self, bytes: &[u8], file_name: &str) -> ImportResult<DecodedTable> {
        match SourceFormat::from_file_name(file_name) {
            SourceFormat::Delimited => decode_delimited(bytes),
            SourceFormat::Workbook => self.decode_workbook(bytes),
        }
    }

    fn decode_workbook(&self, bytes: &[u8]) -> ImportResult<DecodedTable> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ImportError::unreadable(format!("failed to open workbook: {}", e)))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let index = self
            .layout
            .pick_sheet(&sheet_names)
            .ok_or(ImportError::NoWorksheet)?;
        let sheet = sheet_names[index].clone();

        let range = workbook
            .worksheet_range_at(index)
            .ok_or(ImportError::NoWorksheet)?
            .map_err(|e| ImportError::unreadable(format!("failed to read sheet '{}': {}", sheet, e)))?;

        debug!("Reading sheet '{}' of {} available", sheet, sheet_names.len());
        self.table_from_range(&sheet, &range)
    }

    /// Locate the header row within the scan window and collect the rows below it
    pub fn table_from_range(&self, sheet: &str, range: &Range<Data>) -> ImportResult<DecodedTable> {
        let rows: Vec<&[Data]> = range.rows().collect();
        if rows.len() < 2 {
            return Err(ImportError::EmptyFile);
        }

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let scanned = rows.len().min(self.layout.header_scan_rows);
        let header_index = rows[..scanned]
            .iter()
            .position(|row| row.first().is_some_and(WorkbookLayout::is_header_cell))
            .ok_or_else(|| ImportError::HeaderRowNotFound {
                sheet: sheet.to_string(),
                scanned,
            })?;

        let mut table = DecodedTable {
            headers: rows[header_index].iter().map(header_label).collect(),
            ..DecodedTable::default()
        };

        for (index, row) in rows.iter().enumerate().skip(header_index + 1) {
            table.push(first_row + index + 1, row.iter().map(workbook_cell).collect());
        }
        Ok(table)
    }
}

fn decode_delimited(bytes: &[u8]) -> ImportResult<DecodedTable> {
    let text = decode_text(bytes);
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ImportError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ImportError::unreadable(e.to_string()))?
        .iter()
        .map(|label| label.trim().to_string())
        .collect();

    let mut table = DecodedTable {
        headers,
        ..DecodedTable::default()
    };
    let mut errors = Vec::new();

    for result in reader.records() {
        match result {
            Ok(record) => {
                let row_number = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(table.rows.len() + table.blank_rows_dropped + 2);
                table.push(row_number, record.iter().map(text_cell).collect());
            }
            Err(e) => {
                let row_number = e.position().map(|p| p.line() as usize).unwrap_or(0);
                errors.push(ValidationError::new(row_number, e.to_string()));
            }
        }
    }

    if !errors.is_empty() {
        return Err(ImportError::CsvParse { errors });
    }
    Ok(table)
}

/// UTF-8 when valid, otherwise Windows-1252 (what spreadsheet tools export by default)
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0,
    }
}

/// Pick `,`, `;` or tab by frequency on the header line (outside quotes)
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let mut in_quotes = false;
    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0)];

    for byte in header.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(entry) = counts.iter_mut().find(|(d, _)| *d == byte) {
                entry.1 += 1;
            }
        }
    }

    counts
        .iter()
        .fold((b',', 0), |best, &(delimiter, count)| {
            if count > best.1 {
                (delimiter, count)
            } else {
                best
            }
        })
        .0
}

fn text_cell(value: &str) -> CellValue {
    if value.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::text(value)
    }
}

fn header_label(cell: &Data) -> String {
    match cell {
        Data::String(label) => label.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Numbers are taken as stored, not as displayed: a cell shown as `3%` is `0.03`
fn workbook_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(text) => text_cell(text),
        Data::Float(number) => CellValue::Number(*number),
        Data::Int(number) => CellValue::Number(*number as f64),
        Data::Bool(flag) => CellValue::text(flag.to_string()),
        Data::DateTime(datetime) => {
            let serial = datetime.as_f64();
            dates::from_serial(serial)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Number(serial))
        }
        Data::DateTimeIso(iso) => iso
            .get(..10)
            .and_then(dates::parse_text)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::text(iso.as_str())),
        Data::DurationIso(text) => CellValue::text(text.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn decoder() -> TabularDecoder {
        TabularDecoder::new(WorkbookLayout::from_config(&ImportConfig::default()))
    }

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(value: &str) -> Data {
        Data::String(value.to_string())
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_file_name("ops.XLSX"), SourceFormat::Workbook);
        assert_eq!(SourceFormat::from_file_name("ops.xls"), SourceFormat::Workbook);
        assert_eq!(SourceFormat::from_file_name("ops.csv"), SourceFormat::Delimited);
        assert_eq!(SourceFormat::from_file_name("ops"), SourceFormat::Delimited);
    }

    #[test]
    fn test_csv_rows_keep_file_line_numbers() {
        let csv = "fecha_reserva,estado\n15-03-2024,Cerrada\n,\n01-11-2025,En Curso\n";
        let table = decoder().decode(csv.as_bytes(), "ops.csv").unwrap();

        assert_eq!(table.headers, vec!["fecha_reserva", "estado"]);
        assert_eq!(table.blank_rows_dropped, 1);
        let numbers: Vec<usize> = table.rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![2, 4]);
        assert_eq!(table.rows[0].cells[1], CellValue::text("Cerrada"));
    }

    #[test]
    fn test_csv_with_bom_and_semicolons() {
        let csv = "\u{feff}Fecha de Reserva*;Dirección*\n15/03/2024;\"Calle 1; depto B\"\n";
        let table = decoder().decode(csv.as_bytes(), "ops.csv").unwrap();
        assert_eq!(table.headers, vec!["Fecha de Reserva*", "Dirección*"]);
        assert_eq!(table.rows[0].cells[1], CellValue::text("Calle 1; depto B"));
    }

    #[test]
    fn test_csv_in_windows_1252() {
        let mut bytes = b"direccion\nCalle Peque".to_vec();
        bytes.push(0xF1);
        bytes.extend_from_slice(b"a\n");
        let table = decoder().decode(&bytes, "ops.csv").unwrap();
        assert_eq!(table.rows[0].cells[0], CellValue::text("Calle Pequeña"));
    }

    #[test]
    fn test_empty_csv() {
        assert!(matches!(
            decoder().decode(b"  \n", "ops.csv"),
            Err(ImportError::EmptyFile)
        ));
    }

    #[test]
    fn test_workbook_header_below_metadata_rows() {
        let range = sheet(&[
            &[s("Exportado por CRM")],
            &[Data::Empty],
            &[s("Fecha de Reserva*"), s("Estado*")],
            &[Data::Float(45366.0), s("Cerrada")],
            &[Data::Empty, Data::Empty],
            &[s("01-11-2025"), Data::Bool(true)],
        ]);

        let table = decoder().table_from_range("operaciones", &range).unwrap();
        assert_eq!(table.headers, vec!["Fecha de Reserva*", "Estado*"]);
        assert_eq!(table.blank_rows_dropped, 1);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].row_number, 4);
        assert_eq!(table.rows[0].cells[0], CellValue::Number(45366.0));
        assert_eq!(table.rows[1].row_number, 6);
        assert_eq!(table.rows[1].cells[1], CellValue::text("true"));
    }

    #[test]
    fn test_workbook_percent_cells_keep_stored_value() {
        let range = sheet(&[
            &[s("fecha_reserva"), s("% Punta Vendedora")],
            &[s("15-03-2024"), Data::Float(0.03)],
            &[s("16-03-2024"), s("3%")],
        ]);

        let table = decoder().table_from_range("operaciones", &range).unwrap();
        assert_eq!(table.rows[0].cells[1], CellValue::Number(0.03));
        assert_eq!(table.rows[1].cells[1], CellValue::text("3%"));
    }

    #[test]
    fn test_workbook_without_header_row() {
        let range = sheet(&[&[s("Resumen")], &[s("Total")], &[Data::Float(3.0)]]);
        let result = decoder().table_from_range("Hoja1", &range);
        assert!(matches!(
            result,
            Err(ImportError::HeaderRowNotFound { scanned: 3, .. })
        ));
    }

    #[test]
    fn test_header_must_be_inside_scan_window() {
        let layout = WorkbookLayout {
            preferred_sheet: "operaciones".to_string(),
            header_scan_rows: 2,
        };
        let range = sheet(&[
            &[s("titulo")],
            &[s("subtitulo")],
            &[s("fecha_reserva")],
            &[s("15-03-2024")],
        ]);
        let result = TabularDecoder::new(layout).table_from_range("operaciones", &range);
        assert!(matches!(result, Err(ImportError::HeaderRowNotFound { .. })));
    }

    #[test]
    fn test_workbook_with_single_row_is_empty() {
        let range = sheet(&[&[s("fecha_reserva")]]);
        assert!(matches!(
            decoder().table_from_range("operaciones", &range),
            Err(ImportError::EmptyFile)
        ));
    }

    #[test]
    fn test_pick_sheet_prefers_named_sheet() {
        let layout = WorkbookLayout::from_config(&ImportConfig::default());
        let names = vec!["Instrucciones".to_string(), "Operaciones".to_string()];
        assert_eq!(layout.pick_sheet(&names), Some(1));
        assert_eq!(layout.pick_sheet(&["Hoja1".to_string()]), Some(0));
        assert_eq!(layout.pick_sheet(&[]), None);
    }

    #[test]
    fn test_workbook_cell_conversion() {
        assert_eq!(workbook_cell(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(workbook_cell(&s("  ")), CellValue::Empty);
        assert_eq!(
            workbook_cell(&Data::DateTimeIso("2024-03-15T00:00:00".to_string())),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
    }

    #[test]
    fn test_unreadable_workbook() {
        assert!(matches!(
            decoder().decode(b"not a zip", "ops.xlsx"),
            Err(ImportError::UnreadableFile { .. })
        ));
    }
}
