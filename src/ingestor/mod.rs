//! Bulk import pipeline
//!
//! Stages run strictly forward: decode the upload, normalize headers, build
//! rows, resolve the team roster once, validate and transform each row, link
//! advisors, then persist in sequential atomic groups.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::errors::{AppError, AppResult, ImportError, ImportResult};
use crate::models::{CellValue, ImportJobResult, RawRow};
use crate::repositories::{OperationStore, RosterStore};
use crate::roster;

pub mod batch_writer;
pub mod dates;
pub mod headers;
pub mod sanitize;
pub mod tabular;
pub mod transform;
pub mod validation;

pub use batch_writer::BatchWriter;
pub use headers::{HeaderNormalizer, SynonymTable};
pub use tabular::{TabularDecoder, WorkbookLayout};
pub use transform::RowTransformer;

/// Columns whose spreadsheet numbers are day serials
pub const DATE_COLUMNS: &[&str] = &["fecha_reserva", "fecha_operacion", "fecha_captacion"];

/// One uploaded file and who uploaded it
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caller_id: String,
    /// Team named in the upload form, if any
    pub team_id: Option<String>,
}

#[derive(Clone)]
pub struct ImportPipeline {
    config: ImportConfig,
    decoder: TabularDecoder,
    headers: HeaderNormalizer,
    transformer: RowTransformer,
    roster_store: Arc<dyn RosterStore>,
    operation_store: Arc<dyn OperationStore>,
}

impl ImportPipeline {
    pub fn new(
        config: &ImportConfig,
        roster_store: Arc<dyn RosterStore>,
        operation_store: Arc<dyn OperationStore>,
    ) -> AppResult<Self> {
        let transformer = RowTransformer::new(config)
            .map_err(|e| AppError::configuration(format!("invalid sanitizer pattern: {}", e)))?;
        let synonyms = SynonymTable::default().with_aliases(&config.header_aliases);

        Ok(Self {
            config: config.clone(),
            decoder: TabularDecoder::new(WorkbookLayout::from_config(config)),
            headers: HeaderNormalizer::new(synonyms),
            transformer,
            roster_store,
            operation_store,
        })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Run one import job end to end
    pub async fn run(&self, request: ImportRequest) -> ImportResult<ImportJobResult> {
        let rows = self.prepare_rows(&request.bytes, &request.file_name)?;
        info!(
            "Importing {} rows from '{}' for caller {}",
            rows.len(),
            request.file_name,
            request.caller_id
        );

        let team_id = roster::resolve_effective_team_id(
            self.roster_store.as_ref(),
            &request.caller_id,
            request.team_id.as_deref(),
        )
        .await;
        let resolver =
            roster::select_resolver(self.roster_store.clone(), &team_id, &request.caller_id).await;
        info!(
            "Team {} selected, advisor resolution: {}",
            team_id,
            resolver.strategy()
        );

        let (mut records, errors) = self.transformer.transform_all(&rows, &team_id, Utc::now());
        transform::link_advisors(&mut records, resolver.as_ref()).await;

        if !errors.is_empty() {
            warn!("{} of {} rows rejected", errors.len(), rows.len());
        }

        let writer = BatchWriter::new(self.operation_store.as_ref(), self.config.write_group_size);
        let created_count = writer.write_all(&records).await?;
        info!(
            "Import of '{}' finished: {} created, {} rejected",
            request.file_name,
            created_count,
            errors.len()
        );

        Ok(ImportJobResult {
            created_count,
            errors,
        })
    }

    /// Decode and key the upload, enforcing every whole-file limit
    pub fn prepare_rows(&self, bytes: &[u8], file_name: &str) -> ImportResult<Vec<RawRow>> {
        if bytes.len() > self.config.max_file_size {
            return Err(ImportError::FileTooLarge {
                size: bytes.len(),
                max: self.config.max_file_size,
            });
        }
        if bytes.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        let table = self.decoder.decode(bytes, file_name)?;
        let keys = self.headers.normalize_all(&table.headers);

        let missing = HeaderNormalizer::missing_required(&keys);
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns { columns: missing });
        }
        if table.rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        if table.rows.len() > self.config.max_rows {
            return Err(ImportError::TooManyRows {
                found: table.rows.len(),
                max: self.config.max_rows,
            });
        }
        if table.blank_rows_dropped > 0 {
            info!("Dropped {} blank rows from '{}'", table.blank_rows_dropped, file_name);
        }

        Ok(table
            .rows
            .into_iter()
            .map(|decoded| {
                let mut row = RawRow::new(decoded.row_number);
                for (key, cell) in keys.iter().zip(decoded.cells) {
                    if key.is_empty() {
                        continue;
                    }
                    let cell = if DATE_COLUMNS.contains(&key.as_str()) {
                        normalize_date_cell(cell)
                    } else {
                        cell
                    };
                    row.insert(key.as_str(), cell);
                }
                row
            })
            .collect())
    }
}

/// Spreadsheet serials become dates as soon as the column is known
fn normalize_date_cell(cell: CellValue) -> CellValue {
    match cell {
        CellValue::Number(serial) => dates::from_serial(serial)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(serial)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryStore;
    use chrono::NaiveDate;

    fn pipeline(config: ImportConfig) -> ImportPipeline {
        let store = Arc::new(InMemoryStore::new());
        ImportPipeline::new(&config, store.clone(), store).unwrap()
    }

    const HEADER: &str = "fecha_reserva,direccion_reserva,tipo_operacion,valor_reserva,estado\n";

    #[test]
    fn test_rejects_oversized_file() {
        let config = ImportConfig {
            max_file_size: 10,
            ..ImportConfig::default()
        };
        let result = pipeline(config).prepare_rows(HEADER.as_bytes(), "ops.csv");
        assert!(matches!(result, Err(ImportError::FileTooLarge { max: 10, .. })));
    }

    #[test]
    fn test_rejects_missing_required_columns() {
        let csv = "Fecha de Reserva,Dirección,Estado\n2024-01-01,Calle 1,Cerrada\n";
        match pipeline(ImportConfig::default()).prepare_rows(csv.as_bytes(), "ops.csv") {
            Err(ImportError::MissingColumns { columns }) => {
                assert_eq!(columns, vec!["tipo_operacion", "valor_reserva"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let result = pipeline(ImportConfig::default()).prepare_rows(HEADER.as_bytes(), "ops.csv");
        assert!(matches!(result, Err(ImportError::EmptyFile)));
        let result = pipeline(ImportConfig::default()).prepare_rows(b"", "ops.csv");
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_row_ceiling_counts_non_blank_rows() {
        let config = ImportConfig {
            max_rows: 2,
            ..ImportConfig::default()
        };
        let line = "2024-01-01,Calle 1,Venta,100,Cerrada\n";
        let within = format!("{}{}{},,,,\n", HEADER, line, line);
        assert_eq!(pipeline(config.clone()).prepare_rows(within.as_bytes(), "ops.csv").unwrap().len(), 2);

        let over = format!("{}{}{}{}", HEADER, line, line, line);
        assert!(matches!(
            pipeline(config).prepare_rows(over.as_bytes(), "ops.csv"),
            Err(ImportError::TooManyRows { found: 3, max: 2 })
        ));
    }

    #[test]
    fn test_rows_are_keyed_by_canonical_header() {
        let csv = "Fecha de Reserva*,Dirección*,Tipo de Operación*,Valor de Reserva*,Estado*,Notas\n\
                   15-03-2024,Calle 1,Venta,100,Cerrada,llamar\n";
        let rows = pipeline(ImportConfig::default())
            .prepare_rows(csv.as_bytes(), "ops.csv")
            .unwrap();
        assert_eq!(rows[0].row_number(), 2);
        assert_eq!(rows[0].text("direccion_reserva").as_deref(), Some("Calle 1"));
        assert_eq!(rows[0].text("observaciones").as_deref(), Some("llamar"));
    }

    #[test]
    fn test_date_serials_become_dates() {
        assert_eq!(
            normalize_date_cell(CellValue::Number(45366.0)),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(normalize_date_cell(CellValue::Number(-3.0)), CellValue::Number(-3.0));
    }
}
