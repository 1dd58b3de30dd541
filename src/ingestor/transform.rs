//! Row transformation into persistence-ready operation records

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::ingestor::dates;
use crate::ingestor::sanitize::Sanitizer;
use crate::ingestor::validation::{parse_boolean, parse_number, FieldLimits, Validator};
use crate::models::{
    OperationRecord, OperationStatus, OperationType, PropertyType, RawRow, RowRejection,
    ValidationError,
};
use crate::roster::AdvisorResolver;

#[derive(Debug, Clone)]
pub struct RowTransformer {
    validator: Validator,
    sanitizer: Sanitizer,
    limits: FieldLimits,
    default_country: String,
}

impl RowTransformer {
    pub fn new(config: &ImportConfig) -> Result<Self, regex::Error> {
        let sanitizer = Sanitizer::new()?;
        let limits = FieldLimits::new(config.max_string_length);
        Ok(Self {
            validator: Validator::for_operations(&limits, sanitizer.clone()),
            sanitizer,
            limits,
            default_country: config.default_country.clone(),
        })
    }

    /// Validate one row and build its record, or report every reason it was rejected
    pub fn validate_and_transform(
        &self,
        row: &RawRow,
        team_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OperationRecord, RowRejection> {
        let reject = |message: String| RowRejection {
            row_number: row.row_number(),
            messages: vec![message],
        };

        self.validator
            .validate(row)
            .map_err(|messages| RowRejection {
                row_number: row.row_number(),
                messages,
            })?;

        let fecha_reserva = self
            .date(row, "fecha_reserva")
            .ok_or_else(|| reject("fecha_reserva es requerido".to_string()))?;
        let tipo_operacion = row
            .text("tipo_operacion")
            .and_then(|value| OperationType::from_label(&value))
            .ok_or_else(|| reject("tipo_operacion es requerido".to_string()))?;
        let estado = row
            .text("estado")
            .and_then(|value| OperationStatus::from_label(&value))
            .ok_or_else(|| reject("estado es requerido".to_string()))?;
        // Markup-only addresses are empty once sanitized
        let direccion_reserva = self
            .text(row, "direccion_reserva")
            .ok_or_else(|| reject("direccion_reserva es requerido".to_string()))?;

        Ok(OperationRecord {
            id: Uuid::new_v4(),
            team_id: team_id.to_string(),
            fecha_reserva,
            fecha_operacion: self.date(row, "fecha_operacion"),
            fecha_captacion: self.date(row, "fecha_captacion"),
            direccion_reserva,
            numero_casa: self.text(row, "numero_casa"),
            localidad_reserva: self.text(row, "localidad_reserva"),
            provincia_reserva: self.text(row, "provincia_reserva"),
            pais: self
                .text(row, "pais")
                .unwrap_or_else(|| self.default_country.clone()),
            tipo_operacion,
            tipo_inmueble: row
                .text("tipo_inmueble")
                .and_then(|value| PropertyType::from_label(&value)),
            estado,
            valor_reserva: self.number(row, "valor_reserva"),
            porcentaje_punta_compradora: self.number(row, "porcentaje_punta_compradora"),
            porcentaje_punta_vendedora: self.number(row, "porcentaje_punta_vendedora"),
            punta_compradora: self.flag(row, "punta_compradora"),
            punta_vendedora: self.flag(row, "punta_vendedora"),
            porcentaje_honorarios_broker: self.number(row, "porcentaje_honorarios_broker"),
            exclusiva: self.flag(row, "exclusiva"),
            no_exclusiva: self.flag(row, "no_exclusiva"),
            numero_sobre_reserva: self.text(row, "numero_sobre_reserva"),
            numero_sobre_refuerzo: self.text(row, "numero_sobre_refuerzo"),
            monto_sobre_reserva: self.number(row, "monto_sobre_reserva"),
            monto_sobre_refuerzo: self.number(row, "monto_sobre_refuerzo"),
            referido: self.text(row, "referido"),
            compartido: self.text(row, "compartido"),
            porcentaje_compartido: self.number(row, "porcentaje_compartido"),
            porcentaje_referido: self.number(row, "porcentaje_referido"),
            realizador_venta: self.text(row, "realizador_venta"),
            user_uid: None,
            porcentaje_honorarios_asesor: self.number(row, "porcentaje_honorarios_asesor"),
            realizador_venta_adicional: self.text(row, "realizador_venta_adicional"),
            user_uid_adicional: None,
            porcentaje_honorarios_asesor_adicional: self
                .number(row, "porcentaje_honorarios_asesor_adicional"),
            observaciones: self.text(row, "observaciones"),
            gastos_operacion: self.number(row, "gastos_operacion"),
            captacion_no_es_mia: self.flag(row, "captacion_no_es_mia"),
            imported_from_csv: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fold every row into records and row errors; one bad row never stops the rest
    pub fn transform_all(
        &self,
        rows: &[RawRow],
        team_id: &str,
        now: DateTime<Utc>,
    ) -> (Vec<OperationRecord>, Vec<ValidationError>) {
        rows.iter().fold(
            (Vec::with_capacity(rows.len()), Vec::new()),
            |(mut records, mut errors), row| {
                match self.validate_and_transform(row, team_id, now) {
                    Ok(record) => records.push(record),
                    Err(rejection) => {
                        debug!("Row {} rejected: {:?}", rejection.row_number, rejection.messages);
                        errors.push(rejection.into_validation_error());
                    }
                }
                (records, errors)
            },
        )
    }

    fn text(&self, row: &RawRow, field: &str) -> Option<String> {
        self.sanitizer
            .sanitize_optional(row.text(field).as_deref(), self.limits.text_limit(field))
    }

    fn number(&self, row: &RawRow, field: &str) -> f64 {
        row.text(field)
            .and_then(|value| parse_number(&value))
            .unwrap_or(0.0)
    }

    fn flag(&self, row: &RawRow, field: &str) -> bool {
        row.text(field).is_some_and(|value| parse_boolean(&value))
    }

    fn date(&self, row: &RawRow, field: &str) -> Option<NaiveDate> {
        dates::resolve_date(row.cell(field))
    }
}

/// Fill the advisor account links; unmatched emails leave the link unset
pub async fn link_advisors(records: &mut [OperationRecord], resolver: &dyn AdvisorResolver) {
    for record in records.iter_mut() {
        if let Some(email) = record.advisor_email() {
            record.user_uid = resolver.resolve(email).await;
        }
        if let Some(email) = record.additional_advisor_email() {
            record.user_uid_adicional = resolver.resolve(email).await;
        }
    }
}
