//! Row validation rules
//!
//! Rules are evaluated independently per row and never short-circuit, so a
//! rejected row reports every problem at once.
//!
//! ```rust
//! use realty_import::ingestor::sanitize::Sanitizer;
//! use realty_import::ingestor::validation::{ValidationRule, Validator};
//! use realty_import::models::{CellValue, RawRow};
//!
//! let validator = Validator::new(Sanitizer::new().unwrap())
//!     .rule(ValidationRule::required("direccion_reserva"))
//!     .rule(ValidationRule::max_length("direccion_reserva", 200));
//!
//! let row = RawRow::new(2).with("direccion_reserva", CellValue::text("Calle 1"));
//! assert!(validator.validate(&row).is_ok());
//! ```

use std::collections::HashMap;

use crate::ingestor::dates;
use crate::ingestor::sanitize::{looks_like_email, Sanitizer, MAX_EMAIL_LENGTH};
use crate::models::{OperationStatus, OperationType, PropertyType, RawRow};

/// Numeric columns and their per-field ceiling
const NUMERIC_MAXIMA: &[(&str, f64)] = &[
    ("valor_reserva", 1e12),
    ("porcentaje_punta_compradora", 100.0),
    ("porcentaje_punta_vendedora", 100.0),
    ("porcentaje_honorarios_broker", 100.0),
    ("porcentaje_honorarios_asesor", 100.0),
    ("porcentaje_honorarios_asesor_adicional", 100.0),
    ("porcentaje_compartido", 100.0),
    ("porcentaje_referido", 100.0),
    ("monto_sobre_reserva", 1e9),
    ("monto_sobre_refuerzo", 1e9),
    ("gastos_operacion", 1e9),
];

/// Free-text columns with a ceiling tighter than the global one
const TEXT_LIMITS: &[(&str, usize)] = &[
    ("direccion_reserva", 200),
    ("referido", 100),
    ("compartido", 100),
    ("numero_casa", 50),
    ("localidad_reserva", 100),
    ("provincia_reserva", 100),
    ("pais", 100),
    ("numero_sobre_reserva", 50),
    ("numero_sobre_refuerzo", 50),
    ("tipo_inmueble", 50),
    ("realizador_venta", MAX_EMAIL_LENGTH),
    ("realizador_venta_adicional", MAX_EMAIL_LENGTH),
];

/// Length and magnitude ceilings per field
#[derive(Debug, Clone)]
pub struct FieldLimits {
    max_string_length: usize,
    text: HashMap<&'static str, usize>,
    numeric: HashMap<&'static str, f64>,
}

impl FieldLimits {
    pub fn new(max_string_length: usize) -> Self {
        Self {
            max_string_length,
            text: TEXT_LIMITS
                .iter()
                .map(|(field, max)| (*field, (*max).min(max_string_length)))
                .collect(),
            numeric: NUMERIC_MAXIMA.iter().copied().collect(),
        }
    }

    pub fn text_limit(&self, field: &str) -> usize {
        self.text
            .get(field)
            .copied()
            .unwrap_or(self.max_string_length)
    }

    pub fn numeric_max(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        NUMERIC_MAXIMA.iter().map(|(field, _)| *field)
    }
}

/// A validation rule that can be applied to a row
#[derive(Debug, Clone)]
pub enum ValidationRule {
    /// Field must be present and non-blank
    Required(String),

    /// Field is required unless the operation type is `exempt`
    RequiredUnlessOperation { field: String, exempt: OperationType },

    /// Field, when present, must resolve to a calendar date
    Date(String),

    /// Field must be at most max characters long
    MaxLength { field: String, max: usize },

    /// Field, when present, must be accepted by the closed-set predicate
    Choice { field: String, accepts: fn(&str) -> bool },

    /// Field, when present, must be a finite number within bounds
    Number {
        field: String,
        positive: bool,
        max: Option<f64>,
    },

    /// Field that looks like an email must be a well-formed one
    Email(String),
}

impl ValidationRule {
    pub fn required<S: Into<String>>(field: S) -> Self {
        Self::Required(field.into())
    }

    pub fn required_unless<S: Into<String>>(field: S, exempt: OperationType) -> Self {
        Self::RequiredUnlessOperation {
            field: field.into(),
            exempt,
        }
    }

    pub fn date<S: Into<String>>(field: S) -> Self {
        Self::Date(field.into())
    }

    pub fn max_length<S: Into<String>>(field: S, max: usize) -> Self {
        Self::MaxLength {
            field: field.into(),
            max,
        }
    }

    pub fn choice<S: Into<String>>(field: S, accepts: fn(&str) -> bool) -> Self {
        Self::Choice {
            field: field.into(),
            accepts,
        }
    }

    pub fn non_negative<S: Into<String>>(field: S, max: Option<f64>) -> Self {
        Self::Number {
            field: field.into(),
            positive: false,
            max,
        }
    }

    pub fn positive<S: Into<String>>(field: S, max: Option<f64>) -> Self {
        Self::Number {
            field: field.into(),
            positive: true,
            max,
        }
    }

    pub fn email<S: Into<String>>(field: S) -> Self {
        Self::Email(field.into())
    }

    fn check(&self, row: &RawRow, sanitizer: &Sanitizer, errors: &mut Vec<String>) {
        match self {
            Self::Required(field) => {
                if !row.has(field) {
                    errors.push(format!("{} es requerido", field));
                }
            }
            Self::RequiredUnlessOperation { field, exempt } => {
                let operation = row
                    .text("tipo_operacion")
                    .and_then(|value| OperationType::from_label(&value));
                if !row.has(field) && operation != Some(*exempt) {
                    errors.push(format!("{} es requerido (excepto para {})", field, exempt));
                }
            }
            Self::Date(field) => {
                if row.has(field) && dates::resolve_date(row.cell(field)).is_none() {
                    errors.push(format!(
                        "{} tiene formato inválido (usar YYYY-MM-DD)",
                        field
                    ));
                }
            }
            Self::MaxLength { field, max } => {
                if let Some(value) = row.text(field) {
                    if value.chars().count() > *max {
                        errors.push(format!(
                            "{} excede la longitud máxima ({} caracteres)",
                            field, max
                        ));
                    }
                }
            }
            Self::Choice { field, accepts } => {
                if let Some(value) = row.text(field) {
                    if !accepts(&value) {
                        errors.push(format!("{} inválido: {}", field, value));
                    }
                }
            }
            Self::Number {
                field,
                positive,
                max,
            } => {
                if let Some(value) = row.text(field) {
                    match parse_number(&value) {
                        None => errors.push(format!("{} debe ser un número válido", field)),
                        Some(number) if *positive && number <= 0.0 => {
                            errors.push(format!("{} debe ser un número positivo", field))
                        }
                        Some(number) if number < 0.0 => {
                            errors.push(format!("{} no puede ser negativo", field))
                        }
                        Some(number) => {
                            if let Some(max) = max.filter(|max| number > *max) {
                                errors.push(format!(
                                    "{} excede el valor máximo permitido ({})",
                                    field, max
                                ));
                            }
                        }
                    }
                }
            }
            Self::Email(field) => {
                if let Some(value) = row.text(field) {
                    if looks_like_email(&value) && !sanitizer.is_valid_email(&value) {
                        errors.push(format!("{}: email inválido", field));
                    }
                }
            }
        }
    }
}

/// Ordered rule set evaluated against each row
#[derive(Debug, Clone)]
pub struct Validator {
    rules: Vec<ValidationRule>,
    sanitizer: Sanitizer,
}

impl Validator {
    pub fn new(sanitizer: Sanitizer) -> Self {
        Self {
            rules: Vec::new(),
            sanitizer,
        }
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules for one commission operation row
    pub fn for_operations(limits: &FieldLimits, sanitizer: Sanitizer) -> Self {
        let mut validator = Self::new(sanitizer)
            .rule(ValidationRule::required("fecha_reserva"))
            .rule(ValidationRule::date("fecha_reserva"))
            .rule(ValidationRule::required("direccion_reserva"))
            .rule(ValidationRule::max_length(
                "direccion_reserva",
                limits.text_limit("direccion_reserva"),
            ))
            .rule(ValidationRule::max_length(
                "observaciones",
                limits.text_limit("observaciones"),
            ))
            .rule(ValidationRule::max_length("referido", limits.text_limit("referido")))
            .rule(ValidationRule::max_length("compartido", limits.text_limit("compartido")))
            .rule(ValidationRule::required("tipo_operacion"))
            .rule(ValidationRule::choice("tipo_operacion", |v| {
                OperationType::from_label(v).is_some()
            }))
            .rule(ValidationRule::required("valor_reserva"))
            .rule(ValidationRule::positive(
                "valor_reserva",
                limits.numeric_max("valor_reserva"),
            ))
            .rule(ValidationRule::email("realizador_venta"))
            .rule(ValidationRule::email("realizador_venta_adicional"))
            .rule(ValidationRule::required("estado"))
            .rule(ValidationRule::choice("estado", |v| {
                OperationStatus::from_label(v).is_some()
            }))
            .rule(ValidationRule::required_unless(
                "porcentaje_punta_vendedora",
                OperationType::Compra,
            ))
            .rule(ValidationRule::choice("tipo_inmueble", |v| {
                PropertyType::from_label(v).is_some()
            }));

        for field in limits.numeric_fields().filter(|f| *f != "valor_reserva") {
            validator =
                validator.rule(ValidationRule::non_negative(field, limits.numeric_max(field)));
        }
        validator
    }

    /// Evaluate every rule; `Err` carries each message in rule order
    pub fn validate(&self, row: &RawRow) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            rule.check(row, &self.sanitizer, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Parse a human-entered number
///
/// Accepts a decimal comma, `.`/`,` thousands grouping, a leading `$` and a
/// trailing `%`. Empty input is zero; anything else unparseable or
/// non-finite is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Some(0.0);
    }

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) | (0, 1) => cleaned,
        (0, _) => cleaned.replace('.', ""),
        (1, 0) => cleaned.replace(',', "."),
        (_, 0) => cleaned.replace(',', ""),
        _ if cleaned.rfind(',') > cleaned.rfind('.') => {
            cleaned.replace('.', "").replace(',', ".")
        }
        _ => cleaned.replace(',', ""),
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a spreadsheet yes/no cell
pub fn parse_boolean(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "si" | "sí" | "1" | "yes"
    )
}
