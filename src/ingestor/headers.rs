//! Header label normalization
//!
//! Spreadsheet authors label columns however they like: `Fecha de Reserva*`,
//! `Dirección`, `% Punta Vendedora`. [`HeaderNormalizer`] folds each label into
//! a canonical field key and maps known synonyms through a [`SynonymTable`].

use std::collections::HashMap;

use crate::utils::text::fold_diacritics;

/// Glyph templates append to mandatory column labels
pub const REQUIRED_MARKER: char = '*';

/// Canonical keys every import file must provide
pub const REQUIRED_COLUMNS: &[&str] = &[
    "fecha_reserva",
    "direccion_reserva",
    "tipo_operacion",
    "valor_reserva",
    "estado",
];

const BUILTIN_SYNONYMS: &[(&str, &str)] = &[
    ("fecha_de_reserva", "fecha_reserva"),
    ("fecha_de_captacion", "fecha_captacion"),
    ("fecha_de_captacion_/_publicacion", "fecha_captacion"),
    ("fecha_captacion_/_publicacion", "fecha_captacion"),
    ("fecha_de_cierre", "fecha_operacion"),
    ("tipo_de_operacion", "tipo_operacion"),
    ("tipo_de_inmueble", "tipo_inmueble"),
    ("direccion", "direccion_reserva"),
    ("direccion_de_la_operacion", "direccion_reserva"),
    ("valor_de_reserva", "valor_reserva"),
    ("valor_de_la_reserva", "valor_reserva"),
    ("%_punta_compradora", "porcentaje_punta_compradora"),
    ("%_punta_vendedora", "porcentaje_punta_vendedora"),
    ("localidad", "localidad_reserva"),
    ("provincia", "provincia_reserva"),
    ("numero_de_casa", "numero_casa"),
    ("nro_casa", "numero_casa"),
    ("%_honorarios_broker", "porcentaje_honorarios_broker"),
    ("nro_sobre_reserva", "numero_sobre_reserva"),
    ("nro_sobre_refuerzo", "numero_sobre_refuerzo"),
    ("%_compartido", "porcentaje_compartido"),
    ("%_referido", "porcentaje_referido"),
    ("asesor", "realizador_venta"),
    ("asesor_(email)", "realizador_venta"),
    ("email_asesor", "realizador_venta"),
    ("realizador_de_venta", "realizador_venta"),
    ("%_honorarios_asesor", "porcentaje_honorarios_asesor"),
    ("asesor_adicional", "realizador_venta_adicional"),
    ("asesor_adicional_(email)", "realizador_venta_adicional"),
    ("email_asesor_adicional", "realizador_venta_adicional"),
    ("realizador_de_venta_adicional", "realizador_venta_adicional"),
    ("%_honorarios_asesor_adicional", "porcentaje_honorarios_asesor_adicional"),
    ("notas", "observaciones"),
    ("gastos_de_operacion", "gastos_operacion"),
    ("la_captacion_no_es_mia", "captacion_no_es_mia"),
];

/// Friendly or localized label -> canonical field key
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: HashMap<String, String>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self {
            entries: BUILTIN_SYNONYMS
                .iter()
                .map(|(label, key)| (label.to_string(), key.to_string()))
                .collect(),
        }
    }
}

impl SynonymTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Merge extra synonyms; both sides go through the same folding as headers
    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (label, key) in aliases {
            let key = strip_marker(&fold(key.as_ref())).to_string();
            self.entries.insert(fold(label.as_ref()), key.clone());
            self.entries.insert(strip_marker(&fold(label.as_ref())).to_string(), key);
        }
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderNormalizer {
    synonyms: SynonymTable,
}

impl HeaderNormalizer {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self { synonyms }
    }

    /// Map a raw header label to its canonical key
    ///
    /// Unknown labels come back folded but otherwise unmapped. Normalizing a
    /// canonical key returns it unchanged.
    pub fn normalize(&self, label: &str) -> String {
        let folded = fold(label);
        if let Some(key) = self.synonyms.get(&folded) {
            return key.to_string();
        }

        let stripped = strip_marker(&folded);
        match self.synonyms.get(stripped) {
            Some(key) => key.to_string(),
            None => stripped.to_string(),
        }
    }

    pub fn normalize_all<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        labels.iter().map(|label| self.normalize(label.as_ref())).collect()
    }

    /// Required canonical keys absent from `keys`, in declaration order
    pub fn missing_required<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !keys.iter().any(|key| key.as_ref() == **required))
            .map(|required| required.to_string())
            .collect()
    }
}

/// Trim, lowercase, collapse whitespace runs to `_`, fold accents
fn fold(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let underscored = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    fold_diacritics(&underscored)
}

fn strip_marker(label: &str) -> &str {
    label
        .trim_end_matches(|c: char| c == REQUIRED_MARKER || c == '_')
        .trim_start_matches('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Fecha de Reserva*", "fecha_reserva")]
    #[case("  FECHA   DE  RESERVA ", "fecha_reserva")]
    #[case("Dirección *", "direccion_reserva")]
    #[case("Tipo de Operación*", "tipo_operacion")]
    #[case("% Punta Vendedora*", "porcentaje_punta_vendedora")]
    #[case("Fecha de Captación / Publicación", "fecha_captacion")]
    #[case("Asesor (email)", "realizador_venta")]
    #[case("Estado*", "estado")]
    #[case("Número de Casa", "numero_casa")]
    #[case("Notas", "observaciones")]
    #[case("Columna Extra", "columna_extra")]
    fn test_normalizes_labels(#[case] label: &str, #[case] expected: &str) {
        let normalizer = HeaderNormalizer::default();
        assert_eq!(normalizer.normalize(label), expected);
    }

    #[test]
    fn test_canonical_keys_are_fixed_points() {
        let normalizer = HeaderNormalizer::default();
        for (_, key) in BUILTIN_SYNONYMS {
            assert_eq!(normalizer.normalize(key), *key);
        }
        for key in REQUIRED_COLUMNS {
            assert_eq!(normalizer.normalize(key), *key);
        }
    }

    #[test]
    fn test_configured_aliases_are_folded() {
        let synonyms = SynonymTable::default()
            .with_aliases([("Dirección del Inmueble", "direccion_reserva")]);
        let normalizer = HeaderNormalizer::new(synonyms);
        assert_eq!(normalizer.normalize("DIRECCION DEL INMUEBLE*"), "direccion_reserva");
        assert_eq!(normalizer.normalize("direccion"), "direccion_reserva");
    }

    #[test]
    fn test_missing_required_columns() {
        let keys = vec!["fecha_reserva".to_string(), "estado".to_string()];
        assert_eq!(
            HeaderNormalizer::missing_required(&keys),
            vec!["direccion_reserva", "tipo_operacion", "valor_reserva"]
        );
        assert!(HeaderNormalizer::missing_required(REQUIRED_COLUMNS).is_empty());
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(label in "[A-Za-zÁÉÍÓÚáéíóúñÑ%*_ ()/]{0,24}") {
            let normalizer = HeaderNormalizer::default();
            let once = normalizer.normalize(&label);
            prop_assert_eq!(normalizer.normalize(&once), once);
        }
    }
}
