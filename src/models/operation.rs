use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::text::fold_label;

/// Closed set of labels stored verbatim; parsing ignores case and accents
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn from_label(value: &str) -> Option<Self> {
                let wanted = fold_label(value);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| fold_label(candidate.as_str()) == wanted)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    OperationType {
        Venta => "Venta",
        Compra => "Compra",
        AlquilerTemporal => "Alquiler Temporal",
        AlquilerTradicional => "Alquiler Tradicional",
        AlquilerComercial => "Alquiler Comercial",
        FondoDeComercio => "Fondo de Comercio",
        DesarrolloInmobiliario => "Desarrollo Inmobiliario",
        Cochera => "Cochera",
        Loteamiento => "Loteamiento",
        LotesParaDesarrollos => "Lotes Para Desarrollos",
    }
}

labelled_enum! {
    OperationStatus {
        EnCurso => "En Curso",
        Cerrada => "Cerrada",
        Caida => "Caída",
    }
}

labelled_enum! {
    PropertyType {
        Casa => "Casa",
        Ph => "PH",
        Departamentos => "Departamentos",
        LocalesComerciales => "Locales Comerciales",
        Oficinas => "Oficinas",
        NavesIndustriales => "Naves Industriales",
        Terrenos => "Terrenos",
        Chacras => "Chacras",
        Otro => "Otro",
    }
}

/// A validated, sanitized operation ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub team_id: String,
    pub fecha_reserva: NaiveDate,
    pub fecha_operacion: Option<NaiveDate>,
    pub fecha_captacion: Option<NaiveDate>,
    pub direccion_reserva: String,
    pub numero_casa: Option<String>,
    pub localidad_reserva: Option<String>,
    pub provincia_reserva: Option<String>,
    pub pais: String,
    pub tipo_operacion: OperationType,
    pub tipo_inmueble: Option<PropertyType>,
    pub estado: OperationStatus,
    pub valor_reserva: f64,
    pub porcentaje_punta_compradora: f64,
    pub porcentaje_punta_vendedora: f64,
    pub punta_compradora: bool,
    pub punta_vendedora: bool,
    pub porcentaje_honorarios_broker: f64,
    pub exclusiva: bool,
    pub no_exclusiva: bool,
    pub numero_sobre_reserva: Option<String>,
    pub numero_sobre_refuerzo: Option<String>,
    pub monto_sobre_reserva: f64,
    pub monto_sobre_refuerzo: f64,
    pub referido: Option<String>,
    pub compartido: Option<String>,
    pub porcentaje_compartido: f64,
    pub porcentaje_referido: f64,
    pub realizador_venta: Option<String>,
    pub user_uid: Option<String>,
    pub porcentaje_honorarios_asesor: f64,
    pub realizador_venta_adicional: Option<String>,
    pub user_uid_adicional: Option<String>,
    pub porcentaje_honorarios_asesor_adicional: f64,
    pub observaciones: Option<String>,
    pub gastos_operacion: f64,
    pub captacion_no_es_mia: bool,
    pub imported_from_csv: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OperationRecord {
    /// Advisor value to resolve against the roster, when it is an email address
    pub fn advisor_email(&self) -> Option<&str> {
        self.realizador_venta.as_deref().filter(|v| v.contains('@'))
    }

    pub fn additional_advisor_email(&self) -> Option<&str> {
        self.realizador_venta_adicional
            .as_deref()
            .filter(|v| v.contains('@'))
    }
}
