use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;

#[cfg(feature = "ts_export")]
use ts_rs::TS;

pub mod utils;

use utils::{add_error, check_nullable, check_text, check_value, Field, Price};

// --- Records, as served by the API ---

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct Usuario {
    pub id: i64,
    pub nome: String,
    pub telefone: String,
    pub data_cadastro: DateTime<Utc>,
}

impl fmt::Display for Usuario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nome)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct Motorista {
    pub id: i64,
    pub nome: String,
    pub cnh: String,
    pub placa: String,
    pub ativo: bool,
}

impl fmt::Display for Motorista {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nome)
    }
}

/// A ride as read back from the API. `usuario` and `motorista` carry the
/// display names of the referenced rows, not their ids.
#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct Corrida {
    pub id: i64,
    pub usuario: String,
    pub motorista: Option<String>,
    pub origem: String,
    pub destino: String,
    pub distancia: f64,
    /// Two-decimal string, e.g. `"25.00"`.
    pub preco: String,
    pub status: String,
    pub data_pedido: DateTime<Utc>,
}

impl fmt::Display for Corrida {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.usuario, self.destino)
    }
}

// --- Write payloads ---

/// Whether a write must carry every required field (create, PUT) or only
/// the ones it changes (PATCH).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

/// Field rules for an incoming body: the `validator` derive covers lengths,
/// `check_fields` adds presence and format rules the derive cannot express.
pub trait FieldRules: Validate {
    fn check_fields(&self, mode: WriteMode, errors: &mut ValidationErrors);

    fn clean(&self, mode: WriteMode) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        self.check_fields(mode, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct UsuarioPayload {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub nome: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 15, message = "Ensure this field has no more than 15 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub telefone: Field<String>,
}

impl FieldRules for UsuarioPayload {
    fn check_fields(&self, mode: WriteMode, errors: &mut ValidationErrors) {
        let full = mode == WriteMode::Full;
        check_text(errors, "nome", &self.nome, full);
        check_text(errors, "telefone", &self.telefone, full);
    }
}

#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct MotoristaPayload {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub nome: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub cnh: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 10, message = "Ensure this field has no more than 10 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub placa: Field<String>,
    /// Defaults to `true` on create.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<bool>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<bool>"))]
    pub ativo: Field<bool>,
}

impl FieldRules for MotoristaPayload {
    fn check_fields(&self, mode: WriteMode, errors: &mut ValidationErrors) {
        let full = mode == WriteMode::Full;
        check_text(errors, "nome", &self.nome, full);
        check_text(errors, "cnh", &self.cnh, full);
        check_text(errors, "placa", &self.placa, full);
        check_value(errors, "ativo", &self.ativo, false);
    }
}

/// Ride body. References are written as raw ids; `motorista: null` clears
/// the driver while an absent `motorista` leaves it untouched.
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct CorridaPayload {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<i64>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<i64>"))]
    pub usuario: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<i64>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<i64>"))]
    pub motorista: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub origem: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub destino: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<f64>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<f64>"))]
    pub distancia: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub preco: Field<Price>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "ts_export", ts(as = "Option<String>"))]
    pub status: Field<String>,
}

impl FieldRules for CorridaPayload {
    fn check_fields(&self, mode: WriteMode, errors: &mut ValidationErrors) {
        let full = mode == WriteMode::Full;
        check_value(errors, "usuario", &self.usuario, full);
        check_nullable(errors, "motorista", &self.motorista);
        check_text(errors, "origem", &self.origem, full);
        check_text(errors, "destino", &self.destino, full);
        check_value(errors, "distancia", &self.distancia, false);
        check_value(errors, "preco", &self.preco, full);
        check_text(errors, "status", &self.status, false);
        if let Some(message) = self.preco.value().and_then(Price::digit_error) {
            add_error(errors, "preco", "max_digits", message);
        }
    }
}

// --- Auth ---

/// Login body for `POST /api/token/`.
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = String)]
    #[cfg_attr(feature = "ts_export", ts(as = "String"))]
    pub username: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = String)]
    #[cfg_attr(feature = "ts_export", ts(as = "String"))]
    pub password: Field<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Field::Value(username.into()),
            password: Field::Value(password.into()),
        }
    }
}

impl FieldRules for Credentials {
    fn check_fields(&self, _mode: WriteMode, errors: &mut ValidationErrors) {
        check_text(errors, "username", &self.username, true);
        check_text(errors, "password", &self.password, true);
    }
}

/// Account creation body for `POST /api/register/`.
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct Registration {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    #[schema(value_type = String)]
    #[cfg_attr(feature = "ts_export", ts(as = "String"))]
    pub username: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    #[schema(value_type = String)]
    #[cfg_attr(feature = "ts_export", ts(as = "String"))]
    pub password: Field<String>,
}

impl FieldRules for Registration {
    fn check_fields(&self, _mode: WriteMode, errors: &mut ValidationErrors) {
        check_text(errors, "username", &self.username, true);
        check_text(errors, "password", &self.password, true);
    }
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct Account {
    pub id: i64,
    pub username: String,
}

#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate, ToSchema)]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    #[schema(value_type = String)]
    #[cfg_attr(feature = "ts_export", ts(as = "String"))]
    pub refresh: Field<String>,
}

impl FieldRules for RefreshRequest {
    fn check_fields(&self, _mode: WriteMode, errors: &mut ValidationErrors) {
        check_text(errors, "refresh", &self.refresh, true);
    }
}

#[cfg_attr(feature = "ts_export", derive(TS))]
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct AccessToken {
    pub access: String,
}
