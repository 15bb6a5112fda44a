use std::{borrow::Cow, fmt, str::FromStr};

use bigdecimal::BigDecimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use validator::{ValidateLength, ValidationError, ValidationErrors};

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";
pub const INVALID_NUMBER: &str = "A valid number is required.";

/// Records a field error with a client-facing message.
pub fn add_error(errors: &mut ValidationErrors, field: &'static str, code: &'static str, message: impl Into<Cow<'static, str>>) {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    errors.add(field, error);
}

/// Converts one JSON value into a field's Rust type, or explains why it cannot.
pub trait FieldValue: Sized {
    fn from_json(value: Value) -> Result<Self, String>;
}

/// Short JSON type name used in type-mismatch messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

impl FieldValue for String {
    fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            _ => Err("Not a valid string.".to_string()),
        }
    }
}

impl FieldValue for bool {
    fn from_json(value: Value) -> Result<Self, String> {
        const TRUE: &[&str] = &["t", "y", "yes", "true", "on", "1"];
        const FALSE: &[&str] = &["f", "n", "no", "false", "off", "0"];

        let parsed = match &value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(n) if n.as_f64() == Some(1.0) => Some(true),
            Value::Number(n) if n.as_f64() == Some(0.0) => Some(false),
            Value::String(text) => {
                let text = text.to_lowercase();
                if TRUE.contains(&text.as_str()) {
                    Some(true)
                } else if FALSE.contains(&text.as_str()) {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        };
        parsed.ok_or_else(|| "Must be a valid boolean.".to_string())
    }
}

impl FieldValue for f64 {
    fn from_json(value: Value) -> Result<Self, String> {
        let number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        number
            .filter(|n| n.is_finite())
            .ok_or_else(|| INVALID_NUMBER.to_string())
    }
}

/// Integers are row references: a number or a numeric string.
impl FieldValue for i64 {
    fn from_json(value: Value) -> Result<Self, String> {
        let id = match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        id.ok_or_else(|| {
            format!(
                "Incorrect type. Expected pk value, received {}.",
                json_kind(&value)
            )
        })
    }
}

/// One incoming body field as the client sent it.
///
/// Deserializing never fails on a wrong JSON type; the problem is kept in
/// `Invalid` and reported against the field by [`check_value`]. Use together
/// with `#[serde(default)]` so a missing key becomes `Absent`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Invalid(String),
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl<'de, T: FieldValue> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Field::Null,
            value => match T::from_json(value) {
                Ok(value) => Field::Value(value),
                Err(message) => Field::Invalid(message),
            },
        })
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(value) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<T: ValidateLength<u64>> ValidateLength<u64> for Field<T> {
    fn length(&self) -> Option<u64> {
        self.value().and_then(|value| ValidateLength::<u64>::length(value))
    }
}

/// Presence, null and type checks for a field that must hold a value.
/// Only full writes insist on presence.
pub fn check_value<T>(errors: &mut ValidationErrors, field: &'static str, value: &Field<T>, full: bool) {
    match value {
        Field::Absent if full => add_error(errors, field, "required", REQUIRED),
        Field::Null => add_error(errors, field, "null", NULL),
        Field::Invalid(message) => add_error(errors, field, "invalid", message.clone()),
        _ => {}
    }
}

/// Like [`check_value`], but `null` is an accepted value.
pub fn check_nullable<T>(errors: &mut ValidationErrors, field: &'static str, value: &Field<T>) {
    if let Field::Invalid(message) = value {
        add_error(errors, field, "invalid", message.clone());
    }
}

/// Like [`check_value`], but a supplied string must also contain something besides whitespace.
pub fn check_text(errors: &mut ValidationErrors, field: &'static str, value: &Field<String>, full: bool) {
    match value {
        Field::Value(text) if text.trim().is_empty() => add_error(errors, field, "blank", BLANK),
        _ => check_value(errors, field, value, full),
    }
}

/// Fixed-point amount. Accepts a JSON string or number and serializes as a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Price(pub BigDecimal);

impl Price {
    pub const MAX_DIGITS: i64 = 10;
    pub const DECIMAL_PLACES: i64 = 2;

    /// Canonical text form with exactly two fractional digits, as stored.
    pub fn to_storage(&self) -> String {
        self.0.with_scale(Self::DECIMAL_PLACES).to_string()
    }

    /// Returns the first digit-budget rule this amount breaks, if any.
    pub fn digit_error(&self) -> Option<String> {
        let (unscaled, scale) = self.0.as_bigint_and_exponent();
        let unscaled = unscaled.to_string();
        let len = unscaled.trim_start_matches('-').len() as i64;

        let (digits, decimals) = if scale <= 0 {
            (len - scale, 0)
        } else if scale > len {
            (scale, scale)
        } else {
            (len, scale)
        };
        let whole = digits - decimals;

        if digits > Self::MAX_DIGITS {
            Some(format!(
                "Ensure that there are no more than {} digits in total.",
                Self::MAX_DIGITS
            ))
        } else if decimals > Self::DECIMAL_PLACES {
            Some(format!(
                "Ensure that there are no more than {} decimal places.",
                Self::DECIMAL_PLACES
            ))
        } else if whole > Self::MAX_DIGITS - Self::DECIMAL_PLACES {
            Some(format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                Self::MAX_DIGITS - Self::DECIMAL_PLACES
            ))
        } else {
            None
        }
    }
}

impl FromStr for Price {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl FieldValue for Price {
    fn from_json(value: Value) -> Result<Self, String> {
        // Numbers go through their shortest textual form so 12.3 stays 12.3
        // instead of picking up binary float noise.
        let raw = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            _ => return Err(INVALID_NUMBER.to_string()),
        };
        raw.parse().map_err(|_| INVALID_NUMBER.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Price::from_json(Value::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}
