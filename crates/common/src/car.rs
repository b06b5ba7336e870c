//! Car form schema shared with the front-end.
//!
//! `CarForm` is what a form posts: every field is raw JSON, so a value of
//! the wrong type is a field error rather than a rejected document.
//! [`validate`] coerces and checks every field and reports all failures at
//! once. Only a missing field or `null` counts as absent.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MIN_NAME_LENGTH: usize = 1;
const MAX_NAME_LENGTH: usize = 25;
const MIN_YEAR: i32 = 1960;
const PLATES_LENGTH: usize = 8;
const MIN_SELLING_PRICE: f64 = 5_000.0;
const MAX_SELLING_PRICE: f64 = 5_000_000.0;

/// Day the store opened; no sale can predate it
pub fn store_opening_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 20).unwrap_or_default()
}

/// Allowed paint colors
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Amarelo,
    Azul,
    Branco,
    Cinza,
    Dourado,
    Laranja,
    Marrom,
    Prata,
    Preto,
    Rosa,
    Roxo,
    Verde,
    Vermelho,
}

impl Color {
    pub const ALL: [Color; 13] = [
        Color::Amarelo,
        Color::Azul,
        Color::Branco,
        Color::Cinza,
        Color::Dourado,
        Color::Laranja,
        Color::Marrom,
        Color::Prata,
        Color::Preto,
        Color::Rosa,
        Color::Roxo,
        Color::Verde,
        Color::Vermelho,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Amarelo => "AMARELO",
            Color::Azul => "AZUL",
            Color::Branco => "BRANCO",
            Color::Cinza => "CINZA",
            Color::Dourado => "DOURADO",
            Color::Laranja => "LARANJA",
            Color::Marrom => "MARROM",
            Color::Prata => "PRATA",
            Color::Preto => "PRETO",
            Color::Rosa => "ROSA",
            Color::Roxo => "ROXO",
            Color::Verde => "VERDE",
            Color::Vermelho => "VERMELHO",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or(())
    }
}

/// Number coercion as a form library applies it: blank text and `false`
/// are 0, `true` is 1, anything unparsable is no number at all
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Date coercion: `YYYY-MM-DD`, RFC 3339, or epoch milliseconds
fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
            .map(|dt| dt.date_naive()),
        Value::Bool(b) => DateTime::from_timestamp_millis(i64::from(*b)).map(|dt| dt.date_naive()),
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Raw car form as posted by a client
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CarForm {
    #[serde(default)]
    pub brand: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub color: Option<Value>,
    #[serde(default)]
    pub year_manufacture: Option<Value>,
    #[serde(default)]
    pub imported: Option<Value>,
    #[serde(default)]
    pub plates: Option<Value>,
    #[serde(default)]
    pub selling_date: Option<Value>,
    #[serde(default)]
    pub selling_price: Option<Value>,
    #[serde(default)]
    pub customer_id: Option<Value>,
}

/// A car that passed every rule in [`validate`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Car {
    pub brand: String,
    pub model: String,
    pub color: Color,
    pub year_manufacture: i32,
    pub imported: bool,
    pub plates: String,
    pub selling_date: Option<NaiveDate>,
    pub selling_price: Option<f64>,
    pub customer_id: Option<i64>,
}

/// One rejected field
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every rejected field of a form
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Error)]
#[error("car form has {} invalid field(s)", .0.len())]
pub struct CarErrors(pub Vec<FieldError>);

impl CarErrors {
    /// The error reported for `field`, if any
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }
}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn reject(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }
}

/// A field that must be posted as a JSON string
fn text<'a>(
    errors: &mut Collector,
    field: &'static str,
    label: &str,
    value: Option<&'a Value>,
) -> Option<&'a str> {
    match value {
        Some(Value::String(s)) => Some(s.as_str()),
        None => {
            errors.reject(field, format!("{label} is required"));
            None
        },
        Some(_) => {
            errors.reject(field, format!("{label} must be text"));
            None
        },
    }
}

fn check_name(errors: &mut Collector, field: &'static str, label: &str, value: Option<&Value>) -> String {
    let Some(value) = text(errors, field, label, value) else {
        return String::new();
    };
    let trimmed = value.trim().to_string();
    let len = trimmed.chars().count();
    if len < MIN_NAME_LENGTH {
        errors.reject(field, format!("{label} must have at least {MIN_NAME_LENGTH} character"));
    } else if len > MAX_NAME_LENGTH {
        errors.reject(field, format!("{label} must have at most {MAX_NAME_LENGTH} characters"));
    }
    trimmed
}

/// Validate a car form against `today` (the upper bound for year and sale date)
pub fn validate(form: &CarForm, today: NaiveDate) -> Result<Car, CarErrors> {
    let mut errors = Collector::default();

    let brand = check_name(&mut errors, "brand", "Brand", form.brand.as_ref());
    let model = check_name(&mut errors, "model", "Model", form.model.as_ref());

    let color = match &form.color {
        Some(Value::String(c)) => c.parse::<Color>().ok(),
        _ => None,
    };
    if color.is_none() {
        errors.reject("color", "Invalid color");
    }

    let current_year = today.year();
    let year_manufacture = match form.year_manufacture.as_ref().and_then(coerce_number) {
        Some(year) if year.fract() != 0.0 => {
            errors.reject("year_manufacture", "Year of manufacture must be an integer");
            None
        },
        Some(year) if year < f64::from(MIN_YEAR) => {
            errors.reject("year_manufacture", format!("Year of manufacture must be at least {MIN_YEAR}"));
            None
        },
        Some(year) if year > f64::from(current_year) => {
            errors.reject(
                "year_manufacture",
                format!("Year of manufacture cannot be later than {current_year}"),
            );
            None
        },
        Some(year) => Some(year as i32),
        None => {
            errors.reject("year_manufacture", "Year of manufacture must be a number");
            None
        },
    };

    let imported = match &form.imported {
        Some(Value::Bool(b)) => Some(*b),
        _ => {
            errors.reject("imported", "Imported must be true or false");
            None
        },
    };

    // Input masks leave spaces behind when the plate is only partially typed
    let plates: String = text(&mut errors, "plates", "Plates", form.plates.as_ref())
        .map(|raw| raw.chars().filter(|c| !c.is_whitespace()).collect())
        .unwrap_or_default();
    if form.plates.as_ref().is_some_and(Value::is_string) && plates.chars().count() != PLATES_LENGTH {
        errors.reject("plates", format!("Plates must have exactly {PLATES_LENGTH} characters"));
    }

    let selling_date = match &form.selling_date {
        None => None,
        Some(raw) => match coerce_date(raw) {
            None => {
                errors.reject("selling_date", "Selling date is not a valid date");
                None
            },
            Some(date) if date < store_opening_date() => {
                errors.reject("selling_date", "Selling date cannot be earlier than 2020-03-20");
                None
            },
            Some(date) if date > today => {
                errors.reject("selling_date", "Selling date cannot be later than today");
                None
            },
            Some(date) => Some(date),
        },
    };

    let selling_price = match &form.selling_price {
        None => None,
        Some(raw) => match coerce_number(raw) {
            Some(price) if price < MIN_SELLING_PRICE => {
                errors.reject("selling_price", "Selling price must be at least 5000.00");
                None
            },
            Some(price) if price > MAX_SELLING_PRICE => {
                errors.reject("selling_price", "Selling price must be at most 5000000.00");
                None
            },
            Some(price) => Some(price),
            None => {
                errors.reject("selling_price", "Selling price must be a number");
                None
            },
        },
    };

    let customer_id = match &form.customer_id {
        None => None,
        Some(raw) => match coerce_number(raw) {
            Some(id) if id.fract() == 0.0 && id > 0.0 => Some(id as i64),
            _ => {
                errors.reject("customer_id", "Customer id must be a positive integer");
                None
            },
        },
    };

    match (color, year_manufacture, imported) {
        (Some(color), Some(year_manufacture), Some(imported)) if errors.0.is_empty() => Ok(Car {
            brand,
            model,
            color,
            year_manufacture,
            imported,
            plates,
            selling_date,
            selling_price,
            customer_id,
        }),
        _ => Err(CarErrors(errors.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn valid_form() -> CarForm {
        serde_json::from_value(json!({
            "brand": "  Volkswagen ",
            "model": "Fusca",
            "color": "AZUL",
            "year_manufacture": "1975",
            "imported": false,
            "plates": "ABC-1D23",
            "selling_date": "2023-01-15",
            "selling_price": 25000,
            "customer_id": "12"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_form_is_coerced() {
        let car = validate(&valid_form(), today()).unwrap();
        assert_eq!(car.brand, "Volkswagen");
        assert_eq!(car.color, Color::Azul);
        assert_eq!(car.year_manufacture, 1975);
        assert_eq!(car.plates, "ABC-1D23");
        assert_eq!(car.selling_date, NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(car.selling_price, Some(25000.0));
        assert_eq!(car.customer_id, Some(12));
    }

    #[test]
    fn test_optional_fields_may_be_null() {
        let mut form = valid_form();
        form.selling_date = None;
        form.selling_price = None;
        form.customer_id = None;
        let car = validate(&form, today()).unwrap();
        assert_eq!(car.selling_date, None);
        assert_eq!(car.selling_price, None);
        assert_eq!(car.customer_id, None);

        // JSON null is the same as leaving the field out
        let mut raw = serde_json::to_value(valid_form()).unwrap();
        raw["selling_price"] = Value::Null;
        let form: CarForm = serde_json::from_value(raw).unwrap();
        assert_eq!(validate(&form, today()).unwrap().selling_price, None);
    }

    #[test]
    fn test_blank_optional_fields_are_rejected() {
        let mut form = valid_form();
        form.selling_date = Some(json!(""));
        form.selling_price = Some(json!(""));
        form.customer_id = Some(json!("  "));
        let errors = validate(&form, today()).unwrap_err();
        assert_eq!(
            errors.field("selling_date").unwrap().message,
            "Selling date is not a valid date"
        );
        assert_eq!(
            errors.field("selling_price").unwrap().message,
            "Selling price must be at least 5000.00"
        );
        assert!(errors.field("customer_id").is_some());
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn test_wrong_types_are_field_errors() {
        let form: CarForm = serde_json::from_value(json!({
            "brand": 5,
            "model": ["Fusca"],
            "color": 3,
            "year_manufacture": true,
            "imported": false,
            "plates": 12345678,
            "selling_price": {"value": 6000}
        }))
        .unwrap();
        let errors = validate(&form, today()).unwrap_err();
        assert_eq!(errors.field("brand").unwrap().message, "Brand must be text");
        assert_eq!(errors.field("model").unwrap().message, "Model must be text");
        assert_eq!(errors.field("plates").unwrap().message, "Plates must be text");
        assert!(errors.field("color").is_some());
        // `true` coerces to 1
        assert_eq!(
            errors.field("year_manufacture").unwrap().message,
            "Year of manufacture must be at least 1960"
        );
        assert_eq!(
            errors.field("selling_price").unwrap().message,
            "Selling price must be a number"
        );
        assert!(errors.field("imported").is_none());
        assert_eq!(errors.0.len(), 6);
    }

    #[test]
    fn test_missing_required_fields() {
        let errors = validate(&CarForm::default(), today()).unwrap_err();
        assert_eq!(errors.field("brand").unwrap().message, "Brand is required");
        assert_eq!(errors.field("plates").unwrap().message, "Plates is required");
        assert_eq!(errors.0.len(), 6);
    }

    #[test]
    fn test_plates_ignore_mask_spaces() {
        let mut form = valid_form();
        form.plates = Some(json!("ABC-1D2 "));
        let errors = validate(&form, today()).unwrap_err();
        assert!(errors.field("plates").is_some());

        form.plates = Some(json!("AB C-1D23"));
        assert_eq!(validate(&form, today()).unwrap().plates, "ABC-1D23");
    }

    #[test]
    fn test_every_bad_field_is_reported() {
        let form: CarForm = serde_json::from_value(json!({
            "brand": "   ",
            "model": "x".repeat(26),
            "color": "FUCSIA",
            "year_manufacture": 1959,
            "imported": "yes",
            "plates": "ABC",
            "selling_date": "2020-03-19",
            "selling_price": 4999.99,
            "customer_id": -3
        }))
        .unwrap();
        let errors = validate(&form, today()).unwrap_err();
        for field in [
            "brand",
            "model",
            "color",
            "year_manufacture",
            "imported",
            "plates",
            "selling_date",
            "selling_price",
            "customer_id",
        ] {
            assert!(errors.field(field).is_some(), "missing error for {field}");
        }
    }

    #[test]
    fn test_upper_bounds_follow_today() {
        let mut form = valid_form();
        form.year_manufacture = Some(json!(2025));
        form.selling_date = Some(json!("2024-06-02"));
        form.selling_price = Some(json!(5_000_001.0));
        let errors = validate(&form, today()).unwrap_err();
        assert!(errors.field("year_manufacture").is_some());
        assert!(errors.field("selling_date").is_some());
        assert!(errors.field("selling_price").is_some());
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn test_fractional_year_is_rejected() {
        let mut form = valid_form();
        form.year_manufacture = Some(json!("1999.5"));
        let errors = validate(&form, today()).unwrap_err();
        assert_eq!(
            errors.field("year_manufacture").unwrap().message,
            "Year of manufacture must be an integer"
        );
    }

    #[test]
    fn test_rfc3339_selling_date() {
        let mut form = valid_form();
        form.selling_date = Some(json!("2022-10-05T13:00:00Z"));
        let car = validate(&form, today()).unwrap();
        assert_eq!(car.selling_date, NaiveDate::from_ymd_opt(2022, 10, 5));
    }

    #[test]
    fn test_color_round_trips_through_str() {
        for color in Color::ALL {
            assert_eq!(color.as_str().parse::<Color>(), Ok(color));
        }
        assert!("azul".parse::<Color>().is_err());
    }
}
