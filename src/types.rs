use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

/// Hourly slots that can be booked on any date.
pub const TIME_SLOTS: [&str; 15] = [
    "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00",
    "19:00", "20:00", "21:00", "22:00", "23:00",
];

pub const DATE_FORMAT: &str = "%d.%m.%Y";

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct Booking {
    #[serde(default)]
    #[validate(custom(function = "validate_date"))]
    pub date: String,
    #[serde(default)]
    #[validate(custom(function = "validate_time"))]
    pub time: String,
    #[serde(default)]
    #[validate(custom(function = "validate_present"))]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    #[validate(custom(function = "validate_bribe"))]
    pub bribe: String,
}

/// The (date, time) pair a booking claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub date: String,
    pub time: String,
}

impl Booking {
    pub fn new(
        date: impl Into<String>,
        time: impl Into<String>,
        name: impl Into<String>,
        bribe: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            name: name.into(),
            bribe: bribe.into(),
        }
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date: self.date.clone(),
            time: self.time.clone(),
        }
    }

    pub fn occupies(&self, date: &str, time: &str) -> bool {
        self.date == date && self.time == time
    }
}

pub const MISSING_FIELD: &str = "missing_field";
pub const INVALID_AMOUNT: &str = "invalid_amount";
pub const INVALID_DATE: &str = "invalid_date";
pub const INVALID_TIME: &str = "invalid_time";

fn validate_present(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(MISSING_FIELD));
    }
    Ok(())
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    validate_present(value)?;
    if !is_valid_date(value) {
        return Err(ValidationError::new(INVALID_DATE));
    }
    Ok(())
}

fn validate_time(value: &str) -> Result<(), ValidationError> {
    validate_present(value)?;
    if !TIME_SLOTS.contains(&value) {
        return Err(ValidationError::new(INVALID_TIME));
    }
    Ok(())
}

fn validate_bribe(value: &str) -> Result<(), ValidationError> {
    validate_present(value)?;
    match value.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(()),
        _ => Err(ValidationError::new(INVALID_AMOUNT)),
    }
}

pub fn is_valid_date(value: &str) -> bool {
    DATE_PATTERN.is_match(value) && NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

/// Forms post the amount as text, scripted clients tend to send a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
        Nothing(()),
    }

    Ok(match Amount::deserialize(deserializer)? {
        Amount::Text(text) => text,
        Amount::Number(number) => number.to_string(),
        Amount::Nothing(()) => String::new(),
    })
}
