//! Value normalization
//!
//! Turns a raw field value plus its declared kind into a canonical JSON
//! value. Equality of normalized values is what decides whether a field
//! changed, so every rendering here must be deterministic: timestamps in
//! UTC with a fixed format, relations by key, documents with sorted keys.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::{TrackError, TrackResult};
use crate::models::{FieldKind, FieldMeta, FieldValue};

/// Formats used to render temporal values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// strftime format for timestamps, always rendered in UTC
    pub datetime_format: String,
    pub date_format: String,
    pub time_format: String,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            datetime_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M:%S%.f".to_string(),
        }
    }
}

/// Converts raw values into their comparable form
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizerOptions,
}

impl Normalizer {
    pub fn new(options: NormalizerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    /// Normalize a value for the given field
    pub fn normalize(&self, value: &FieldValue, field: &FieldMeta) -> TrackResult<Value> {
        self.normalize_kind(value, &field.kind, field)
    }

    fn normalize_kind(
        &self,
        value: &FieldValue,
        kind: &FieldKind,
        field: &FieldMeta,
    ) -> TrackResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match kind {
            FieldKind::Text => Ok(Value::String(text_of(value)?)),
            FieldKind::Integer => self.integer(value),
            FieldKind::Float => float(value),
            FieldKind::Boolean => boolean(value),
            FieldKind::Date => self.date(value),
            FieldKind::DateTime => self.datetime(value),
            FieldKind::Time => self.time(value),
            FieldKind::Uuid => uuid(value),
            FieldKind::Choice => {
                let code = scalar(value)?;
                Ok(field
                    .choice_label(&code)
                    .map(|label| Value::String(label.to_string()))
                    .unwrap_or(code))
            }
            FieldKind::Relation => relation(value),
            FieldKind::Json => json(value),
            FieldKind::List(inner) => match value {
                FieldValue::List(items) => items
                    .iter()
                    .map(|item| self.normalize_kind(item, inner, field))
                    .collect::<TrackResult<Vec<_>>>()
                    .map(Value::Array),
                FieldValue::Json(Value::Array(items)) => Ok(canonical(&Value::Array(items.clone()))),
                other => Err(mismatch(other, kind)),
            },
        }
    }

    fn integer(&self, value: &FieldValue) -> TrackResult<Value> {
        match value {
            FieldValue::Int(i) => Ok(Value::from(*i)),
            FieldValue::Float(f)
                if f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f) =>
            {
                Ok(Value::from(*f as i64))
            }
            // Whole but outside i64: keep the exact float rather than saturating
            FieldValue::Float(f) if f.fract() == 0.0 => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| mismatch(value, &FieldKind::Integer)),
            FieldValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch(value, &FieldKind::Integer)),
            other => Err(mismatch(other, &FieldKind::Integer)),
        }
    }

    fn date(&self, value: &FieldValue) -> TrackResult<Value> {
        let date = match value {
            FieldValue::Date(d) => *d,
            FieldValue::DateTime(dt) => dt.with_timezone(&Utc).date_naive(),
            FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| mismatch(value, &FieldKind::Date))?,
            other => return Err(mismatch(other, &FieldKind::Date)),
        };
        Ok(Value::String(
            date.format(&self.options.date_format).to_string(),
        ))
    }

    fn datetime(&self, value: &FieldValue) -> TrackResult<Value> {
        let utc: DateTime<Utc> = match value {
            FieldValue::DateTime(dt) => dt.with_timezone(&Utc),
            FieldValue::Date(d) => Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)),
            FieldValue::Int(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| mismatch(value, &FieldKind::DateTime))?,
            FieldValue::Text(s) => parse_datetime(s).ok_or_else(|| mismatch(value, &FieldKind::DateTime))?,
            other => return Err(mismatch(other, &FieldKind::DateTime)),
        };
        Ok(Value::String(
            utc.format(&self.options.datetime_format).to_string(),
        ))
    }

    fn time(&self, value: &FieldValue) -> TrackResult<Value> {
        let time = match value {
            FieldValue::Time(t) => *t,
            FieldValue::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
                .map_err(|_| mismatch(value, &FieldKind::Time))?,
            other => return Err(mismatch(other, &FieldKind::Time)),
        };
        Ok(Value::String(
            time.format(&self.options.time_format).to_string(),
        ))
    }
}

/// Rebuild a JSON value with object keys in sorted order at every level
pub fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonical(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// The stored value in plain JSON form, without interpreting it by field
/// kind. `None` when the value has no JSON form, such as a NaN float.
pub fn raw_json(value: &FieldValue) -> Option<Value> {
    Some(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(f) => Value::Number(Number::from_f64(*f)?),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Date(d) => Value::String(d.to_string()),
        FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        FieldValue::Time(t) => Value::String(t.to_string()),
        FieldValue::Uuid(u) => Value::String(u.to_string()),
        FieldValue::Json(v) => canonical(v),
        FieldValue::Related(r) => Value::String(r.pk.clone()),
        FieldValue::List(items) => Value::Array(
            items
                .iter()
                .map(raw_json)
                .collect::<Option<Vec<_>>>()?,
        ),
    })
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn text_of(value: &FieldValue) -> TrackResult<String> {
    Ok(match value {
        FieldValue::Null => String::new(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Date(d) => d.to_string(),
        FieldValue::DateTime(dt) => dt.to_rfc3339(),
        FieldValue::Time(t) => t.to_string(),
        FieldValue::Uuid(u) => u.to_string(),
        FieldValue::Json(v) => canonical(v).to_string(),
        FieldValue::Related(r) => r.pk.clone(),
        FieldValue::List(_) => return Err(mismatch(value, &FieldKind::Text)),
    })
}

fn float(value: &FieldValue) -> TrackResult<Value> {
    let f = match value {
        FieldValue::Float(f) => *f,
        FieldValue::Int(i) => *i as f64,
        FieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(value, &FieldKind::Float))?,
        other => return Err(mismatch(other, &FieldKind::Float)),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| mismatch(value, &FieldKind::Float))
}

fn boolean(value: &FieldValue) -> TrackResult<Value> {
    match value {
        FieldValue::Bool(b) => Ok(Value::Bool(*b)),
        FieldValue::Int(0) => Ok(Value::Bool(false)),
        FieldValue::Int(1) => Ok(Value::Bool(true)),
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch(value, &FieldKind::Boolean)),
        },
        other => Err(mismatch(other, &FieldKind::Boolean)),
    }
}

fn uuid(value: &FieldValue) -> TrackResult<Value> {
    match value {
        FieldValue::Uuid(u) => Ok(Value::String(u.hyphenated().to_string())),
        FieldValue::Text(s) => Uuid::parse_str(s.trim())
            .map(|u| Value::String(u.hyphenated().to_string()))
            .map_err(|_| mismatch(value, &FieldKind::Uuid)),
        other => Err(mismatch(other, &FieldKind::Uuid)),
    }
}

/// Foreign keys compare by the related key, never by the loaded object
fn relation(value: &FieldValue) -> TrackResult<Value> {
    match value {
        FieldValue::Related(record) => Ok(Value::String(record.pk.clone())),
        FieldValue::Int(i) => Ok(Value::String(i.to_string())),
        FieldValue::Text(s) => Ok(Value::String(s.clone())),
        FieldValue::Uuid(u) => Ok(Value::String(u.to_string())),
        other => Err(mismatch(other, &FieldKind::Relation)),
    }
}

fn json(value: &FieldValue) -> TrackResult<Value> {
    match value {
        FieldValue::Json(v) => Ok(canonical(v)),
        // A string that is not a document is kept as a JSON string
        FieldValue::Text(s) => Ok(serde_json::from_str::<Value>(s)
            .map(|v| canonical(&v))
            .unwrap_or_else(|_| Value::String(s.clone()))),
        FieldValue::List(items) => items
            .iter()
            .map(json)
            .collect::<TrackResult<Vec<_>>>()
            .map(Value::Array),
        other => scalar(other),
    }
}

/// Plain JSON rendering of a scalar, used for choice codes
fn scalar(value: &FieldValue) -> TrackResult<Value> {
    match value {
        FieldValue::Null => Ok(Value::Null),
        FieldValue::Bool(b) => Ok(Value::Bool(*b)),
        FieldValue::Int(i) => Ok(Value::from(*i)),
        FieldValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| mismatch(value, &FieldKind::Float)),
        FieldValue::Text(s) => Ok(Value::String(s.clone())),
        FieldValue::Uuid(u) => Ok(Value::String(u.to_string())),
        FieldValue::Related(r) => Ok(Value::String(r.pk.clone())),
        other => Err(mismatch(other, &FieldKind::Choice)),
    }
}

fn mismatch(value: &FieldValue, kind: &FieldKind) -> TrackError {
    TrackError::DiffComputation(format!("cannot render {:?} as {}", value, kind))
}
