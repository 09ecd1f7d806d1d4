//! Sensor records have two shapes: the document as the ingestion side wrote it into mongo, and
//! the record we hand back over http. The conversion between them is the only place that knows
//! about bson types.

use serde::{Deserialize, Serialize};
use std::io;

/// Every top-level field that `SensorDocument` reads itself. Anything else a writer stored is
/// carried along untouched in `SensorDocument::extra`.
const KNOWN_FIELDS: [&str; 9] = [
  "_id",
  "device",
  "date",
  "windowSize",
  "label",
  "latency",
  "validation",
  "processed",
  "data",
];

/// Naive timestamp layouts we accept for string dates; python's `str(datetime)` is the first.
const NAIVE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn from_millis(millis: i64) -> Option<chrono::DateTime<chrono::Utc>> {
  chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, millis).single()
}

/// Parses a string date. Zone-less timestamps are taken to be UTC.
fn parse_date_string(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
  chrono::DateTime::parse_from_rfc3339(text)
    .map(|date| date.with_timezone(&chrono::Utc))
    .ok()
    .or_else(|| {
      NAIVE_DATE_FORMATS
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| chrono::TimeZone::from_utc_datetime(&chrono::Utc, &naive))
    })
}

/// Writers have stored `date` as a bson datetime, as a string, and occasionally as epoch millis.
fn parse_stored_date(value: &bson::Bson) -> Option<chrono::DateTime<chrono::Utc>> {
  match value {
    bson::Bson::DateTime(date) => from_millis(date.timestamp_millis()),
    bson::Bson::String(text) => parse_date_string(text),
    bson::Bson::Int64(millis) => from_millis(*millis),
    bson::Bson::Int32(millis) => from_millis(i64::from(*millis)),
    bson::Bson::Double(millis) if millis.is_finite() => from_millis(*millis as i64),
    _ => None,
  }
}

fn deserialize_stored_date<'de, D>(deserializer: D) -> Result<chrono::DateTime<chrono::Utc>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let value = bson::Bson::deserialize(deserializer)?;
  parse_stored_date(&value)
    .ok_or_else(|| serde::de::Error::custom(format!("unrecognized record date '{value}'")))
}

/// Numbers come back as whatever bson type the writer used; integers stay integers.
fn json_number(field: &str, value: bson::Bson) -> Option<serde_json::Number> {
  match value {
    bson::Bson::Int32(number) => Some(number.into()),
    bson::Bson::Int64(number) => Some(number.into()),
    bson::Bson::Double(number) => serde_json::Number::from_f64(number),
    bson::Bson::Null => None,
    other => {
      log::warn!("ignoring non-numeric '{field}' value - {other:?}");
      None
    }
  }
}

/// The schema of the documents stored in the sensor collection. Field names match what the
/// ingestion pipeline writes, hence the camel-cased `windowSize`.
#[derive(Deserialize, Debug, Clone)]
pub struct SensorDocument {
  /// Generated by mongo on insert when the writer did not provide one.
  #[serde(rename = "_id")]
  pub id: Option<bson::oid::ObjectId>,

  /// The device this reading came from.
  pub device: String,

  /// When the reading was taken; the sort key for every query.
  #[serde(deserialize_with = "deserialize_stored_date")]
  pub date: chrono::DateTime<chrono::Utc>,

  /// The size of the sample window. Written as whatever number type the writer had on hand.
  #[serde(rename = "windowSize")]
  pub window_size: Option<f64>,

  /// Classification result; `None` until the analysis side labels the record.
  pub label: Option<bson::Bson>,

  /// Measured processing latency.
  pub latency: Option<bson::Bson>,

  /// Outlier-detection outcome, `"checked"` or `"unchecked"`.
  pub validation: Option<String>,

  /// Whether the analysis side has consumed this record.
  pub processed: Option<bool>,

  /// Free-form payload. Never inspected.
  pub data: bson::Document,

  /// Fields outside the ones above (`outlier_model`, `__v`, ...).
  #[serde(skip)]
  pub extra: bson::Document,
}

impl SensorDocument {
  /// Builds a bare document for a device; the optional fields are left empty.
  pub fn new<S>(device: S, date: chrono::DateTime<chrono::Utc>, data: bson::Document) -> Self
  where
    S: AsRef<str>,
  {
    Self {
      id: None,
      device: device.as_ref().to_string(),
      date,
      window_size: None,
      label: None,
      latency: None,
      validation: None,
      processed: None,
      data,
      extra: bson::Document::new(),
    }
  }

  /// Decodes a raw collection document, keeping any fields we do not model in `extra`.
  pub fn decode(document: bson::Document) -> io::Result<Self> {
    let extra = document
      .iter()
      .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
      .map(|(key, value)| (key.clone(), value.clone()))
      .collect::<bson::Document>();

    let mut decoded = bson::from_document::<Self>(document).map_err(|error| {
      log::warn!("unable to decode sensor document - {error}");
      io::Error::new(io::ErrorKind::Other, format!("{error}"))
    })?;

    decoded.extra = extra;
    Ok(decoded)
  }

  /// The "newest first" ordering: date descending, then id descending. Documents without an id
  /// sort last among equal dates.
  pub(crate) fn newest_first(left: &Self, right: &Self) -> std::cmp::Ordering {
    let recency = |document: &Self| (document.date, document.id.map(|id| id.bytes()));
    recency(right).cmp(&recency(left))
  }
}

/// Dates are rendered the same way javascript's `toISOString` does, which is what consumers of
/// this api have always received.
pub(crate) fn serialize_date<S>(date: &chrono::DateTime<chrono::Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
  S: serde::Serializer,
{
  serializer.serialize_str(&date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

/// A sensor record, as returned from the api.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
  #[serde(rename = "_id")]
  pub id: Option<String>,
  pub device: String,
  #[serde(serialize_with = "serialize_date")]
  pub date: chrono::DateTime<chrono::Utc>,
  pub window_size: Option<u64>,
  pub label: Option<serde_json::Number>,
  pub latency: Option<serde_json::Number>,
  pub validation: Option<String>,
  pub processed: Option<bool>,
  pub data: serde_json::Value,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<SensorDocument> for SensorRecord {
  fn from(document: SensorDocument) -> Self {
    // Only whole, positive window sizes mean anything; anything else is treated as missing.
    let window_size = document
      .window_size
      .filter(|size| size.is_finite() && *size > 0.0 && size.fract() == 0.0)
      .map(|size| size as u64);

    Self {
      id: document.id.map(|id| id.to_hex()),
      device: document.device,
      date: document.date,
      window_size,
      label: document.label.and_then(|label| json_number("label", label)),
      latency: document.latency.and_then(|latency| json_number("latency", latency)),
      validation: document.validation,
      processed: document.processed,
      data: bson::Bson::Document(document.data).into_relaxed_extjson(),
      extra: document
        .extra
        .into_iter()
        .map(|(key, value)| (key, value.into_relaxed_extjson()))
        .collect(),
    }
  }
}
