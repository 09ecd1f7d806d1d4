//! The sensor record routes. Each one runs a single query and maps the three possible outcomes
//! (found, nothing found, query failed) onto a status code and envelope.

use serde::Serialize;

use super::{nothing_found, query_failed, respond, EnvelopeStatus, Worker};
use crate::query::Lookup;
use crate::schema::SensorRecord;

/// The schema of responses from the device listing route.
#[derive(Debug, Serialize)]
struct DeviceListResponse {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,
  #[allow(clippy::missing_docs_in_private_items)]
  message: String,
  /// The distinct device names.
  sensors: Vec<String>,
}

/// The schema of responses from the per-device history route.
#[derive(Debug, Serialize)]
struct RecordListResponse {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,
  #[allow(clippy::missing_docs_in_private_items)]
  message: String,
  #[allow(clippy::missing_docs_in_private_items)]
  count: usize,
  /// Newest first.
  data: Vec<SensorRecord>,
}

/// The schema of responses from the latest-record route. Only a curated subset of the record is
/// sent; optional fields are always present, as `null` when the record has no value.
#[derive(Debug, Serialize)]
struct LatestRecordResponse {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,
  #[allow(clippy::missing_docs_in_private_items)]
  message: String,
  /// Integer labels stay integers.
  label: Option<serde_json::Number>,
  latency: Option<serde_json::Number>,
  validation: Option<String>,
  processed: Option<bool>,
  #[serde(serialize_with = "crate::schema::serialize_date")]
  date: chrono::DateTime<chrono::Utc>,
}

/// Pulls the device name out of the url, undoing any percent-encoding. The result is used as-is
/// for an equality match.
fn device_name(request: &tide::Request<Worker>) -> tide::Result<String> {
  let raw = request.param("device_name")?;

  urlencoding::decode(raw).map(|name| name.into_owned()).map_err(|error| {
    log::warn!("unable to decode device name '{raw}' - {error}");
    tide::Error::from_str(500, "bad-device-name")
  })
}

/// Route: list devices
///
/// Returns every distinct device name known to the store.
pub(super) async fn list_devices(request: tide::Request<Worker>) -> tide::Result {
  log::info!("fetching all unique sensor names");

  match request.state().queries().device_names().await {
    Ok(Lookup::Found(sensors)) => {
      log::debug!("found {} sensor device(s)", sensors.len());
      respond(
        200,
        &DeviceListResponse {
          status: EnvelopeStatus::Success,
          message: format!("Found {} unique sensor devices.", sensors.len()),
          sensors,
        },
      )
    }
    Ok(Lookup::Missing) => {
      log::warn!("no sensor devices found in the database");
      nothing_found(
        "No sensor devices found in the database. Try adding some!".to_string(),
        None,
      )
    }
    Err(error) => {
      log::error!("error fetching sensor names - {error}");
      query_failed("Oops! Something went wrong while fetching sensor names.", error)
    }
  }
}

/// Route: device records
///
/// Returns every record for the device in the url, newest first.
pub(super) async fn device_records(request: tide::Request<Worker>) -> tide::Result {
  let device = device_name(&request)?;
  log::info!("fetching data for device '{device}'");

  match request.state().queries().device_records(&device).await {
    Ok(Lookup::Found(data)) => {
      log::debug!("found {} record(s) for device '{device}'", data.len());
      respond(
        200,
        &RecordListResponse {
          status: EnvelopeStatus::Success,
          message: format!("Data retrieved for device '{device}'."),
          count: data.len(),
          data,
        },
      )
    }
    Ok(Lookup::Missing) => {
      log::warn!("no data found for device '{device}'");
      nothing_found(
        format!("No data found for device '{device}'."),
        Some("Make sure the device ID is correct or try adding new sensor data."),
      )
    }
    Err(error) => {
      log::error!("error fetching sensor data for '{device}' - {error}");
      query_failed("An error occurred while fetching sensor data.", error)
    }
  }
}

/// Route: latest record
///
/// Returns a summary of the newest record for the device in the url.
pub(super) async fn latest_record(request: tide::Request<Worker>) -> tide::Result {
  let device = device_name(&request)?;
  log::info!("fetching latest data for device '{device}'");

  match request.state().queries().latest_record(&device).await {
    Ok(Lookup::Found(record)) => {
      log::debug!("latest record for '{device}' is from {}", record.date);
      respond(
        200,
        &LatestRecordResponse {
          status: EnvelopeStatus::Success,
          message: format!("Latest sensor data for device '{device}' retrieved successfully."),
          label: record.label,
          latency: record.latency,
          validation: record.validation,
          processed: record.processed,
          date: record.date,
        },
      )
    }
    Ok(Lookup::Missing) => {
      log::warn!("no latest data found for device '{device}'");
      nothing_found(
        format!("No latest data found for device '{device}'."),
        Some("Try checking another device or ensure data is being recorded."),
      )
    }
    Err(error) => {
      log::error!("unable to fetch latest sensor data for '{device}' - {error}");
      query_failed("Unable to fetch the latest sensor data.", error)
    }
  }
}
