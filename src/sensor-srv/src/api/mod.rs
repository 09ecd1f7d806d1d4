use serde::{Deserialize, Serialize};
use std::io;

/// Catch-all conversion of unhandled errors into the generic error envelope.
mod boundary;

/// The sensor record routes.
mod sensors;

mod worker;
pub use worker::Worker;

/// These configuration definitions makes it easy for the web binary to deserialize a
/// configuration file (e.g toml) and have everything ready for the server to run.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct WebConfiguration {
  /// The address to listen on.
  addr: Option<String>,

  /// Upper bound on any single store read.
  query_timeout_ms: Option<u64>,

  /// The text returned in the welcome route's `documentation` field.
  documentation: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Configuration {
  #[serde(default)]
  pub(self) web: WebConfiguration,
  #[serde(default)]
  pub(self) store: crate::config::StoreConfiguration,
  pub(self) mongo: Option<crate::config::MongoConfiguration>,
}

impl Configuration {
  /// The configured listen address, or our default.
  pub fn addr(&self) -> String {
    self
      .web
      .addr
      .clone()
      .unwrap_or_else(|| crate::constants::DEFAULT_WEB_ADDR.to_string())
  }

  /// Opens the configured record store and builds the request handling state around it. Fails if
  /// the store cannot be reached.
  pub async fn worker(self) -> io::Result<Worker> {
    let store = crate::store::open(&self.store, self.mongo.as_ref()).await?;
    let timeout = std::time::Duration::from_millis(
      self
        .web
        .query_timeout_ms
        .unwrap_or(crate::constants::DEFAULT_QUERY_TIMEOUT_MS),
    );

    let documentation = self
      .web
      .documentation
      .unwrap_or_else(|| crate::constants::DEFAULT_DOCUMENTATION.to_string());

    Ok(Worker::new(crate::query::QueryService::new(store, timeout), documentation))
  }
}

/// Every response body carries one of these in its `status` field.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum EnvelopeStatus {
  /// The request found what it asked for.
  Success,

  /// The request was fine but matched nothing.
  Info,

  /// Something went wrong.
  Error,
}

/// The envelope used for "nothing here" responses.
#[derive(Serialize, Debug)]
struct InfoEnvelope {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,

  #[allow(clippy::missing_docs_in_private_items)]
  message: String,

  /// A hint for the caller about what to try next.
  #[serde(skip_serializing_if = "Option::is_none")]
  suggestion: Option<&'static str>,
}

/// The envelope used for every failure.
#[derive(Serialize, Debug)]
struct ErrorEnvelope {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,

  #[allow(clippy::missing_docs_in_private_items)]
  message: &'static str,

  /// The underlying failure; omitted for unhandled errors so nothing internal leaks.
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

#[derive(Serialize, Debug)]
struct WelcomeResponse<'a> {
  #[allow(clippy::missing_docs_in_private_items)]
  status: EnvelopeStatus,

  #[allow(clippy::missing_docs_in_private_items)]
  message: &'static str,

  #[allow(clippy::missing_docs_in_private_items)]
  documentation: &'a str,
}

/// Serializes `body` as the json response with `status`.
fn respond<T>(status: u16, body: &T) -> tide::Result
where
  T: Serialize,
{
  tide::Body::from_json(body).map(|body| tide::Response::builder(status).body(body).build())
}

/// The 404 response for queries that matched nothing.
fn nothing_found(message: String, suggestion: Option<&'static str>) -> tide::Result {
  respond(
    404,
    &InfoEnvelope {
      status: EnvelopeStatus::Info,
      message,
      suggestion,
    },
  )
}

/// The 500 response for a failed store query. Unlike unhandled errors, the underlying message is
/// included for diagnostics.
fn query_failed(message: &'static str, error: io::Error) -> tide::Result {
  respond(
    500,
    &ErrorEnvelope {
      status: EnvelopeStatus::Error,
      message,
      error: Some(error.to_string()),
    },
  )
}

/// Route: welcome
async fn welcome(request: tide::Request<Worker>) -> tide::Result {
  log::info!("root welcome message requested");

  respond(
    200,
    &WelcomeResponse {
      status: EnvelopeStatus::Success,
      message: "Welcome to Intec Framework! Your trusted API for managing sensor data.",
      documentation: &request.state().documentation,
    },
  )
}

async fn missing(request: tide::Request<Worker>) -> tide::Result {
  log::debug!("not-found - '{}'", request.url().path());

  respond(
    404,
    &InfoEnvelope {
      status: EnvelopeStatus::Info,
      message: "Not Found".to_string(),
      suggestion: None,
    },
  )
}

pub fn new(worker: Worker) -> tide::Server<Worker> {
  let mut app = tide::with_state(worker);

  app.with(boundary::ErrorBoundary);

  app.at("/").get(welcome);
  app.at("/sensors").get(sensors::list_devices);
  app.at("/sensors/:device_name").get(sensors::device_records);
  app.at("/sensors/:device_name/latest").get(sensors::latest_record);

  app.at("/*").all(missing);

  app
}

#[cfg(test)]
mod tests {
  use super::{new, Configuration, Worker};
  use crate::query::QueryService;
  use crate::schema::SensorDocument;
  use crate::store::MemoryStore;
  use std::sync::Arc;
  use std::time::Duration;

  fn at(millis: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, millis)
      .single()
      .expect("bad date")
  }

  fn app(store: Arc<MemoryStore>) -> tide::Server<Worker> {
    new(Worker::new(
      QueryService::new(store, Duration::from_secs(1)),
      "see the docs",
    ))
  }

  /// The store described by our main scenario: two records for "A", one for "B".
  fn scenario() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    let mut older = SensorDocument::new("A", at(1_000), bson::doc! { "reading": "t1" });
    older.label = Some(bson::Bson::Int32(0));
    let mut newer = SensorDocument::new("A", at(2_000), bson::doc! { "reading": "t2" });
    newer.label = Some(bson::Bson::Int32(1));
    newer.latency = Some(bson::Bson::Double(12.5));
    newer.validation = Some("checked".to_string());
    newer.processed = Some(true);

    store.insert(older).expect("insert failed");
    store.insert(newer).expect("insert failed");
    store
      .insert(SensorDocument::new("B", at(3_000), bson::doc! { "reading": "t3" }))
      .expect("insert failed");
    store
  }

  async fn get(app: &tide::Server<Worker>, path: &str) -> (http_types::StatusCode, serde_json::Value) {
    let url = http_types::Url::parse(&format!("http://localhost{path}")).expect("bad url");
    let request = http_types::Request::new(http_types::Method::Get, url);
    let mut response: http_types::Response = app.respond(request).await.expect("request failed");
    let body = response.body_json::<serde_json::Value>().await.expect("bad json");
    (response.status(), body)
  }

  #[async_std::test]
  async fn test_welcome() {
    let (status, body) = get(&app(Arc::new(MemoryStore::default())), "/").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    assert_eq!(body["status"], "success");
    assert_eq!(body["documentation"], "see the docs");
    assert!(body["message"].is_string());
  }

  #[async_std::test]
  async fn test_list_devices() {
    let (status, body) = get(&app(scenario()), "/sensors").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Found 2 unique sensor devices.");

    let mut sensors = body["sensors"]
      .as_array()
      .expect("missing sensors")
      .iter()
      .filter_map(|value| value.as_str())
      .collect::<Vec<&str>>();
    sensors.sort_unstable();
    assert_eq!(sensors, vec!["A", "B"]);
  }

  #[async_std::test]
  async fn test_list_devices_empty_store() {
    let (status, body) = get(&app(Arc::new(MemoryStore::default())), "/sensors").await;
    assert_eq!(status, http_types::StatusCode::NotFound);
    assert_eq!(body["status"], "info");
    assert!(body["message"].is_string());
    assert!(body.get("suggestion").is_none());
  }

  #[async_std::test]
  async fn test_device_records() {
    let (status, body) = get(&app(scenario()), "/sensors/A").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 2);

    let data = body["data"].as_array().expect("missing data");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["data"]["reading"], "t2");
    assert_eq!(data[1]["data"]["reading"], "t1");
    assert!(data.iter().all(|record| record["device"] == "A"));
  }

  #[async_std::test]
  async fn test_unknown_device() {
    let application = app(scenario());

    let (status, body) = get(&application, "/sensors/C").await;
    assert_eq!(status, http_types::StatusCode::NotFound);
    assert_eq!(body["status"], "info");
    assert_eq!(body["message"], "No data found for device 'C'.");
    assert!(body["suggestion"].is_string());

    let (status, body) = get(&application, "/sensors/C/latest").await;
    assert_eq!(status, http_types::StatusCode::NotFound);
    assert_eq!(body["status"], "info");
    assert!(body["suggestion"].is_string());
  }

  #[async_std::test]
  async fn test_latest_record() {
    let (status, body) = get(&app(scenario()), "/sensors/A/latest").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    assert_eq!(body["status"], "success");
    assert_eq!(body["label"], 1);
    assert!(body["label"].is_i64());
    assert_eq!(body["latency"], 12.5);
    assert_eq!(body["validation"], "checked");
    assert_eq!(body["processed"], true);
    assert_eq!(body["date"], "1970-01-01T00:00:02.000Z");
    assert!(body.get("data").is_none());
    assert!(body.get("device").is_none());
  }

  #[async_std::test]
  async fn test_latest_record_renders_absent_fields_as_null() {
    let (status, body) = get(&app(scenario()), "/sensors/B/latest").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    for key in ["label", "latency", "validation", "processed"] {
      assert_eq!(body.get(key), Some(&serde_json::Value::Null), "{key}");
    }
  }

  #[async_std::test]
  async fn test_device_name_is_decoded() {
    let store = Arc::new(MemoryStore::default());
    store
      .insert(SensorDocument::new("living room", at(1), bson::doc! {}))
      .expect("insert failed");

    let (status, body) = get(&app(store), "/sensors/living%20room").await;
    assert_eq!(status, http_types::StatusCode::Ok);
    assert_eq!(body["count"], 1);
  }

  #[async_std::test]
  async fn test_store_failure_then_recovery() {
    let store = scenario();
    let application = app(store.clone());
    store.fail_with("connection dropped").expect("lock failed");

    for path in ["/sensors", "/sensors/A", "/sensors/A/latest"] {
      let (status, body) = get(&application, path).await;
      assert_eq!(status, http_types::StatusCode::InternalServerError, "{path}");
      assert_eq!(body["status"], "error");
      assert_eq!(body["error"], "connection dropped");
    }

    store.recover().expect("lock failed");
    let (status, _) = get(&application, "/sensors/A").await;
    assert_eq!(status, http_types::StatusCode::Ok);
  }

  #[async_std::test]
  async fn test_unknown_route() {
    let (status, body) = get(&app(scenario()), "/nope").await;
    assert_eq!(status, http_types::StatusCode::NotFound);
    assert_eq!(body["status"], "info");
  }

  #[async_std::test]
  async fn test_memory_configuration_builds_worker() {
    let config = toml::from_str::<Configuration>(
      "[web]\naddr = \"127.0.0.1:9000\"\nquery_timeout_ms = 50\n[store]\nkind = \"memory\"",
    )
    .expect("bad config");
    assert_eq!(config.addr(), "127.0.0.1:9000");

    let worker = config.worker().await.expect("worker failed");
    assert_eq!(worker.documentation, crate::constants::DEFAULT_DOCUMENTATION);
  }

  #[async_std::test]
  async fn test_mongo_configuration_requires_section() {
    let config = toml::from_str::<Configuration>("").expect("bad config");
    assert_eq!(config.addr(), crate::constants::DEFAULT_WEB_ADDR);
    assert!(config.worker().await.is_err());
  }
}
