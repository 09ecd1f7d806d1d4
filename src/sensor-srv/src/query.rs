//! The query service translates the three questions the api can answer into record store reads.
//! An empty result is not an error here; it comes back as `Lookup::Missing` so the api can decide
//! what that means for the response.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::schema::SensorRecord;
use crate::store::RecordStore;

/// The outcome of a query that completed successfully.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
  /// The query matched something.
  Found(T),

  /// The query matched nothing.
  Missing,
}

impl<T> Lookup<Vec<T>> {
  /// Empty lists are treated as missing.
  fn from_list(items: Vec<T>) -> Self {
    if items.is_empty() {
      Lookup::Missing
    } else {
      Lookup::Found(items)
    }
  }
}

impl<T> From<Option<T>> for Lookup<T> {
  fn from(value: Option<T>) -> Self {
    value.map(Lookup::Found).unwrap_or(Lookup::Missing)
  }
}

/// Holds a handle to the record store along with the time budget for each read. Clones share the
/// same store.
#[derive(Clone)]
pub struct QueryService {
  /// The store we read from.
  store: Arc<dyn RecordStore>,

  /// Upper bound on a single store read.
  timeout: Duration,
}

impl QueryService {
  /// The constructor.
  pub fn new(store: Arc<dyn RecordStore>, timeout: Duration) -> Self {
    Self { store, timeout }
  }

  /// Awaits a store read, failing it if it runs past our timeout.
  async fn bounded<F, T>(&self, operation: &str, read: F) -> io::Result<T>
  where
    F: std::future::Future<Output = io::Result<T>>,
  {
    async_std::future::timeout(self.timeout, read)
      .await
      .map_err(|_| {
        log::warn!("{operation} exceeded {}ms", self.timeout.as_millis());
        io::Error::new(
          io::ErrorKind::TimedOut,
          format!("{operation} timed out after {}ms", self.timeout.as_millis()),
        )
      })?
  }

  /// Every distinct device name in the store.
  pub async fn device_names(&self) -> io::Result<Lookup<Vec<String>>> {
    let devices = self.bounded("device listing", self.store.distinct_devices()).await?;
    log::debug!("found {} distinct device(s)", devices.len());
    Ok(Lookup::from_list(devices))
  }

  /// All records for `device`, newest first.
  pub async fn device_records(&self, device: &str) -> io::Result<Lookup<Vec<SensorRecord>>> {
    let documents = self.bounded("device record query", self.store.find_by_device(device)).await?;
    log::debug!("found {} record(s) for device '{device}'", documents.len());

    let records = documents.into_iter().map(SensorRecord::from).collect::<Vec<SensorRecord>>();
    Ok(Lookup::from_list(records))
  }

  /// The newest record for `device`.
  pub async fn latest_record(&self, device: &str) -> io::Result<Lookup<SensorRecord>> {
    let document = self.bounded("latest record query", self.store.find_latest(device)).await?;
    Ok(document.map(SensorRecord::from).into())
  }
}
