use std::io;
use std::sync::Mutex;

use crate::schema::SensorDocument;

#[derive(Debug, Default)]
struct MemoryState {
  /// Documents in insertion order.
  documents: Vec<SensorDocument>,

  /// When set, every read fails with this message.
  failure: Option<String>,
}

/// A record store that keeps documents in a vector. Ordering matches the mongo store. Reads can be
/// made to fail on demand, which is how the api's error path gets exercised without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<MemoryState>,
}

impl MemoryStore {
  /// Stores a document, assigning an id the way mongo would when it has none. Returns the id.
  pub fn insert(&self, mut document: SensorDocument) -> io::Result<bson::oid::ObjectId> {
    let id = *document.id.get_or_insert_with(bson::oid::ObjectId::new);
    self.with_state(|state| state.documents.push(document))?;
    Ok(id)
  }

  /// Causes every subsequent read to fail with `message` until `recover` is called.
  pub fn fail_with<S>(&self, message: S) -> io::Result<()>
  where
    S: std::fmt::Display,
  {
    let message = message.to_string();
    self.with_state(|state| state.failure = Some(message))
  }

  /// Clears a failure set by `fail_with`.
  pub fn recover(&self) -> io::Result<()> {
    self.with_state(|state| state.failure = None)
  }

  fn with_state<F, T>(&self, operation: F) -> io::Result<T>
  where
    F: FnOnce(&mut MemoryState) -> T,
  {
    let mut state = self.state.lock().map_err(|error| {
      log::warn!("memory store lock poisoned - {error}");
      io::Error::new(io::ErrorKind::Other, "memory store lock poisoned")
    })?;

    Ok(operation(&mut state))
  }

  /// Runs a read, honoring any injected failure.
  fn read<F, T>(&self, operation: F) -> io::Result<T>
  where
    F: FnOnce(&[SensorDocument]) -> T,
  {
    self
      .with_state(|state| match &state.failure {
        Some(message) => Err(io::Error::new(io::ErrorKind::Other, message.clone())),
        None => Ok(operation(&state.documents)),
      })
      .and_then(|result| result)
  }

  fn newest_first(documents: &[SensorDocument], device: &str) -> Vec<SensorDocument> {
    let mut matches = documents
      .iter()
      .filter(|document| document.device == device)
      .cloned()
      .collect::<Vec<SensorDocument>>();

    matches.sort_by(SensorDocument::newest_first);
    matches
  }
}

#[async_trait::async_trait]
impl super::RecordStore for MemoryStore {
  async fn distinct_devices(&self) -> io::Result<Vec<String>> {
    self.read(|documents| {
      documents.iter().fold(Vec::new(), |mut devices, document| {
        if !devices.contains(&document.device) {
          devices.push(document.device.clone());
        }
        devices
      })
    })
  }

  async fn find_by_device(&self, device: &str) -> io::Result<Vec<SensorDocument>> {
    self.read(|documents| Self::newest_first(documents, device))
  }

  async fn find_latest(&self, device: &str) -> io::Result<Option<SensorDocument>> {
    self.read(|documents| Self::newest_first(documents, device).into_iter().next())
  }
}

#[cfg(test)]
mod tests {
  use super::MemoryStore;
  use crate::schema::SensorDocument;
  use crate::store::RecordStore;

  fn at(millis: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, millis)
      .single()
      .expect("bad date")
  }

  #[async_std::test]
  async fn test_distinct_devices_keeps_first_seen_order() {
    let store = MemoryStore::default();
    for device in ["b", "a", "b", "c", "a"] {
      store
        .insert(SensorDocument::new(device, at(0), bson::doc! {}))
        .expect("insert failed");
    }

    let devices = store.distinct_devices().await.expect("query failed");
    assert_eq!(devices, vec!["b".to_string(), "a".to_string(), "c".to_string()]);
  }

  #[async_std::test]
  async fn test_equal_dates_break_ties_by_id() {
    let store = MemoryStore::default();
    let first = store
      .insert(SensorDocument::new("a", at(5), bson::doc! { "n": 1 }))
      .expect("insert failed");
    let second = store
      .insert(SensorDocument::new("a", at(5), bson::doc! { "n": 2 }))
      .expect("insert failed");

    let documents = store.find_by_device("a").await.expect("query failed");
    let ids = documents.iter().filter_map(|document| document.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![second, first]);

    let latest = store.find_latest("a").await.expect("query failed").expect("missing");
    assert_eq!(latest.id, Some(second));
  }

  #[async_std::test]
  async fn test_injected_failure_and_recovery() {
    let store = MemoryStore::default();
    store
      .insert(SensorDocument::new("a", at(1), bson::doc! {}))
      .expect("insert failed");
    store.fail_with("connection dropped").expect("lock failed");

    let error = store.find_latest("a").await.expect_err("should have failed");
    assert_eq!(error.to_string(), "connection dropped");
    assert!(store.distinct_devices().await.is_err());

    store.recover().expect("lock failed");
    assert!(store.find_latest("a").await.expect("query failed").is_some());
  }

  #[async_std::test]
  async fn test_mixed_date_types_sort_chronologically() {
    let store = MemoryStore::default();
    let documents = [
      bson::doc! { "device": "a", "date": bson::DateTime::from_millis(1_740_832_000_000), "data": { "n": 1 } },
      bson::doc! { "device": "a", "date": "2025-03-01 12:34:56.789012", "data": { "n": 2 } },
      bson::doc! { "device": "a", "date": "2025-02-28 09:00:00", "data": { "n": 0 } },
    ];
    for raw in documents {
      store
        .insert(SensorDocument::decode(raw).expect("decode failed"))
        .expect("insert failed");
    }

    let found = store.find_by_device("a").await.expect("query failed");
    let order = found.iter().filter_map(|document| document.data.get_i32("n").ok()).collect::<Vec<_>>();
    assert_eq!(order, vec![2, 1, 0]);

    let latest = store.find_latest("a").await.expect("query failed").expect("missing");
    assert_eq!(latest.data.get_i32("n").ok(), Some(2));
  }
}
