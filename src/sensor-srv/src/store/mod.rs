//! The record store is the only thing in this crate that talks to persistence. It exposes exactly
//! the three reads the api needs; implementations are responsible for ordering.

use std::io;
use std::sync::Arc;

use crate::schema::SensorDocument;

/// The mongo-backed store used in production.
mod mongo;
pub use mongo::MongoStore;

/// An in-process store; used by tests and for running the api without a database.
mod memory;
pub use memory::MemoryStore;

/// Read access to sensor documents.
///
/// Implementations must order documents for a device by `date` descending, breaking ties by `_id`
/// descending, in both `find_by_device` and `find_latest`.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
  /// Every distinct `device` value, in whatever order the store produces them.
  async fn distinct_devices(&self) -> io::Result<Vec<String>>;

  /// All documents for `device`, newest first.
  async fn find_by_device(&self, device: &str) -> io::Result<Vec<SensorDocument>>;

  /// The newest document for `device`, if any.
  async fn find_latest(&self, device: &str) -> io::Result<Option<SensorDocument>>;
}

/// Builds the store named by our configuration. For mongo this connects and pings the server, so
/// an unreachable database fails here rather than on the first request.
pub async fn open(
  store: &crate::config::StoreConfiguration,
  mongo: Option<&crate::config::MongoConfiguration>,
) -> io::Result<Arc<dyn RecordStore>> {
  match store.kind {
    crate::config::StoreKind::Mongo => {
      let config = mongo.ok_or_else(|| {
        log::warn!("mongo store requested without a [mongo] configuration section");
        io::Error::new(io::ErrorKind::Other, "missing-mongo-config")
      })?;

      let client = crate::mongo::connect_mongo(config).await?;
      crate::mongo::ping(&client).await?;
      log::info!(
        "connected to mongo, reading from '{}.{}'",
        config.database,
        config.collections.sensors
      );

      Ok(Arc::new(MongoStore::new(&client, config)))
    }
    crate::config::StoreKind::Memory => {
      log::warn!("using an empty in-memory record store");
      Ok(Arc::new(MemoryStore::default()))
    }
  }
}
