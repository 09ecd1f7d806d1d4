use std::io::{Error, ErrorKind, Result};

use crate::schema::SensorDocument;

/// The bson types writers have used for `date`. Mongo orders values of different types by type
/// before value, so a single sorted query cannot find the newest record across them.
const DATE_TYPES: [&str; 3] = ["date", "string", "number"];

/// Sort applied to every per-device read: newest first, newest insert first among equal dates.
fn newest_first() -> bson::Document {
  bson::doc! { "date": -1, "_id": -1 }
}

/// A record store backed by a single mongo collection.
pub struct MongoStore {
  /// The sensor collection, read as raw documents so fields we do not model survive decoding. The
  /// underlying client is pooled, so this is shared across requests.
  collection: mongodb::Collection<bson::Document>,
}

impl MongoStore {
  /// Binds to the configured database + collection on an existing client.
  pub fn new(client: &mongodb::Client, config: &crate::config::MongoConfiguration) -> Self {
    let collection = client
      .database(&config.database)
      .collection::<bson::Document>(&config.collections.sensors);

    Self { collection }
  }
}

#[async_trait::async_trait]
impl super::RecordStore for MongoStore {
  async fn distinct_devices(&self) -> Result<Vec<String>> {
    let values = self.collection.distinct("device", None, None).await.map_err(|error| {
      log::warn!("failed mongo distinct - {error}");
      Error::new(ErrorKind::Other, format!("{error}"))
    })?;

    Ok(
      values
        .into_iter()
        .filter_map(|value| match value {
          bson::Bson::String(device) => Some(device),
          other => {
            log::warn!("skipping non-string device value - {other:?}");
            None
          }
        })
        .collect(),
    )
  }

  async fn find_by_device(&self, device: &str) -> Result<Vec<SensorDocument>> {
    let options = mongodb::options::FindOptions::builder().sort(newest_first()).build();
    let mut cursor = self
      .collection
      .find(bson::doc! { "device": device }, options)
      .await
      .map_err(|error| {
        log::warn!("failed mongo query - {error}");
        Error::new(ErrorKind::Other, format!("{error}"))
      })?;

    let mut documents = Vec::new();

    while cursor.advance().await.map_err(|error| {
      log::warn!("unable to advance cursor - {error}");
      Error::new(ErrorKind::Other, format!("{error}"))
    })? {
      let raw = cursor.deserialize_current().map_err(|error| {
        log::warn!("unable to read sensor document for '{device}' - {error}");
        Error::new(ErrorKind::Other, format!("{error}"))
      })?;
      documents.push(SensorDocument::decode(raw)?);
    }

    // The server sort only holds within one bson type of `date`; this puts mixed collections in
    // true chronological order. Stable, so single-type results keep the server's order.
    documents.sort_by(SensorDocument::newest_first);

    Ok(documents)
  }

  async fn find_latest(&self, device: &str) -> Result<Option<SensorDocument>> {
    let mut newest: Option<SensorDocument> = None;

    for kind in DATE_TYPES {
      let options = mongodb::options::FindOneOptions::builder().sort(newest_first()).build();
      let candidate = self
        .collection
        .find_one(bson::doc! { "device": device, "date": { "$type": kind } }, options)
        .await
        .map_err(|error| {
          log::warn!("failed mongo find_one - {error}");
          Error::new(ErrorKind::Other, format!("{error}"))
        })?
        .map(SensorDocument::decode)
        .transpose()?;

      newest = match (newest, candidate) {
        (Some(current), Some(candidate))
          if SensorDocument::newest_first(&candidate, &current) == std::cmp::Ordering::Less =>
        {
          Some(candidate)
        }
        (None, candidate) => candidate,
        (current, _) => current,
      };
    }

    Ok(newest)
  }
}
