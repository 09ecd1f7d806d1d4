use serde::Deserialize;

fn default_database() -> String {
  crate::constants::DEFAULT_MONGO_DATABASE.to_string()
}

fn default_sensor_collection() -> String {
  crate::constants::DEFAULT_SENSOR_COLLECTION.to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct MongoCollectionsConfiguration {
  #[serde(default = "default_sensor_collection")]
  pub(crate) sensors: String,
}

impl Default for MongoCollectionsConfiguration {
  fn default() -> Self {
    Self {
      sensors: default_sensor_collection(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MongoConfiguration {
  pub(crate) url: String,
  #[serde(default = "default_database")]
  pub(crate) database: String,
  #[serde(default)]
  pub(crate) collections: MongoCollectionsConfiguration,
}

/// Which backing store the query service should read from.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
  /// Sensor records live in a mongodb collection; requires a `[mongo]` section.
  #[default]
  Mongo,

  /// An empty, in-process store. Only useful for local development of the api itself.
  Memory,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StoreConfiguration {
  #[serde(default)]
  pub(crate) kind: StoreKind,
}

#[cfg(test)]
mod tests {
  use super::{MongoConfiguration, StoreConfiguration, StoreKind};

  #[test]
  fn test_mongo_defaults() {
    let config = toml::from_str::<MongoConfiguration>("url = \"mongodb://localhost:27017\"").expect("bad config");
    assert_eq!(config.database, "edge");
    assert_eq!(config.collections.sensors, "sensors");
  }

  #[test]
  fn test_mongo_overrides() {
    let config = toml::from_str::<MongoConfiguration>(
      "url = \"mongodb://db\"\ndatabase = \"lab\"\n[collections]\nsensors = \"readings\"",
    )
    .expect("bad config");
    assert_eq!(config.database, "lab");
    assert_eq!(config.collections.sensors, "readings");
  }

  #[test]
  fn test_store_kind() {
    let config = toml::from_str::<StoreConfiguration>("kind = \"memory\"").expect("bad config");
    assert_eq!(config.kind, StoreKind::Memory);
    let config = toml::from_str::<StoreConfiguration>("").expect("bad config");
    assert_eq!(config.kind, StoreKind::Mongo);
  }
}
