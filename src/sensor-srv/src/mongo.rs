use std::io::{Error, ErrorKind, Result};

/// Takes our mongo configuration as an input, and produces the mongo client provided by the
/// `mongodb` crate. The client is lazy; nothing is sent over the wire until it is used.
pub async fn connect_mongo(config: &crate::config::MongoConfiguration) -> Result<mongodb::Client> {
  let mongo_options = mongodb::options::ClientOptions::parse(&config.url)
    .await
    .map_err(|error| Error::new(ErrorKind::Other, format!("failed mongodb connection - {error}")))?;

  mongodb::Client::with_options(mongo_options)
    .map_err(|error| Error::new(ErrorKind::Other, format!("failed mongodb connection - {error}")))
}

/// Sends a `ping` to the server. Used at startup so a bad url or unreachable host stops the
/// process instead of surfacing on the first request.
pub async fn ping(client: &mongodb::Client) -> Result<()> {
  client
    .database("admin")
    .run_command(bson::doc! { "ping": 1 }, None)
    .await
    .map(|_| ())
    .map_err(|error| {
      log::warn!("mongodb ping failed - {error}");
      Error::new(ErrorKind::Other, format!("failed mongodb ping - {error}"))
    })
}
