/// The state shared by every request handler. Cloned per request by tide; the query service inside
/// holds the only shared resource (the store handle).
#[derive(Clone)]
pub struct Worker {
  /// Reads sensor records.
  pub(super) queries: crate::query::QueryService,

  /// Sent back from the welcome route.
  pub(super) documentation: String,
}

impl Worker {
  /// Builds a worker around an existing query service. The binary goes through
  /// `Configuration::worker`; tests use this directly.
  pub fn new<S>(queries: crate::query::QueryService, documentation: S) -> Self
  where
    S: std::fmt::Display,
  {
    Self {
      queries,
      documentation: documentation.to_string(),
    }
  }

  pub(super) fn queries(&self) -> &crate::query::QueryService {
    &self.queries
  }
}
