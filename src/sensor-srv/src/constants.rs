/// The address the web api binds to when neither the config file nor the environment set one.
pub const DEFAULT_WEB_ADDR: &str = "0.0.0.0:1010";

/// Environment variable that, when present, overrides the configured listen address.
pub const WEB_ADDR_ENV: &str = "SENSOR_WEB_ADDR";

/// How long a single store query may run before we give up on it.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;

/// Database used when the `[mongo]` section does not name one.
pub const DEFAULT_MONGO_DATABASE: &str = "edge";

/// Collection used when `[mongo.collections]` does not name one.
pub const DEFAULT_SENSOR_COLLECTION: &str = "sensors";

/// The link sent back from the welcome route.
pub const DEFAULT_DOCUMENTATION: &str = "Visit https://intec-framework-docs.com for API usage details.";
