use clap::Parser;
use std::io::{Error, ErrorKind, Result};

/// Serves the sensor read api.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CommandLineArguments {
  /// Path to the toml configuration file.
  #[arg(short = 'c', long, default_value = "sensor-web.toml")]
  config: String,
}

async fn run(args: CommandLineArguments) -> Result<()> {
  let contents = async_std::fs::read_to_string(&args.config).await.map_err(|error| {
    log::error!("unable to read config file '{}' - {error}", args.config);
    error
  })?;

  let config = toml::from_str::<sensors::api::Configuration>(&contents).map_err(|error| {
    log::warn!("invalid toml config file - {error}");
    Error::new(ErrorKind::Other, "bad-config")
  })?;

  let addr = std::env::var(sensors::constants::WEB_ADDR_ENV)
    .ok()
    .unwrap_or_else(|| config.addr());

  // The store is opened (and pinged) before we bind; a database we cannot reach is fatal.
  let worker = config.worker().await.map_err(|error| {
    log::error!("unable to open record store - {error}");
    error
  })?;

  log::info!("sensor api listening on '{addr}'");
  sensors::api::new(worker).listen(addr).await
}

fn main() -> Result<()> {
  let load_env = std::fs::metadata(".env").map(|meta| meta.is_file()).unwrap_or(false);

  if load_env {
    let env_result = dotenv::dotenv();
    println!(".env loaded? {:?}", env_result.is_ok());
  }

  env_logger::init();

  // Handler panics are caught by the api's error boundary and answered with a 500; any other panic
  // unwinds out of `main` and the process exits non-zero.
  std::panic::set_hook(Box::new(|info| {
    log::error!("panic - {info}");
  }));

  log::info!("environment + logger ready.");
  let args = CommandLineArguments::parse();
  async_std::task::block_on(run(args))
}
