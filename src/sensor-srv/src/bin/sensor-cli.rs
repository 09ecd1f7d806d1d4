use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::time::Duration;

/// Commands that operate on a single device share this.
#[derive(Parser, PartialEq, Debug)]
struct SingleDeviceCommand {
  /// The name of a device.
  #[arg(short = 'd', long)]
  device: String,
}

#[derive(Subcommand, Debug)]
enum CommandLineCommand {
  /// Prints every distinct device name.
  Devices,

  /// Prints the history for a device, newest first.
  Records(SingleDeviceCommand),

  /// Prints the newest record for a device.
  Latest(SingleDeviceCommand),
}

/// sensor-cli admin interface
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CommandLineArguments {
  /// Path to the toml configuration file; the same file `sensor-web` reads.
  #[arg(short = 'c', long, default_value = "sensor-web.toml")]
  config: String,

  #[command(subcommand)]
  command: CommandLineCommand,
}

/// The subset of the web configuration this tool needs.
#[derive(Deserialize, Debug)]
struct CommandLineConfig {
  #[serde(default)]
  store: sensors::config::StoreConfiguration,
  mongo: Option<sensors::config::MongoConfiguration>,
}

fn optional<T>(value: Option<T>) -> String
where
  T: std::fmt::Display,
{
  value.map(|inner| inner.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn run(args: CommandLineArguments) -> anyhow::Result<()> {
  let contents = async_std::fs::read_to_string(&args.config).await?;
  let config = toml::from_str::<CommandLineConfig>(&contents).map_err(|error| {
    log::warn!("invalid toml config file - {error}");
    anyhow::Error::msg("bad-config")
  })?;

  let store = sensors::store::open(&config.store, config.mongo.as_ref()).await?;
  let queries = sensors::query::QueryService::new(
    store,
    Duration::from_millis(sensors::constants::DEFAULT_QUERY_TIMEOUT_MS),
  );

  match args.command {
    CommandLineCommand::Devices => match queries.device_names().await? {
      sensors::query::Lookup::Found(devices) => {
        for device in devices {
          println!("- {device}");
        }
      }
      sensors::query::Lookup::Missing => eprintln!("no devices found"),
    },

    CommandLineCommand::Records(SingleDeviceCommand { device }) => match queries.device_records(&device).await? {
      sensors::query::Lookup::Found(records) => {
        println!("{} record(s) for '{device}'", records.len());
        for record in records {
          println!(
            "- {} label={} latency={}",
            record.date.to_rfc3339(),
            optional(record.label),
            optional(record.latency)
          );
        }
      }
      sensors::query::Lookup::Missing => eprintln!("no records found for '{device}'"),
    },

    CommandLineCommand::Latest(SingleDeviceCommand { device }) => match queries.latest_record(&device).await? {
      sensors::query::Lookup::Found(record) => println!("{}", serde_json::to_string_pretty(&record)?),
      sensors::query::Lookup::Missing => eprintln!("no records found for '{device}'"),
    },
  }

  Ok(())
}

fn main() -> anyhow::Result<()> {
  dotenv::dotenv().ok();
  env_logger::init();

  log::info!("environment + logger ready.");
  let args = CommandLineArguments::parse();
  async_std::task::block_on(run(args))
}
