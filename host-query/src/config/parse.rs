use anyhow::anyhow;
use clap::Arg;

/// Parsed options
pub struct Opts {
  /// Configuration file path
  pub config_file_path: String,
  /// Domains to resolve, as they would arrive in the request `Host` field
  pub domains: Vec<String>,
}

/// Parse arg values passed from cli
pub fn parse_opts() -> Result<Opts, anyhow::Error> {
  let _ = include_str!("../../Cargo.toml");
  let options = clap::command!()
    .arg(
      Arg::new("config_file")
        .long("config")
        .short('c')
        .value_name("FILE")
        .required(true)
        .help("Configuration file path like ./config.toml"),
    )
    .arg(
      Arg::new("domains")
        .value_name("DOMAIN")
        .required(true)
        .num_args(1..)
        .help("One or more inbound host names to resolve"),
    );
  let matches = options.get_matches();

  ///////////////////////////////////
  let config_file_path = matches
    .get_one::<String>("config_file")
    .ok_or_else(|| anyhow!("config_file is required"))?
    .to_owned();
  let domains = matches
    .get_many::<String>("domains")
    .ok_or_else(|| anyhow!("at least one domain is required"))?
    .cloned()
    .collect();

  Ok(Opts {
    config_file_path,
    domains,
  })
}
