mod config;
mod log;

use crate::{
  config::{ConfigToml, Opts, parse_opts},
  log::*,
};
use anyhow::anyhow;
use host_query_lib::{
  HostQueryConfig, HostQueryHandler, NextHandler, ProxyRequest, RoutingVar, UPSTREAM_HEADER,
  UPSTREAM_IS_PORT_443_VAR_KEY, UPSTREAM_SECURE_HEADER, UPSTREAM_VAR_KEY,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
  let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
  runtime_builder.enable_all();
  runtime_builder.thread_name("host-query");
  let runtime = runtime_builder.build().unwrap();

  init_logger();

  runtime.block_on(async {
    if let Err(e) = run().await {
      error!("{e}");
      std::process::exit(1);
    }
  });
}

async fn run() -> Result<(), anyhow::Error> {
  let Opts {
    config_file_path,
    domains,
  } = parse_opts()?;

  let config_toml = ConfigToml::new(&config_file_path)?;
  let config: HostQueryConfig = config_toml.try_into()?;
  let handler = HostQueryHandler::try_new(config)?;
  info!("Upstream resolution layer ready");

  let mut failed = 0usize;
  for domain in &domains {
    let mut req = ProxyRequest::new(domain);
    match handler.handle(&mut req, &ReportNext).await {
      Ok(()) => {}
      Err(e) => {
        error!("{domain}: {e}");
        failed += 1;
      }
    }
  }

  if failed > 0 {
    return Err(anyhow!("{failed} of {} resolutions failed", domains.len()));
  }
  Ok(())
}

/// Terminal stage standing in for the downstream proxy: reports the routing
/// state a real proxy stage would consume to select its dial target.
struct ReportNext;

#[async_trait::async_trait]
impl NextHandler for ReportNext {
  async fn serve(&self, req: &mut ProxyRequest) -> Result<(), anyhow::Error> {
    match (req.var(UPSTREAM_VAR_KEY), req.var(UPSTREAM_IS_PORT_443_VAR_KEY)) {
      (Some(RoutingVar::Text(upstream)), Some(RoutingVar::Flag(is_tls))) => {
        info!("{}: upstream {} (tls: {})", req.host(), upstream, is_tls);
        return Ok(());
      }
      _ => {}
    }
    match (req.header(UPSTREAM_HEADER), req.header(UPSTREAM_SECURE_HEADER)) {
      (Some(upstream), Some(secure)) => {
        info!("{}: upstream header {} (secure: {})", req.host(), upstream, secure);
        Ok(())
      }
      _ => Err(anyhow!("no upstream published for {}", req.host())),
    }
  }
}
