//! Binary entrypoint for `coral-server`.

mod app;
mod ingress;
mod network;

use coral_common::config::ServerConfig;
use tracing_subscriber::EnvFilter;

fn parse_args(config: &mut ServerConfig) -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--port" | "-p" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "--port requires a value".to_owned())?;
                config.listen_port = value
                    .parse()
                    .map_err(|_| format!("invalid port number '{value}'"))?;
                index += 2;
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Err(err) = parse_args(&mut config) {
        eprintln!("usage: coral-server [--port PORT]\n{err}");
        std::process::exit(2);
    }
    if let Err(err) = app::run(config) {
        tracing::error!("failed to run coral-server: {err}");
        std::process::exit(1);
    }
}
