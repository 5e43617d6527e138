use clap::Parser;
use std::{env, path::PathBuf};
use wgkex_broker::serve;
use wgkex_shared::Config;

#[derive(Debug, Parser)]
#[clap(name = "wgkex-broker", author, version, about)]
struct Opts {
    /// Path to the broker configuration file.
    #[clap(short, long, default_value = "/etc/wgkex/broker.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var_os("RUST_LOG").is_none() {
        // Set some default log settings.
        env::set_var("RUST_LOG", "warn,wgkex_broker=info");
    }

    pretty_env_logger::init();
    let opts = Opts::parse();

    let config = Config::from_file(&opts.config)?;
    serve(config).await?;

    Ok(())
}
