use anyhow::Result;
use clap::Parser;
use log::info;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::runtime::Builder;

use sdn_controller::config::TopologyConfig;
use sdn_controller::controller::Controller;

#[derive(Parser)]
#[command(name = "sdn-controller")]
struct Cli {
    /// Address to listen on for switch datagrams.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Topology description: switch count, then one link per line.
    #[arg(long, default_value = "./config.txt")]
    config: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = TopologyConfig::load_from_file(&cli.config)?;
    info!(
        "loaded topology: {} switches, {} links",
        config.switch_count,
        config.links.len()
    );

    let rt = Builder::new_multi_thread().enable_all().build()?;

    rt.block_on(async {
        let socket = UdpSocket::bind(format!("{}:{}", cli.host, cli.port)).await?;
        let controller = Arc::new(Controller::new(&config, socket)?);
        controller.run().await
    })
}
