use anyhow::Result;
use clap::Parser;
use harness_server::{init_tracing, run_harness_proxy, HarnessServerCli};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = HarnessServerCli::parse().into_config();
    run_harness_proxy(config).await
}
