use clap::Parser;

use crate::HarnessServerConfig;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "harness-proxy",
    about = "HTTP test-harness proxy exposing the feature-flag SDK to a remote driver",
    version
)]
pub struct HarnessServerCli {
    #[arg(
        long,
        env = "HARNESS_PROXY_BIND",
        default_value = "0.0.0.0:3000",
        help = "Socket address the proxy listens on (host:port)"
    )]
    pub bind: String,

    #[arg(
        long = "sdk-request-timeout-ms",
        env = "HARNESS_PROXY_SDK_TIMEOUT_MS",
        default_value = "5000",
        value_parser = parse_positive_u64,
        help = "HTTP timeout for the SDK's config, events and bucketing requests"
    )]
    pub sdk_request_timeout_ms: u64,

    #[arg(
        long = "spec-name",
        env = "HARNESS_PROXY_SPEC_NAME",
        default_value = "Rust",
        help = "SDK name reported by GET /spec"
    )]
    pub spec_name: String,
}

impl HarnessServerCli {
    pub fn into_config(self) -> HarnessServerConfig {
        HarnessServerConfig {
            bind: self.bind,
            sdk_request_timeout_ms: self.sdk_request_timeout_ms,
            spec_name: self.spec_name,
        }
    }
}
