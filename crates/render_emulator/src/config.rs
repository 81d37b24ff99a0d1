use anyhow::{anyhow, bail, Context};
use std::net::SocketAddr;

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub metrics_listen_addr: SocketAddr,
    /// Fixed delay added to every request.
    pub latency_ms: u64,
    /// Upper bound of the random delay added on top of `latency_ms`.
    pub jitter_ms: u64,
    /// Share of submissions answered with images directly instead of a job id.
    pub inline_percent: u8,
    /// Share of renders that fail.
    pub failure_percent: u8,
    /// Status request on which a queued job resolves.
    pub polls_to_complete: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());
        let percent = |key: &str| -> anyhow::Result<u8> {
            let value: u8 = var(key, "0")
                .parse()
                .with_context(|| format!("Failed to parse {key}"))?;
            if value > 100 {
                bail!("{key} must be between 0 and 100");
            }
            Ok(value)
        };

        Ok(Self {
            listen_addr: var("EMULATOR_LISTEN_ADDR", "0.0.0.0:8090")
                .parse()
                .context("Failed to parse EMULATOR_LISTEN_ADDR")?,
            metrics_listen_addr: var("EMULATOR_METRICS_LISTEN_ADDR", "0.0.0.0:9092")
                .parse()
                .context("Failed to parse EMULATOR_METRICS_LISTEN_ADDR")?,
            latency_ms: var("EMULATOR_LATENCY_MS", "0")
                .parse()
                .context("Failed to parse EMULATOR_LATENCY_MS")?,
            jitter_ms: var("EMULATOR_JITTER_MS", "0")
                .parse()
                .context("Failed to parse EMULATOR_JITTER_MS")?,
            inline_percent: percent("EMULATOR_INLINE_PERCENT")?,
            failure_percent: percent("EMULATOR_FAILURE_PERCENT")?,
            polls_to_complete: var("EMULATOR_POLLS_TO_COMPLETE", "3")
                .parse()
                .map_err(|e| anyhow!("Failed to parse EMULATOR_POLLS_TO_COMPLETE: {e}"))?,
        })
    }
}
