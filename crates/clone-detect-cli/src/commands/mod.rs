//! CLI command handlers
//!
//! Handlers return a process exit code: 0 on success, 1 on any error. The
//! error chain is logged and printed to stderr.

pub mod infer;
pub mod train;

use std::path::Path;

use anyhow::Context;
use candle_core::Device;
use clone_detect_train::CloneDetectConfig;
use tracing::error;

/// Read a TOML configuration and apply `CLONE_DETECT_*` overrides.
pub(crate) fn load_config(path: &Path) -> anyhow::Result<CloneDetectConfig> {
    let config = CloneDetectConfig::from_file(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?
        .with_env_overrides();
    Ok(config)
}

/// Device for tensors. Only the CPU backend is compiled in.
pub(crate) fn device() -> Device {
    Device::Cpu
}

/// Log error and print to stderr, returning exit code 1.
pub(crate) fn report(err: anyhow::Error) -> u8 {
    error!("{:#}", err);
    eprintln!("Error: {:#}", err);
    1
}
