// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the arguments they share.

pub mod inspect;
pub mod run;
pub mod split;
pub mod variants;

use kernel_runtime::{RuntimeConfig, Workload};
use std::path::Path;
use tensor_core::Activation;

/// Installs the `tracing` subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Reads the config file if one was given, else the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let config = RuntimeConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load config from '{}': {e}", path.display()))?;
    tracing::info!("loaded config from {}", path.display());
    Ok(config)
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum WorkloadKind {
    /// 3x3 depthwise convolution, NHWC.
    Conv,
    /// Dense matrix multiply.
    Gemm,
}

/// Shape and fusion options shared by `run` and `split`.
#[derive(Debug, clap::Args)]
pub struct WorkloadArgs {
    #[arg(short, long, value_enum, default_value = "conv")]
    pub workload: WorkloadKind,

    #[arg(long, default_value_t = 32)]
    pub height: usize,

    #[arg(long, default_value_t = 32)]
    pub width: usize,

    #[arg(long, default_value_t = 16)]
    pub channels: usize,

    #[arg(long, default_value_t = 1)]
    pub stride: usize,

    #[arg(long, default_value_t = 64)]
    pub m: usize,

    #[arg(long, default_value_t = 64)]
    pub n: usize,

    #[arg(long, default_value_t = 64)]
    pub k: usize,

    /// Storage margin around every operand, in elements.
    #[arg(long, default_value_t = 0)]
    pub padding: usize,

    /// Add a per-channel (conv) or per-column (gemm) bias.
    #[arg(long)]
    pub bias: bool,

    /// identity, relu, brelu:MAX or lubrelu:LO:HI.
    #[arg(short, long, default_value = "identity")]
    pub activation: Activation,
}

impl WorkloadArgs {
    pub fn build(&self) -> anyhow::Result<Workload> {
        let workload = match self.workload {
            WorkloadKind::Conv => Workload::conv(self.height, self.width, self.channels).with_stride(self.stride),
            WorkloadKind::Gemm => Workload::gemm(self.m, self.n, self.k),
        }
        .with_padding(self.padding)
        .with_bias(self.bias)
        .with_activation(self.activation);
        workload.validate()?;
        Ok(workload)
    }
}

/// Overrides applied on top of the loaded configuration.
#[derive(Debug, clap::Args)]
pub struct RuntimeArgs {
    /// `auto` or a variant name (see `tile-rt variants`).
    #[arg(long)]
    pub variant: Option<String>,

    /// Memory budget for operand tensors (e.g., "64M").
    #[arg(short = 'b', long)]
    pub memory_budget: Option<String>,

    /// Byte alignment for operand tensors.
    #[arg(long)]
    pub alignment: Option<usize>,

    /// Seed for the generated operands.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable cache prefetch hints.
    #[arg(long)]
    pub no_prefetch: bool,
}

impl RuntimeArgs {
    pub fn apply(self, mut config: RuntimeConfig) -> anyhow::Result<RuntimeConfig> {
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(budget) = self.memory_budget {
            config.memory_budget = budget;
        }
        if let Some(alignment) = self.alignment {
            config.alignment = alignment;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.no_prefetch {
            config.prefetch = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Prints a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
