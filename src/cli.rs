// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;
use spitest::def::DumpLevel;
use spitest::loopback::LoopbackOptions;
use spitest::HarnessConfig;

fn parse_byte(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|err| format!("{value:?} is not a byte value: {err}"))
}

/// Run the SPI transfer self tests against the software loopback controller.
#[derive(Parser, Debug)]
#[command(name = "spitest", version)]
pub struct CliOptions {
    /// Build and fill every message but never hand it to the controller
    #[arg(long)]
    pub simulate_only: bool,

    /// Message dumps: off (failures only), message (every message) or data (every message with data)
    #[arg(long, default_value_t = DumpLevel::Off)]
    pub dump: DumpLevel,

    /// The controller is jumpered for loopback, check received data
    #[arg(long)]
    pub loopback: bool,

    /// Only run the test at this catalog index
    #[arg(long = "only", value_name = "INDEX")]
    pub run_only: Option<usize>,

    /// Load the test catalog from a YAML file instead of using the builtin tests
    #[arg(long, value_name = "YAML")]
    pub catalog: Option<PathBuf>,

    /// Alignment granularity reported by the controller
    #[arg(long, default_value_t = 0)]
    pub dma_alignment: usize,

    /// Level seen on MISO while nothing is transmitted
    #[arg(long, value_parser = parse_byte, default_value = "0xff")]
    pub idle: u8,

    /// MOSI is not wired back to MISO
    #[arg(long)]
    pub no_loopback_wire: bool,

    /// Report this many bytes fewer than requested for every message
    #[arg(long, default_value_t = 0, hide = true)]
    pub short_by: usize,

    /// Flip the received byte at this index of every receiving transfer
    #[arg(long, hide = true)]
    pub corrupt_at: Option<usize>,

    /// Fail every message with this status
    #[arg(long, allow_negative_numbers = true, hide = true)]
    pub reject_with: Option<i32>,

    /// Print the test catalog and exit
    #[arg(long)]
    pub list: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl CliOptions {
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            simulate_only: self.simulate_only,
            dump: self.dump,
            loopback: self.loopback,
            run_only: self.run_only,
        }
    }

    pub fn loopback_options(&self) -> LoopbackOptions {
        LoopbackOptions {
            dma_alignment: self.dma_alignment,
            wired: !self.no_loopback_wire,
            idle: self.idle,
            short_by: self.short_by,
            corrupt_at: self.corrupt_at,
            reject_with: self.reject_with,
        }
    }
}
