// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use clap::Parser;
use spitest::harness::CallReason;
use spitest::loopback::LoopbackDevice;
use spitest::{Catalog, Harness};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::CliOptions;

fn load_catalog(options: &CliOptions) -> Result<Catalog, spitest::CatalogError> {
    match &options.catalog {
        Some(path) => Catalog::load(path),
        None => Ok(Catalog::builtin()),
    }
}

fn list(catalog: &Catalog) {
    for (index, template) in catalog.iter().enumerate() {
        println!("{index:3}: {}", template.description);
        for xfer in template.active_transfers() {
            let tx = xfer.tx_buf.map(|addr| addr.to_string());
            let rx = xfer.rx_buf.map(|addr| addr.to_string());
            println!(
                "       len {:<6} tx {:<14} rx {}",
                xfer.len,
                tx.as_deref().unwrap_or("-"),
                rx.as_deref().unwrap_or("-"),
            );
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = CliOptions::parse();

    let catalog = match load_catalog(&options) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("spitest: {err}");
            return ExitCode::from(2);
        }
    };

    if options.list {
        list(&catalog);
        return ExitCode::SUCCESS;
    }

    let device = LoopbackDevice::with_options(options.loopback_options());
    let mut harness = Harness::new(device, options.harness_config());

    let bar = indicatif::ProgressBar::new_spinner().with_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.green} [{pos}] {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
    );
    let result = harness.run_catalog_with(&catalog, &mut |state| match state.call {
        CallReason::TemplateStarted(template) => {
            bar.set_position(0);
            let index = state.index.unwrap_or_default();
            bar.set_message(format!("{index}: {}", template.description));
        }
        CallReason::Iteration(_) => bar.inc(1),
        CallReason::TemplateCompleted(_) | CallReason::Failed(_) => {}
    });
    bar.finish_and_clear();

    if options.json {
        match serde_json::to_string_pretty(harness.report()) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("spitest: failed to serialize report: {err}"),
        }
    }

    match result {
        Ok(()) => {
            if !options.json {
                println!(
                    "{} tests, {} executions, all passed",
                    harness.report().templates.len(),
                    harness.report().executions()
                );
            }
            ExitCode::SUCCESS
        }
        Err(spitest::HarnessError::InvalidConfiguration(message))
            if harness.report().failure.as_ref().is_some_and(|f| f.index.is_none()) =>
        {
            eprintln!("spitest: {message}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("spitest: {err}");
            ExitCode::from(1)
        }
    }
}
