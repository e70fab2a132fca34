// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use spitest_api::ScratchBuffers;
use spitest_def::Region;

use crate::catalog::TestTemplate;
use crate::error::HarnessError;
use crate::exec::{run_test, ExecContext, TestCase};

/// Warnings that should only be emitted once per run.
#[derive(Debug, Default)]
pub struct Warnings {
    seen: HashSet<(String, Region)>,
    emitted: Vec<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `description` asks for offset iteration on a side it has no buffer on.
    ///
    /// Returns true when this is the first time for that template and side.
    pub fn skipped_alignment(&mut self, description: &str, region: Region) -> bool {
        if !self.seen.insert((description.to_string(), region)) {
            return false;
        }

        let side = match region {
            Region::Tx => "tx",
            Region::Rx => "rx",
        };
        let message =
            format!("{description}: iterate_{side}_off configured with {side}_buf==NULL - ignoring");
        tracing::warn!("{message}");
        self.emitted.push(message);

        true
    }

    pub fn emitted(&self) -> &[String] {
        &self.emitted
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.emitted.clear();
    }
}

/// Number of offset passes for an alignment selector.
///
/// A selector of 0 disables the dimension. Otherwise the device's alignment
/// granularity wins over the literal selector when the device reports one.
pub fn alignment_passes(selector: usize, dma_alignment: usize) -> usize {
    match (selector, dma_alignment) {
        (0, _) => 1,
        (selector, 0) => selector,
        (_, granularity) => granularity,
    }
}

fn side_passes(
    template: &TestTemplate,
    region: Region,
    dma_alignment: usize,
    warnings: &mut Warnings,
) -> usize {
    let selector = match region {
        Region::Tx => template.iterate_tx_align,
        Region::Rx => template.iterate_rx_align,
    };
    if selector == 0 {
        return 1;
    }

    let has_buffer = template.active_transfers().iter().any(|xfer| match region {
        Region::Tx => xfer.tx_buf.is_some(),
        Region::Rx => xfer.rx_buf.is_some(),
    });
    if !has_buffer {
        warnings.skipped_alignment(&template.description, region);
        return 1;
    }

    alignment_passes(selector, dma_alignment)
}

/// Run `template` over every (length, tx offset, rx offset) combination.
///
/// Returns the number of executed iterations. The first failing iteration ends
/// the template.
pub fn run_template(
    template: &TestTemplate,
    buffers: &mut ScratchBuffers,
    ctx: &ExecContext<'_>,
    warnings: &mut Warnings,
) -> Result<usize, HarnessError> {
    run_template_with(template, buffers, ctx, warnings, &mut |_| {})
}

pub fn run_template_with(
    template: &TestTemplate,
    buffers: &mut ScratchBuffers,
    ctx: &ExecContext<'_>,
    warnings: &mut Warnings,
    on_iteration: &mut dyn FnMut(&TestCase),
) -> Result<usize, HarnessError> {
    if let Err(err) = template.validate() {
        tracing::error!("{err}");
        return Err(err);
    }

    tracing::info!("Running test {}", template.description);

    let dma_alignment = ctx.spi.dma_alignment();
    let tx_passes = side_passes(template, Region::Tx, dma_alignment, warnings);
    let rx_passes = side_passes(template, Region::Rx, dma_alignment, warnings);

    let mut lens: Vec<usize> = template
        .iterate_len
        .iter()
        .copied()
        .filter(|len| *len != 0)
        .collect();
    if lens.is_empty() {
        lens.push(0);
    }

    let mut executions = 0;
    for len in lens {
        for tx_off in 0..tx_passes {
            for rx_off in 0..rx_passes {
                let case = TestCase::resolve(template, len, tx_off, rx_off);
                if !case.is_default_iteration() {
                    tracing::info!(
                        "  with iteration values: len = {len}, tx_off = {tx_off}, rx_off = {rx_off}"
                    );
                }
                on_iteration(&case);

                run_test(&case, buffers, ctx)?;
                executions += 1;
            }
        }
    }

    Ok(executions)
}

#[cfg(test)]
mod tests {
    use spitest_def::ITERATE_ALIGN;
    use spitest_loopback::{LoopbackDevice, LoopbackOptions};

    use super::*;
    use crate::addr::BufAddr;
    use crate::catalog::TransferDescriptor;
    use crate::config::HarnessConfig;

    #[test]
    fn pass_counts() {
        assert_eq!(alignment_passes(0, 0), 1);
        assert_eq!(alignment_passes(0, 8), 1);
        assert_eq!(alignment_passes(4, 0), 4);
        assert_eq!(alignment_passes(4, 8), 8);
        assert_eq!(alignment_passes(1, 2), 2);
    }

    fn run(template: &TestTemplate, options: LoopbackOptions) -> (Vec<(usize, usize, usize)>, Warnings) {
        let spi = LoopbackDevice::with_options(options);
        let config = HarnessConfig {
            loopback: true,
            ..Default::default()
        };
        let ctx = ExecContext {
            spi: &spi,
            config: &config,
        };
        let mut buffers = ScratchBuffers::new(4096, 64);
        let mut warnings = Warnings::new();

        let mut seen = Vec::new();
        let executions = run_template_with(template, &mut buffers, &ctx, &mut warnings, &mut |case| {
            seen.push((case.len, case.tx_off, case.rx_off))
        })
        .unwrap();
        assert_eq!(executions, seen.len());
        assert_eq!(spi.messages(), seen.len());

        (seen, warnings)
    }

    #[test]
    fn enumerates_in_order() {
        let template = TestTemplate::new("order")
            .iterate_len([16, 0, 32])
            .iterate_tx_align(2)
            .iterate_rx_align(2)
            .transfer(TransferDescriptor::new(1).tx(BufAddr::Tx(0)).rx(BufAddr::Rx(0)))
            .build()
            .unwrap();

        let (seen, warnings) = run(&template, LoopbackOptions::default());
        assert_eq!(
            seen,
            vec![
                (16, 0, 0),
                (16, 0, 1),
                (16, 1, 0),
                (16, 1, 1),
                (32, 0, 0),
                (32, 0, 1),
                (32, 1, 0),
                (32, 1, 1),
            ]
        );
        assert!(warnings.emitted().is_empty());
    }

    #[test]
    fn no_lengths_means_one_pass_with_template_lengths() {
        let template = TestTemplate::new("plain")
            .transfer(TransferDescriptor::new(7).tx(BufAddr::Tx(0)).rx(BufAddr::Rx(0)))
            .build()
            .unwrap();

        let (seen, _) = run(&template, LoopbackOptions::default());
        assert_eq!(seen, vec![(0, 0, 0)]);
    }

    #[test]
    fn device_alignment_overrides_selector() {
        let template = TestTemplate::new("aligned")
            .iterate_len([4])
            .iterate_tx_align(ITERATE_ALIGN)
            .transfer(TransferDescriptor::new(1).tx(BufAddr::Tx(0)).rx(BufAddr::Rx(0)))
            .build()
            .unwrap();

        let (seen, _) = run(
            &template,
            LoopbackOptions {
                dma_alignment: 8,
                ..Default::default()
            },
        );
        assert_eq!(seen.len(), 8);
        assert_eq!(seen.last(), Some(&(4, 7, 0)));
    }

    #[test]
    fn side_without_buffers_is_skipped_once() {
        let template = TestTemplate::new("tx only")
            .iterate_len([4, 8])
            .iterate_tx_align(ITERATE_ALIGN)
            .iterate_rx_align(ITERATE_ALIGN)
            .transfer(TransferDescriptor::new(1).tx(BufAddr::Tx(0)))
            .build()
            .unwrap();

        let (seen, warnings) = run(&template, LoopbackOptions::default());
        assert_eq!(seen.len(), 8);
        assert!(seen.iter().all(|(_, _, rx_off)| *rx_off == 0));
        assert_eq!(
            warnings.emitted(),
            &["tx only: iterate_rx_off configured with rx_buf==NULL - ignoring".to_string()]
        );
    }

    #[test]
    fn warnings_are_deduplicated() {
        let mut warnings = Warnings::new();
        assert!(warnings.skipped_alignment("t", Region::Tx));
        assert!(!warnings.skipped_alignment("t", Region::Tx));
        assert!(warnings.skipped_alignment("t", Region::Rx));
        assert_eq!(warnings.emitted().len(), 2);
    }

    #[test]
    fn first_failure_stops_the_template() {
        let template = TestTemplate::new("corrupt")
            .iterate_len([16, 32])
            .iterate_tx_align(4)
            .transfer(TransferDescriptor::new(1).tx(BufAddr::Tx(0)).rx(BufAddr::Rx(0)))
            .build()
            .unwrap();

        let spi = LoopbackDevice::with_options(LoopbackOptions {
            corrupt_at: Some(3),
            ..Default::default()
        });
        let config = HarnessConfig {
            loopback: true,
            ..Default::default()
        };
        let ctx = ExecContext {
            spi: &spi,
            config: &config,
        };
        let mut buffers = ScratchBuffers::new(4096, 64);

        let err = run_template(&template, &mut buffers, &ctx, &mut Warnings::new()).unwrap_err();
        assert!(matches!(err, HarnessError::DataMismatch { index: 3, .. }));
        assert_eq!(spi.messages(), 1);
    }

    #[test]
    fn templates_are_checked_before_running() {
        let spi = LoopbackDevice::new();
        let config = HarnessConfig::default();
        let ctx = ExecContext {
            spi: &spi,
            config: &config,
        };
        let mut buffers = ScratchBuffers::new(4096, 64);

        let unnamed =
            TestTemplate::new("").transfer(TransferDescriptor::new(4).tx(BufAddr::Tx(0)));
        let err = run_template(&unnamed, &mut buffers, &ctx, &mut Warnings::new()).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfiguration(_)));

        let too_many_lens = TestTemplate::new("lens")
            .iterate_len(1..=20)
            .transfer(TransferDescriptor::new(4).tx(BufAddr::Tx(0)));
        let err =
            run_template(&too_many_lens, &mut buffers, &ctx, &mut Warnings::new()).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfiguration(_)));

        assert_eq!(spi.messages(), 0);
    }
}
