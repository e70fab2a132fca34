// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use spitest_api::{ScratchBuffers, SpiInterface, SpiMessage, SpiTransfer};
use spitest_def::MAX_TRANSFERS;

use crate::addr::translate;
use crate::catalog::{TestTemplate, TransferDescriptor};
use crate::config::HarnessConfig;
use crate::dump::dump_message;
use crate::error::HarnessError;
use crate::fill::{fill_tx, FillOption};
use crate::verify::check_loopback_result;

/// Everything an execution needs besides the case and the buffers.
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub spi: &'a dyn SpiInterface,
    pub config: &'a HarnessConfig,
}

/// Replacement for the default dispatch.
///
/// Receives the translated and filled message. Its result is what gets
/// compared against the template's `expected_result`.
pub type CustomExecutor = fn(
    &TestCase,
    &mut SpiMessage,
    &mut ScratchBuffers,
    &ExecContext<'_>,
) -> Result<(), HarnessError>;

#[derive(Clone, Copy, Default)]
pub enum Executor {
    #[default]
    Default,
    Custom(CustomExecutor),
}

impl Executor {
    pub fn is_custom(&self) -> bool {
        matches!(self, Executor::Custom(_))
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Default => f.write_str("Default"),
            Executor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A template pinned to one (length, tx offset, rx offset) combination.
#[derive(Clone, Debug)]
pub struct TestCase {
    pub description: String,
    /// The transfer count as declared by the template, 0 when derived.
    pub transfer_count: usize,
    pub transfers: Vec<TransferDescriptor>,
    pub fill_option: FillOption,
    pub fill: u32,
    pub executor: Executor,
    pub expected_result: i32,
    pub len: usize,
    pub tx_off: usize,
    pub rx_off: usize,
}

impl TestCase {
    /// Instantiate `template` for one iteration.
    ///
    /// A non-zero `len` replaces the length of every transfer, the offsets move
    /// every buffer present on their side.
    pub fn resolve(template: &TestTemplate, len: usize, tx_off: usize, rx_off: usize) -> Self {
        let transfers = template
            .active_transfers()
            .iter()
            .map(|xfer| TransferDescriptor {
                len: if len != 0 { len } else { xfer.len },
                tx_buf: xfer.tx_buf.map(|addr| addr.advance(tx_off)),
                rx_buf: xfer.rx_buf.map(|addr| addr.advance(rx_off)),
            })
            .collect();

        Self {
            description: template.description.clone(),
            transfer_count: template.transfer_count,
            transfers,
            fill_option: template.fill_option,
            fill: template.fill,
            executor: template.executor,
            expected_result: template.expected_result,
            len,
            tx_off,
            rx_off,
        }
    }

    pub fn is_default_iteration(&self) -> bool {
        self.len == 0 && self.tx_off == 0 && self.rx_off == 0
    }
}

/// Build, fill and dispatch one message for `case`, then hold the outcome against
/// `expected_result`.
///
/// Translation and fill problems abort before anything is dispatched and are
/// returned as is.
pub fn run_test(
    case: &TestCase,
    buffers: &mut ScratchBuffers,
    ctx: &ExecContext<'_>,
) -> Result<(), HarnessError> {
    let count = case.transfer_count.max(case.transfers.len());
    if case.transfer_count >= MAX_TRANSFERS || case.transfers.len() > MAX_TRANSFERS {
        let err = HarnessError::TooManyTransfers {
            description: case.description.clone(),
            count,
            max: MAX_TRANSFERS,
        };
        tracing::error!("{err}");
        return Err(err);
    }

    let mut msg = SpiMessage::with_capacity(case.transfers.len());
    let mut frame_length = 0usize;
    for xfer in &case.transfers {
        frame_length = match frame_length.checked_add(xfer.len) {
            Some(total) => total,
            None => {
                let err = HarnessError::invalid_configuration(format!(
                    "{}: total transfer length overflows",
                    case.description
                ));
                tracing::error!("{err}");
                return Err(err);
            }
        };
        let tx_buf = translate(xfer.tx_buf, xfer.len, buffers)?;
        let rx_buf = translate(xfer.rx_buf, xfer.len, buffers)?;
        msg.add_tail(SpiTransfer {
            len: xfer.len,
            tx_buf,
            rx_buf,
        });
    }

    fill_tx(&msg, case.fill_option, case.fill, buffers)?;

    let result = match case.executor {
        Executor::Default => execute_msg(&mut msg, buffers, ctx),
        Executor::Custom(hook) => hook(case, &mut msg, buffers, ctx),
    };

    check_result(result, case.expected_result)
}

fn check_result(result: Result<(), HarnessError>, expected: i32) -> Result<(), HarnessError> {
    let code = match &result {
        Ok(()) => 0,
        Err(err) => err.errno(),
    };
    if code == expected {
        return Ok(());
    }

    tracing::error!("test failed - test returned {code}, but we expect {expected}");

    result?;
    Err(HarnessError::UnexpectedSuccess { expected })
}

/// The default dispatch: send the message, check the transferred length and, on
/// a loopback setup, the received data.
///
/// Failing messages are always dumped with their data; successful ones only as
/// the configured dump level asks for.
pub fn execute_msg(
    msg: &mut SpiMessage,
    buffers: &mut ScratchBuffers,
    ctx: &ExecContext<'_>,
) -> Result<(), HarnessError> {
    let result = dispatch(msg, buffers, ctx);

    let failed = result.is_err();
    if failed || ctx.config.dump.dumps_messages() {
        dump_message(msg, buffers, failed || ctx.config.dump.dumps_data());
    }

    result
}

fn dispatch(
    msg: &mut SpiMessage,
    buffers: &mut ScratchBuffers,
    ctx: &ExecContext<'_>,
) -> Result<(), HarnessError> {
    if ctx.config.simulate_only {
        return Ok(());
    }

    if let Err(err) = ctx.spi.transfer(msg, buffers) {
        tracing::error!("Failed to execute spi message: {err}");
        return Err(err.into());
    }

    if msg.frame_length != msg.actual_length {
        let err = HarnessError::LengthMismatch {
            expected: msg.frame_length,
            actual: msg.actual_length,
        };
        tracing::error!("{err}");
        return Err(err);
    }

    if ctx.config.loopback {
        check_loopback_result(msg, buffers)?;
    }

    Ok(())
}
