// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use spitest_api::{ScratchBuffers, SpiMessage};

use crate::error::HarnessError;

fn bytes<'a>(
    buffers: &'a ScratchBuffers,
    slot: spitest_api::BufSlot,
    len: usize,
    transfer: usize,
) -> Result<&'a [u8], HarnessError> {
    buffers.get(slot, len).ok_or_else(|| {
        HarnessError::invalid_configuration(format!(
            "transfer {transfer} buffer {slot}+{len:#x} is not backed by scratch memory"
        ))
    })
}

/// Check what a loopback-jumpered device received against what it sent.
///
/// With both buffers present rx must echo tx from byte 1 on; byte 0 is not
/// compared since many controllers cannot loop the first bit back cleanly.
/// Receive-only transfers must see a constant line level of 0x00 or 0xff.
pub fn check_loopback_result(
    msg: &SpiMessage,
    buffers: &ScratchBuffers,
) -> Result<(), HarnessError> {
    for (transfer, xfer) in msg.transfers.iter().enumerate() {
        let Some(rx_slot) = xfer.rx_buf else {
            continue;
        };
        if xfer.len == 0 {
            continue;
        }

        let rx = bytes(buffers, rx_slot, xfer.len, transfer)?;

        if let Some(tx_slot) = xfer.tx_buf {
            let tx = bytes(buffers, tx_slot, xfer.len, transfer)?;
            if let Some(index) = (1..xfer.len).find(|i| tx[*i] != rx[*i]) {
                return Err(mismatch(transfer, index, tx[index], rx[index]));
            }
            continue;
        }

        let level = rx[0];
        if level != 0x00 && level != 0xff {
            let err = HarnessError::InvalidResult {
                transfer,
                value: level,
            };
            tracing::error!("{err}");
            return Err(err);
        }

        if let Some(index) = (1..xfer.len).find(|i| rx[*i] != level) {
            return Err(mismatch(transfer, index, level, rx[index]));
        }
    }

    Ok(())
}

fn mismatch(transfer: usize, index: usize, expected: u8, actual: u8) -> HarnessError {
    let err = HarnessError::DataMismatch {
        transfer,
        index,
        expected,
        actual,
    };
    tracing::error!("{err}");
    err
}
