// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};

use spitest_api::{DeviceInfo, ScratchBuffers, SpiInterface, SpiMessage, TransportError};

pub mod error;

use error::LoopbackError;

/// Behaviour of the emulated controller.
///
/// The fault knobs exist so the harness' failure paths can be exercised
/// without real hardware.
#[derive(Clone, Debug)]
pub struct LoopbackOptions {
    /// Alignment granularity reported to the harness.
    pub dma_alignment: usize,
    /// MOSI is jumpered to MISO, so received bytes echo the transmitted ones.
    pub wired: bool,
    /// Level seen on MISO while nothing is being transmitted.
    pub idle: u8,
    /// Report this many bytes fewer than were requested.
    pub short_by: usize,
    /// Invert the received byte at this index of every receiving transfer.
    pub corrupt_at: Option<usize>,
    /// Fail every message with this status.
    pub reject_with: Option<i32>,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            dma_alignment: 0,
            wired: true,
            idle: 0xff,
            short_by: 0,
            corrupt_at: None,
            reject_with: None,
        }
    }
}

pub struct LoopbackDevice {
    options: LoopbackOptions,
    messages: AtomicUsize,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self::with_options(LoopbackOptions::default())
    }

    pub fn with_options(options: LoopbackOptions) -> Self {
        Self {
            options,
            messages: AtomicUsize::new(0),
        }
    }

    pub fn options(&self) -> &LoopbackOptions {
        &self.options
    }

    /// Number of messages handed to `transfer` so far, rejected ones included.
    pub fn messages(&self) -> usize {
        self.messages.load(Ordering::Relaxed)
    }

    fn run(&self, msg: &SpiMessage, buffers: &mut ScratchBuffers) -> Result<usize, LoopbackError> {
        let mut moved: usize = 0;
        for (index, xfer) in msg.transfers.iter().enumerate() {
            // Snapshot first, tx and rx may overlap when a test points both into one region.
            let tx = match xfer.tx_buf {
                Some(slot) => Some(
                    buffers
                        .get(slot, xfer.len)
                        .ok_or(LoopbackError::SlotOutOfRange {
                            index,
                            slot,
                            len: xfer.len,
                        })?
                        .to_vec(),
                ),
                None => None,
            };

            if let Some(slot) = xfer.rx_buf {
                let rx = buffers
                    .get_mut(slot, xfer.len)
                    .ok_or(LoopbackError::SlotOutOfRange {
                        index,
                        slot,
                        len: xfer.len,
                    })?;

                match tx {
                    Some(tx) if self.options.wired => rx.copy_from_slice(&tx),
                    _ => rx.fill(self.options.idle),
                }

                if let Some(byte) = self.options.corrupt_at.and_then(|at| rx.get_mut(at)) {
                    *byte = !*byte;
                }
            }

            moved = moved
                .checked_add(xfer.len)
                .ok_or(LoopbackError::FrameTooLong { index })?;
        }

        Ok(moved)
    }
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiInterface for LoopbackDevice {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        Ok(Some(DeviceInfo {
            name: "spi-loopback".to_string(),
            bus_num: 0,
            chip_select: 0,
            max_speed_hz: 1_000_000,
            mode: 0,
        }))
    }

    fn dma_alignment(&self) -> usize {
        self.options.dma_alignment
    }

    fn transfer(
        &self,
        msg: &mut SpiMessage,
        buffers: &mut ScratchBuffers,
    ) -> Result<(), TransportError> {
        self.messages.fetch_add(1, Ordering::Relaxed);

        if let Some(status) = self.options.reject_with {
            msg.status = status;
            return Err(TransportError::Rejected(status));
        }

        let moved = match self.run(msg, buffers) {
            Ok(moved) => moved,
            Err(err) => {
                let err = TransportError::from(err);
                msg.status = err.errno();
                return Err(err);
            }
        };

        tracing::trace!(
            "loopback moved {moved} bytes in {} transfers",
            msg.transfers.len()
        );

        msg.actual_length = moved.saturating_sub(self.options.short_by);
        msg.status = 0;

        Ok(())
    }
}
