// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::Serialize;
use spitest_def::Region;

/// A resolved buffer location: an offset into one of the two scratch regions.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
pub struct BufSlot {
    pub region: Region,
    pub offset: usize,
}

impl BufSlot {
    pub fn new(region: Region, offset: usize) -> Self {
        Self { region, offset }
    }

    pub fn rx(offset: usize) -> Self {
        Self::new(Region::Rx, offset)
    }

    pub fn tx(offset: usize) -> Self {
        Self::new(Region::Tx, offset)
    }

    /// The same slot moved `by` bytes further into its region.
    pub fn advance(self, by: usize) -> Self {
        Self {
            offset: self.offset + by,
            ..self
        }
    }
}

impl fmt::Display for BufSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{:#x}", self.region, self.offset)
    }
}

/// One segment of a message. Either buffer may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpiTransfer {
    pub len: usize,
    pub tx_buf: Option<BufSlot>,
    pub rx_buf: Option<BufSlot>,
}

/// An ordered batch of transfers submitted to the controller in one go.
///
/// `frame_length` accumulates the requested bytes as transfers are appended,
/// the transport reports what it actually moved in `actual_length` and its
/// completion code in `status`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpiMessage {
    pub transfers: Vec<SpiTransfer>,
    pub frame_length: usize,
    pub actual_length: usize,
    pub status: i32,
}

impl SpiMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(transfers: usize) -> Self {
        Self {
            transfers: Vec::with_capacity(transfers),
            ..Default::default()
        }
    }

    /// Appends `xfer`, the frame length saturates at `usize::MAX`.
    pub fn add_tail(&mut self, xfer: SpiTransfer) {
        self.frame_length = self.frame_length.saturating_add(xfer.len);
        self.transfers.push(xfer);
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tail_accumulates_frame_length() {
        let mut msg = SpiMessage::new();
        msg.add_tail(SpiTransfer {
            len: 16,
            tx_buf: Some(BufSlot::tx(0)),
            rx_buf: None,
        });
        msg.add_tail(SpiTransfer {
            len: 0,
            tx_buf: None,
            rx_buf: None,
        });
        msg.add_tail(SpiTransfer {
            len: 7,
            tx_buf: None,
            rx_buf: Some(BufSlot::rx(3)),
        });

        assert_eq!(msg.len(), 3);
        assert_eq!(msg.frame_length, 23);
        assert_eq!(msg.actual_length, 0);
    }

    #[test]
    fn slot_display() {
        assert_eq!(BufSlot::rx(0x10).to_string(), "RX+0x10");
        assert_eq!(BufSlot::tx(4).advance(3), BufSlot::tx(7));
    }
}
