// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use spitest_api::{BufSlot, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopbackError {
    #[error("transfer {index} reaches past its scratch region: {len} bytes at {slot}")]
    SlotOutOfRange {
        index: usize,
        slot: BufSlot,
        len: usize,
    },

    #[error("transfer {index} overflows the frame length")]
    FrameTooLong { index: usize },
}

impl From<LoopbackError> for TransportError {
    fn from(value: LoopbackError) -> Self {
        TransportError::generic(value.to_string())
    }
}
