// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Buffer placeholders used by test templates and their translation into scratch memory.
//!
//! Templates never see real memory. They name a position in the virtual
//! receive region (`RX(off)`) or the virtual transmit region (`TX(off)`), and
//! [`translate`] resolves that against the [`ScratchBuffers`] of the run right
//! before a message is built.

use std::fmt;

use spitest_api::{BufSlot, ScratchBuffers};
use spitest_def::Region;

use crate::error::HarnessError;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BufAddr {
    /// Offset into the virtual receive region.
    Rx(usize),
    /// Offset into the virtual transmit region.
    Tx(usize),
    /// An already resolved location, passed through after a range check.
    Real(BufSlot),
}

impl BufAddr {
    pub fn region(&self) -> Region {
        match self {
            BufAddr::Rx(_) => Region::Rx,
            BufAddr::Tx(_) => Region::Tx,
            BufAddr::Real(slot) => slot.region,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            BufAddr::Rx(offset) | BufAddr::Tx(offset) => *offset,
            BufAddr::Real(slot) => slot.offset,
        }
    }

    /// The same placeholder moved `by` bytes further into its region.
    pub fn advance(self, by: usize) -> Self {
        match self {
            BufAddr::Rx(offset) => BufAddr::Rx(offset + by),
            BufAddr::Tx(offset) => BufAddr::Tx(offset + by),
            BufAddr::Real(slot) => BufAddr::Real(slot.advance(by)),
        }
    }
}

impl fmt::Display for BufAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufAddr::Rx(offset) => write!(f, "RX({offset:#x})"),
            BufAddr::Tx(offset) => write!(f, "TX({offset:#x})"),
            BufAddr::Real(slot) => write!(f, "{slot}"),
        }
    }
}

/// Resolve a placeholder covering `len` bytes to a location in `buffers`.
///
/// An absent buffer stays absent. The range may extend into the slack past the
/// declared region size but never past the allocation.
pub fn translate(
    addr: Option<BufAddr>,
    len: usize,
    buffers: &ScratchBuffers,
) -> Result<Option<BufSlot>, HarnessError> {
    let Some(addr) = addr else {
        return Ok(None);
    };

    let fits = addr
        .offset()
        .checked_add(len)
        .map_or(false, |end| end <= buffers.capacity());
    if fits {
        let slot = match addr {
            BufAddr::Rx(offset) => BufSlot::rx(offset),
            BufAddr::Tx(offset) => BufSlot::tx(offset),
            BufAddr::Real(slot) => slot,
        };
        return Ok(Some(slot));
    }

    let err = HarnessError::OutOfRange {
        addr,
        len,
        size: buffers.size(),
    };
    tracing::error!("{err}");

    Err(err)
}
