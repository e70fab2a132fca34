// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use spitest_def::{Region, MAX_SIZE, PAGE_SIZE};

use crate::BufSlot;

/// The receive and transmit scratch regions every test message points into.
///
/// Both regions are `size + slack` bytes long. Tests address them relative to
/// `size`; the slack is there so that offset iterations can push a transfer of
/// the maximum length past the end of the declared range.
///
/// Contents are never reset between messages: a test can only rely on bytes it
/// wrote itself.
pub struct ScratchBuffers {
    rx: Vec<u8>,
    tx: Vec<u8>,
    size: usize,
}

impl ScratchBuffers {
    pub fn new(size: usize, slack: usize) -> Self {
        Self {
            rx: vec![0; size + slack],
            tx: vec![0; size + slack],
            size,
        }
    }

    /// The declared size of each region, excluding slack.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The allocated size of each region, including slack.
    pub fn capacity(&self) -> usize {
        self.rx.len()
    }

    pub fn region(&self, region: Region) -> &[u8] {
        match region {
            Region::Rx => &self.rx,
            Region::Tx => &self.tx,
        }
    }

    pub fn region_mut(&mut self, region: Region) -> &mut [u8] {
        match region {
            Region::Rx => &mut self.rx,
            Region::Tx => &mut self.tx,
        }
    }

    /// `len` bytes starting at `slot`, or `None` when that runs past the region.
    pub fn get(&self, slot: BufSlot, len: usize) -> Option<&[u8]> {
        let end = slot.offset.checked_add(len)?;
        self.region(slot.region).get(slot.offset..end)
    }

    pub fn get_mut(&mut self, slot: BufSlot, len: usize) -> Option<&mut [u8]> {
        let end = slot.offset.checked_add(len)?;
        self.region_mut(slot.region).get_mut(slot.offset..end)
    }

    /// Process address of the byte `slot` refers to.
    pub fn addr_of(&self, slot: BufSlot) -> usize {
        self.region(slot.region).as_ptr() as usize + slot.offset
    }
}

impl Default for ScratchBuffers {
    fn default() -> Self {
        Self::new(MAX_SIZE, PAGE_SIZE)
    }
}

impl std::fmt::Debug for ScratchBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffers")
            .field("rx", &self.rx.as_ptr())
            .field("tx", &self.tx.as_ptr())
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .finish()
    }
}
