// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde::Serialize;

use crate::{ScratchBuffers, SpiMessage, TransportError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,

    pub bus_num: u16,
    pub chip_select: u8,

    pub max_speed_hz: u32,
    pub mode: u8,
}

/// This trait abstracts the SPI controller the harness drives.
///
/// `transfer` is synchronous: it returns once every transfer of the message
/// has completed or the controller gave up. On return `actual_length` must
/// hold the number of bytes that were clocked and every receive slot of the
/// message must have been written.
pub trait SpiInterface {
    /// Access information about the device under test.
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>>;

    /// Buffer address alignment the controller's DMA engine requires, 0 if it has none.
    fn dma_alignment(&self) -> usize;

    /// Run `msg` against the scratch buffers its transfers point into.
    fn transfer(
        &self,
        msg: &mut SpiMessage,
        buffers: &mut ScratchBuffers,
    ) -> Result<(), TransportError>;
}

impl<T: SpiInterface + ?Sized> SpiInterface for Arc<T> {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        self.as_ref().get_device_info()
    }

    fn dma_alignment(&self) -> usize {
        self.as_ref().dma_alignment()
    }

    fn transfer(
        &self,
        msg: &mut SpiMessage,
        buffers: &mut ScratchBuffers,
    ) -> Result<(), TransportError> {
        self.as_ref().transfer(msg, buffers)
    }
}

impl<T: SpiInterface + ?Sized> SpiInterface for Box<T> {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        self.as_ref().get_device_info()
    }

    fn dma_alignment(&self) -> usize {
        self.as_ref().dma_alignment()
    }

    fn transfer(
        &self,
        msg: &mut SpiMessage,
        buffers: &mut ScratchBuffers,
    ) -> Result<(), TransportError> {
        self.as_ref().transfer(msg, buffers)
    }
}

/// The requests a `CallbackStorage` forwards to its callback.
#[derive(Debug)]
pub enum FnOptions<'a> {
    DeviceInfo(&'a mut Option<DeviceInfo>),
    DmaAlignment(&'a mut usize),
    Transfer {
        msg: &'a mut SpiMessage,
        buffers: &'a mut ScratchBuffers,
    },
}

/// Implements `SpiInterface` on top of a single function and some user data,
/// for transports that are easier to express as one dispatch routine.
#[derive(Clone)]
pub struct CallbackStorage<T: Clone + Send> {
    pub callback: fn(&T, FnOptions<'_>) -> Result<(), Box<dyn std::error::Error>>,
    pub user_data: T,
}

impl<T: Clone + Send> CallbackStorage<T> {
    pub fn new(
        callback: fn(&T, FnOptions<'_>) -> Result<(), Box<dyn std::error::Error>>,
        user_data: T,
    ) -> Self {
        Self {
            callback,
            user_data,
        }
    }
}

impl<T: Clone + Send> SpiInterface for CallbackStorage<T> {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        let mut device_info = None;
        (self.callback)(&self.user_data, FnOptions::DeviceInfo(&mut device_info))?;

        Ok(device_info)
    }

    fn dma_alignment(&self) -> usize {
        let mut alignment = 0;
        if let Err(err) = (self.callback)(&self.user_data, FnOptions::DmaAlignment(&mut alignment))
        {
            tracing::debug!("alignment query failed, assuming no constraint: {err}");
            return 0;
        }

        alignment
    }

    fn transfer(
        &self,
        msg: &mut SpiMessage,
        buffers: &mut ScratchBuffers,
    ) -> Result<(), TransportError> {
        (self.callback)(&self.user_data, FnOptions::Transfer { msg, buffers })?;

        Ok(())
    }
}
