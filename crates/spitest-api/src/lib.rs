// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

/// spitest-api is the boundary between the test harness and whatever moves the bytes.
/// The harness only ever talks to an `SpiInterface`; a controller driver, a
/// software loopback or a C callback (see `CallbackStorage`) can sit behind it.
///
mod buffers;
pub mod error;
mod interface;
mod message;

pub use buffers::ScratchBuffers;
pub use error::TransportError;
pub use interface::{CallbackStorage, DeviceInfo, FnOptions, SpiInterface};
pub use message::{BufSlot, SpiMessage, SpiTransfer};
