// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of a page of scratch memory; offsets in the stock tests are expressed in pages.
pub const PAGE_SIZE: usize = 4096;
/// Largest transfer length exercised by the harness.
pub const MAX_SIZE: usize = 32 * PAGE_SIZE;
/// Scratch region size: one page of slack on top of [`MAX_SIZE`] so offsets can be applied.
pub const MAX_SIZE_PLUS: usize = MAX_SIZE + PAGE_SIZE;
/// Upper bound on the transfers in a single test message.
pub const MAX_TRANSFERS: usize = 4;
/// Upper bound on the length values a template may iterate over.
pub const MAX_ITERATE: usize = 12;
/// Alignment selector used by the stock tests (`sizeof(int)`).
pub const ITERATE_ALIGN: usize = 4;

/// Result codes shared with the transport layer.
///
/// Failures are reported as the negated value, so a transport refusing a
/// message with `EINVAL` produces a result code of `-22`.
pub mod errno {
    pub const EIO: i32 = 5;
    pub const E2BIG: i32 = 7;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const ETIMEDOUT: i32 = 110;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseDefError {
    #[error("unknown fill pattern {0:?}")]
    UnknownFillPattern(String),

    #[error("unknown dump level {0:?}, expected 0/off, 1/message or 2/data")]
    UnknownDumpLevel(String),

    #[error("unknown buffer region {0:?}, expected rx or tx")]
    UnknownRegion(String),
}

/// Deterministic pattern written into transmit buffers before a message is dispatched.
///
/// The discriminants are the selector codes used by test catalogs.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum FillPattern {
    /// Every byte is the low byte of the seed.
    #[default]
    Memset8 = 0,
    /// The seed repeated as a 16 bit value.
    Memset16 = 1,
    /// The seed repeated as a 24 bit value.
    Memset24 = 2,
    /// The seed repeated as a 32 bit value.
    Memset32 = 3,
    /// Running byte counter across every transfer of the message.
    Count8 = 4,
    Count16 = 5,
    Count24 = 6,
    Count32 = 7,
    /// Byte index inside the current transfer.
    TransferByte8 = 8,
    TransferByte16 = 9,
    TransferByte24 = 10,
    TransferByte32 = 11,
    /// Every byte of transfer `i` is `i`.
    TransferNum = 16,
}

impl FillPattern {
    pub const ALL: [FillPattern; 13] = [
        FillPattern::Memset8,
        FillPattern::Memset16,
        FillPattern::Memset24,
        FillPattern::Memset32,
        FillPattern::Count8,
        FillPattern::Count16,
        FillPattern::Count24,
        FillPattern::Count32,
        FillPattern::TransferByte8,
        FillPattern::TransferByte16,
        FillPattern::TransferByte24,
        FillPattern::TransferByte32,
        FillPattern::TransferNum,
    ];

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|pattern| pattern.code() == code)
    }

    /// Width in bytes of the value that is spread over the buffer.
    pub fn width(&self) -> usize {
        match self {
            FillPattern::Memset8
            | FillPattern::Count8
            | FillPattern::TransferByte8
            | FillPattern::TransferNum => 1,
            FillPattern::Memset16 | FillPattern::Count16 | FillPattern::TransferByte16 => 2,
            FillPattern::Memset24 | FillPattern::Count24 | FillPattern::TransferByte24 => 3,
            FillPattern::Memset32 | FillPattern::Count32 | FillPattern::TransferByte32 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FillPattern::Memset8 => "memset8",
            FillPattern::Memset16 => "memset16",
            FillPattern::Memset24 => "memset24",
            FillPattern::Memset32 => "memset32",
            FillPattern::Count8 => "count8",
            FillPattern::Count16 => "count16",
            FillPattern::Count24 => "count24",
            FillPattern::Count32 => "count32",
            FillPattern::TransferByte8 => "transfer_byte8",
            FillPattern::TransferByte16 => "transfer_byte16",
            FillPattern::TransferByte24 => "transfer_byte24",
            FillPattern::TransferByte32 => "transfer_byte32",
            FillPattern::TransferNum => "transfer_num",
        }
    }
}

impl FromStr for FillPattern {
    type Err = ParseDefError;

    /// Accepts `count8`, `COUNT_8`, `fill-count-8` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let normalized = normalized.strip_prefix("fill").unwrap_or(&normalized);

        Self::ALL
            .into_iter()
            .find(|pattern| pattern.name().replace('_', "") == normalized)
            .ok_or_else(|| ParseDefError::UnknownFillPattern(s.to_string()))
    }
}

impl fmt::Display for FillPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much of a message gets dumped after it has been executed.
///
/// Failing messages are always dumped together with their data.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpLevel {
    /// Only failing messages.
    #[default]
    Off,
    /// Every message, without buffer contents.
    Message,
    /// Every message including TX/RX bytes.
    Data,
}

impl DumpLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(DumpLevel::Off),
            1 => Some(DumpLevel::Message),
            2 => Some(DumpLevel::Data),
            _ => None,
        }
    }

    pub fn dumps_messages(&self) -> bool {
        !matches!(self, DumpLevel::Off)
    }

    pub fn dumps_data(&self) -> bool {
        matches!(self, DumpLevel::Data)
    }
}

impl FromStr for DumpLevel {
    type Err = ParseDefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "off" | "none" => Ok(DumpLevel::Off),
            "1" | "message" | "msg" => Ok(DumpLevel::Message),
            "2" | "data" | "all" => Ok(DumpLevel::Data),
            _ => Err(ParseDefError::UnknownDumpLevel(s.to_string())),
        }
    }
}

impl fmt::Display for DumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpLevel::Off => write!(f, "off"),
            DumpLevel::Message => write!(f, "message"),
            DumpLevel::Data => write!(f, "data"),
        }
    }
}

/// One of the two scratch regions a transfer buffer can live in.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Rx,
    Tx,
}

impl Region {
    pub fn is_rx(&self) -> bool {
        matches!(self, Region::Rx)
    }

    pub fn is_tx(&self) -> bool {
        matches!(self, Region::Tx)
    }
}

impl FromStr for Region {
    type Err = ParseDefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rx" => Ok(Region::Rx),
            "tx" => Ok(Region::Tx),
            _ => Err(ParseDefError::UnknownRegion(s.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Rx => write!(f, "RX"),
            Region::Tx => write!(f, "TX"),
        }
    }
}

/// Order in which the bytes of a multi-byte fill value land in memory.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub const NATIVE: ByteOrder = if cfg!(target_endian = "big") {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };

    /// Which byte of a `width` byte value is stored at running position `count`.
    pub fn byte_index(&self, count: usize, width: usize) -> usize {
        match self {
            ByteOrder::Little => count % width,
            ByteOrder::Big => width - 1 - count % width,
        }
    }
}
