// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use spitest_api::TransportError;
use spitest_def::errno;
use thiserror::Error;

use crate::addr::BufAddr;

/// Problems with a catalog description, raised while it is being loaded.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not parse {input:?}: {message}")]
    Expression { input: String, message: String },

    #[error("Expression {input:?} evaluates to {value}, which is not a valid size or offset")]
    OutOfBounds { input: String, value: i64 },
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("buffer range [{addr}:+{len:#x}[ not in range [RX(0):RX({size:#x})[ or [TX(0):TX({size:#x})[")]
    OutOfRange { addr: BufAddr, len: usize, size: usize },

    #[error("invalid test configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{description}: exceeded max number of transfers with {count} (limit {max})")]
    TooManyTransfers {
        description: String,
        count: usize,
        max: usize,
    },

    #[error("Failed to execute spi message: {0}")]
    Transport(#[from] TransportError),

    #[error("actual length {actual} differs from expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("loopback strangeness - transfer {transfer} mismatch on byte {index} - expected 0x{expected:02x}, but got 0x{actual:02x}")]
    DataMismatch {
        transfer: usize,
        index: usize,
        expected: u8,
        actual: u8,
    },

    #[error("loopback strangeness - transfer {transfer} - we expect 0x00 or 0xff, but not 0x{value:02x}")]
    InvalidResult { transfer: usize, value: u8 },

    #[error("test returned 0, but we expect {expected}")]
    UnexpectedSuccess { expected: i32 },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl HarnessError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        HarnessError::InvalidConfiguration(message.into())
    }

    /// The negative errno a kernel-side harness would have returned for this failure.
    ///
    /// This is the value compared against a template's `expected_result`.
    pub fn errno(&self) -> i32 {
        match self {
            HarnessError::OutOfRange { .. }
            | HarnessError::InvalidConfiguration(_)
            | HarnessError::DataMismatch { .. }
            | HarnessError::InvalidResult { .. }
            | HarnessError::Catalog(_) => -errno::EINVAL,
            HarnessError::TooManyTransfers { .. } => -errno::E2BIG,
            HarnessError::Transport(err) => err.errno(),
            HarnessError::LengthMismatch { .. } => -errno::EIO,
            HarnessError::UnexpectedSuccess { .. } => -errno::EFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_per_kind() {
        assert_eq!(
            HarnessError::OutOfRange {
                addr: BufAddr::Rx(0),
                len: 1,
                size: 16
            }
            .errno(),
            -22
        );
        assert_eq!(
            HarnessError::TooManyTransfers {
                description: "t".to_string(),
                count: 4,
                max: 4
            }
            .errno(),
            -7
        );
        assert_eq!(
            HarnessError::LengthMismatch {
                expected: 4,
                actual: 3
            }
            .errno(),
            -5
        );
        assert_eq!(HarnessError::UnexpectedSuccess { expected: -22 }.errno(), -14);
        assert_eq!(
            HarnessError::from(TransportError::Rejected(-110)).errno(),
            -110
        );
    }

    #[test]
    fn mismatch_message() {
        let err = HarnessError::DataMismatch {
            transfer: 0,
            index: 1,
            expected: 5,
            actual: 9,
        };
        assert_eq!(
            err.to_string(),
            "loopback strangeness - transfer 0 mismatch on byte 1 - expected 0x05, but got 0x09"
        );
    }
}
