// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::time::Duration;

use spitest_def::errno;
use thiserror::Error;

#[derive(Debug)]
pub struct BtWrapper(pub std::backtrace::Backtrace);

impl BtWrapper {
    #[inline(always)]
    pub fn capture() -> Self {
        Self(std::backtrace::Backtrace::capture())
    }
}

impl Display for BtWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let std::backtrace::BacktraceStatus::Captured = self.0.status() {
            self.0.fmt(f)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("controller rejected the message with status {0}")]
    Rejected(i32),

    #[error("message did not complete within {0:?}")]
    Timeout(Duration),

    #[error("{0}\n{1}")]
    Generic(String, BtWrapper),
}

impl TransportError {
    pub fn generic(message: impl Into<String>) -> Self {
        TransportError::Generic(message.into(), BtWrapper::capture())
    }

    /// Negative errno describing this failure, as a controller driver would report it.
    pub fn errno(&self) -> i32 {
        match self {
            TransportError::Rejected(status) if *status < 0 => *status,
            TransportError::Rejected(status) if *status > 0 => -status,
            TransportError::Rejected(_) => -errno::EIO,
            TransportError::Timeout(_) => -errno::ETIMEDOUT,
            TransportError::Generic(..) => -errno::EIO,
        }
    }
}

impl From<Box<dyn std::error::Error>> for TransportError {
    #[inline]
    fn from(e: Box<dyn std::error::Error>) -> Self {
        match e.downcast::<TransportError>() {
            Ok(err) => *err,
            Err(e) => Self::Generic(e.to_string(), BtWrapper::capture()),
        }
    }
}

impl From<String> for TransportError {
    #[inline]
    fn from(e: String) -> Self {
        Self::Generic(e, BtWrapper::capture())
    }
}
