// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

pub use spitest_api as api;
pub use spitest_def as def;
pub use spitest_loopback as loopback;

pub mod addr;
pub mod catalog;
pub mod config;
pub mod dump;
pub mod error;
pub mod exec;
pub mod fill;
pub mod harness;
pub mod iter;
pub mod verify;

pub use addr::{translate, BufAddr};
pub use catalog::{Catalog, TestTemplate, TransferDescriptor};
pub use config::HarnessConfig;
pub use error::{CatalogError, HarnessError};
pub use exec::{run_test, CustomExecutor, ExecContext, Executor, TestCase};
pub use fill::{fill_tx, FillOption};
pub use harness::{CallReason, Harness, RunReport, RunState};
pub use verify::check_loopback_result;
