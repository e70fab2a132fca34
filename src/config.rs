// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use spitest_def::DumpLevel;

/// Run-wide switches. Built once before the first test and shared read-only by every component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Skip the controller entirely and treat every message as successful.
    pub simulate_only: bool,

    /// Dump executed messages, see [`DumpLevel`].
    pub dump: DumpLevel,

    /// The device is jumpered for loopback, so received data can be checked.
    pub loopback: bool,

    /// Run only the template at this catalog index.
    pub run_only: Option<usize>,
}
