// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use spitest_api::{DeviceInfo, ScratchBuffers, SpiInterface};
use spitest_def::{MAX_SIZE, PAGE_SIZE};

use crate::catalog::{Catalog, TestTemplate};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::exec::{ExecContext, TestCase};
use crate::iter::{run_template_with, Warnings};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TemplateReport {
    pub index: usize,
    pub description: String,
    pub executions: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FailureReport {
    /// Catalog index of the failing template, if the failure belongs to one.
    pub index: Option<usize>,
    pub description: Option<String>,
    pub code: i32,
    pub error: String,
}

/// Outcome of one [`Harness::run_catalog`] call.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub device: Option<DeviceInfo>,
    pub templates: Vec<TemplateReport>,
    pub warnings: Vec<String>,
    pub failure: Option<FailureReport>,
    /// 0 on success, otherwise the negative errno of the failure.
    pub result: i32,
}

impl RunReport {
    pub fn executions(&self) -> usize {
        self.templates.iter().map(|t| t.executions).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// What is happening during a catalog run, passed to the callback of
/// [`Harness::run_catalog_with`].
pub enum CallReason<'a> {
    TemplateStarted(&'a TestTemplate),
    Iteration(&'a TestCase),
    TemplateCompleted(usize),
    Failed(&'a HarnessError),
}

pub struct RunState<'a> {
    /// Catalog index of the template the call is about, `None` for failures of
    /// the run itself.
    pub index: Option<usize>,
    pub call: CallReason<'a>,
}

/// Owns the device, the run configuration and the scratch buffers for a whole run.
pub struct Harness<S> {
    spi: S,
    config: HarnessConfig,
    buffers: ScratchBuffers,
    warnings: Warnings,
    report: RunReport,
}

impl<S: SpiInterface> Harness<S> {
    pub fn new(spi: S, config: HarnessConfig) -> Self {
        Self::with_buffers(spi, config, ScratchBuffers::new(MAX_SIZE, PAGE_SIZE))
    }

    pub fn with_buffers(spi: S, config: HarnessConfig, buffers: ScratchBuffers) -> Self {
        Self {
            spi,
            config,
            buffers,
            warnings: Warnings::new(),
            report: RunReport::default(),
        }
    }

    pub fn spi(&self) -> &S {
        &self.spi
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn buffers(&self) -> &ScratchBuffers {
        &self.buffers
    }

    /// Report of the last catalog run.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Run a single template outside of a catalog. Returns the number of executions.
    pub fn run_template(&mut self, template: &TestTemplate) -> Result<usize, HarnessError> {
        let ctx = ExecContext {
            spi: &self.spi,
            config: &self.config,
        };
        run_template_with(
            template,
            &mut self.buffers,
            &ctx,
            &mut self.warnings,
            &mut |_| {},
        )
    }

    pub fn run_catalog(&mut self, catalog: &Catalog) -> Result<(), HarnessError> {
        self.run_catalog_with(catalog, &mut |_| {})
    }

    /// Run the templates of `catalog` in order, stopping at the first failure.
    ///
    /// With `run_only` configured just that template is run.
    pub fn run_catalog_with(
        &mut self,
        catalog: &Catalog,
        callback: &mut impl FnMut(RunState),
    ) -> Result<(), HarnessError> {
        tracing::info!("Executing spi-tests");

        self.warnings.clear();
        self.report = RunReport {
            device: match self.spi.get_device_info() {
                Ok(info) => info,
                Err(err) => {
                    tracing::debug!("Failed to query device info: {err}");
                    None
                }
            },
            ..Default::default()
        };

        let result = self.run_selected(catalog, callback);

        self.report.warnings = self.warnings.emitted().to_vec();
        self.report.result = match &result {
            Ok(()) => 0,
            Err((_, err)) => err.errno(),
        };
        tracing::info!("Finished spi-tests with return: {}", self.report.result);

        result.map_err(|(index, err)| {
            callback(RunState {
                index,
                call: CallReason::Failed(&err),
            });
            self.report.failure = Some(FailureReport {
                index,
                description: index
                    .and_then(|index| catalog.get(index))
                    .map(|template| template.description.clone()),
                code: err.errno(),
                error: err.to_string(),
            });
            err
        })
    }

    fn run_selected(
        &mut self,
        catalog: &Catalog,
        callback: &mut impl FnMut(RunState),
    ) -> Result<(), (Option<usize>, HarnessError)> {
        let selected: Vec<usize> = match self.config.run_only {
            Some(index) if index < catalog.len() => vec![index],
            Some(index) => {
                let err = HarnessError::invalid_configuration(format!(
                    "test index {index} is out of range, the catalog has {} tests",
                    catalog.len()
                ));
                tracing::error!("{err}");
                return Err((None, err));
            }
            None => (0..catalog.len()).collect(),
        };

        let ctx = ExecContext {
            spi: &self.spi,
            config: &self.config,
        };

        for index in selected {
            let Some(template) = catalog.get(index) else {
                continue;
            };

            callback(RunState {
                index: Some(index),
                call: CallReason::TemplateStarted(template),
            });

            let executions = run_template_with(
                template,
                &mut self.buffers,
                &ctx,
                &mut self.warnings,
                &mut |case| {
                    callback(RunState {
                        index: Some(index),
                        call: CallReason::Iteration(case),
                    })
                },
            )
            .map_err(|err| (Some(index), err))?;

            self.report.templates.push(TemplateReport {
                index,
                description: template.description.clone(),
                executions,
            });
            callback(RunState {
                index: Some(index),
                call: CallReason::TemplateCompleted(executions),
            });
        }

        Ok(())
    }
}
