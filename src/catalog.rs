// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use serde::{Deserialize, Deserializer};
use spitest_def::{FillPattern, ITERATE_ALIGN, MAX_ITERATE, MAX_SIZE, MAX_TRANSFERS, PAGE_SIZE};

use crate::addr::BufAddr;
use crate::error::{CatalogError, HarnessError};
use crate::exec::Executor;
use crate::fill::FillOption;

pub mod expr;

/// Lengths every stock template is run with.
pub const ITERATE_LEN: [usize; 8] = [16, 32, 64, 128, 256, 1024, PAGE_SIZE, MAX_SIZE];

#[derive(Deserialize)]
#[serde(untagged)]
enum Value {
    Number(u64),
    Expression(String),
}

impl Value {
    fn into_usize(self) -> Result<usize, CatalogError> {
        match self {
            Value::Number(value) => usize::try_from(value).map_err(|_| CatalogError::OutOfBounds {
                input: value.to_string(),
                value: i64::try_from(value).unwrap_or(i64::MAX),
            }),
            Value::Expression(input) => expr::parse_len(&input),
        }
    }
}

fn deserialize_usize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    Value::deserialize(deserializer)?
        .into_usize()
        .map_err(serde::de::Error::custom)
}

fn deserialize_lens<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<usize>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(Value::into_usize)
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}

fn deserialize_addr<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BufAddr>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|input| expr::parse_addr(&input))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// One transfer of a template: a length and where its data comes from and goes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferDescriptor {
    #[serde(default, deserialize_with = "deserialize_usize")]
    pub len: usize,
    #[serde(default, deserialize_with = "deserialize_addr")]
    pub tx_buf: Option<BufAddr>,
    #[serde(default, deserialize_with = "deserialize_addr")]
    pub rx_buf: Option<BufAddr>,
}

impl TransferDescriptor {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Default::default()
        }
    }

    pub fn tx(mut self, addr: BufAddr) -> Self {
        self.tx_buf = Some(addr);
        self
    }

    pub fn rx(mut self, addr: BufAddr) -> Self {
        self.rx_buf = Some(addr);
        self
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateDesc {
    description: String,
    #[serde(default, deserialize_with = "deserialize_lens")]
    iterate_len: Vec<usize>,
    #[serde(default, deserialize_with = "deserialize_usize")]
    iterate_tx_align: usize,
    #[serde(default, deserialize_with = "deserialize_usize")]
    iterate_rx_align: usize,
    #[serde(default)]
    expected_result: i32,
    #[serde(default)]
    transfer_count: usize,
    #[serde(default)]
    transfers: Vec<TransferDescriptor>,
    #[serde(default)]
    fill: u32,
    #[serde(default)]
    fill_option: FillOption,
}

impl TryFrom<TemplateDesc> for TestTemplate {
    type Error = HarnessError;

    fn try_from(desc: TemplateDesc) -> Result<Self, Self::Error> {
        TestTemplate {
            description: desc.description,
            iterate_len: desc.iterate_len,
            iterate_tx_align: desc.iterate_tx_align,
            iterate_rx_align: desc.iterate_rx_align,
            executor: Executor::Default,
            expected_result: desc.expected_result,
            transfer_count: desc.transfer_count,
            transfers: desc.transfers,
            fill: desc.fill,
            fill_option: desc.fill_option,
        }
        .build()
    }
}

/// Declarative description of a test: up to [`MAX_TRANSFERS`] transfers plus the
/// values to iterate them over.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "TemplateDesc")]
pub struct TestTemplate {
    pub description: String,
    /// Lengths to run with; zero entries are ignored, an empty list runs the
    /// transfers with their own lengths.
    pub iterate_len: Vec<usize>,
    pub iterate_tx_align: usize,
    pub iterate_rx_align: usize,
    pub executor: Executor,
    pub expected_result: i32,
    /// Number of transfers to use, 0 to count the leading transfers with a length.
    pub transfer_count: usize,
    pub transfers: Vec<TransferDescriptor>,
    pub fill: u32,
    pub fill_option: FillOption,
}

impl TestTemplate {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            iterate_len: Vec::new(),
            iterate_tx_align: 0,
            iterate_rx_align: 0,
            executor: Executor::Default,
            expected_result: 0,
            transfer_count: 0,
            transfers: Vec::new(),
            fill: 0,
            fill_option: FillOption::default(),
        }
    }

    pub fn iterate_len(mut self, lens: impl IntoIterator<Item = usize>) -> Self {
        self.iterate_len = lens.into_iter().collect();
        self
    }

    pub fn iterate_tx_align(mut self, align: usize) -> Self {
        self.iterate_tx_align = align;
        self
    }

    pub fn iterate_rx_align(mut self, align: usize) -> Self {
        self.iterate_rx_align = align;
        self
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn expected_result(mut self, expected: i32) -> Self {
        self.expected_result = expected;
        self
    }

    pub fn transfer_count(mut self, count: usize) -> Self {
        self.transfer_count = count;
        self
    }

    pub fn transfer(mut self, xfer: TransferDescriptor) -> Self {
        self.transfers.push(xfer);
        self
    }

    pub fn fill(mut self, seed: u32) -> Self {
        self.fill = seed;
        self
    }

    pub fn fill_option(mut self, option: impl Into<FillOption>) -> Self {
        self.fill_option = option.into();
        self
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.description.trim().is_empty() {
            return Err(HarnessError::invalid_configuration(
                "test description must not be empty",
            ));
        }
        if self.transfers.len() > MAX_TRANSFERS {
            return Err(HarnessError::TooManyTransfers {
                description: self.description.clone(),
                count: self.transfers.len(),
                max: MAX_TRANSFERS,
            });
        }
        if self.iterate_len.len() > MAX_ITERATE {
            return Err(HarnessError::invalid_configuration(format!(
                "{}: {} iteration lengths given, at most {MAX_ITERATE} are supported",
                self.description,
                self.iterate_len.len()
            )));
        }

        Ok(())
    }

    pub fn build(self) -> Result<Self, HarnessError> {
        self.validate()?;
        Ok(self)
    }

    /// The transfers a run actually uses.
    pub fn active_transfers(&self) -> &[TransferDescriptor] {
        let count = if self.transfer_count == 0 {
            self.transfers
                .iter()
                .take(MAX_TRANSFERS)
                .take_while(|xfer| xfer.len != 0)
                .count()
        } else {
            self.transfer_count.min(self.transfers.len())
        };

        &self.transfers[..count]
    }
}

/// An ordered list of templates, run front to back.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    templates: Vec<TestTemplate>,
}

impl Catalog {
    pub fn new(templates: Vec<TestTemplate>) -> Self {
        Self { templates }
    }

    /// The stock tests: plain and page crossing tx/rx transfers followed by tx
    /// only and rx only transfers, each over [`ITERATE_LEN`] and all alignments.
    pub fn builtin() -> Self {
        let stock = |description: &str, xfer: TransferDescriptor| {
            let mut template = TestTemplate::new(description)
                .fill_option(FillPattern::Count8)
                .iterate_len(ITERATE_LEN)
                .transfer(xfer);
            if xfer.tx_buf.is_some() {
                template = template.iterate_tx_align(ITERATE_ALIGN);
            }
            if xfer.rx_buf.is_some() {
                template = template.iterate_rx_align(ITERATE_ALIGN);
            }
            template
        };

        Self::new(vec![
            stock(
                "tx/rx-transfer - start of page",
                TransferDescriptor::new(1).tx(BufAddr::Tx(0)).rx(BufAddr::Rx(0)),
            ),
            stock(
                "tx/rx-transfer - crossing PAGE_SIZE",
                TransferDescriptor::new(1)
                    .tx(BufAddr::Tx(PAGE_SIZE - 4))
                    .rx(BufAddr::Rx(PAGE_SIZE - 4)),
            ),
            stock(
                "tx-transfer - only",
                TransferDescriptor::new(1).tx(BufAddr::Tx(0)),
            ),
            stock(
                "rx-transfer - only",
                TransferDescriptor::new(1).rx(BufAddr::Rx(0)),
            ),
        ])
    }

    /// Read a catalog from YAML, either a plain list of templates or a map with a
    /// `tests` list.
    pub fn from_yaml(input: &str) -> Result<Self, CatalogError> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct CatalogFile {
            tests: Vec<TestTemplate>,
        }

        let value: serde_yaml::Value = serde_yaml::from_str(input)?;
        let templates = if value.is_sequence() {
            serde_yaml::from_value(value)?
        } else {
            serde_yaml::from_value::<CatalogFile>(value)?.tests
        };

        Ok(Self::new(templates))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!("Loading test catalog from {}", path.display());
        Self::from_yaml(&input)
    }

    pub fn push(&mut self, template: TestTemplate) {
        self.templates.push(template);
    }

    pub fn templates(&self) -> &[TestTemplate] {
        &self.templates
    }

    pub fn get(&self, index: usize) -> Option<&TestTemplate> {
        self.templates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a TestTemplate;
    type IntoIter = std::slice::Iter<'a, TestTemplate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
