// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use spitest_api::{ScratchBuffers, SpiMessage};
use spitest_def::{ByteOrder, FillPattern};

use crate::error::HarnessError;

/// The fill selector exactly as a template states it.
///
/// Selectors are kept raw so that a catalog can carry a code this harness does
/// not implement; that only becomes an error once there is data to fill.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct FillOption(pub u32);

impl FillOption {
    pub fn pattern(&self) -> Option<FillPattern> {
        FillPattern::from_code(self.0)
    }
}

impl From<FillPattern> for FillOption {
    fn from(value: FillPattern) -> Self {
        FillOption(value.code())
    }
}

impl fmt::Display for FillOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pattern() {
            Some(pattern) => write!(f, "{pattern}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for FillOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.pattern() {
            Some(pattern) => serializer.serialize_str(pattern.name()),
            None => serializer.serialize_u32(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for FillOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u32),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Ok(FillOption(code)),
            Repr::Name(name) => name
                .parse::<FillPattern>()
                .map(FillOption::from)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[inline]
fn value_byte(value: u64, count: usize, width: usize, order: ByteOrder) -> u8 {
    (value >> (8 * order.byte_index(count, width))) as u8
}

/// Write the selected pattern into the transmit buffer of every transfer in `msg`.
///
/// `count` runs across the whole message, `j` restarts with every transfer. Bytes
/// outside the transmit ranges are left untouched.
pub fn fill_tx(
    msg: &SpiMessage,
    option: FillOption,
    seed: u32,
    buffers: &mut ScratchBuffers,
) -> Result<(), HarnessError> {
    fill_tx_with_order(msg, option, seed, buffers, ByteOrder::NATIVE)
}

pub fn fill_tx_with_order(
    msg: &SpiMessage,
    option: FillOption,
    seed: u32,
    buffers: &mut ScratchBuffers,
    order: ByteOrder,
) -> Result<(), HarnessError> {
    let pattern = option.pattern();
    let seed = seed as u64;
    let mut count = 0usize;

    for (i, xfer) in msg.transfers.iter().enumerate() {
        let Some(slot) = xfer.tx_buf else {
            continue;
        };
        if xfer.len == 0 {
            continue;
        }

        let Some(pattern) = pattern else {
            let err = HarnessError::invalid_configuration(format!(
                "unsupported fill_option: {}",
                option.0
            ));
            tracing::error!("{err}");
            return Err(err);
        };

        let tx = buffers.get_mut(slot, xfer.len).ok_or_else(|| {
            HarnessError::invalid_configuration(format!(
                "transfer {i} transmit range {slot}+{:#x} is not backed by scratch memory",
                xfer.len
            ))
        })?;

        let width = pattern.width();
        for (j, byte) in tx.iter_mut().enumerate() {
            *byte = match pattern {
                FillPattern::Memset8 => seed as u8,
                FillPattern::Memset16 | FillPattern::Memset24 | FillPattern::Memset32 => {
                    value_byte(seed, count, width, order)
                }
                FillPattern::Count8 => count as u8,
                FillPattern::Count16 | FillPattern::Count24 | FillPattern::Count32 => {
                    value_byte(count as u64, count, width, order)
                }
                FillPattern::TransferByte8 => j as u8,
                FillPattern::TransferByte16
                | FillPattern::TransferByte24
                | FillPattern::TransferByte32 => value_byte(j as u64, count, width, order),
                FillPattern::TransferNum => i as u8,
            };
            count += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use spitest_api::{BufSlot, SpiTransfer};

    use super::*;

    fn message(transfers: &[(usize, Option<BufSlot>)]) -> SpiMessage {
        let mut msg = SpiMessage::new();
        for (len, tx_buf) in transfers.iter().copied() {
            msg.add_tail(SpiTransfer {
                len,
                tx_buf,
                rx_buf: None,
            });
        }
        msg
    }

    fn filled(
        msg: &SpiMessage,
        pattern: FillPattern,
        seed: u32,
        order: ByteOrder,
    ) -> ScratchBuffers {
        let mut buffers = ScratchBuffers::new(256, 0);
        fill_tx_with_order(msg, pattern.into(), seed, &mut buffers, order).unwrap();
        buffers
    }

    #[test]
    fn memset_widths() {
        let msg = message(&[(6, Some(BufSlot::tx(0)))]);

        let buffers = filled(&msg, FillPattern::Memset8, 0x1234_56a5, ByteOrder::Little);
        assert_eq!(
            buffers.get(BufSlot::tx(0), 7).unwrap(),
            &[0xa5, 0xa5, 0xa5, 0xa5, 0xa5, 0xa5, 0]
        );

        let buffers = filled(&msg, FillPattern::Memset16, 0x1234_5678, ByteOrder::Little);
        assert_eq!(buffers.get(BufSlot::tx(0), 6).unwrap(), &[0x78, 0x56, 0x78, 0x56, 0x78, 0x56]);

        let buffers = filled(&msg, FillPattern::Memset16, 0x1234_5678, ByteOrder::Big);
        assert_eq!(buffers.get(BufSlot::tx(0), 6).unwrap(), &[0x56, 0x78, 0x56, 0x78, 0x56, 0x78]);

        let buffers = filled(&msg, FillPattern::Memset24, 0x1234_5678, ByteOrder::Little);
        assert_eq!(buffers.get(BufSlot::tx(0), 6).unwrap(), &[0x78, 0x56, 0x34, 0x78, 0x56, 0x34]);

        let buffers = filled(&msg, FillPattern::Memset32, 0x1234_5678, ByteOrder::Big);
        assert_eq!(buffers.get(BufSlot::tx(0), 6).unwrap(), &[0x12, 0x34, 0x56, 0x78, 0x12, 0x34]);
    }

    #[test]
    fn counter_spans_transfers() {
        let msg = message(&[
            (3, Some(BufSlot::tx(0))),
            (2, None),
            (3, Some(BufSlot::tx(16))),
        ]);

        let buffers = filled(&msg, FillPattern::Count8, 0, ByteOrder::Little);
        assert_eq!(buffers.get(BufSlot::tx(0), 3).unwrap(), &[0, 1, 2]);
        // a transfer without tx does not advance the counter
        assert_eq!(buffers.get(BufSlot::tx(16), 3).unwrap(), &[3, 4, 5]);

        let buffers = filled(&msg, FillPattern::TransferByte8, 0, ByteOrder::Little);
        assert_eq!(buffers.get(BufSlot::tx(0), 3).unwrap(), &[0, 1, 2]);
        assert_eq!(buffers.get(BufSlot::tx(16), 3).unwrap(), &[0, 1, 2]);

        let buffers = filled(&msg, FillPattern::TransferNum, 0, ByteOrder::Little);
        assert_eq!(buffers.get(BufSlot::tx(0), 3).unwrap(), &[0, 0, 0]);
        assert_eq!(buffers.get(BufSlot::tx(16), 3).unwrap(), &[2, 2, 2]);
    }

    #[test]
    fn wide_counters_pick_bytes_by_running_position() {
        let msg = message(&[(300, Some(BufSlot::tx(0)))]);
        let mut buffers = ScratchBuffers::new(512, 0);

        fill_tx_with_order(
            &msg,
            FillPattern::Count16.into(),
            0,
            &mut buffers,
            ByteOrder::Little,
        )
        .unwrap();
        let tx = buffers.get(BufSlot::tx(0), 300).unwrap();
        assert_eq!(&tx[..4], &[0, 0, 2, 0]);
        assert_eq!(&tx[256..260], &[0, 1, 2, 1]);

        fill_tx_with_order(
            &msg,
            FillPattern::Count16.into(),
            0,
            &mut buffers,
            ByteOrder::Big,
        )
        .unwrap();
        let tx = buffers.get(BufSlot::tx(0), 300).unwrap();
        assert_eq!(&tx[..4], &[0, 1, 0, 3]);
        assert_eq!(&tx[256..260], &[1, 1, 1, 3]);
    }

    #[test]
    fn counters_24_and_32_bit() {
        let msg = message(&[(300, Some(BufSlot::tx(0)))]);
        let cases: [(FillPattern, ByteOrder, &[u8], [u8; 4]); 4] = [
            (FillPattern::Count24, ByteOrder::Little, &[0, 0, 0, 3, 0, 0], [1, 0, 2, 1]),
            (FillPattern::Count24, ByteOrder::Big, &[0, 0, 2, 0, 0, 5], [1, 1, 0, 1]),
            (FillPattern::Count32, ByteOrder::Little, &[0, 0, 0, 0, 4, 0, 0, 0], [0, 1, 0, 0]),
            (FillPattern::Count32, ByteOrder::Big, &[0, 0, 0, 3, 0, 0, 0, 7], [0, 0, 1, 3]),
        ];

        for (pattern, order, head, tail) in cases {
            let mut buffers = ScratchBuffers::new(512, 0);
            fill_tx_with_order(&msg, pattern.into(), 0, &mut buffers, order).unwrap();
            let tx = buffers.get(BufSlot::tx(0), 300).unwrap();
            assert_eq!(&tx[..head.len()], head, "{pattern:?} {order:?}");
            assert_eq!(&tx[256..260], &tail, "{pattern:?} {order:?}");
        }
    }

    #[test]
    fn transfer_bytes_24_and_32_bit() {
        // the second transfer starts at count 2
        let msg = message(&[(2, Some(BufSlot::tx(0))), (260, Some(BufSlot::tx(8)))]);
        let cases: [(FillPattern, ByteOrder, [u8; 5], [u8; 4]); 4] = [
            (FillPattern::TransferByte24, ByteOrder::Little, [0, 1, 0, 0, 4], [0, 1, 0, 3]),
            (FillPattern::TransferByte24, ByteOrder::Big, [0, 0, 0, 3, 0], [0, 1, 2, 0]),
            (FillPattern::TransferByte32, ByteOrder::Little, [0, 0, 2, 0, 0], [0, 0, 2, 1]),
            (FillPattern::TransferByte32, ByteOrder::Big, [0, 1, 0, 0, 0], [1, 1, 0, 0]),
        ];

        for (pattern, order, head, tail) in cases {
            let mut buffers = ScratchBuffers::new(512, 0);
            fill_tx_with_order(&msg, pattern.into(), 0, &mut buffers, order).unwrap();
            assert_eq!(buffers.get(BufSlot::tx(0), 2).unwrap(), &[0, 0]);
            let tx = buffers.get(BufSlot::tx(8), 260).unwrap();
            assert_eq!(&tx[..5], &head, "{pattern:?} {order:?}");
            assert_eq!(&tx[256..260], &tail, "{pattern:?} {order:?}");
        }
    }

    #[test]
    fn transfer_byte_uses_transfer_index() {
        let msg = message(&[(3, Some(BufSlot::tx(0))), (4, Some(BufSlot::tx(8)))]);
        let buffers = filled(&msg, FillPattern::TransferByte16, 0, ByteOrder::Little);

        // value j, byte picked by the message wide count (3, 4, 5, 6)
        assert_eq!(buffers.get(BufSlot::tx(0), 3).unwrap(), &[0, 0, 2]);
        assert_eq!(buffers.get(BufSlot::tx(8), 4).unwrap(), &[0, 1, 0, 3]);
    }

    #[test]
    fn unsupported_option() {
        let msg = message(&[(4, Some(BufSlot::tx(0)))]);
        let mut buffers = ScratchBuffers::new(64, 0);

        let err = fill_tx(&msg, FillOption(12), 0, &mut buffers).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfiguration(_)));
        assert_eq!(err.errno(), -22);

        // nothing to fill, nothing to complain about
        let msg = message(&[(4, None)]);
        assert!(fill_tx(&msg, FillOption(12), 0, &mut buffers).is_ok());
    }

    #[test]
    fn option_parsing() {
        let option: FillOption = serde_yaml::from_str("count8").unwrap();
        assert_eq!(option, FillOption(4));
        let option: FillOption = serde_yaml::from_str("13").unwrap();
        assert_eq!(option, FillOption(13));
        assert!(option.pattern().is_none());
        assert!(serde_yaml::from_str::<FillOption>("count9").is_err());
        assert_eq!(FillOption::from(FillPattern::TransferNum).to_string(), "transfer_num");
    }

    proptest! {
        #[test]
        fn count8_matches_global_position(lens in proptest::collection::vec(0usize..300, 1..4)) {
            let mut transfers = Vec::new();
            let mut offset = 0;
            for len in &lens {
                transfers.push((*len, Some(BufSlot::tx(offset))));
                offset += len;
            }
            let msg = message(&transfers);
            let mut buffers = ScratchBuffers::new(1024, 0);
            fill_tx(&msg, FillPattern::Count8.into(), 0, &mut buffers).unwrap();

            let tx = buffers.get(BufSlot::tx(0), offset).unwrap();
            for (p, byte) in tx.iter().enumerate() {
                prop_assert_eq!(*byte, (p % 256) as u8);
            }
        }

        #[test]
        fn transfer_num_marks_each_transfer(lens in proptest::collection::vec(1usize..200, 1..4)) {
            let mut transfers = Vec::new();
            for (i, len) in lens.iter().enumerate() {
                transfers.push((*len, Some(BufSlot::tx(i * 256))));
            }
            let msg = message(&transfers);
            let mut buffers = ScratchBuffers::new(1024, 0);
            fill_tx(&msg, FillPattern::TransferNum.into(), 0, &mut buffers).unwrap();

            for (i, len) in lens.iter().enumerate() {
                let tx = buffers.get(BufSlot::tx(i * 256), *len).unwrap();
                prop_assert!(tx.iter().all(|b| *b == i as u8));
            }
        }
    }
}
