// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write;

use spitest_api::{BufSlot, ScratchBuffers, SpiMessage};

const ROW: usize = 16;

/// Format `bytes` as rows of 16 hex bytes, each row prefixed with `prefix` and its offset.
pub fn hex_dump(prefix: &str, bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(ROW)
        .enumerate()
        .map(|(row, chunk)| {
            let mut line = format!("{prefix}{:08x}:", row * ROW);
            for byte in chunk {
                let _ = write!(line, " {byte:02x}");
            }
            line
        })
        .collect()
}

fn slot_lines(
    lines: &mut Vec<String>,
    name: &str,
    prefix: &str,
    slot: Option<BufSlot>,
    len: usize,
    buffers: &ScratchBuffers,
    dump_data: bool,
) {
    match slot {
        Some(slot) => {
            lines.push(format!(
                "      {name}: {slot} @{:#x}",
                buffers.addr_of(slot)
            ));
            if dump_data {
                match buffers.get(slot, len) {
                    Some(bytes) => lines.extend(hex_dump(prefix, bytes)),
                    None => lines.push(format!("{prefix}<outside scratch memory>")),
                }
            }
        }
        None => lines.push(format!("      {name}: none")),
    }
}

/// Render a message, and optionally the bytes each transfer moved, as log lines.
pub fn format_message(msg: &SpiMessage, buffers: &ScratchBuffers, dump_data: bool) -> Vec<String> {
    let mut lines = vec!["  spi_msg".to_string()];
    if msg.status != 0 {
        lines.push(format!("    status:        {}", msg.status));
    }
    lines.push(format!("    frame_length:  {}", msg.frame_length));
    lines.push(format!("    actual_length: {}", msg.actual_length));

    for (index, xfer) in msg.transfers.iter().enumerate() {
        lines.push(format!("    spi_transfer {index}"));
        lines.push(format!("      len:    {}", xfer.len));
        slot_lines(
            &mut lines,
            "tx_buf",
            "          TX: ",
            xfer.tx_buf,
            xfer.len,
            buffers,
            dump_data,
        );
        slot_lines(
            &mut lines,
            "rx_buf",
            "          RX: ",
            xfer.rx_buf,
            xfer.len,
            buffers,
            dump_data,
        );
    }

    lines
}

pub fn dump_message(msg: &SpiMessage, buffers: &ScratchBuffers, dump_data: bool) {
    for line in format_message(msg, buffers, dump_data) {
        tracing::info!("{line}");
    }
}
