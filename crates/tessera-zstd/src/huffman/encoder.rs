//! Huffman literal streams.
//!
//! Symbols are written last to first so the backward reader sees them in
//! order. A 64-bit container holds four 12-bit codes plus the pending
//! byte remainder, so the writer only flushes every four symbols.

use tessera_core::Result;

use super::table::HuffmanCompressionTable;
use crate::bits::{write_u16_le, BitWriter};

/// Encode `input` as one stream. Returns the stream size, or 0 when it
/// does not fit in `output`.
pub fn compress_single_stream(
    output: &mut [u8],
    input: &[u8],
    table: &HuffmanCompressionTable,
) -> Result<usize> {
    if output.len() < 8 {
        return Ok(0);
    }

    let mut writer = BitWriter::new(output)?;

    let aligned = input.len() & !3;
    for &symbol in input[aligned..].iter().rev() {
        table.encode_symbol(&mut writer, symbol);
    }
    if aligned != input.len() {
        writer.flush();
    }

    for chunk in input[..aligned].chunks_exact(4).rev() {
        table.encode_symbol(&mut writer, chunk[3]);
        table.encode_symbol(&mut writer, chunk[2]);
        table.encode_symbol(&mut writer, chunk[1]);
        table.encode_symbol(&mut writer, chunk[0]);
        writer.flush();
    }

    // Overflow only means the stream is not worth storing
    Ok(writer.close().unwrap_or(0))
}

/// Encode `input` as four streams behind a 6-byte jump table. Returns the
/// total size, or 0 when the streams do not fit or are not worth it.
pub fn compress_4_streams(
    output: &mut [u8],
    input: &[u8],
    table: &HuffmanCompressionTable,
) -> Result<usize> {
    // Jump table, one byte for each of the first three streams, and the
    // writer's slack for the last
    if output.len() < 6 + 1 + 1 + 1 + 8 {
        return Ok(0);
    }
    if input.len() <= 6 + 1 + 1 + 1 {
        return Ok(0);
    }

    let segment = (input.len() + 3) / 4;
    let mut position = 6;
    for (i, chunk) in input.chunks(segment).enumerate() {
        let size = compress_single_stream(&mut output[position..], chunk, table)?;
        if size == 0 {
            return Ok(0);
        }
        if i < 3 {
            let Ok(size) = u16::try_from(size) else {
                return Ok(0);
            };
            write_u16_le(output, 2 * i, size);
        }
        position += size;
    }

    Ok(position)
}
