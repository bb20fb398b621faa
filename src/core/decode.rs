//! Stream decoding for cross-reference and object streams.
//!
//! Only the structural streams the splitter must read are ever decoded;
//! page content streams are carried through byte-for-byte. FlateDecode is
//! the only filter those structural streams use in practice, optionally
//! combined with a PNG predictor.

use super::error::{SplitError, SplitResult};
use super::parser::{Dict, Object};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Decodes a FlateDecode (zlib/deflate) compressed stream.
///
/// Tries zlib first; some producers emit raw deflate without the zlib
/// wrapper, so that is attempted as a fallback.
pub fn decode_flate(compressed_data: &[u8]) -> SplitResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed_data);
    let mut decompressed = Vec::new();

    match decoder.read_to_end(&mut decompressed) {
        Ok(_) => Ok(decompressed),
        Err(zlib_err) => {
            decompressed.clear();
            let mut raw_decoder = DeflateDecoder::new(compressed_data);
            match raw_decoder.read_to_end(&mut decompressed) {
                Ok(_) => Ok(decompressed),
                Err(deflate_err) => Err(SplitError::MalformedSyntax {
                    offset: 0,
                    message: format!(
                        "FlateDecode failed: zlib ({}), raw deflate ({})",
                        zlib_err, deflate_err
                    ),
                }),
            }
        }
    }
}

/// Reverses PNG predictor filtering on decompressed data.
///
/// Each row carries a one-byte predictor tag followed by `row_bytes` of
/// filtered data.
///
/// # Arguments
/// * `data` - The decompressed data with PNG prediction applied
/// * `colors` - Number of color components per sample
/// * `bits_per_component` - Bits per component (usually 8)
/// * `columns` - Number of samples per row
pub fn decode_png_predictor(
    data: &[u8],
    colors: usize,
    bits_per_component: usize,
    columns: usize,
) -> SplitResult<Vec<u8>> {
    let pix_bytes = (colors * bits_per_component + 7) / 8;
    let row_bytes = (columns * colors * bits_per_component + 7) / 8;

    // Each row: 1 predictor byte + row_bytes data
    let stride = 1 + row_bytes;

    if stride == 1 || data.len() % stride != 0 {
        return Err(SplitError::MalformedSyntax {
            offset: 0,
            message: format!(
                "PNG predictor data size mismatch: {} bytes for stride {}",
                data.len(),
                stride
            ),
        });
    }
    let num_rows = data.len() / stride;

    let mut output = Vec::with_capacity(num_rows * row_bytes);
    let mut prev_row = vec![0u8; row_bytes];

    for row_idx in 0..num_rows {
        let row_start = row_idx * stride;
        let predictor_byte = data[row_start];
        let raw_bytes = &data[row_start + 1..row_start + 1 + row_bytes];

        match predictor_byte {
            0 => {
                // None
                output.extend_from_slice(raw_bytes);
                prev_row.copy_from_slice(raw_bytes);
            }
            1 => {
                // Sub: predicts from the sample to the left
                for i in 0..row_bytes.min(pix_bytes) {
                    let val = raw_bytes[i];
                    output.push(val);
                    prev_row[i] = val;
                }
                for i in pix_bytes..row_bytes {
                    let val = output[output.len() - pix_bytes].wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
            }
            2 => {
                // Up: predicts from the sample above
                for i in 0..row_bytes {
                    let val = prev_row[i].wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
            }
            3 => {
                // Average of left and above
                for i in 0..row_bytes.min(pix_bytes) {
                    let val = (prev_row[i] / 2).wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
                for i in pix_bytes..row_bytes {
                    let left = output[output.len() - pix_bytes] as u16;
                    let up = prev_row[i] as u16;
                    let val = (((left + up) / 2) as u8).wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
            }
            4 => {
                // Paeth
                for i in 0..row_bytes.min(pix_bytes) {
                    let val = prev_row[i].wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
                for i in pix_bytes..row_bytes {
                    let left = output[output.len() - pix_bytes];
                    let up = prev_row[i];
                    let up_left = prev_row[i - pix_bytes];

                    let p = (left as i32) + (up as i32) - (up_left as i32);
                    let pa = (p - left as i32).abs();
                    let pb = (p - up as i32).abs();
                    let pc = (p - up_left as i32).abs();

                    let paeth = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };

                    let val = paeth.wrapping_add(raw_bytes[i]);
                    output.push(val);
                    prev_row[i] = val;
                }
            }
            _ => {
                return Err(SplitError::MalformedSyntax {
                    offset: 0,
                    message: format!("unsupported PNG predictor tag {}", predictor_byte),
                });
            }
        }
    }

    Ok(output)
}

fn dict_usize(dict: &Dict, key: &str, default: usize) -> usize {
    dict.get(key)
        .and_then(Object::as_integer)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
}

/// Decodes a structural stream's payload according to its dictionary.
///
/// Supports unfiltered data and FlateDecode (optionally with `/DecodeParms`
/// carrying a PNG predictor). Anything else in a cross-reference or object
/// stream is out of this crate's scope.
pub fn decode_stream_payload(dict: &Dict, data: &[u8]) -> SplitResult<Vec<u8>> {
    let filter = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(Object::Name(name)) => name.clone(),
        Some(Object::Array(items)) => match items.len() {
            0 => return Ok(data.to_vec()),
            1 => match &items[0] {
                Object::Name(name) => name.clone(),
                other => {
                    return Err(SplitError::UnsupportedFeature(format!(
                        "non-name stream filter {:?}",
                        other
                    )))
                }
            },
            _ => {
                return Err(SplitError::UnsupportedFeature(
                    "filter chains in structural streams".to_string(),
                ))
            }
        },
        Some(other) => {
            return Err(SplitError::UnsupportedFeature(format!(
                "indirect or malformed /Filter {:?}",
                other
            )))
        }
    };

    if filter != "FlateDecode" {
        return Err(SplitError::UnsupportedFeature(format!(
            "{} filter in a structural stream",
            filter
        )));
    }

    let decoded = decode_flate(data)?;

    let parms = match dict.get("DecodeParms") {
        None => return Ok(decoded),
        Some(Object::Dictionary(parms)) => parms.clone(),
        Some(Object::Array(items)) => match items.first() {
            Some(Object::Dictionary(parms)) => parms.clone(),
            Some(Object::Null) | None => return Ok(decoded),
            Some(other) => {
                return Err(SplitError::UnsupportedFeature(format!(
                    "malformed /DecodeParms {:?}",
                    other
                )))
            }
        },
        Some(Object::Null) => return Ok(decoded),
        Some(other) => {
            return Err(SplitError::UnsupportedFeature(format!(
                "malformed /DecodeParms {:?}",
                other
            )))
        }
    };

    let predictor = dict_usize(&parms, "Predictor", 1);
    match predictor {
        1 => Ok(decoded),
        2 => Err(SplitError::UnsupportedFeature(
            "TIFF predictor in a structural stream".to_string(),
        )),
        10..=15 => {
            let colors = dict_usize(&parms, "Colors", 1);
            let bits = dict_usize(&parms, "BitsPerComponent", 8);
            let columns = dict_usize(&parms, "Columns", 1);
            decode_png_predictor(&decoded, colors, bits, columns)
        }
        other => Err(SplitError::UnsupportedFeature(format!(
            "predictor {} in a structural stream",
            other
        ))),
    }
}
