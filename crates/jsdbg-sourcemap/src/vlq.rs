use crate::error::{Result, SourceMapError};

/// One decoded mapping. All coordinates are 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RawMapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
}

fn base64_digit(byte: u8) -> Option<i64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(value as i64)
}

fn decode_segment(segment: &str, index: usize, out: &mut Vec<i64>) -> Result<()> {
    out.clear();
    let mut value: i64 = 0;
    let mut shift = 0u32;
    for byte in segment.bytes() {
        let digit = base64_digit(byte).ok_or(SourceMapError::InvalidMappings {
            segment: index,
            message: "invalid base64 digit",
        })?;
        if shift > 55 {
            return Err(SourceMapError::InvalidMappings {
                segment: index,
                message: "vlq value overflows",
            });
        }
        value += (digit & 0b11111) << shift;
        if digit & 0b100000 != 0 {
            shift += 5;
            continue;
        }
        let magnitude = value >> 1;
        out.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }
    if shift != 0 {
        return Err(SourceMapError::InvalidMappings {
            segment: index,
            message: "truncated vlq value",
        });
    }
    Ok(())
}

fn apply_delta(base: &mut i64, delta: i64, segment: usize) -> Result<u32> {
    *base += delta;
    u32::try_from(*base).map_err(|_| SourceMapError::InvalidMappings {
        segment,
        message: "negative or oversized coordinate",
    })
}

/// Decode a v3 `mappings` string. Segments without a source are skipped since
/// they cannot take part in source-to-generated queries.
pub(crate) fn decode_mappings(mappings: &str) -> Result<Vec<RawMapping>> {
    let mut out = Vec::new();
    let mut fields = Vec::with_capacity(5);
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;
    let mut index = 0usize;

    for (generated_line, line) in mappings.split(';').enumerate() {
        let mut generated_column: i64 = 0;
        for segment in line.split(',') {
            if segment.is_empty() {
                continue;
            }
            decode_segment(segment, index, &mut fields)?;
            let column = apply_delta(&mut generated_column, fields[0], index)?;
            match fields.len() {
                1 => {}
                4 | 5 => {
                    let src = apply_delta(&mut source, fields[1], index)?;
                    let orig_line = apply_delta(&mut original_line, fields[2], index)?;
                    let orig_column = apply_delta(&mut original_column, fields[3], index)?;
                    if let Some(&delta) = fields.get(4) {
                        apply_delta(&mut name, delta, index)?;
                    }
                    out.push(RawMapping {
                        generated_line: generated_line as u32,
                        generated_column: column,
                        source: src,
                        original_line: orig_line,
                        original_column: orig_column,
                    });
                }
                _ => {
                    return Err(SourceMapError::InvalidMappings {
                        segment: index,
                        message: "segment must have 1, 4 or 5 fields",
                    })
                }
            }
            index += 1;
        }
    }
    Ok(out)
}
