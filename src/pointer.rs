//! RFC 6901 JSON Pointer evaluation over [`Value`] trees.

use crate::error::PointerError;
use crate::value::Value;

/// Evaluate `pointer` against `document`.
///
/// The empty pointer addresses the whole document. Each `/`-separated segment
/// is unescaped (`~1` → `/`, then `~0` → `~`) before lookup.
pub fn evaluate<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value, PointerError> {
    if pointer.is_empty() {
        return Ok(document);
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PointerError::MissingLeadingSlash);
    };

    let mut current = document;
    for raw in rest.split('/') {
        let segment = unescape(raw);
        current = match current {
            Value::Object(map) => map
                .get(&segment)
                .ok_or(PointerError::NoSuchKey { segment })?,
            Value::Array(items) => {
                let index = parse_index(&segment)?;
                items.get(index).ok_or(PointerError::IndexOutOfRange {
                    index,
                    len: items.len(),
                })?
            }
            _ => return Err(PointerError::NotAContainer { segment }),
        };
    }
    Ok(current)
}

/// Unescape one pointer segment.
pub fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

// Array indices are base-10 without leading zeros; "-" (one past the end)
// never addresses an existing element.
fn parse_index(segment: &str) -> Result<usize, PointerError> {
    let well_formed = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if !well_formed {
        return Err(PointerError::InvalidIndex {
            segment: segment.to_string(),
        });
    }
    segment.parse().map_err(|_| PointerError::InvalidIndex {
        segment: segment.to_string(),
    })
}
