//! Typed accessors over the opaque parameter map.

use serde_json::Value;

use super::error::ProcessorError;
use super::ops::Rect;
use crate::job::Parameters;

/// Read an optional float, falling back to `default`.
pub fn f32_or(params: &Parameters, name: &str, default: f32) -> Result<f32, ProcessorError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f as f32)
            .ok_or_else(|| ProcessorError::invalid_parameter(name, "expected a number")),
    }
}

/// Read an optional non-negative integer, falling back to `default`.
pub fn u32_or(params: &Parameters, name: &str, default: u32) -> Result<u32, ProcessorError> {
    Ok(u64_opt(params, name)?
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(default))
}

/// Read an optional non-negative integer.
pub fn u64_opt(params: &Parameters, name: &str) -> Result<Option<u64>, ProcessorError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| ProcessorError::invalid_parameter(name, "expected a non-negative integer")),
    }
}

/// Read a required `{x, y, width, height}` object.
pub fn rect(params: &Parameters, name: &str) -> Result<Rect, ProcessorError> {
    let obj = params
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| ProcessorError::invalid_parameter(name, "expected {x, y, width, height}"))?;

    let field = |key: &str| -> Result<u32, ProcessorError> {
        obj.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                ProcessorError::invalid_parameter(name, format!("missing or invalid '{}'", key))
            })
    };

    Ok(Rect::new(
        field("x")?,
        field("y")?,
        field("width")?,
        field("height")?,
    ))
}

/// Read an optional `[r, g, b]` colour, falling back to `default`.
pub fn color_or(
    params: &Parameters,
    name: &str,
    default: [u8; 3],
) -> Result<[u8; 3], ProcessorError> {
    let Some(value) = params.get(name).filter(|v| !v.is_null()) else {
        return Ok(default);
    };

    let channels: Vec<u8> = value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c.as_u64().and_then(|c| u8::try_from(c).ok()))
                .collect()
        })
        .unwrap_or_default();

    match channels.as_slice() {
        [r, g, b] if value.as_array().map(Vec::len) == Some(3) => Ok([*r, *g, *b]),
        _ => Err(ProcessorError::invalid_parameter(
            name,
            "expected [r, g, b] with values 0-255",
        )),
    }
}
