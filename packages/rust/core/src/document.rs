//! Document parsing: raw item bytes → [`Value`].
//!
//! Items are YAML restricted to what JSON can express. Tags, non-string keys,
//! duplicate keys and non-finite numbers are rejected.

use std::path::Path;

use opws_builder_shared::{BuildError, Map, Result, Value};

/// Parse one item document.
///
/// `path` is only used to label errors.
pub fn parse(path: &Path, raw: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| BuildError::parse(path, format!("not valid UTF-8: {e}")))?;

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| BuildError::parse(path, e.to_string()))?;

    convert(&yaml).map_err(|message| BuildError::parse(path, message))
}

fn convert(yaml: &serde_yaml::Value) -> std::result::Result<Value, String> {
    use serde_yaml::Value as Y;

    Ok(match yaml {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(*b),
        Y::Number(n) => Value::Number(convert_number(n)?),
        Y::String(s) => Value::String(s.clone()),
        Y::Sequence(items) => Value::Array(
            items
                .iter()
                .map(convert)
                .collect::<std::result::Result<_, _>>()?,
        ),
        Y::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let Y::String(key) = key else {
                    return Err(format!("mapping key {key:?} is not a string"));
                };
                map.try_insert(key.clone(), convert(value)?)
                    .map_err(|key| format!("duplicate key {key:?}"))?;
            }
            Value::Map(map)
        }
        Y::Tagged(tagged) => return Err(format!("unsupported tag {}", tagged.tag)),
    })
}

fn convert_number(n: &serde_yaml::Number) -> std::result::Result<serde_json::Number, String> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    let f = n
        .as_f64()
        .filter(|f| f.is_finite())
        .ok_or_else(|| format!("number {n} has no JSON representation"))?;
    // Integral floats render without a fraction: `1.0` → `1`, `1e3` → `1000`.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Ok((f as i64).into());
    }
    serde_json::Number::from_f64(f).ok_or_else(|| format!("number {n} has no JSON representation"))
}
