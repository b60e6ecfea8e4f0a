//! Rendering values into their published text forms.

use serde::Serialize;

use opws_builder_shared::{BuildError, Result};

/// Global function name every JSONP artifact invokes.
pub const JSONP_CALLBACK: &str = "opws_jsonp_response";

/// Second argument of the JSONP call.
#[derive(Debug, Serialize)]
struct EnvelopeMeta<'a> {
    domain: &'a str,
    filename: &'a str,
}

/// Canonical compact JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BuildError::Render(e.to_string()))
}

/// Wrap an already serialized payload in the JSONP envelope.
///
/// `filename` is the artifact's virtual path, e.g. `/v0.1/latest/profiles/a.jsonp`.
pub fn jsonp(payload_json: &str, domain: &str, filename: &str) -> Result<String> {
    let meta = to_json(&EnvelopeMeta { domain, filename })?;
    Ok(format!("{JSONP_CALLBACK}({payload_json},{meta})"))
}
