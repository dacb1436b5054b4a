//! Parameter decoding for RPC methods.

use super::envelope::RpcError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode method parameters into a typed struct.
pub fn parse<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    serde_json::from_value(params.clone()).map_err(RpcError::invalid_params)
}

/// Interpret one query-string value the way devices do: as JSON when it
/// parses (`true`, `3`, `"x"`, `{...}`), as a plain string otherwise.
pub fn query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Build a parameter object from an optional JSON body overlaid by query
/// pairs. A body that is not a JSON object is treated as empty.
pub fn from_parts<'a>(body: &[u8], query: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
    let mut params = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    for (key, raw) in query {
        params.insert(key.to_string(), query_value(raw));
    }
    Value::Object(params)
}
