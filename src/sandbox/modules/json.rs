use super::script_error;
use crate::error::CapabilityError;
use crate::sandbox::value::{Value, from_host, to_host};
use rhai::{Dynamic, ImmutableString, Module};

/// `json::encode`, `json::encode_pretty`, `json::decode`.
pub fn module() -> Module {
    let mut module = Module::new();

    module.set_native_fn("encode", |value: Dynamic| {
        encode(&to_host(value), false).map_err(script_error)
    });
    module.set_native_fn("encode_pretty", |value: Dynamic| {
        encode(&to_host(value), true).map_err(script_error)
    });
    module.set_native_fn("decode", |text: ImmutableString| {
        decode(text.as_str())
            .map(|value| from_host(&value))
            .map_err(script_error)
    });

    module
}

pub fn encode(value: &Value, pretty: bool) -> Result<String, CapabilityError> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.map_err(|e| CapabilityError::Encode(e.to_string()))
}

pub fn decode(text: &str) -> Result<Value, CapabilityError> {
    serde_json::from_str(text).map_err(|e| CapabilityError::Decode(e.to_string()))
}
