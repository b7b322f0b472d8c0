use super::ScriptResult;
use crate::security::SecretProvider;
use rhai::{Array, Dynamic, ImmutableString, Module};
use std::sync::Arc;

/// `secrets::get(name)` returns the value or `()`; `secrets::list()` returns names only.
pub fn module(secrets: &Arc<SecretProvider>) -> Module {
    let mut module = Module::new();

    let provider = Arc::clone(secrets);
    module.set_native_fn("get", move |name: ImmutableString| -> ScriptResult<Dynamic> {
        Ok(provider
            .get(name.as_str())
            .map_or(Dynamic::UNIT, Dynamic::from))
    });

    let provider = Arc::clone(secrets);
    module.set_native_fn("list", move || -> ScriptResult<Array> {
        Ok(provider.names().into_iter().map(Dynamic::from).collect())
    });

    module
}
