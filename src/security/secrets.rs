use super::redact::Redactor;
use crate::sandbox::{ExecutionResult, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use zeroize::Zeroizing;

/// Name to value credential map shared by the sandbox and the redaction pass.
///
/// Values are zeroized on drop and never appear in `Debug` output; only names
/// can be enumerated.
#[derive(Default)]
pub struct SecretProvider {
    secrets: RwLock<HashMap<String, Zeroizing<String>>>,
}

impl fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretProvider")
            .field("names", &self.names())
            .finish()
    }
}

impl SecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(secrets: HashMap<String, String>) -> Self {
        let provider = Self::new();
        provider.replace(secrets);
        provider
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Zeroizing::new(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|value| value.as_str().to_string())
    }

    /// Sorted secret names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Swap the whole set atomically.
    pub fn replace(&self, secrets: HashMap<String, String>) {
        let next: HashMap<String, Zeroizing<String>> = secrets
            .into_iter()
            .map(|(name, value)| (name, Zeroizing::new(value)))
            .collect();
        *self.secrets.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn len(&self) -> usize {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_redactor<R>(&self, f: impl FnOnce(&Redactor<'_>) -> R) -> R {
        let guard = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
        let redactor = Redactor::new(
            guard
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        f(&redactor)
    }

    /// Redact every secret value from `result`'s value tree and error string.
    pub fn sanitize_result(&self, result: ExecutionResult) -> ExecutionResult {
        self.with_redactor(|redactor| ExecutionResult {
            value: result.value.map(|value| redactor.value(value)),
            error: result
                .error
                .map(|error| redactor.text(&error).into_owned()),
            duration: result.duration,
        })
    }

    pub fn sanitize_value(&self, value: Value) -> Value {
        self.with_redactor(|redactor| redactor.value(value))
    }

    pub fn sanitize_text(&self, text: &str) -> String {
        self.with_redactor(|redactor| redactor.text(text).into_owned())
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
