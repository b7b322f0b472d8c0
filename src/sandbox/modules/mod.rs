//! Capability modules installed into every sandbox engine.
//!
//! This is the complete surface a script can reach: `json`, `time`, `http`,
//! `secrets`, and `fmt`. Nothing here touches the filesystem, processes, or the
//! environment.

pub mod format;
pub mod http;
pub mod json;
pub mod secrets;
pub mod time;

use crate::error::CapabilityError;
use crate::sandbox::interrupt::Interrupt;
use crate::security::SecretProvider;
use rhai::{Engine, EvalAltResult};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

pub use http::HttpCapability;

pub(crate) type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

pub(crate) fn script_error(err: impl Display) -> Box<EvalAltResult> {
    err.to_string().into()
}

/// Shared state handed to every capability module of one execution.
#[derive(Clone)]
pub struct ModuleContext {
    interrupt: Arc<Interrupt>,
    handle: Handle,
    secrets: Arc<SecretProvider>,
    http: HttpCapability,
}

impl ModuleContext {
    pub fn new(
        interrupt: Arc<Interrupt>,
        handle: Handle,
        secrets: Arc<SecretProvider>,
        http: HttpCapability,
    ) -> Self {
        Self {
            interrupt,
            handle,
            secrets,
            http,
        }
    }

    /// Sleep on the runtime, returning early once the execution is interrupted.
    pub(crate) fn sleep(&self, duration: Duration) {
        if duration.is_zero() || self.interrupt.is_triggered() {
            return;
        }
        let interrupt = self.interrupt.clone();
        self.handle.block_on(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => {}
                () = interrupt.triggered() => {}
            }
        });
    }

    /// Drive a host future to completion from the interpreter thread.
    ///
    /// Must only be called from the blocking pool. The future is dropped as soon
    /// as the execution is interrupted.
    pub(crate) fn block_on<T, F>(&self, fut: F) -> ScriptResult<T>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        if self.interrupt.is_triggered() {
            return Err(script_error("execution interrupted"));
        }
        let interrupt = self.interrupt.clone();
        self.handle.block_on(async move {
            tokio::select! {
                result = fut => result.map_err(script_error),
                () = interrupt.triggered() => Err(script_error("execution interrupted")),
            }
        })
    }
}

/// Register every capability module as a static module on `engine`.
pub fn install(engine: &mut Engine, ctx: &ModuleContext) {
    engine.register_static_module("json", json::module().into());
    engine.register_static_module("time", time::module(ctx).into());
    engine.register_static_module("http", http::module(ctx).into());
    engine.register_static_module("secrets", secrets::module(&ctx.secrets).into());
    engine.register_static_module("fmt", format::module().into());
}
