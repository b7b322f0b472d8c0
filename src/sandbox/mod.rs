//! Capability-restricted script execution.
//!
//! Every call to [`Sandbox::execute`] or [`Sandbox::execute_function`] builds a
//! fresh Rhai engine bound to one [`Interrupt`]. The engine checks the
//! interrupt at each operation, so cancellation is cooperative: a single host
//! call that never yields can still overrun the budget. `http` and
//! `time::sleep` race the interrupt; caller-supplied host functions do not.

pub mod interrupt;
pub mod modules;
pub mod value;

use crate::error::SandboxError;
use crate::security::SecretProvider;
use interrupt::{Interrupt, InterruptReason};
use modules::{HttpCapability, ModuleContext};
use rhai::packages::{Package, StandardPackage};
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, Scope};
use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub use value::Value;

/// Caller-supplied host function. Arguments and the return value cross the
/// value bridge; an `Err` surfaces to the script as a runtime error.
pub type HostFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Highest arity a host function can be called with.
pub const MAX_HOST_ARITY: usize = 8;

const DEFAULT_USER_AGENT: &str = concat!("scriptcron/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub max_execution: Duration,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub max_call_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_execution: Duration::from_secs(30),
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_call_depth: 64,
            max_string_size: 10 * 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
        }
    }
}

/// Outcome of one execution. Exactly one of `value` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl ExecutionResult {
    pub fn success(value: Value, duration: Duration) -> Self {
        Self {
            value: Some(value),
            error: None,
            duration,
        }
    }

    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            value: None,
            error: Some(error.into()),
            duration,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Text form of the value: strings verbatim, null as empty, anything else as JSON.
    #[must_use]
    pub fn output_text(&self) -> String {
        self.value.as_ref().map(Value::to_text).unwrap_or_default()
    }
}

pub struct Sandbox {
    config: SandboxConfig,
    secrets: Arc<SecretProvider>,
    http: HttpCapability,
    functions: RwLock<HashMap<String, HostFunction>>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .field("secrets", &self.secrets)
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    pub fn new(config: SandboxConfig, secrets: Arc<SecretProvider>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.http_timeout.min(Duration::from_secs(10)))
            .build()?;
        let http = HttpCapability::new(client, config.user_agent.clone());
        Ok(Self {
            config,
            secrets,
            http,
            functions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn secrets(&self) -> &Arc<SecretProvider> {
        &self.secrets
    }

    /// Register a host function callable from scripts as `name(a, b, ...)`
    /// with up to [`MAX_HOST_ARITY`] arguments. Replaces any earlier function
    /// of the same name.
    pub fn add_function(&self, name: &str, function: HostFunction) -> Result<(), SandboxError> {
        if !is_identifier(name) || RESERVED.contains(&name) {
            return Err(SandboxError::InvalidFunctionName(name.to_string()));
        }
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), function);
        Ok(())
    }

    /// Run top-level code and derive the result: `main()` if defined, else the
    /// `result` variable, else every binding not starting with a lowercase letter.
    pub async fn execute(&self, ctx: &CancellationToken, name: &str, source: &str) -> ExecutionResult {
        self.run(ctx, name, source, None).await
    }

    /// Run top-level code, then call `function` with positional `args`.
    pub async fn execute_function(
        &self,
        ctx: &CancellationToken,
        name: &str,
        source: &str,
        function: &str,
        args: Vec<Value>,
    ) -> ExecutionResult {
        self.run(ctx, name, source, Some(Call {
            function: function.to_string(),
            args,
        }))
        .await
    }

    async fn run(
        &self,
        ctx: &CancellationToken,
        name: &str,
        source: &str,
        call: Option<Call>,
    ) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.run_inner(ctx, name, source, call).await;
        let duration = started.elapsed();
        match outcome {
            Ok(value) => ExecutionResult::success(value, duration),
            Err(e) => {
                tracing::debug!(script = name, error = %e, "script execution failed");
                ExecutionResult::failure(e.to_string(), duration)
            }
        }
    }

    async fn run_inner(
        &self,
        ctx: &CancellationToken,
        name: &str,
        source: &str,
        call: Option<Call>,
    ) -> Result<Value, SandboxError> {
        let interrupt = Arc::new(Interrupt::new());
        let finished = CancellationToken::new();
        let watcher = interrupt::spawn_watcher(
            ctx.clone(),
            self.config.max_execution,
            Arc::clone(&interrupt),
            finished.clone(),
        );

        let module_ctx = ModuleContext::new(
            Arc::clone(&interrupt),
            tokio::runtime::Handle::current(),
            Arc::clone(&self.secrets),
            self.http.clone(),
        );
        let engine = self.build_engine(name, &module_ctx, Arc::clone(&interrupt));

        let script = name.to_string();
        let source = source.to_string();
        let joined =
            tokio::task::spawn_blocking(move || evaluate(&engine, &script, &source, call)).await;

        finished.cancel();
        let _ = watcher.await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => Err(SandboxError::Aborted(join_failure(join_err))),
        };

        match (outcome, interrupt.reason()) {
            (Err(_), Some(InterruptReason::Timeout(budget))) => Err(SandboxError::Timeout {
                timeout_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            }),
            (Err(_), Some(InterruptReason::Cancelled)) => Err(SandboxError::Cancelled),
            (outcome, _) => outcome,
        }
    }

    fn build_engine(&self, script: &str, ctx: &ModuleContext, interrupt: Arc<Interrupt>) -> Engine {
        let mut engine = Engine::new_raw();
        engine.register_global_module(StandardPackage::new().as_shared_module());

        engine.set_max_call_levels(self.config.max_call_depth);
        engine.set_max_string_size(self.config.max_string_size);
        engine.set_max_array_size(self.config.max_array_size);
        engine.set_max_map_size(self.config.max_map_size);
        engine.disable_symbol("eval");
        engine.disable_symbol("import");

        let print_script = script.to_string();
        engine.on_print(move |text| tracing::debug!(script = %print_script, "{text}"));
        let debug_script = script.to_string();
        engine.on_debug(move |text, _source, pos| {
            tracing::debug!(script = %debug_script, position = %pos, "{text}");
        });
        engine.on_progress(move |_ops| {
            interrupt
                .is_triggered()
                .then(|| Dynamic::from("execution interrupted".to_string()))
        });

        modules::install(&mut engine, ctx);

        let functions = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (name, function) in functions {
            register_host_function(&mut engine, &name, &function);
        }

        engine
    }
}

/// Names a host function may not take.
const RESERVED: &[&str] = &["main", "result", "json", "time", "http", "secrets", "fmt"];

struct Call {
    function: String,
    args: Vec<Value>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn register_host_function(engine: &mut Engine, name: &str, function: &HostFunction) {
    for arity in 0..=MAX_HOST_ARITY {
        let function = Arc::clone(function);
        engine.register_raw_fn(
            name,
            vec![TypeId::of::<Dynamic>(); arity],
            move |_ctx, args| -> Result<Dynamic, Box<EvalAltResult>> {
                let values: Vec<Value> = args
                    .iter()
                    .map(|arg| value::to_host((**arg).clone()))
                    .collect();
                function(&values)
                    .map(|result| value::from_host(&result))
                    .map_err(Into::into)
            },
        );
    }
}

fn runtime_error(script: &str, err: &EvalAltResult) -> SandboxError {
    SandboxError::Runtime {
        script: script.to_string(),
        message: err.to_string(),
    }
}

fn evaluate(
    engine: &Engine,
    script: &str,
    source: &str,
    call: Option<Call>,
) -> Result<Value, SandboxError> {
    let ast = engine.compile(source).map_err(|e| SandboxError::Compile {
        script: script.to_string(),
        message: e.to_string(),
    })?;

    let mut scope = Scope::new();
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| runtime_error(script, &e))?;

    if let Some(Call { function, args }) = call {
        return call_function(engine, &mut scope, &ast, script, &function, args);
    }
    if ast
        .iter_functions()
        .any(|f| f.name == "main" && f.params.is_empty())
    {
        return call_function(engine, &mut scope, &ast, script, "main", Vec::new());
    }
    if let Some(result) = scope.get_value::<Dynamic>("result") {
        return Ok(value::to_host(result));
    }
    Ok(exports(&scope))
}

fn call_function(
    engine: &Engine,
    scope: &mut Scope,
    ast: &AST,
    script: &str,
    function: &str,
    args: Vec<Value>,
) -> Result<Value, SandboxError> {
    if !ast.iter_functions().any(|f| f.name == function) {
        return Err(if scope.contains(function) {
            SandboxError::NotAFunction(function.to_string())
        } else {
            SandboxError::FunctionNotFound(function.to_string())
        });
    }

    let args: Vec<Dynamic> = args.iter().map(value::from_host).collect();
    let options = CallFnOptions::new().eval_ast(false);
    engine
        .call_fn_with_options::<Dynamic>(options, scope, ast, function, args)
        .map(value::to_host)
        .map_err(|e| runtime_error(script, &e))
}

/// Top-level bindings whose name does not start with a lowercase letter.
fn exports(scope: &Scope) -> Value {
    let map = scope
        .iter()
        .filter(|(name, _, _)| !name.starts_with(|c: char| c.is_lowercase()))
        .map(|(name, _, value)| (name.to_string(), value::to_host(value)))
        .collect();
    Value::Map(map)
}

fn join_failure(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "host function panicked".to_string()
    }
}

#[cfg(test)]
mod tests;
