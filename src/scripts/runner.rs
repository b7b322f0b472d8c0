use super::{SCRIPT_EXTENSION, ScriptLoader, loader::normalize_name};
use crate::error::ScriptError;
use crate::sandbox::{ExecutionResult, Sandbox, Value};
use crate::security::ApprovalGate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Approval, load, execute, sanitize. The only path by which a named script
/// runs, for both the CLI and scheduled jobs.
#[derive(Clone)]
pub struct ScriptRunner {
    loader: Arc<ScriptLoader>,
    sandbox: Arc<Sandbox>,
    approval: Arc<dyn ApprovalGate>,
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("loader", &self.loader)
            .field("sandbox", &self.sandbox)
            .finish_non_exhaustive()
    }
}

impl ScriptRunner {
    pub fn new(
        loader: Arc<ScriptLoader>,
        sandbox: Arc<Sandbox>,
        approval: Arc<dyn ApprovalGate>,
    ) -> Self {
        Self {
            loader,
            sandbox,
            approval,
        }
    }

    pub fn loader(&self) -> &Arc<ScriptLoader> {
        &self.loader
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    /// Run `name`, optionally calling `function` with `args` after top-level code.
    ///
    /// Approval and loading failures are returned as errors. Script failures come
    /// back inside the result, already redacted like its value.
    pub async fn run(
        &self,
        ctx: &CancellationToken,
        name: &str,
        function: Option<&str>,
        args: Vec<Value>,
    ) -> Result<ExecutionResult, ScriptError> {
        let name = normalize_name(name)?;
        self.approval
            .can_execute(&format!("{name}.{SCRIPT_EXTENSION}"))
            .await?;

        let script = self.loader.load(name).await?;
        let raw = match function {
            Some(function) => {
                self.sandbox
                    .execute_function(ctx, &script.name, &script.source, function, args)
                    .await
            }
            None => {
                self.sandbox
                    .execute(ctx, &script.name, &script.source)
                    .await
            }
        };

        let result = self.sandbox.secrets().sanitize_result(raw);
        tracing::info!(
            script = %script.name,
            ok = result.is_ok(),
            duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            "script finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxConfig;
    use crate::security::{AllowAllApproval, AllowListApproval, SecretProvider};
    use tempfile::TempDir;

    async fn runner(tmp: &TempDir, approval: Arc<dyn ApprovalGate>) -> ScriptRunner {
        tokio::fs::write(
            tmp.path().join("leak.rhai"),
            "// @secrets: TOKEN\nlet result = \"token=\" + secrets::get(\"TOKEN\");",
        )
        .await
        .unwrap();
        tokio::fs::write(
            tmp.path().join("lib.rhai"),
            "fn double(x) { x * 2 }",
        )
        .await
        .unwrap();

        let secrets = Arc::new(SecretProvider::new());
        secrets.set("TOKEN", "s3cr3t-t0k3n-value");
        let sandbox = Arc::new(Sandbox::new(SandboxConfig::default(), secrets).unwrap());
        ScriptRunner::new(Arc::new(ScriptLoader::new(tmp.path())), sandbox, approval)
    }

    #[tokio::test]
    async fn results_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let runner = runner(&tmp, Arc::new(AllowAllApproval)).await;
        let result = runner
            .run(&CancellationToken::new(), "leak", None, Vec::new())
            .await
            .unwrap();
        assert_eq!(result.value, Some(Value::from("token=[REDACTED:TOKEN]")));
    }

    #[tokio::test]
    async fn unapproved_scripts_never_load() {
        let tmp = TempDir::new().unwrap();
        let runner = runner(&tmp, Arc::new(AllowListApproval::new(["lib.rhai"]))).await;

        let err = runner
            .run(&CancellationToken::new(), "leak", None, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script not approved: leak.rhai is not approved for execution"
        );
        assert!(runner.loader().get("leak").is_none());
    }

    #[tokio::test]
    async fn named_function_with_args() {
        let tmp = TempDir::new().unwrap();
        let runner = runner(&tmp, Arc::new(AllowAllApproval)).await;
        let result = runner
            .run(
                &CancellationToken::new(),
                "lib.rhai",
                Some("double"),
                vec![Value::Int(21)],
            )
            .await
            .unwrap();
        assert_eq!(result.value, Some(Value::Int(42)));
    }
}
