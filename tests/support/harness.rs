#![allow(dead_code)]

use scriptcron::sandbox::{Sandbox, SandboxConfig};
use scriptcron::scripts::{ScriptLoader, ScriptRunner};
use scriptcron::security::{AllowListApproval, SecretProvider};
use std::sync::Arc;
use tempfile::TempDir;

pub const TOKEN: &str = "sk-live-9f8e7d6c5b4a";
pub const PIN: &str = "4821";

pub fn secrets() -> Arc<SecretProvider> {
    let secrets = SecretProvider::new();
    secrets.set("API_TOKEN", TOKEN);
    secrets.set("PIN", PIN);
    Arc::new(secrets)
}

pub fn sandbox(config: SandboxConfig) -> Sandbox {
    Sandbox::new(config, secrets()).expect("sandbox")
}

/// Script directory plus a runner that approves every file written into it.
pub struct ScriptDir {
    pub dir: TempDir,
    pub runner: ScriptRunner,
}

pub async fn script_dir(files: &[(&str, &str)]) -> ScriptDir {
    let dir = TempDir::new().expect("tempdir");
    for (name, body) in files {
        tokio::fs::write(dir.path().join(format!("{name}.rhai")), body)
            .await
            .expect("write script");
    }
    let approval = AllowListApproval::new(files.iter().map(|(name, _)| format!("{name}.rhai")));
    let runner = ScriptRunner::new(
        Arc::new(ScriptLoader::new(dir.path())),
        Arc::new(sandbox(SandboxConfig::default())),
        Arc::new(approval),
    );
    ScriptDir { dir, runner }
}
