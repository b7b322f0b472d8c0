use scriptcron::sandbox::{SandboxConfig, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::harness;

#[tokio::test]
async fn division_by_zero_is_an_error_without_value() {
    let out = harness::sandbox(SandboxConfig::default())
        .execute(&CancellationToken::new(), "div", "let result = 1 / 0;")
        .await;
    assert!(out.value.is_none());
    assert!(!out.error.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn unbounded_loop_stops_near_the_deadline() {
    let config = SandboxConfig {
        max_execution: Duration::from_millis(100),
        ..SandboxConfig::default()
    };
    let started = Instant::now();
    let out = harness::sandbox(config)
        .execute(&CancellationToken::new(), "spin", "let x = 0; loop { x += 1; }")
        .await;
    let elapsed = started.elapsed();
    assert!(out.value.is_none());
    assert!(!out.error.unwrap_or_default().is_empty());
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[tokio::test]
async fn file_urls_are_rejected_before_any_io() {
    let out = harness::sandbox(SandboxConfig::default())
        .execute(
            &CancellationToken::new(),
            "fetch",
            r#"let result = http::get("file:///etc/passwd");"#,
        )
        .await;
    let error = out.error.unwrap_or_default();
    assert!(error.contains("unsupported URL scheme `file`"), "{error}");
}

#[tokio::test]
async fn cancelling_the_context_stops_the_script() {
    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    let out = harness::sandbox(SandboxConfig::default())
        .execute(&ctx, "spin", "let x = 0; loop { x += 1; }")
        .await;
    assert_eq!(out.error.as_deref(), Some("execution cancelled"));
}

#[tokio::test]
async fn no_ambient_capabilities_are_exposed() {
    let sandbox = harness::sandbox(SandboxConfig::default());
    for source in [
        r#"let result = eval("1");"#,
        r#"import "fs" as fs; let result = 1;"#,
        r#"let result = fs::read("/etc/passwd");"#,
        r#"let result = env::get("HOME");"#,
    ] {
        let out = sandbox.execute(&CancellationToken::new(), "probe", source).await;
        assert!(out.value.is_none(), "{source} produced {:?}", out.value);
        assert!(out.error.is_some(), "{source}");
    }
}

#[tokio::test]
async fn executions_do_not_share_state() {
    let sandbox = harness::sandbox(SandboxConfig::default());
    let first = sandbox
        .execute(&CancellationToken::new(), "a", "let counter = 41; let result = counter + 1;")
        .await;
    assert_eq!(first.value, Some(Value::Int(42)));

    let second = sandbox
        .execute(&CancellationToken::new(), "b", "let result = counter;")
        .await;
    assert!(second.error.is_some());
}
