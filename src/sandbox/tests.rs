use super::*;
use std::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sandbox_with(config: SandboxConfig) -> Sandbox {
    let secrets = SecretProvider::new();
    secrets.set("API_TOKEN", "tok_live_0123456789");
    Sandbox::new(config, Arc::new(secrets)).unwrap()
}

fn sandbox() -> Sandbox {
    sandbox_with(SandboxConfig::default())
}

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect(),
    )
}

// ── Result derivation ──────────────────────────────────────

#[tokio::test]
async fn result_variable_is_the_value() {
    let out = sandbox()
        .execute(&CancellationToken::new(), "hello", r#"let result = "hello from script";"#)
        .await;
    assert_eq!(out.value, Some(Value::from("hello from script")));
    assert!(out.error.is_none());
    assert_eq!(out.output_text(), "hello from script");
}

#[tokio::test]
async fn main_takes_precedence_over_result() {
    let source = r"
        let result = 1;
        fn main() { 40 + 2 }
    ";
    let out = sandbox()
        .execute(&CancellationToken::new(), "main", source)
        .await;
    assert_eq!(out.value, Some(Value::Int(42)));
}

#[tokio::test]
async fn without_main_or_result_public_bindings_are_exported() {
    let source = r"
        let Total = 3;
        const LIMIT = 10;
        let helper = 99;
        let _internal = true;
    ";
    let out = sandbox()
        .execute(&CancellationToken::new(), "lib", source)
        .await;
    assert_eq!(
        out.value,
        Some(map(&[
            ("Total", Value::Int(3)),
            ("LIMIT", Value::Int(10)),
            ("_internal", Value::Bool(true)),
        ]))
    );
}

#[tokio::test]
async fn execute_function_passes_positional_args() {
    let source = r#"
        let unused = "top-level code runs first";
        fn greet(name, times) { "hi " + name + times }
    "#;
    let out = sandbox()
        .execute_function(
            &CancellationToken::new(),
            "greet",
            source,
            "greet",
            vec![Value::from("ada"), Value::Int(2)],
        )
        .await;
    assert_eq!(out.error, None);
    assert_eq!(out.value, Some(Value::from("hi ada2")));
}

#[tokio::test]
async fn map_results_cross_the_bridge() {
    let out = sandbox()
        .execute(
            &CancellationToken::new(),
            "map",
            r#"let result = #{ name: "x", tags: [1, 2.5, ()], ok: true };"#,
        )
        .await;
    assert_eq!(
        out.value,
        Some(map(&[
            ("name", Value::from("x")),
            (
                "tags",
                Value::List(vec![Value::Int(1), Value::Float(2.5), Value::Null])
            ),
            ("ok", Value::Bool(true)),
        ]))
    );
}

// ── Failure modes ──────────────────────────────────────────

#[tokio::test]
async fn division_by_zero_is_an_error_without_value() {
    let out = sandbox()
        .execute(&CancellationToken::new(), "div", "let result = 1 / 0;")
        .await;
    assert!(out.value.is_none());
    let error = out.error.unwrap();
    assert!(error.contains("runtime error in div"), "{error}");
}

#[tokio::test]
async fn compile_errors_are_reported() {
    let out = sandbox()
        .execute(&CancellationToken::new(), "broken", "let = ;")
        .await;
    assert!(out.error.unwrap().starts_with("compile error in broken"));
}

#[tokio::test]
async fn thrown_errors_are_reported() {
    let out = sandbox()
        .execute(&CancellationToken::new(), "throws", r#"throw "boom";"#)
        .await;
    assert!(out.error.unwrap().contains("boom"));
}

#[tokio::test]
async fn missing_and_non_function_targets() {
    let sandbox = sandbox();
    let ctx = CancellationToken::new();
    let source = "let answer = 42; fn real() { 1 }";

    let out = sandbox
        .execute_function(&ctx, "t", source, "nope", Vec::new())
        .await;
    assert_eq!(out.error.as_deref(), Some("function `nope` not found"));

    let out = sandbox
        .execute_function(&ctx, "t", source, "answer", Vec::new())
        .await;
    assert_eq!(out.error.as_deref(), Some("`answer` is not a function"));
}

#[tokio::test]
async fn eval_and_import_are_unavailable() {
    let sandbox = sandbox();
    let ctx = CancellationToken::new();
    for source in [r#"let result = eval("1 + 1");"#, r#"import "os" as os;"#] {
        let out = sandbox.execute(&ctx, "escape", source).await;
        assert!(out.error.is_some(), "{source} should fail");
    }
}

#[tokio::test]
async fn unbounded_loop_times_out() {
    let sandbox = sandbox_with(SandboxConfig {
        max_execution: Duration::from_millis(100),
        ..SandboxConfig::default()
    });
    let started = Instant::now();
    let out = sandbox
        .execute(&CancellationToken::new(), "spin", "let x = 0; loop { x += 1; }")
        .await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(out.error.as_deref(), Some("execution timed out after 100ms"));
    assert!(out.duration >= Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread")]
async fn caller_cancellation_wakes_sleeping_script() {
    let sandbox = Arc::new(sandbox());
    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let out = sandbox
        .execute(&ctx, "nap", "time::sleep(5); let result = 1;")
        .await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(out.error.as_deref(), Some("execution cancelled"));
}

// ── Capabilities ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn file_urls_are_rejected() {
    let out = sandbox()
        .execute(
            &CancellationToken::new(),
            "ssrf",
            r#"let result = http::get("file:///etc/passwd");"#,
        )
        .await;
    assert!(out.value.is_none());
    assert!(out.error.unwrap().contains("unsupported URL scheme `file`"));
}

#[tokio::test(flavor = "multi_thread")]
async fn http_get_returns_status_body_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"up":true}"#)
                .insert_header("x-build", "7"),
        )
        .mount(&server)
        .await;

    let source = format!(
        r#"
        let resp = http::get("{}/status");
        let result = #{{ status: resp.status, up: json::decode(resp.body).up, build: resp.headers["x-build"] }};
        "#,
        server.uri()
    );
    let out = sandbox()
        .execute(&CancellationToken::new(), "probe", &source)
        .await;
    assert_eq!(
        out.value,
        Some(map(&[
            ("build", Value::from("7")),
            ("status", Value::Int(200)),
            ("up", Value::Bool(true)),
        ])),
        "{:?}",
        out.error
    );
}

#[tokio::test]
async fn secrets_module_reads_values_and_lists_names() {
    let out = sandbox()
        .execute(
            &CancellationToken::new(),
            "secrets",
            r#"let result = [secrets::get("API_TOKEN"), secrets::get("NOPE"), secrets::list()];"#,
        )
        .await;
    assert_eq!(
        out.value,
        Some(Value::List(vec![
            Value::from("tok_live_0123456789"),
            Value::Null,
            Value::List(vec![Value::from("API_TOKEN")]),
        ]))
    );
}

#[tokio::test]
async fn json_time_and_fmt_are_available() {
    let source = r#"
        let encoded = json::encode(#{ a: 1 });
        let stamp = time::now();
        let result = [encoded, fmt::sprintf("%05.1f|%s", [3.14159, "x"]), stamp.len() > 0, time::unix() > 0];
    "#;
    let out = sandbox()
        .execute(&CancellationToken::new(), "caps", source)
        .await;
    assert_eq!(
        out.value,
        Some(Value::List(vec![
            Value::from(r#"{"a":1}"#),
            Value::from("003.1|x"),
            Value::Bool(true),
            Value::Bool(true),
        ]))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sleep_is_capped() {
    let sandbox = sandbox_with(SandboxConfig {
        max_execution: Duration::from_secs(20),
        ..SandboxConfig::default()
    });
    let started = Instant::now();
    let out = sandbox
        .execute(&CancellationToken::new(), "nap", "time::sleep(-3); time::sleep(0.01); let result = 1;")
        .await;
    assert_eq!(out.value, Some(Value::Int(1)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn long_sleep_stops_at_five_seconds() {
    let sandbox = sandbox_with(SandboxConfig {
        max_execution: Duration::from_secs(10),
        ..SandboxConfig::default()
    });
    let started = Instant::now();
    let out = sandbox
        .execute(&CancellationToken::new(), "nap", "time::sleep(3600); let result = 1;")
        .await;
    let elapsed = started.elapsed();
    assert_eq!(out.error, None);
    assert_eq!(out.value, Some(Value::Int(1)));
    assert!(elapsed >= Duration::from_millis(4500), "woke too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "sleep was not capped: {elapsed:?}");
}

// ── Host functions ─────────────────────────────────────────

#[tokio::test]
async fn host_functions_are_callable() {
    let sandbox = sandbox();
    sandbox
        .add_function(
            "sum_all",
            Arc::new(|args: &[Value]| {
                args.iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(*i),
                        other => Err(format!("expected int, got {}", other.type_name())),
                    })
                    .sum::<Result<i64, String>>()
                    .map(Value::Int)
            }),
        )
        .unwrap();

    let ctx = CancellationToken::new();
    let out = sandbox
        .execute(&ctx, "sum", "let result = [sum_all(), sum_all(1, 2, 3, 4, 5, 6, 7, 8)];")
        .await;
    assert_eq!(
        out.value,
        Some(Value::List(vec![Value::Int(0), Value::Int(36)]))
    );

    let out = sandbox
        .execute(&ctx, "sum", r#"let result = sum_all(1, "two");"#)
        .await;
    assert!(out.error.unwrap().contains("expected int, got string"));
}

#[test]
fn host_function_names_must_be_identifiers() {
    let sandbox = sandbox();
    let noop: HostFunction = Arc::new(|_: &[Value]| -> Result<Value, String> { Ok(Value::Null) });
    for bad in ["", "1abc", "with space", "http", "main"] {
        assert!(matches!(
            sandbox.add_function(bad, Arc::clone(&noop)),
            Err(SandboxError::InvalidFunctionName(_))
        ));
    }
}

#[tokio::test]
async fn panicking_host_function_is_reported_as_aborted() {
    let sandbox = sandbox();
    sandbox
        .add_function(
            "explode",
            Arc::new(|_: &[Value]| -> Result<Value, String> { panic!("kaboom") }),
        )
        .unwrap();
    let out = sandbox
        .execute(&CancellationToken::new(), "boom", "let result = explode();")
        .await;
    assert_eq!(out.error.as_deref(), Some("execution aborted: kaboom"));
}

#[test]
fn execution_result_serializes_duration_in_millis() {
    let result = ExecutionResult::success(Value::from("ok"), Duration::from_millis(12));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json, serde_json::json!({ "value": "ok", "duration_ms": 12 }));
}
