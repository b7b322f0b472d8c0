use scriptcron::sandbox::Value;
use tokio_util::sync::CancellationToken;

use crate::harness::{self, PIN, TOKEN};

fn occurrences(result: &scriptcron::ExecutionResult, needle: &str) -> usize {
    let json = serde_json::to_string(result).unwrap();
    json.matches(needle).count()
}

#[tokio::test]
async fn secrets_are_redacted_everywhere_in_values() {
    let dir = harness::script_dir(&[(
        "leak",
        r#"
            let token = secrets::get("API_TOKEN");
            let result = #{
                plain: token,
                nested: [#{ header: "Bearer " + token }],
            };
            result[token] = "as key";
        "#,
    )])
    .await;
    let out = dir
        .runner
        .run(&CancellationToken::new(), "leak", None, Vec::new())
        .await
        .unwrap();
    assert_eq!(occurrences(&out, TOKEN), 0);
    assert!(occurrences(&out, "[REDACTED:API_TOKEN]") >= 3);
}

#[tokio::test]
async fn secrets_in_errors_are_redacted() {
    let dir = harness::script_dir(&[("fail", r#"throw "auth failed for " + secrets::get("API_TOKEN");"#)]).await;
    let out = dir
        .runner
        .run(&CancellationToken::new(), "fail", None, Vec::new())
        .await
        .unwrap();
    let error = out.error.clone().unwrap();
    assert!(!error.contains(TOKEN));
    assert!(error.contains("[REDACTED:API_TOKEN]"));
}

#[tokio::test]
async fn short_secrets_are_left_alone() {
    let dir = harness::script_dir(&[("pin", r#"let result = "pin is " + secrets::get("PIN");"#)]).await;
    let out = dir
        .runner
        .run(&CancellationToken::new(), "pin", None, Vec::new())
        .await
        .unwrap();
    assert_eq!(out.value, Some(Value::from(format!("pin is {PIN}"))));
}

#[tokio::test]
async fn sanitizing_twice_changes_nothing() {
    let secrets = harness::secrets();
    let dir = harness::script_dir(&[("echo", r#"let result = [secrets::get("API_TOKEN"), "ok"];"#)]).await;
    let once = dir
        .runner
        .run(&CancellationToken::new(), "echo", None, Vec::new())
        .await
        .unwrap();
    let twice = secrets.sanitize_result(once.clone());
    assert_eq!(twice, once);
}
