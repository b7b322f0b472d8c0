use indexmap::IndexMap;
use scriptcron::sandbox::value::{from_host, to_host};
use scriptcron::sandbox::{SandboxConfig, Value};
use tokio_util::sync::CancellationToken;

use crate::harness;

fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<IndexMap<_, _>>(),
    )
}

#[test]
fn bridge_preserves_value_and_shape() {
    // Keys already sorted: maps come back from the interpreter key-ordered.
    let samples = vec![
        Value::Null,
        Value::Bool(false),
        Value::Int(i64::MIN),
        Value::Float(-0.5),
        Value::from(""),
        Value::from("ünïcødé"),
        Value::List(vec![]),
        Value::List(vec![Value::Int(1), Value::Null, Value::from("x")]),
        map(vec![]),
        map(vec![
            ("a", Value::List(vec![map(vec![("deep", Value::Bool(true))])])),
            ("b", Value::Float(1.5)),
            ("c", Value::Null),
        ]),
    ];
    for value in samples {
        assert_eq!(to_host(from_host(&value)), value);
    }
}

#[tokio::test]
async fn script_built_values_reach_the_host_intact() {
    let source = r#"
        let result = #{
            name: "report",
            count: 3,
            ratio: 0.25,
            ok: true,
            nothing: (),
            tags: ["a", -1, ()],
        };
    "#;
    let out = harness::sandbox(SandboxConfig::default())
        .execute(&CancellationToken::new(), "shape", source)
        .await;
    assert_eq!(
        out.value,
        Some(map(vec![
            ("count", Value::Int(3)),
            ("name", Value::from("report")),
            ("nothing", Value::Null),
            ("ok", Value::Bool(true)),
            ("ratio", Value::Float(0.25)),
            ("tags", Value::List(vec![Value::from("a"), Value::Int(-1), Value::Null])),
        ]))
    );
}

#[tokio::test]
async fn host_args_reach_script_functions_intact() {
    let source = r"fn echo(x) { x }";
    let arg = map(vec![("k", Value::List(vec![Value::Float(2.0), Value::Bool(true)]))]);
    let out = harness::sandbox(SandboxConfig::default())
        .execute_function(&CancellationToken::new(), "echo", source, "echo", vec![arg.clone()])
        .await;
    assert_eq!(out.value, Some(arg));
}
