use engine::{EngineHandle, ExecutionEngine, InvocationOutcome, InvocationRequest, ResponseEnvelope};
use executor::{Environment, Resolver, ScriptLoader};
use serde_json::json;

fn script_engine(dir: &std::path::Path) -> ExecutionEngine {
    let loader = ScriptLoader::new().expect("script runtime");
    ExecutionEngine::with_env(Resolver::new(dir, Box::new(loader)), Environment::default())
}

#[test]
fn script_invocation_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = script_engine(dir.path());
    let code = "export function handler(event, context) { return { ok: true }; }";

    let outcome = engine.invoke(InvocationRequest::new(code, "function.handler"));
    assert_eq!(outcome, InvocationOutcome::Ok(json!({"ok": true})));
    assert_eq!(
        serde_json::to_value(outcome.into_response()).unwrap(),
        json!({"statusCode": 200, "body": {"ok": true}})
    );
}

#[test]
fn async_script_matches_sync_script() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = script_engine(dir.path());

    let suspending = engine.invoke(InvocationRequest::new(
        "export async function handler() { await Promise.resolve(); return 42; }",
        "function.handler",
    ));
    let immediate = engine.invoke(InvocationRequest::new(
        "export function handler() { return 42; }",
        "function.handler",
    ));
    assert_eq!(suspending, InvocationOutcome::Ok(json!(42)));
    assert_eq!(suspending, immediate);
}

#[test]
fn script_failure_becomes_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = script_engine(dir.path());
    let outcome = engine.invoke(InvocationRequest::new(
        "export async function handler() { await null; throw new Error('boom'); }",
        "function.handler",
    ));

    match outcome.into_response() {
        ResponseEnvelope::Failure {
            status_code,
            error,
            stack,
        } => {
            assert_eq!(status_code, 500);
            assert_eq!(error, "boom");
            assert!(!stack.is_empty());
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
}

#[test]
fn environment_is_visible_during_module_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = script_engine(dir.path());
    let code = r#"
        const stage = process.env.STAGE;
        export function handler() { return { stage, now: process.env.STAGE }; }
    "#;

    let outcome =
        engine.invoke(InvocationRequest::new(code, "function.handler").with_env("STAGE", "prod"));
    assert_eq!(outcome, InvocationOutcome::Ok(json!({"stage": "prod", "now": "prod"})));
}

#[test]
fn unchanged_script_is_not_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = script_engine(dir.path());
    let code = "let n = 0; export function handler() { n += 1; return n; }";

    engine.invoke(InvocationRequest::new(code, "function.handler"));
    let outcome = engine.invoke(InvocationRequest::new(code, "function.handler"));
    assert_eq!(outcome, InvocationOutcome::Ok(json!(2)));
    assert_eq!(engine.resolver().resolutions(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("function.js")).unwrap(),
        code
    );
}

#[tokio::test]
async fn worker_serves_script_engine() {
    let dir = tempfile::tempdir().unwrap();
    let function_dir = dir.path().to_path_buf();
    let handle = EngineHandle::spawn(move || {
        let loader = ScriptLoader::new()?;
        Ok(ExecutionEngine::with_env(
            Resolver::new(function_dir, Box::new(loader)),
            Environment::default(),
        ))
    })
    .await
    .unwrap();

    let outcome = handle
        .invoke(
            InvocationRequest::new(
                "export async function handler(event) { return event.a + event.b; }",
                "function.handler",
            )
            .with_event(json!({"a": 2, "b": 3})),
        )
        .await
        .unwrap();
    assert_eq!(outcome, InvocationOutcome::Ok(json!(5)));
}
