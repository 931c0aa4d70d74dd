//! End-to-end dispatch scenarios with a recording fake runner and a scripted
//! native API. No real processes are spawned.

use luminous_common::executor::{Backend, NativeApiExecutor, SubprocessExecutor};
use luminous_common::native::{FakeNativeApi, Generation};
use luminous_common::runner::{FakeResponse, FakeRunner};
use luminous_common::{intent_parser, Dispatcher, ProgressBus, RequestContext, Settings};
use luminous_shared::{IntentKind, IntentType, ProgressEvent, RebuildMode, Response};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SEARCH_JSON: &str = r#"{
  "legacyPackages.x86_64-linux.vim": {"pname": "vim", "version": "9.1.0", "description": "The most popular clone of the VI editor"},
  "legacyPackages.x86_64-linux.gedit": {"pname": "gedit", "version": "46.2", "description": "Former GNOME text editor"}
}"#;

fn subprocess_dispatcher(runner: Arc<FakeRunner>) -> Dispatcher {
    Dispatcher::new(
        Arc::new(SubprocessExecutor::new(runner)),
        ProgressBus::default(),
        Settings::default(),
    )
}

fn dry() -> RequestContext {
    RequestContext::default().with_dry_run(true)
}

fn live() -> RequestContext {
    RequestContext::default().with_dry_run(false)
}

fn generation(number: u32, current: bool) -> Generation {
    Generation {
        number,
        date: Some("2024-06-01 12:00:00".to_string()),
        current,
        nixos_version: Some("24.05".to_string()),
        kernel_version: None,
    }
}

#[tokio::test]
async fn scenario_a_dry_run_install() {
    let runner = Arc::new(FakeRunner::new());
    let dispatcher = subprocess_dispatcher(runner.clone());

    let result = dispatcher.process(&intent_parser::parse("install firefox"), &dry()).await;

    assert!(result.success);
    assert_eq!(result.message, "Would install: firefox");
    assert_eq!(result.packages(), vec!["firefox"]);
    assert_eq!(result.commands, vec!["nix profile install nixpkgs#firefox"]);
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn scenario_b_search_text_editors() {
    let runner = Arc::new(FakeRunner::new().respond("nix", FakeResponse::ok(SEARCH_JSON)));
    let dispatcher = subprocess_dispatcher(runner.clone());

    let intent = intent_parser::parse("search for text editors");
    assert_eq!(
        intent.kind,
        IntentKind::Search {
            query: "text editors".to_string()
        }
    );
    let result = dispatcher.process(&intent, &live()).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.packages().contains(&"vim"));
    assert!(result.message.contains("vim (9.1.0)"));
    assert_eq!(runner.calls(), vec!["nix search nixpkgs text editors --json"]);
}

#[tokio::test]
async fn search_with_large_json_output_succeeds() {
    let mut entries = Vec::new();
    for i in 0..3000 {
        entries.push(format!(
            r#""legacyPackages.x86_64-linux.python3Packages.pkg{i}": {{"pname": "pkg{i}", "version": "1.0.{i}", "description": "Python module number {i} for testing"}}"#
        ));
    }
    let json = format!("{{{}}}\n", entries.join(","));
    assert!(json.len() > 64 * 1024);

    let runner = Arc::new(FakeRunner::new().respond("nix", FakeResponse::ok(&json)));
    let dispatcher = subprocess_dispatcher(runner);

    let result = dispatcher
        .process(&intent_parser::parse("search python"), &live())
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data["packages"].as_array().map(Vec::len), Some(3000));
}

#[tokio::test]
async fn scenario_c_rollback_permission_denied() {
    let runner = Arc::new(FakeRunner::new().respond(
        "nixos-rebuild",
        FakeResponse::fail(1, "error: opening lock file '/nix/var/nix/profiles/system.lock': Permission denied"),
    ));
    let api = Arc::new(FakeNativeApi::failing("switch-to-configuration is unavailable"));
    let dispatcher = Dispatcher::new(
        Arc::new(NativeApiExecutor::new(api.clone(), runner.clone())),
        ProgressBus::default(),
        Settings::default(),
    );

    let result = dispatcher.process(&intent_parser::parse("rollback"), &live()).await;

    assert!(!result.success);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.to_lowercase().contains("permission denied"), "{}", error);
    assert!(result
        .suggestions
        .iter()
        .any(|s| s.contains("elevated privileges")));
    assert_eq!(api.calls(), vec!["rollback"]);
    assert_eq!(runner.calls(), vec!["nixos-rebuild switch --rollback"]);
}

#[tokio::test]
async fn scenario_d_concurrent_dry_runs() {
    let runner = Arc::new(FakeRunner::new());
    let dispatcher = Arc::new(subprocess_dispatcher(runner.clone()));

    let mut handles = Vec::new();
    for package in ["firefox", "vim", "htop", "git"] {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            let intent = intent_parser::parse(&format!("install {}", package));
            (package, dispatcher.process(&intent, &dry()).await)
        }));
    }

    for handle in handles {
        let (package, result) = handle.await.unwrap();
        assert!(result.success);
        assert_eq!(result.message, format!("Would install: {}", package));
    }
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn dry_run_never_spawns_for_any_intent() {
    let runner = Arc::new(FakeRunner::new());
    let api = Arc::new(FakeNativeApi::new(vec![generation(1, true)]));
    let dispatcher = Dispatcher::new(
        Arc::new(NativeApiExecutor::new(api.clone(), runner.clone())),
        ProgressBus::default(),
        Settings::default(),
    );

    let queries = [
        "install firefox",
        "remove vim",
        "search for browsers",
        "update my system",
        "rollback",
        "switch to generation 3",
        "what's installed",
        "list generations",
        "rebuild boot",
        "garbage collect",
        "system status",
        "what is a flake",
        "help",
        "gibberish words here",
    ];
    for query in queries {
        dispatcher.process(&intent_parser::parse(query), &dry()).await;
    }
    assert_eq!(runner.call_count(), 0);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn native_success_skips_subprocess() {
    let runner = Arc::new(FakeRunner::new());
    let api = Arc::new(FakeNativeApi::new(vec![generation(1, false), generation(2, true)]));
    let dispatcher = Dispatcher::new(
        Arc::new(NativeApiExecutor::new(api.clone(), runner.clone())),
        ProgressBus::default(),
        Settings::default(),
    );

    let result = dispatcher
        .process(&intent_parser::parse("list generations"), &live())
        .await;
    assert!(result.success);
    assert_eq!(result.data["backend"], Backend::Native.as_str());
    assert_eq!(result.data["current_generation"], 2);
    assert_eq!(runner.call_count(), 0);

    let result = dispatcher
        .process(&intent_parser::parse("rebuild test"), &live())
        .await;
    assert!(result.success);
    assert_eq!(api.calls()[1..], ["build:test".to_string(), "switch:test".to_string()]);
}

#[tokio::test]
async fn native_failure_falls_back_to_subprocess() {
    let runner = Arc::new(FakeRunner::new());
    let api = Arc::new(FakeNativeApi::failing("not supported"));
    let dispatcher = Dispatcher::new(
        Arc::new(NativeApiExecutor::new(api, runner.clone())),
        ProgressBus::default(),
        Settings::default(),
    );

    let intent = intent_parser::parse("nixos-rebuild boot");
    assert_eq!(
        intent.kind,
        IntentKind::Rebuild {
            mode: RebuildMode::Boot
        }
    );
    let result = dispatcher.process(&intent, &live()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data["backend"], "subprocess");
    assert_eq!(runner.calls(), vec!["nixos-rebuild boot"]);
}

#[tokio::test]
async fn mutating_operations_are_serialized() {
    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_millis(50)));
    let dispatcher = Arc::new(subprocess_dispatcher(runner.clone()));

    let mut handles = Vec::new();
    for package in ["firefox", "vim", "htop"] {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            let intent = intent_parser::parse(&format!("install {}", package));
            dispatcher.process(&intent, &live()).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    assert_eq!(runner.call_count(), 3);
    assert_eq!(runner.max_in_flight(), 1);
}

#[tokio::test]
async fn read_only_operations_run_concurrently() {
    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_millis(100)));
    let dispatcher = Arc::new(subprocess_dispatcher(runner.clone()));

    let a = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .process(&intent_parser::parse("search for browsers"), &live())
                .await
        })
    };
    let b = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .process(&intent_parser::parse("search for terminals"), &live())
                .await
        })
    };
    a.await.unwrap();
    b.await.unwrap();
    assert_eq!(runner.max_in_flight(), 2);
}

#[tokio::test]
async fn timeout_becomes_failure_with_hint() {
    let runner = Arc::new(FakeRunner::new().respond("nix-collect-garbage", FakeResponse::Timeout));
    let dispatcher = subprocess_dispatcher(runner);

    let result = dispatcher
        .process(&intent_parser::parse("garbage collect"), &live())
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("timed out"));
    assert!(result.suggestions.iter().any(|s| s.contains("[timeouts]")));
}

#[tokio::test]
async fn progress_callback_sees_every_checkpoint() {
    let runner = Arc::new(FakeRunner::new());
    let dispatcher = subprocess_dispatcher(runner);
    let seen: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    dispatcher
        .bus()
        .register_callback(move |event| sink.lock().unwrap().push(event.clone()));

    dispatcher
        .process(&intent_parser::parse("remove vim"), &live())
        .await;

    let seen = seen.lock().unwrap();
    let percents: Vec<f32> = seen.iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![0.0, 20.0, 50.0, 80.0, 100.0]);
    assert!(seen.windows(2).all(|w| w[0].operation_id == w[1].operation_id));
}

#[tokio::test]
async fn response_round_trip_keeps_outcome() {
    let runner = Arc::new(FakeRunner::new().respond("nix", FakeResponse::fail(1, "error: unable to download")));
    let dispatcher = subprocess_dispatcher(runner);

    let result = dispatcher
        .process(&intent_parser::parse("search for browsers"), &live())
        .await;
    let back = Response::from_result(&result).into_result();
    assert_eq!(back.success, result.success);
    assert_eq!(back.message, result.message);
    assert_eq!(back.error, result.error);

    let response = dispatcher
        .respond(&intent_parser::parse("search for browsers"), &live())
        .await;
    assert_eq!(response.intent, Some(IntentType::Search));
    assert!(response.suggestions.iter().any(|s| s.contains("internet connection")));
}
