#![cfg(target_os = "linux")]

mod common;

use std::time::Duration;

use cc_tunnel_core::prelude::{
    ConfigError, ExecutionMode, LinkEmulation, RunSpec, SchemeRegistry, ShutdownHandle, Side,
};
use cc_tunnel_runner::prelude::{
    configure, launch, run_one, LaunchSettings, RunError, RunOutcome,
};
use common::{wait_until_dead, Harness};
use pretty_assertions::assert_eq;

const SCHEMES: &[&str] = &["forever", "quick", "broken", "stamped"];

fn harness() -> Harness {
    let harness = Harness::new();
    harness.write_registry(SCHEMES);
    harness.write_wrapper("forever", "exec sleep 30", "exec sleep 30");
    harness.write_wrapper("quick", "exit 0", "exit 0");
    harness.write_wrapper("broken", "exec sleep 30", "exit 1");
    let stamp = harness.marker("stamped.sender.started");
    harness.write_wrapper(
        "stamped",
        "exec sleep 30",
        &format!("date +%s%N > \"{}\"; exit 0", stamp.display()),
    );
    harness
}

fn settings() -> LaunchSettings {
    LaunchSettings::new(env!("CARGO_BIN_EXE_cc-tunnel"))
        .with_settle(Duration::from_millis(200))
        .with_kill_grace(Duration::from_millis(500))
}

fn spec(harness: &Harness, registry: &SchemeRegistry, scheme: &str, mode: ExecutionMode, timeout: Duration) -> RunSpec {
    let run_order = registry
        .validate(scheme)
        .unwrap()
        .resolve_run_order()
        .unwrap();
    RunSpec::new(scheme, 1, mode, run_order, timeout, harness.data_dir())
}

#[tokio::test(flavor = "multi_thread")]
async fn time_limit_ends_run_without_error() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = spec(&harness, &registry, "forever", ExecutionMode::Local, Duration::from_secs(1));
    let mut listener = ShutdownHandle::new().new_listener();

    let report = run_one(&spec, &registry, &settings(), &mut listener, false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::TimedOut);
    assert!(report.ended_at > report.started_at);
    assert!(wait_until_dead(harness.pid("forever.receiver.pid")));
    assert!(wait_until_dead(harness.pid("forever.sender.pid")));
}

#[tokio::test(flavor = "multi_thread")]
async fn endpoints_get_matching_port_and_peer() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = spec(&harness, &registry, "quick", ExecutionMode::Local, Duration::from_secs(10));
    let mut listener = ShutdownHandle::new().new_listener();

    let report = run_one(&spec, &registry, &settings(), &mut listener, false)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let receiver = harness.read_marker("quick.receiver.args").unwrap();
    let sender = harness.read_marker("quick.sender.args").unwrap();
    let port = receiver.strip_prefix("receiver ").unwrap();
    assert!(port.parse::<u16>().is_ok());
    assert_eq!(sender, format!("sender 127.0.0.1 {port}"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_endpoint_is_a_process_failure() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = spec(&harness, &registry, "broken", ExecutionMode::Local, Duration::from_secs(10));
    let mut listener = ShutdownHandle::new().new_listener();

    let result = run_one(&spec, &registry, &settings(), &mut listener, false).await;

    match result {
        Err(RunError::ProcessFailure { side, status }) => {
            assert_eq!(side, Side::Sender);
            assert_eq!(status.code(), Some(1));
        }
        other => panic!("Unexpected result: {other:?}"),
    }
    assert!(wait_until_dead(harness.pid("broken.receiver.pid")));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_trace_spawns_nothing() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let fake_mm_link = harness.write_fake_mm_link();
    let missing = harness.path().join("missing.trace");
    let spec = spec(
        &harness,
        &registry,
        "quick",
        ExecutionMode::Emulated(LinkEmulation::new(&missing, &missing)),
        Duration::from_secs(5),
    );
    let mut listener = ShutdownHandle::new().new_listener();

    let result = run_one(
        &spec,
        &registry,
        &settings().with_mm_link(fake_mm_link),
        &mut listener,
        false,
    )
    .await;

    assert!(matches!(
        result,
        Err(RunError::Config(ConfigError::MissingTrace(path))) if path == missing
    ));
    assert_eq!(harness.read_marker("quick.receiver.pid"), None);
    assert_eq!(harness.read_marker("quick.sender.pid"), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_scheme_is_a_config_error() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = RunSpec::new(
        "vegas",
        1,
        ExecutionMode::Local,
        cc_tunnel_core::prelude::RunOrder::new(Side::Receiver),
        Duration::from_secs(5),
        harness.data_dir(),
    );
    let mut listener = ShutdownHandle::new().new_listener();

    let result = run_one(&spec, &registry, &settings(), &mut listener, false).await;
    assert!(matches!(
        result,
        Err(RunError::Config(ConfigError::UnknownScheme(_)))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn interrupted_run_is_cleaned_up() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = spec(&harness, &registry, "forever", ExecutionMode::Local, Duration::from_secs(60));
    let shutdown = ShutdownHandle::new();
    let mut listener = shutdown.new_listener();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        shutdown.shutdown();
    });

    let started = std::time::Instant::now();
    let result = run_one(&spec, &registry, &settings(), &mut listener, false).await;

    assert!(matches!(result, Err(RunError::Interrupted)));
    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(wait_until_dead(harness.pid("forever.receiver.pid")));
    assert!(wait_until_dead(harness.pid("forever.sender.pid")));
}

#[tokio::test(flavor = "multi_thread")]
async fn emulated_endpoint_gets_peer_from_emulator() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let fake_mm_link = harness.write_fake_mm_link();
    let up = harness.write_executable("traces/up.trace", "1\n");
    let down = harness.write_executable("traces/down.trace", "1\n");
    let emulation = LinkEmulation::new(&up, &down).with_prepend("env");
    let spec = spec(
        &harness,
        &registry,
        "quick",
        ExecutionMode::Emulated(emulation),
        Duration::from_secs(10),
    );
    let mut listener = ShutdownHandle::new().new_listener();

    let report = run_one(
        &spec,
        &registry,
        &settings().with_mm_link(&fake_mm_link),
        &mut listener,
        false,
    )
    .await
    .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let receiver = harness.read_marker("quick.receiver.args").unwrap();
    let port = receiver.strip_prefix("receiver ").unwrap();
    assert_eq!(
        harness.read_marker("quick.sender.args").unwrap(),
        format!("sender 100.64.0.1 {port}")
    );

    // Receiver first: the uplink is the data direction.
    let mm_link_args = harness.read_marker("mm-link.args").unwrap();
    let data_dir = harness.data_dir();
    assert!(mm_link_args.starts_with(&format!("{} {}", up.display(), down.display())));
    assert!(mm_link_args.contains(&format!(
        "--uplink-log={}",
        data_dir.join("quick_mm_datalink_run1.log").display()
    )));
    assert!(mm_link_args.contains(&format!(
        "--downlink-log={}",
        data_dir.join("quick_mm_acklink_run1.log").display()
    )));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_starts_after_settle_and_before_second_endpoint() {
    let harness = harness();
    let registry = SchemeRegistry::load(harness.config()).unwrap();
    let spec = spec(&harness, &registry, "stamped", ExecutionMode::Local, Duration::from_secs(10));
    let settings = settings().with_settle(Duration::from_millis(500));

    let before_launch = chrono::Utc::now();
    let resolved = configure(&spec, &registry, &settings).unwrap();
    let launched = launch(resolved).await.unwrap();
    let started_at = launched.started_at();

    let mut sender_started = None;
    for _ in 0..250 {
        sender_started = harness
            .read_marker("stamped.sender.started")
            .and_then(|nanos| nanos.parse::<i64>().ok())
            .map(chrono::DateTime::from_timestamp_nanos);
        if sender_started.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let sender_started = sender_started.expect("sender never started");
    launched.cleanup().await;

    assert!(started_at - before_launch >= chrono::TimeDelta::milliseconds(500));
    assert!(started_at <= sender_started);
}
