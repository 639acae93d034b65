#![cfg(unix)]
//! Runner tests against host binaries loaded as in-memory sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mozjpeg_runner::{BinaryRegistry, BinarySource, ProcessRunner, RunStatus, ToolError};

fn registry(name: &str, path: &str) -> Arc<BinaryRegistry> {
    let bytes = std::fs::read(path).unwrap();
    Arc::new(BinaryRegistry::new(name).with_source(BinarySource::new(bytes)))
}

fn sh() -> Arc<BinaryRegistry> {
    registry("sh", "/bin/sh")
}

fn cat() -> Arc<BinaryRegistry> {
    registry("cat", "/bin/cat")
}

#[tokio::test]
async fn pipes_stdin_through_cat() {
    let mut runner = ProcessRunner::new(cat());
    runner.set_stdin(&b"hello from memory"[..]);

    let result = runner.run(Vec::<String>::new()).await.unwrap();
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.stdout, b"hello from memory");
    assert_eq!(runner.stdout(), b"hello from memory");
}

#[tokio::test]
async fn no_stdin_means_empty_input() {
    let mut runner = ProcessRunner::new(cat());
    let result = runner.run(Vec::<String>::new()).await.unwrap();
    assert!(result.success());
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn non_zero_exit_is_a_result_and_check_turns_it_into_an_error() {
    let mut runner = ProcessRunner::new(sh());
    let result = runner.run(["-c", "echo oops >&2; exit 3"]).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed { code: Some(3) });
    assert_eq!(result.stderr_lossy(), "oops\n");
    match result.check() {
        Err(ToolError::NonZeroExit { code, stderr }) => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "oops");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn combined_output_is_stdout_then_stderr() {
    let mut runner = ProcessRunner::new(sh());
    let result = runner.run(["-c", "echo err >&2; echo out"]).await.unwrap();
    assert_eq!(result.combined_output(), b"out\nerr\n");
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let mut runner = ProcessRunner::new(sh());
    runner.set_timeout(Duration::from_millis(200));
    let handle = runner.kill_handle();

    let started = Instant::now();
    let status = runner.run(["-c", "exec sleep 5"]).await.unwrap().status.clone();

    assert!(matches!(status, RunStatus::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(matches!(runner.last_result().unwrap().check(), Err(ToolError::Timeout { .. })));
    // Nothing left to kill once the run has returned.
    assert!(!handle.kill());
    assert!(!runner.is_running());
}

#[tokio::test]
async fn kill_from_another_task() {
    let mut runner = ProcessRunner::new(sh());
    let handle = runner.kill_handle();

    let killer = tokio::spawn(async move {
        while !handle.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.pid().is_some());
        handle.kill()
    });

    let started = Instant::now();
    let status = runner.run(["-c", "exec sleep 5"]).await.unwrap().status.clone();

    assert!(killer.await.unwrap());
    assert_eq!(status, RunStatus::Killed);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(matches!(runner.last_result().unwrap().check(), Err(ToolError::Killed)));
}

#[tokio::test]
async fn kill_when_idle_is_a_no_op() {
    let runner = ProcessRunner::new(sh());
    assert!(!runner.kill());
    assert!(runner.kill_handle().pid().is_none());
}

#[tokio::test]
async fn environment_override_replaces_inherited_environment() {
    let mut runner = ProcessRunner::new(sh());
    runner.set_env([("FOO", "bar")]);

    let result = runner
        .run(["-c", r#"printf '%s|%s' "$FOO" "${HOME:-unset}""#])
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.stdout, b"bar|unset");
}

#[tokio::test]
async fn stdout_sink_receives_output() {
    let mut out = Vec::new();
    {
        let mut runner = ProcessRunner::new(cat());
        runner.set_stdin(&b"streamed"[..]).set_stdout_sink(&mut out);
        let result = runner.run(Vec::<String>::new()).await.unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }
    assert_eq!(out, b"streamed");
}

#[tokio::test]
async fn stdout_sink_serves_a_single_run() {
    let mut out = Vec::new();
    {
        let mut runner = ProcessRunner::new(cat());
        runner.set_stdin(&b"first"[..]).set_stdout_sink(&mut out);
        runner.run(Vec::<String>::new()).await.unwrap();

        // The sink was consumed, so the next run captures stdout again.
        runner.set_stdin(&b"second"[..]);
        let result = runner.run(Vec::<String>::new()).await.unwrap();
        assert_eq!(result.stdout, b"second");
    }
    assert_eq!(out, b"first");
}

#[tokio::test]
async fn large_stdout_and_stderr_do_not_deadlock() {
    let script = "i=0; while [ $i -lt 20000 ]; do \
                  echo xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx; \
                  echo yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy >&2; \
                  i=$((i+1)); done";

    let mut runner = ProcessRunner::new(sh());
    runner.set_timeout(Duration::from_secs(60));
    let result = runner.run(["-c", script]).await.unwrap();

    assert!(result.success());
    assert_eq!(result.stdout.len(), 20000 * 40);
    assert_eq!(result.stderr.len(), 20000 * 40);
}

#[tokio::test]
async fn large_stdin_is_fed_while_stdout_drains() {
    let input = vec![b'z'; 4 * 1024 * 1024];
    let mut runner = ProcessRunner::new(cat());
    runner.set_stdin(&input[..]);

    let result = runner.run(Vec::<String>::new()).await.unwrap();
    assert!(result.success());
    assert_eq!(result.stdout.len(), input.len());
}

#[tokio::test]
async fn configured_args_come_before_extra_args() {
    let mut runner = ProcessRunner::new(sh());
    runner.arg("-c", [r#"printf '%s ' "$0" "$@""#]);

    let result = runner.run(["first", "second"]).await.unwrap();
    assert_eq!(result.stdout, b"first second ");
}

#[tokio::test]
async fn reset_clears_arguments_and_streams_but_keeps_timeout() {
    let mut runner = ProcessRunner::new(cat());
    runner
        .set_timeout(Duration::from_secs(5))
        .flag("-u")
        .set_stdin(&b"ignored"[..])
        .set_env([("A", "B")]);
    runner.run(Vec::<String>::new()).await.unwrap();

    runner.reset();
    assert!(runner.arguments().is_empty());
    assert!(runner.env().is_none());
    assert!(runner.last_result().is_none());
    assert_eq!(runner.timeout(), Some(Duration::from_secs(5)));

    // stdin was cleared, so cat sees an empty input
    let result = runner.run(Vec::<String>::new()).await.unwrap();
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn falls_back_to_a_generic_source() {
    let bytes = std::fs::read("/bin/cat").unwrap();
    let registry = BinaryRegistry::new("cat")
        .with_source(BinarySource::new(b"not a binary".to_vec()).os("plan9"))
        .with_source(BinarySource::new(bytes));

    let mut runner = ProcessRunner::new(Arc::new(registry));
    runner.set_stdin(&b"fallback"[..]);
    let result = runner.run(Vec::<String>::new()).await.unwrap();
    assert_eq!(result.stdout, b"fallback");
}

#[tokio::test]
async fn no_matching_source_is_unsupported_platform() {
    let registry = BinaryRegistry::new("cat").with_source(BinarySource::new(b"x".to_vec()).os("plan9"));
    let mut runner = ProcessRunner::new(Arc::new(registry));

    let err = runner.run(Vec::<String>::new()).await.unwrap_err();
    assert!(matches!(err, ToolError::UnsupportedPlatform { .. }));
}

#[tokio::test]
async fn one_registry_serves_concurrent_runners() {
    let registry = cat();
    let mut tasks = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let payload = format!("runner {i}");
            let mut runner = ProcessRunner::new(registry);
            runner.set_stdin(std::io::Cursor::new(payload.clone().into_bytes()));
            let out = runner.run(Vec::<String>::new()).await.unwrap().stdout.clone();
            (payload, out)
        }));
    }

    for task in tasks {
        let (payload, out) = task.await.unwrap();
        assert_eq!(out, payload.as_bytes());
    }
}
