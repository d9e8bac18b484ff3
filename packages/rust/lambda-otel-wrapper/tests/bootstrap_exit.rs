use std::process::{Command, Output};

fn run_bootstrap(envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bootstrap"));
    command
        .env_remove("OBS_ENABLED")
        .env_remove("ORIGINAL_HANDLER")
        .env_remove("RUST_LOG")
        .env_remove("AWS_LAMBDA_LOG_FORMAT")
        .env_remove("AWS_LAMBDA_RUNTIME_API")
        .env_remove("AWS_LAMBDA_FUNCTION_NAME");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("failed to run bootstrap binary")
}

#[test]
fn test_missing_handler_exits_with_failure_in_bypass_mode() {
    let output = run_bootstrap(&[]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ORIGINAL_HANDLER"), "stderr: {}", stderr);
    assert!(!stderr.contains("Observability disabled"), "stderr: {}", stderr);
}

#[test]
fn test_missing_handler_exits_before_bootstrap() {
    let output = run_bootstrap(&[
        ("OBS_ENABLED", "1"),
        ("OTEL_LOG_LEVEL", "debug"),
        ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://127.0.0.1:1"),
    ]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ORIGINAL_HANDLER"), "stderr: {}", stderr);
    assert!(
        !stderr.contains("OpenTelemetry initialized"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_empty_handler_is_treated_as_missing() {
    let output = run_bootstrap(&[("ORIGINAL_HANDLER", "   ")]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_bypass_mode_never_bootstraps_telemetry() {
    let output = run_bootstrap(&[
        ("ORIGINAL_HANDLER", "cat"),
        ("OTEL_LOG_LEVEL", "debug"),
        ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://127.0.0.1:1"),
    ]);

    // Without a runtime API the process ends right after choosing its path
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Observability disabled, invoking cat directly"),
        "stderr: {}",
        stderr
    );
    assert!(
        !stderr.contains("OpenTelemetry initialized"),
        "stderr: {}",
        stderr
    );
    assert!(!stderr.contains("OTEL initialization failed"), "stderr: {}", stderr);
}
