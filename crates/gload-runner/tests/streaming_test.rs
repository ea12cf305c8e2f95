//! End-to-end transfer tests against a scripted controller.
//!
//! Each test builds a full controller over a [`ScriptedPort`] and runs it to
//! completion, checking the outcome, the bytes put on the wire and the
//! operator output.

use std::io::Cursor;

use gload_runner::mock::{PortProbe, Reply, ScriptedPort};
use gload_runner::{
    LineReader, LoaderConfig, Phase, SerialTransport, StreamOptions, StreamingController,
    TransferOutcome, TransferReport,
};

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> LoaderConfig {
    LoaderConfig {
        read_retries: 3,
        poll_interval_ms: 0,
        reset_settle_ms: 0,
        ..Default::default()
    }
}

/// Run `program` against a controller answering with `script`.
fn run_program(program: &str, script: Vec<Reply>, options: StreamOptions) -> (TransferReport, PortProbe, String) {
    let config = test_config();
    let (port, probe) = ScriptedPort::new(script);
    let transport = SerialTransport::new(port, config.read_retries);
    let input = LineReader::for_line_length(Cursor::new(program.to_string()), config.max_line_len);
    let mut console = Vec::new();

    let report = StreamingController::new(config, options, transport, input, &mut console).run();

    (report, probe, String::from_utf8(console).expect("console output is UTF-8"))
}

fn no_wait() -> StreamOptions {
    StreamOptions {
        no_wait: true,
        ..Default::default()
    }
}

// ============================================================================
// Successful Transfers
// ============================================================================

#[test]
fn test_full_program_completes() {
    let program = "(header)\nG21\n\nG0 X10 (rapid)\nM2\n";
    let (report, probe, console) = run_program(
        program,
        vec![Reply::idle(), Reply::ok(), Reply::ok(), Reply::ok(), Reply::running(), Reply::idle()],
        StreamOptions::default(),
    );

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(report.outcome.exit_code(), 0);
    assert_eq!(report.last_active, Phase::Completing);
    assert_eq!(probe.written_text(), "?G21\nG0 X10 \nM2\n??");
    assert_eq!(report.stats.lines_sent, 3);
    assert_eq!(report.stats.lines_skipped, 2);
    assert_eq!(report.stats.completion_polls, 2);
    assert_eq!(probe.close_count(), 1);
    assert_eq!(probe.unused_replies(), 0);

    assert!(console.contains("   1: skipping - comment"));
    assert!(console.contains("   2:    4 - ok"));
    assert!(console.contains("   3: skipping - line is empty"));
    assert!(console.contains("please wait"));
}

#[test]
fn test_every_write_is_answered_before_the_next() {
    let (report, probe, _console) = run_program(
        "G0 X1\nG0 X2\nG0 X3\n",
        vec![Reply::idle(), Reply::delayed("ok\r\n", 2), Reply::ok(), Reply::delayed("ok\r\n", 1)],
        no_wait(),
    );

    assert!(report.outcome.is_completed());
    // One status read plus three line reads, with three empty quanta in between.
    assert_eq!(probe.write_count(), 4);
    assert_eq!(probe.read_attempts(), 4 + 3);
}

#[test]
fn test_empty_program() {
    let (report, probe, console) = run_program("", vec![Reply::idle()], no_wait());

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(probe.written_text(), "?");
    assert!(console.is_empty());
}

#[test]
fn test_ignored_device_error_continues() {
    let options = StreamOptions {
        ignore_errors: true,
        no_wait: true,
        ..Default::default()
    };
    let (report, probe, console) = run_program(
        "G5\nG0 X1\n",
        vec![Reply::idle(), Reply::data("error:20\r\n"), Reply::ok()],
        options,
    );

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(report.stats.errors_ignored, 1);
    assert_eq!(probe.written_text(), "?G5\nG0 X1\n");
    assert!(console.contains("error:20"));
}

#[test]
fn test_alarm_unlocked_when_permitted() {
    let options = StreamOptions {
        unlock_alarm: true,
        no_wait: true,
        ..Default::default()
    };
    let (report, probe, _console) = run_program("G0\n", vec![Reply::alarm(), Reply::ok(), Reply::ok()], options);

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(probe.written_text(), "?$X\nG0\n");
}

#[test]
fn test_reset_before_preflight() {
    let options = StreamOptions {
        reset: true,
        no_wait: true,
        ..Default::default()
    };
    let (report, probe, _console) = run_program(
        "G0\n",
        vec![Reply::data("Grbl 1.1h ['$' for help]\r\n"), Reply::ok(), Reply::idle(), Reply::ok()],
        options,
    );

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(probe.writes()[0], vec![0x18]);
    assert_eq!(probe.written_text(), "\u{18}$X\n?G0\n");
}

#[test]
fn test_failed_reset_does_not_fail_run() {
    let options = StreamOptions {
        reset: true,
        no_wait: true,
        ..Default::default()
    };
    let (report, _probe, _console) = run_program(
        "G0\n",
        vec![Reply::Silence, Reply::Silence, Reply::idle(), Reply::ok()],
        options,
    );

    assert_eq!(report.outcome, TransferOutcome::Completed);
}

#[test]
fn test_unreadable_reset_banner_still_unlocks() {
    let options = StreamOptions {
        reset: true,
        no_wait: true,
        ..Default::default()
    };
    let (report, probe, _console) = run_program(
        "G0\n",
        vec![
            Reply::Fail(std::io::ErrorKind::BrokenPipe),
            Reply::ok(),
            Reply::idle(),
            Reply::ok(),
        ],
        options,
    );

    assert_eq!(report.outcome, TransferOutcome::Completed);
    assert_eq!(probe.written_text(), "\u{18}$X\n?G0\n");
}

// ============================================================================
// Aborted Transfers
// ============================================================================

#[test]
fn test_too_long_line_aborts_with_exit_code_1() {
    let program = format!("G0 X1\n{}\nG0 X2\n", "G".repeat(150));
    let (report, probe, console) = run_program(&program, vec![Reply::idle(), Reply::ok(), Reply::ok()], no_wait());

    assert_eq!(report.outcome, TransferOutcome::AbortedValidation);
    assert_eq!(report.outcome.exit_code(), 1);
    assert_eq!(probe.written_text(), "?G0 X1\n");
    assert!(console.contains("   2: skipping - line has more than 100 chars"));
    assert_eq!(probe.close_count(), 1);
}

#[test]
fn test_device_error_aborts_with_exit_code_4() {
    let (report, probe, console) = run_program(
        "G0 X1\nG99\nG0 X2\n",
        vec![Reply::idle(), Reply::ok(), Reply::data("error:9\r\n"), Reply::ok()],
        StreamOptions::default(),
    );

    assert_eq!(report.outcome, TransferOutcome::AbortedDeviceError);
    assert_eq!(report.outcome.exit_code(), 4);
    assert_eq!(probe.written_text(), "?G0 X1\nG99\n");
    assert!(console.contains("   2:    4 - error:9"));
    assert_eq!(probe.close_count(), 1);
}

#[test]
fn test_alarm_without_unlock_aborts_with_exit_code_3() {
    let (report, probe, console) = run_program("G0 X1\n", vec![Reply::alarm()], StreamOptions::default());

    assert_eq!(report.outcome, TransferOutcome::AbortedAlarm);
    assert_eq!(report.outcome.exit_code(), 3);
    assert_eq!(report.last_active, Phase::Preflight);
    assert_eq!(probe.written_text(), "?");
    assert!(console.is_empty());
}

#[test]
fn test_busy_controller_aborts_with_exit_code_0() {
    let (report, probe, _console) = run_program("G0 X1\n", vec![Reply::running()], StreamOptions::default());

    assert_eq!(report.outcome, TransferOutcome::AbortedBusy);
    assert_eq!(report.outcome.exit_code(), 0);
    assert!(!report.outcome.is_completed());
    assert_eq!(probe.written_text(), "?");
}

#[test]
fn test_preflight_timeout_aborts_with_exit_code_2() {
    let (report, probe, _console) = run_program("G0 X1\n", vec![Reply::Silence], StreamOptions::default());

    assert_eq!(report.outcome, TransferOutcome::AbortedTimeout);
    assert_eq!(report.outcome.exit_code(), 2);
    assert_eq!(probe.read_attempts(), 3);
    assert_eq!(probe.close_count(), 1);
}

#[test]
fn test_line_timeout_aborts_with_exit_code_2() {
    let (report, probe, console) = run_program(
        "G0 X1\nG0 X2\n",
        vec![Reply::idle(), Reply::Silence, Reply::ok()],
        StreamOptions::default(),
    );

    assert_eq!(report.outcome, TransferOutcome::AbortedTimeout);
    assert_eq!(report.last_active, Phase::Streaming);
    assert_eq!(probe.written_text(), "?G0 X1\n");
    assert!(console.contains("no response"));
}
