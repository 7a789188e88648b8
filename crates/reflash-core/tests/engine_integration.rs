//! End-to-end tests for the script engine: parsing, substitution, dispatch,
//! per-line error isolation, and the outcome trace, all against the mock
//! tool context from `common/mod.rs`.

mod common;

use common::{mock_engine, MockBehavior};

use reflash_core::engine::{FailureKind, LineResult};
use reflash_core::tool::Tool;

fn failure_kind(result: &LineResult) -> Option<FailureKind> {
    match result {
        LineResult::Success => None,
        LineResult::Failure { kind, .. } => Some(*kind),
    }
}

#[test]
fn assignment_is_stored_verbatim() {
    let (mut engine, _tools) = mock_engine(vec![]);
    let report = engine.execute("TARGET = boot partition, rev2\n");
    assert!(report.success);
    assert_eq!(engine.environment().get("TARGET"), "boot partition, rev2");
}

#[test]
fn assignment_does_not_self_substitute() {
    let (mut engine, _tools) = mock_engine(vec![]);
    engine.execute("A = one\nB = $A two\n");
    // Substitution happens at invocation time, not assignment time.
    assert_eq!(engine.environment().get("B"), "$A two");
}

#[test]
fn variables_substitute_into_invocations() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("PART = boot\nIMG = boot.img\nFLASH($PART, $IMG)\n");
    assert!(report.success, "report: {report:?}");
    let calls = tools.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Tool::Fastboot);
    assert_eq!(calls[0].1[0], "flash");
    assert_eq!(calls[0].1[1], "boot");
    assert!(calls[0].1[2].ends_with("boot.img"));
}

#[test]
fn unknown_command_fails_run_with_one_outcome() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("FOO()\n");
    assert!(!report.success);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        failure_kind(&report.outcomes[0].result),
        Some(FailureKind::UnknownCommand)
    );
    assert!(tools.calls().is_empty());
}

#[test]
fn failed_line_does_not_stop_the_run() {
    let (mut engine, tools) = mock_engine(vec![
        MockBehavior::Succeed,
        MockBehavior::Fail("FAILED (remote: 'locked')"),
        MockBehavior::Succeed,
    ]);
    let report = engine.execute("DEVICES()\nERASE(userdata)\nREBOOT()\n");
    assert!(!report.success);
    assert_eq!(tools.calls().len(), 3, "line 3 must still run");
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes[0].result.succeeded());
    assert_eq!(
        failure_kind(&report.outcomes[1].result),
        Some(FailureKind::HandlerFailed)
    );
    assert!(report.outcomes[2].result.succeeded());
}

#[test]
fn comments_and_blanks_never_reach_the_trace() {
    let (mut engine, _tools) = mock_engine(vec![]);
    let report = engine.execute("# header\n\n   \nDEVICES()\n# trailer\n");
    assert!(report.success);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].line, 4);
}

#[test]
fn empty_invocation_has_no_arguments() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("DEVICES()\n");
    assert!(report.success);
    // DEVICES rejects any argument, so success proves zero args were passed.
    assert_eq!(tools.calls()[0].1, vec!["devices".to_string()]);
}

#[test]
fn arity_mismatch_is_reported_distinctly() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("FLASH(boot)\n");
    assert!(!report.success);
    assert_eq!(
        failure_kind(&report.outcomes[0].result),
        Some(FailureKind::ArityMismatch)
    );
    match &report.outcomes[0].result {
        LineResult::Failure { detail, .. } => {
            assert!(detail.contains("expected 2"), "detail: {detail}");
            assert!(detail.contains("got 1"), "detail: {detail}");
        }
        LineResult::Success => panic!("expected failure"),
    }
    assert!(tools.calls().is_empty());
}

#[test]
fn handler_fault_is_isolated_to_its_line() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("WAIT(soon)\nDEVICES()\n");
    assert!(!report.success);
    assert_eq!(
        failure_kind(&report.outcomes[0].result),
        Some(FailureKind::HandlerFault)
    );
    // The run continued past the fault.
    assert!(report.outcomes[1].result.succeeded());
    assert_eq!(tools.calls().len(), 1);
}

#[test]
fn spawn_error_surfaces_as_handler_fault() {
    let (mut engine, _tools) = mock_engine(vec![MockBehavior::SpawnError]);
    let report = engine.execute("DEVICES()\n");
    assert!(!report.success);
    assert_eq!(
        failure_kind(&report.outcomes[0].result),
        Some(FailureKind::HandlerFault)
    );
}

#[test]
fn unrecognized_line_reported_as_unknown_command() {
    let (mut engine, _tools) = mock_engine(vec![]);
    let report = engine.execute("this is not a command\n");
    assert!(!report.success);
    assert_eq!(
        failure_kind(&report.outcomes[0].result),
        Some(FailureKind::Unrecognized)
    );
    match &report.outcomes[0].result {
        LineResult::Failure { detail, .. } => assert_eq!(detail, "unknown command"),
        LineResult::Success => panic!("expected failure"),
    }
}

#[test]
fn wait_goes_through_the_sleep_hook() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("WAIT(2)\n");
    assert!(report.success);
    assert_eq!(tools.sleeps(), vec![std::time::Duration::from_secs(2)]);
}

#[test]
fn command_names_are_case_insensitive() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("devices()\nDevices()\n");
    assert!(report.success);
    assert_eq!(tools.calls().len(), 2);
}

#[test]
fn substituted_comma_splits_arguments() {
    // Documented behavior: substitution happens on the raw argument text
    // before tokenizing, so a value containing a comma produces extra
    // arguments. Here it turns a one-argument ERASE into a two-argument one.
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("PARTS = userdata, cache\nERASE($PARTS)\n");
    assert!(!report.success);
    assert_eq!(
        failure_kind(&report.outcomes[1].result),
        Some(FailureKind::ArityMismatch)
    );
    assert!(tools.calls().is_empty());
}

#[test]
fn quoted_argument_keeps_its_comma() {
    let (mut engine, tools) = mock_engine(vec![]);
    let report = engine.execute("OEM('setprop a,b')\n");
    assert!(report.success);
    assert_eq!(
        tools.calls()[0].1,
        vec!["oem".to_string(), "setprop a,b".to_string()]
    );
}

#[test]
fn debug_toggle_enables_verbosity_without_changing_results() {
    let (mut engine, _tools) = mock_engine(vec![]);
    let plain = engine.execute("X = 1\nDEVICES()\n");
    assert!(!engine.debug_enabled());

    let (mut engine2, _tools2) = mock_engine(vec![]);
    let verbose = engine2.execute("DEBUG = TRUE\nX = 1\nDEVICES()\n");
    assert!(engine2.debug_enabled());

    assert!(plain.success);
    assert!(verbose.success);
    // Same outcome count apart from the DEBUG assignment line itself.
    assert_eq!(plain.outcomes.len() + 1, verbose.outcomes.len());
    // The DEBUG assignment is still an ordinary assignment.
    assert_eq!(engine2.environment().get("DEBUG"), "TRUE");
}

#[test]
fn environment_resets_between_scripts() {
    let (mut engine, _tools) = mock_engine(vec![]);
    engine.execute("X = 1\n");
    assert_eq!(engine.environment().get("X"), "1");
    engine.execute("Y = 2\n");
    assert_eq!(engine.environment().get("X"), "");
    assert_eq!(engine.environment().get("Y"), "2");
}

#[test]
fn flash_all_flashes_every_image_found() {
    let (mut engine, tools) = mock_engine(vec![]);
    // fixtures dir contains boot.img and system.img
    let report = engine.execute("FLASH_ALL()\n");
    assert!(report.success);
    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1[1], "boot");
    assert_eq!(calls[1].1[1], "system");
}

#[test]
fn flash_all_fails_if_any_image_fails() {
    let (mut engine, tools) = mock_engine(vec![
        MockBehavior::Succeed,
        MockBehavior::Fail("FAILED (remote failure)"),
    ]);
    let report = engine.execute("FLASH_ALL()\n");
    assert!(!report.success);
    assert_eq!(tools.calls().len(), 2, "keeps flashing after a failure");
}

#[test]
fn report_failures_iterator() {
    let (mut engine, _tools) = mock_engine(vec![MockBehavior::Fail("nope")]);
    let report = engine.execute("DEVICES()\nFOO()\nX = 1\n");
    let failed: Vec<usize> = report.failures().map(|o| o.line).collect();
    assert_eq!(failed, vec![1, 2]);
}

#[test]
fn trace_lines_are_one_indexed_and_ordered() {
    let (mut engine, _tools) = mock_engine(vec![]);
    let report = engine.execute("A = 1\n\nB = 2\nDEVICES()\n");
    let lines: Vec<usize> = report.outcomes.iter().map(|o| o.line).collect();
    assert_eq!(lines, vec![1, 3, 4]);
}
