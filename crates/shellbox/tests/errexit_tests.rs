//! `set -e`, `set -u`, `pipefail` and their interactions.

use shellbox::Shell;

async fn run(script: &str) -> (String, String, i32) {
    let mut shell = Shell::new();
    let result = shell.exec(script).await.expect("exec");
    (result.stdout, result.stderr, result.exit_code)
}

#[tokio::test]
async fn errexit_stops_after_failure() {
    let (stdout, _, code) = run("set -e; false; echo nope").await;
    assert_eq!(stdout, "");
    assert_eq!(code, 1);
}

#[tokio::test]
async fn errexit_preserves_failing_status() {
    let (_, _, code) = run("set -e; f() { return 7; }; f; echo unreached").await;
    assert_eq!(code, 7);
}

#[tokio::test]
async fn errexit_ignores_condition_contexts() {
    let (stdout, _, code) = run("set -e; if false; then echo t; else echo f; fi; echo after").await;
    assert_eq!(stdout, "f\nafter\n");
    assert_eq!(code, 0);

    let (stdout, _, code) = run("set -e; false || echo rescued; echo alive").await;
    assert_eq!(stdout, "rescued\nalive\n");
    assert_eq!(code, 0);

    let (stdout, _, code) = run("set -e; while false; do :; done; echo past").await;
    assert_eq!(stdout, "past\n");
    assert_eq!(code, 0);

    // `!` makes the pipeline a condition.
    let (stdout, _, code) = run("set -e; ! false; echo on").await;
    assert_eq!(stdout, "on\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn errexit_inside_functions() {
    let (stdout, _, code) = run("set -e; f() { false; echo in; }; f; echo out").await;
    assert_eq!(stdout, "");
    assert_eq!(code, 1);
}

#[tokio::test]
async fn errexit_does_not_escape_command_substitution() {
    // do-not-inherit: a failing command inside $( ) only matters through
    // the parent command's own status.
    let (stdout, _, code) = run("set -e; x=$(false; echo still); echo got:$x").await;
    assert_eq!(stdout, "got:still\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn assignment_takes_substitution_status() {
    let (_, _, code) = run("x=$(false)").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("x=$(true)").await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn pipefail() {
    let (_, _, code) = run("true | false").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("false | true").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("set -o pipefail; false | true").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("set -o pipefail; true | true").await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn nounset_in_and_out() {
    let (_, stderr, code) = run("set -u; echo $nope").await;
    assert_eq!(code, 1);
    assert!(stderr.contains("unbound variable"));

    // Defaults rescue the reference.
    let (stdout, _, code) = run("set -u; echo ${nope:-ok}").await;
    assert_eq!(code, 0);
    assert_eq!(stdout, "ok\n");

    // set +u turns it back off.
    let (stdout, _, code) = run("set -u; set +u; echo [$nope]").await;
    assert_eq!(code, 0);
    assert_eq!(stdout, "[]\n");
}

#[tokio::test]
async fn xtrace_writes_to_stderr() {
    let (stdout, stderr, _) = run("set -x; echo traced").await;
    assert_eq!(stdout, "traced\n");
    assert!(stderr.contains("+ echo traced"));
}

#[tokio::test]
async fn errexit_persists_across_exec_calls() {
    let mut shell = Shell::new();
    shell.exec("set -e").await.unwrap();
    let result = shell.exec("false; echo unreached").await.unwrap();
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stdout, "");
}
