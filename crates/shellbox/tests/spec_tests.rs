//! Literal input/output scenarios and the quantified behavioral laws the
//! engine guarantees.

use shellbox::Shell;

async fn run(script: &str) -> (String, i32) {
    let mut shell = Shell::new();
    let result = shell.exec(script).await.expect("exec");
    (result.stdout, result.exit_code)
}

#[tokio::test]
async fn scenario_hello_world() {
    let (stdout, code) = run("echo \"Hello, World!\"").await;
    assert_eq!(stdout, "Hello, World!\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_pipeline_sort() {
    let (stdout, code) = run("echo \"banana apple cherry\" | tr \" \" \"\\n\" | sort").await;
    assert_eq!(stdout, "apple\nbanana\ncherry\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_arithmetic() {
    let (stdout, code) = run("x=5; echo $((x * 2))").await;
    assert_eq!(stdout, "10\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_array() {
    let (stdout, code) = run("arr=(a b c); echo \"${arr[@]}\"").await;
    assert_eq!(stdout, "a b c\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_file_round_trip() {
    let (stdout, code) = run("echo test > /tmp/f.txt; cat /tmp/f.txt").await;
    assert_eq!(stdout, "test\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_function_local() {
    let (stdout, code) = run("f() { local x=1; echo $x; }; x=0; f; echo $x").await;
    assert_eq!(stdout, "1\n0\n");
    assert_eq!(code, 0);
}

#[tokio::test]
async fn scenario_errexit() {
    let (stdout, code) = run("set -e; false; echo nope").await;
    assert_eq!(stdout, "");
    assert_eq!(code, 1);
}

// --- quantified laws ---

#[tokio::test]
async fn law_quoting_preservation() {
    // echo "$x" prints the assigned bytes exactly, newline-terminated.
    for value in [
        "plain",
        "two  spaces",
        "g l o b * ? [x]",
        "punct !@#%^&()_+=",
        "unicode ß∂ƒ",
    ] {
        let script = format!("x='{}'; echo \"$x\"", value);
        let (stdout, code) = run(&script).await;
        assert_eq!(code, 0, "failed for {:?}", value);
        assert_eq!(stdout, format!("{}\n", value), "mangled {:?}", value);
    }
}

#[tokio::test]
async fn law_ifs_field_splitting() {
    let (stdout, _) = run("IFS=:; x='a::b'; for w in $x; do echo \"<$w>\"; done").await;
    assert_eq!(stdout, "<a>\n<>\n<b>\n");
}

#[tokio::test]
async fn law_subshell_isolation() {
    let (stdout, _) = run("v=kept; (v=changed); echo $v").await;
    assert_eq!(stdout, "kept\n");
    let (stdout, _) = run("unset v; (v=1); echo [${v:-unset}]").await;
    assert_eq!(stdout, "[unset]\n");
}

#[tokio::test]
async fn law_exit_status_propagation() {
    assert_eq!(run("true | false").await.1, 1);
    assert_eq!(run("set -o pipefail; false | true").await.1, 1);
    assert_eq!(run("true | true").await.1, 0);
}

#[tokio::test]
async fn law_vfs_round_trip() {
    for content in ["X", "line one", "with\ttab", "star*glob?"] {
        let script = format!("echo '{}' > /f && cat /f", content);
        let (stdout, code) = run(&script).await;
        assert_eq!(code, 0);
        assert_eq!(stdout, format!("{}\n", content));
    }
}

#[tokio::test]
async fn law_limit_enforcement() {
    let limits = shellbox::ExecutionLimits::new()
        .max_loop_iterations(10_000)
        .timeout(std::time::Duration::from_secs(10));
    let mut shell = Shell::builder().limits(limits).build();
    let result = shell.exec("while true; do :; done").await.unwrap();
    assert_eq!(result.exit_code, 124);
}

#[tokio::test]
async fn law_parse_print_round_trip() {
    // A parsed script, printed canonically, parses to an equivalent tree.
    for src in [
        "echo one two | grep o && echo found",
        "for x in a b; do echo $x; done",
        "if [ -f /tmp/x ]; then cat /tmp/x; fi",
        "f() { echo ${1:-none}; }; f",
        "case $v in a|b) echo ab ;; *) echo rest ;; esac",
    ] {
        let first = shellbox::Parser::new(src).parse().expect("parse");
        let printed = first.to_string();
        let second = shellbox::Parser::new(&printed).parse().expect("reparse");
        assert_eq!(first, second, "round trip failed: {:?} -> {:?}", src, printed);
    }
}
