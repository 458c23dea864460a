//! End-to-end script execution through the public session API.

use shellbox::Shell;

async fn run(script: &str) -> (String, String, i32) {
    let mut shell = Shell::new();
    let result = shell.exec(script).await.expect("exec");
    (result.stdout, result.stderr, result.exit_code)
}

async fn stdout_of(script: &str) -> String {
    let (stdout, stderr, code) = run(script).await;
    assert_eq!(code, 0, "script failed: {:?} (stderr: {})", script, stderr);
    stdout
}

#[tokio::test]
async fn simple_commands_and_arguments() {
    assert_eq!(stdout_of("echo hello world").await, "hello world\n");
    assert_eq!(stdout_of("echo -n no-newline").await, "no-newline");
}

#[tokio::test]
async fn quoting() {
    assert_eq!(stdout_of("echo 'single  spaces'").await, "single  spaces\n");
    assert_eq!(stdout_of("echo \"double  spaces\"").await, "double  spaces\n");
    assert_eq!(stdout_of("echo a\\ b").await, "a b\n");
    assert_eq!(stdout_of("echo \"\"").await, "\n");
    assert_eq!(stdout_of("echo $'tab\\there'").await, "tab\there\n");
}

#[tokio::test]
async fn pipelines_stream_between_stages() {
    assert_eq!(stdout_of("echo hello | cat").await, "hello\n");
    assert_eq!(stdout_of("echo hello | cat | cat | cat").await, "hello\n");
    assert_eq!(
        stdout_of("printf 'b\\na\\nc\\n' | sort | head -2").await,
        "a\nb\n"
    );
}

#[tokio::test]
async fn pipeline_stages_are_subshells() {
    // Assignments in any stage are discarded.
    assert_eq!(stdout_of("x=1; x=2 | cat; echo $x").await, "1\n");
}

#[tokio::test]
async fn and_or_lists() {
    assert_eq!(stdout_of("true && echo yes").await, "yes\n");
    assert_eq!(stdout_of("false && echo no; echo done").await, "done\n");
    assert_eq!(stdout_of("false || echo fallback").await, "fallback\n");
    assert_eq!(stdout_of("true || echo skipped; echo after").await, "after\n");
    assert_eq!(stdout_of("false && echo a || echo b").await, "b\n");
}

#[tokio::test]
async fn exit_status_propagation() {
    let (_, _, code) = run("false").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("true | false").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("false | true").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("! true").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("! false").await;
    assert_eq!(code, 0);
    assert_eq!(stdout_of("false; echo $?").await, "1\n");
}

#[tokio::test]
async fn if_elif_else() {
    assert_eq!(
        stdout_of("if true; then echo a; else echo b; fi").await,
        "a\n"
    );
    assert_eq!(
        stdout_of("if false; then echo a; elif true; then echo b; else echo c; fi").await,
        "b\n"
    );
    assert_eq!(
        stdout_of("if false; then echo a; else echo c; fi").await,
        "c\n"
    );
}

#[tokio::test]
async fn while_until_and_for_loops() {
    assert_eq!(
        stdout_of("i=0; while [ $i -lt 3 ]; do echo $i; i=$((i+1)); done").await,
        "0\n1\n2\n"
    );
    assert_eq!(
        stdout_of("i=0; until [ $i -ge 2 ]; do echo $i; i=$((i+1)); done").await,
        "0\n1\n"
    );
    assert_eq!(stdout_of("for x in a b c; do echo $x; done").await, "a\nb\nc\n");
    assert_eq!(
        stdout_of("for ((i=0; i<3; i++)); do echo $i; done").await,
        "0\n1\n2\n"
    );
}

#[tokio::test]
async fn break_and_continue() {
    assert_eq!(
        stdout_of("for x in 1 2 3 4; do if [ $x = 3 ]; then break; fi; echo $x; done").await,
        "1\n2\n"
    );
    assert_eq!(
        stdout_of("for x in 1 2 3; do if [ $x = 2 ]; then continue; fi; echo $x; done").await,
        "1\n3\n"
    );
    // Levelled break leaves both loops.
    assert_eq!(
        stdout_of("for a in 1 2; do for b in x y; do break 2; done; echo inner; done; echo out")
            .await,
        "out\n"
    );
}

#[tokio::test]
async fn case_matching_and_fallthrough() {
    assert_eq!(
        stdout_of("case apple in a*) echo fruit ;; *) echo other ;; esac").await,
        "fruit\n"
    );
    assert_eq!(
        stdout_of("case x in a) echo a ;; b) echo b ;; *) echo neither ;; esac").await,
        "neither\n"
    );
    // `;&` falls through into the next arm unconditionally.
    assert_eq!(
        stdout_of("case a in a) echo one ;& b) echo two ;; c) echo three ;; esac").await,
        "one\ntwo\n"
    );
    // `;;&` keeps testing later patterns.
    assert_eq!(
        stdout_of("case ab in a*) echo first ;;& *b) echo second ;; esac").await,
        "first\nsecond\n"
    );
}

#[tokio::test]
async fn functions_and_dynamic_scope() {
    assert_eq!(
        stdout_of("greet() { echo hi $1; }; greet world").await,
        "hi world\n"
    );
    assert_eq!(
        stdout_of("f() { local x=1; echo $x; }; x=0; f; echo $x").await,
        "1\n0\n"
    );
    // Callee sees the caller's locals (dynamic scoping).
    assert_eq!(
        stdout_of("inner() { echo $v; }; outer() { local v=seen; inner; }; outer").await,
        "seen\n"
    );
    assert_eq!(
        stdout_of("f() { return 3; }; f; echo $?").await,
        "3\n"
    );
}

#[tokio::test]
async fn function_positional_parameters() {
    assert_eq!(
        stdout_of("f() { echo $# $1 $2; }; f a b").await,
        "2 a b\n"
    );
    assert_eq!(
        stdout_of("f() { for a in \"$@\"; do echo $a; done; }; f one two").await,
        "one\ntwo\n"
    );
    // Positionals restored after the call.
    assert_eq!(
        stdout_of("set -- top; f() { echo $1; }; f inner; echo $1").await,
        "inner\ntop\n"
    );
}

#[tokio::test]
async fn subshell_isolation_and_group_sharing() {
    assert_eq!(stdout_of("v=before; (v=inside); echo $v").await, "before\n");
    assert_eq!(stdout_of("(v=only; echo $v)").await, "only\n");
    assert_eq!(stdout_of("v=1; { v=2; }; echo $v").await, "2\n");
    assert_eq!(stdout_of("(cd /tmp); pwd").await, "/home/user\n");
}

#[tokio::test]
async fn redirections() {
    assert_eq!(
        stdout_of("echo data > /tmp/out.txt; cat /tmp/out.txt").await,
        "data\n"
    );
    assert_eq!(
        stdout_of("echo one > /tmp/a; echo two >> /tmp/a; cat /tmp/a").await,
        "one\ntwo\n"
    );
    assert_eq!(
        stdout_of("echo content > /tmp/in; cat < /tmp/in").await,
        "content\n"
    );
    // stderr redirect and 2>&1 duplication
    let (stdout, stderr, _) = run("cat /missing 2> /tmp/err; cat /tmp/err").await;
    assert!(stdout.contains("/missing"));
    assert!(stderr.is_empty());
    let (stdout, _, _) = run("cat /missing 2>&1 | cat").await;
    assert!(stdout.contains("/missing"));
}

#[tokio::test]
async fn here_documents_and_strings() {
    assert_eq!(
        stdout_of("cat <<EOF\nline one\nline two\nEOF").await,
        "line one\nline two\n"
    );
    assert_eq!(
        stdout_of("name=world; cat <<EOF\nhello $name\nEOF").await,
        "hello world\n"
    );
    assert_eq!(
        stdout_of("name=world; cat <<'EOF'\nhello $name\nEOF").await,
        "hello $name\n"
    );
    assert_eq!(stdout_of("cat <<< 'here string'").await, "here string\n");
    assert_eq!(
        stdout_of("cat <<-EOF\n\tindented\n\tEOF").await,
        "indented\n"
    );
}

#[tokio::test]
async fn command_substitution() {
    assert_eq!(stdout_of("echo $(echo nested)").await, "nested\n");
    assert_eq!(stdout_of("echo `echo backtick`").await, "backtick\n");
    assert_eq!(stdout_of("x=$(echo captured); echo $x").await, "captured\n");
    // Trailing newlines are stripped, inner ones kept.
    assert_eq!(
        stdout_of("x=$(printf 'a\\nb\\n\\n'); echo \"$x\"").await,
        "a\nb\n"
    );
    assert_eq!(stdout_of("echo $(echo a; echo b) end").await, "a b end\n");
}

#[tokio::test]
async fn arrays() {
    assert_eq!(stdout_of("arr=(a b c); echo \"${arr[@]}\"").await, "a b c\n");
    assert_eq!(stdout_of("arr=(a b c); echo ${arr[1]}").await, "b\n");
    assert_eq!(stdout_of("arr=(a b c); echo ${#arr[@]}").await, "3\n");
    assert_eq!(stdout_of("arr=(a b); arr[5]=f; echo ${arr[5]} ${#arr[@]}").await, "f 3\n");
    assert_eq!(stdout_of("arr=(x y z); echo ${!arr[@]}").await, "0 1 2\n");
    assert_eq!(
        stdout_of("arr=(a b c); for e in \"${arr[@]}\"; do echo $e; done").await,
        "a\nb\nc\n"
    );
}

#[tokio::test]
async fn alias_expansion() {
    assert_eq!(
        stdout_of("alias greet='echo hello'; greet there").await,
        "hello there\n"
    );
}

#[tokio::test]
async fn background_jobs_and_wait() {
    assert_eq!(
        stdout_of("sleep 0.01 & wait; echo done").await,
        "done\n"
    );
    let (stdout, _, code) = run("true & wait $!; echo $?").await;
    assert_eq!(code, 0);
    assert_eq!(stdout, "0\n");
}

#[tokio::test]
async fn eval_and_source() {
    assert_eq!(stdout_of("eval 'echo from eval'").await, "from eval\n");
    assert_eq!(
        stdout_of("echo 'echo sourced' > /tmp/lib.sh; source /tmp/lib.sh").await,
        "sourced\n"
    );
    assert_eq!(
        stdout_of("echo 'echo dot' > /tmp/d.sh; . /tmp/d.sh").await,
        "dot\n"
    );
}

#[tokio::test]
async fn double_bracket_conditionals() {
    let (_, _, code) = run("[[ abc == a* ]]").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("[[ abc == b* ]]").await;
    assert_eq!(code, 1);
    let (_, _, code) = run("[[ -n hello && -z '' ]]").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("[[ 10 -gt 9 ]]").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("[[ hello =~ ^h.*o$ ]]").await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn arithmetic_commands() {
    let (_, _, code) = run("((1 + 1))").await;
    assert_eq!(code, 0);
    let (_, _, code) = run("((0))").await;
    assert_eq!(code, 1);
    assert_eq!(stdout_of("((x = 5 * 3)); echo $x").await, "15\n");
}

#[tokio::test]
async fn command_not_found_is_127() {
    let (_, stderr, code) = run("definitely_not_a_command").await;
    assert_eq!(code, 127);
    assert!(stderr.contains("command not found"));
}

#[tokio::test]
async fn cd_and_pwd() {
    assert_eq!(stdout_of("cd /tmp; pwd").await, "/tmp\n");
    assert_eq!(stdout_of("pwd").await, "/home/user\n");
    assert_eq!(
        stdout_of("cd /tmp; cd /; cd -; pwd").await,
        "/tmp\n/tmp\n"
    );
    let (_, stderr, code) = run("cd /does/not/exist").await;
    assert_eq!(code, 1);
    assert!(!stderr.is_empty());
}

#[tokio::test]
async fn comments_are_ignored() {
    assert_eq!(stdout_of("echo visible # hidden").await, "visible\n");
    assert_eq!(stdout_of("# whole line\necho next").await, "next\n");
}

#[tokio::test]
async fn multiline_scripts() {
    let script = "\
total=0
for n in 1 2 3 4; do
  total=$((total + n))
done
echo $total";
    assert_eq!(stdout_of(script).await, "10\n");
}

#[tokio::test]
async fn line_continuation() {
    assert_eq!(stdout_of("echo one \\\n  two").await, "one two\n");
}
