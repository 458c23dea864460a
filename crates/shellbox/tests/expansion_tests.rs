//! Word-expansion behavior through the session API.

use shellbox::Shell;

async fn stdout_of(script: &str) -> String {
    let mut shell = Shell::new();
    let result = shell.exec(script).await.expect("exec");
    assert_eq!(
        result.exit_code, 0,
        "script failed: {:?} (stderr: {})",
        script, result.stderr
    );
    result.stdout
}

async fn run(script: &str) -> (String, String, i32) {
    let mut shell = Shell::new();
    let result = shell.exec(script).await.expect("exec");
    (result.stdout, result.stderr, result.exit_code)
}

#[tokio::test]
async fn parameter_defaults() {
    assert_eq!(stdout_of("echo ${unset:-fallback}").await, "fallback\n");
    assert_eq!(stdout_of("x=set; echo ${x:-fallback}").await, "set\n");
    assert_eq!(stdout_of("x=; echo ${x:-empty}").await, "empty\n");
    assert_eq!(stdout_of("x=; echo ${x-kept}").await, "\n");
    assert_eq!(stdout_of("echo ${v:=assigned}; echo $v").await, "assigned\nassigned\n");
    assert_eq!(stdout_of("x=yes; echo ${x:+alt}").await, "alt\n");
    assert_eq!(stdout_of("echo ${unset:+alt}").await, "\n");
}

#[tokio::test]
async fn parameter_error_op() {
    let (_, stderr, code) = run("echo ${missing:?custom message}").await;
    assert_eq!(code, 1);
    assert!(stderr.contains("custom message"));
}

#[tokio::test]
async fn length_and_substring() {
    assert_eq!(stdout_of("x=hello; echo ${#x}").await, "5\n");
    assert_eq!(stdout_of("x=abcdef; echo ${x:2}").await, "cdef\n");
    assert_eq!(stdout_of("x=abcdef; echo ${x:1:3}").await, "bcd\n");
    assert_eq!(stdout_of("x=abcdef; echo ${x: -2}").await, "ef\n");
    assert_eq!(stdout_of("x=abcdef; echo ${x:0:-2}").await, "abcd\n");
}

#[tokio::test]
async fn pattern_removal() {
    assert_eq!(stdout_of("p=/a/b/c.txt; echo ${p##*/}").await, "c.txt\n");
    assert_eq!(stdout_of("p=/a/b/c.txt; echo ${p#*/}").await, "a/b/c.txt\n");
    assert_eq!(stdout_of("f=file.tar.gz; echo ${f%%.*}").await, "file\n");
    assert_eq!(stdout_of("f=file.tar.gz; echo ${f%.*}").await, "file.tar\n");
}

#[tokio::test]
async fn replacement_and_case_ops() {
    assert_eq!(stdout_of("x=banana; echo ${x/a/o}").await, "bonana\n");
    assert_eq!(stdout_of("x=banana; echo ${x//a/o}").await, "bonono\n");
    assert_eq!(stdout_of("x=banana; echo ${x/#ba/pa}").await, "panana\n");
    assert_eq!(stdout_of("x=banana; echo ${x/%na/!}").await, "bana!\n");
    assert_eq!(stdout_of("x=word; echo ${x^}").await, "Word\n");
    assert_eq!(stdout_of("x=word; echo ${x^^}").await, "WORD\n");
    assert_eq!(stdout_of("x=LOUD; echo ${x,,}").await, "loud\n");
}

#[tokio::test]
async fn indirection() {
    assert_eq!(stdout_of("target=value; ref=target; echo ${!ref}").await, "value\n");
}

#[tokio::test]
async fn brace_expansion() {
    assert_eq!(stdout_of("echo {a,b,c}").await, "a b c\n");
    assert_eq!(stdout_of("echo pre{x,y}post").await, "prexpost preypost\n");
    assert_eq!(stdout_of("echo {1..4}").await, "1 2 3 4\n");
    assert_eq!(stdout_of("echo {05..1}").await, "05 04 03 02 01\n");
    assert_eq!(stdout_of("echo {a..c}{1..2}").await, "a1 a2 b1 b2 c1 c2\n");
    assert_eq!(stdout_of("echo {1..10..3}").await, "1 4 7 10\n");
    // No alternation: literal.
    assert_eq!(stdout_of("echo {abc}").await, "{abc}\n");
    assert_eq!(stdout_of("echo '{a,b}'").await, "{a,b}\n");
}

#[tokio::test]
async fn tilde_expansion() {
    assert_eq!(stdout_of("echo ~").await, "/home/user\n");
    assert_eq!(stdout_of("echo ~/sub").await, "/home/user/sub\n");
    assert_eq!(stdout_of("echo '~'").await, "~\n");
}

#[tokio::test]
async fn field_splitting_default_ifs() {
    assert_eq!(stdout_of("x='a  b   c'; for w in $x; do echo $w; done").await, "a\nb\nc\n");
    // Quoted expansion never splits.
    assert_eq!(stdout_of("x='a b'; for w in \"$x\"; do echo $w; done").await, "a b\n");
}

#[tokio::test]
async fn field_splitting_custom_ifs() {
    assert_eq!(
        stdout_of("IFS=:; x='a::b'; for w in $x; do echo \"[$w]\"; done").await,
        "[a]\n[]\n[b]\n"
    );
    assert_eq!(
        stdout_of("IFS=,; x='one,two'; for w in $x; do echo $w; done").await,
        "one\ntwo\n"
    );
}

#[tokio::test]
async fn empty_expansion_vanishes_unquoted() {
    assert_eq!(stdout_of("e=; set -- $e; echo $#").await, "0\n");
    assert_eq!(stdout_of("e=; set -- \"$e\"; echo $#").await, "1\n");
}

#[tokio::test]
async fn at_versus_star() {
    assert_eq!(
        stdout_of("set -- 'a b' c; for w in \"$@\"; do echo $w; done").await,
        "a b\nc\n"
    );
    assert_eq!(
        stdout_of("IFS=-; set -- x y; echo \"$*\"").await,
        "x-y\n"
    );
}

#[tokio::test]
async fn pathname_expansion() {
    let script = "\
cd /tmp
touch alpha.txt beta.txt gamma.rs
echo *.txt";
    assert_eq!(stdout_of(script).await, "alpha.txt beta.txt\n");
}

#[tokio::test]
async fn unmatched_glob_stays_literal() {
    assert_eq!(stdout_of("cd /tmp; echo *.nomatch").await, "*.nomatch\n");
}

#[tokio::test]
async fn nullglob_and_failglob() {
    assert_eq!(
        stdout_of("shopt -s nullglob; cd /tmp; echo start *.nomatch end").await,
        "start end\n"
    );
    let (_, _, code) = run("shopt -s failglob; cd /tmp; echo *.nomatch").await;
    assert_eq!(code, 1);
}

#[tokio::test]
async fn hidden_files_need_literal_dot() {
    let script = "\
cd /tmp
touch .secret visible
echo *";
    assert_eq!(stdout_of(script).await, "visible\n");
    let script = "\
cd /tmp
touch .secret
echo .s*";
    assert_eq!(stdout_of(script).await, ".secret\n");
}

#[tokio::test]
async fn globstar() {
    let script = "\
shopt -s globstar
mkdir -p /src/deep/deeper
touch /src/top.rs /src/deep/deeper/bottom.rs
cd /src
echo **/*.rs";
    assert_eq!(stdout_of(script).await, "deep/deeper/bottom.rs top.rs\n");
}

#[tokio::test]
async fn quoted_globs_are_literal() {
    assert_eq!(stdout_of("cd /tmp; echo '*.txt'").await, "*.txt\n");
}

#[tokio::test]
async fn arithmetic_expansion() {
    assert_eq!(stdout_of("echo $((2 + 3 * 4))").await, "14\n");
    assert_eq!(stdout_of("x=5; echo $((x * 2))").await, "10\n");
    assert_eq!(stdout_of("echo $(( $(echo 4) + 1 ))").await, "5\n");
    assert_eq!(stdout_of("echo $((1 < 2 ? 10 : 20))").await, "10\n");
}

#[tokio::test]
async fn nounset_flags_unset_references() {
    let (_, stderr, code) = run("set -u; echo $never_defined").await;
    assert_eq!(code, 1);
    assert!(stderr.contains("unbound variable"));
    let (_, _, code) = run("set -u; x=ok; echo $x").await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn quoting_preserves_bytes() {
    for value in ["a  b", "tab\\there", "*?[]", "dollar$sign", "semi;colon"] {
        let script = format!("x='{}'; echo \"$x\"", value);
        assert_eq!(stdout_of(&script).await, format!("{}\n", value), "value {:?}", value);
    }
}

#[tokio::test]
async fn names_matching_prefix() {
    assert_eq!(
        stdout_of("apple=1; apricot=2; banana=3; echo ${!ap*}").await,
        "apple apricot\n"
    );
}

#[tokio::test]
async fn transforms() {
    assert_eq!(stdout_of("x=hi; echo ${x@U}").await, "HI\n");
    assert_eq!(stdout_of("x=Hi; echo ${x@L}").await, "hi\n");
    assert_eq!(stdout_of("x='a b'; echo ${x@Q}").await, "'a b'\n");
}

#[tokio::test]
async fn attribute_transform_reports_all_flags() {
    assert_eq!(stdout_of("declare -i n=5; echo ${n@a}").await, "i\n");
    // Case-folding attributes show up and keep working on assignment.
    assert_eq!(
        stdout_of("declare -l s; s=ABC; echo $s ${s@a}").await,
        "abc l\n"
    );
    assert_eq!(
        stdout_of("declare -u s; s=abc; echo $s ${s@a}").await,
        "ABC u\n"
    );
    assert_eq!(stdout_of("arr=(1 2); echo ${arr@a}").await, "a\n");
}

#[tokio::test]
async fn declare_p_prints_attribute_flags() {
    assert_eq!(
        stdout_of("declare -lx v=; declare -p v").await,
        "declare -lx v=\"\"\n"
    );
    assert_eq!(
        stdout_of("declare -i n=3; declare -p n").await,
        "declare -i n=\"3\"\n"
    );
    assert_eq!(
        stdout_of("plain=yes; declare -p plain").await,
        "declare -- plain=\"yes\"\n"
    );
}
