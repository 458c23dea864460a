//! Property tests: quoting preservation and field splitting.

use proptest::prelude::*;
use shellbox::Shell;

fn eval(script: &str) -> (String, i32) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let mut shell = Shell::new();
        let result = shell.exec(script).await.expect("exec");
        (result.stdout, result.exit_code)
    })
}

/// Printable text without single quotes or newlines, so it embeds into
/// `x='...'` unambiguously.
fn embeddable() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -&(-~]{0,40}").expect("regex")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quoted_expansion_preserves_bytes(value in embeddable()) {
        // printf rather than echo: a value like "-n" must not become a flag.
        let script = format!("x='{}'; printf '%s\\n' \"$x\"", value);
        let (stdout, code) = eval(&script);
        prop_assert_eq!(code, 0, "failed for {:?}", &value);
        prop_assert_eq!(stdout, format!("{}\n", value));
    }

    #[test]
    fn heredoc_preserves_lines(value in proptest::string::string_regex("[ -~]{0,30}").expect("regex")) {
        // The quoted delimiter suppresses all expansion in the body.
        if value.trim() == "EOF" {
            return Ok(());
        }
        let script = format!("cat <<'EOF'\n{}\nEOF", value);
        let (stdout, code) = eval(&script);
        prop_assert_eq!(code, 0);
        prop_assert_eq!(stdout, format!("{}\n", value));
    }

    #[test]
    fn splitting_matches_reference_model(
        parts in proptest::collection::vec("[a-z]{0,3}", 1..5),
    ) {
        // Join with colons, split with IFS=: — empty interior fields
        // survive, one trailing separator is silent.
        let joined = parts.join(":");
        let script = format!("IFS=:; x='{}'; for w in $x; do echo \"<$w>\"; done", joined);
        let (stdout, code) = eval(&script);
        prop_assert_eq!(code, 0);

        let mut expected: Vec<&str> = parts.iter().map(String::as_str).collect();
        if expected == [""] {
            // An empty expansion yields no fields at all.
            expected.clear();
        } else if expected.last() == Some(&"") {
            // One trailing separator is silent.
            expected.pop();
        }
        let want: String = expected.iter().map(|p| format!("<{}>\n", p)).collect();
        prop_assert_eq!(stdout, want, "joined {:?}", joined);
    }

    #[test]
    fn single_quotes_defeat_all_expansion(value in embeddable()) {
        let script = format!("printf '%s\\n' '{}'", value);
        let (stdout, code) = eval(&script);
        prop_assert_eq!(code, 0);
        prop_assert_eq!(stdout, format!("{}\n", value));
    }
}
