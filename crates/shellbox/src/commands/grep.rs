//! grep - pattern matching utility
//!
//! Usage:
//!   grep pattern file
//!   echo "text" | grep pattern
//!   grep -i pattern file        # case insensitive
//!   grep -v pattern file        # invert match
//!   grep -n pattern file        # show line numbers
//!   grep -c pattern file        # count matches
//!   grep -q pattern file        # quiet (status only)
//!   grep -F pattern file        # fixed string match
//!   grep -e pat1 -e pat2 file   # multiple patterns

use async_trait::async_trait;
use regex::RegexBuilder;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

pub struct Grep;

struct GrepOptions {
    patterns: Vec<String>,
    files: Vec<String>,
    ignore_case: bool,
    invert: bool,
    line_numbers: bool,
    count_only: bool,
    quiet: bool,
    fixed: bool,
}

fn parse_options(args: &[String]) -> std::result::Result<GrepOptions, String> {
    let mut options = GrepOptions {
        patterns: Vec::new(),
        files: Vec::new(),
        ignore_case: false,
        invert: false,
        line_numbers: false,
        count_only: false,
        quiet: false,
        fixed: false,
    };
    let mut iter = args.iter().peekable();
    let mut have_pattern = false;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-i" => options.ignore_case = true,
            "-v" => options.invert = true,
            "-n" => options.line_numbers = true,
            "-c" => options.count_only = true,
            "-q" => options.quiet = true,
            "-F" => options.fixed = true,
            "-E" | "-P" => {}
            "-e" => match iter.next() {
                Some(pattern) => {
                    options.patterns.push(pattern.clone());
                    have_pattern = true;
                }
                None => return Err("option requires an argument -- 'e'".into()),
            },
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("invalid option -- '{}'", &other[1..]));
            }
            other => {
                if have_pattern {
                    options.files.push(other.to_string());
                } else {
                    options.patterns.push(other.to_string());
                    have_pattern = true;
                }
            }
        }
    }
    if options.patterns.is_empty() {
        return Err("usage: grep [-ivncqF] [-e pattern] pattern [file...]".into());
    }
    Ok(options)
}

#[async_trait]
impl Utility for Grep {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let options = match parse_options(ctx.args()) {
            Ok(options) => options,
            Err(message) => {
                ctx.fail(message).await?;
                return Ok(2);
            }
        };

        let mut regexes = Vec::new();
        for pattern in &options.patterns {
            let source = if options.fixed {
                regex::escape(pattern)
            } else {
                pattern.clone()
            };
            match RegexBuilder::new(&source)
                .case_insensitive(options.ignore_case)
                .build()
            {
                Ok(re) => regexes.push(re),
                Err(_) => {
                    ctx.fail(format!("invalid pattern: {}", pattern)).await?;
                    return Ok(2);
                }
            }
        }

        let mut inputs: Vec<(Option<String>, String)> = Vec::new();
        if options.files.is_empty() {
            inputs.push((None, ctx.io.stdin.read_to_string().await));
        } else {
            let show_name = options.files.len() > 1;
            for file in &options.files {
                let text = if file == "-" {
                    ctx.io.stdin.read_to_string().await
                } else {
                    match ctx.fs.read_file(&ctx.path(file)).await {
                        Ok(content) => String::from_utf8_lossy(&content).into_owned(),
                        Err(e) => {
                            ctx.fail(format!("{}: {}", file, e)).await?;
                            return Ok(2);
                        }
                    }
                };
                inputs.push((show_name.then(|| file.clone()), text));
            }
        }

        let mut out = String::new();
        let mut matched_any = false;
        for (label, text) in &inputs {
            let mut count = 0usize;
            for (lineno, line) in text.lines().enumerate() {
                let hit = regexes.iter().any(|re| re.is_match(line));
                if hit != options.invert {
                    matched_any = true;
                    count += 1;
                    if options.quiet || options.count_only {
                        continue;
                    }
                    if let Some(label) = label {
                        out.push_str(label);
                        out.push(':');
                    }
                    if options.line_numbers {
                        out.push_str(&format!("{}:", lineno + 1));
                    }
                    out.push_str(line);
                    out.push('\n');
                }
            }
            if options.count_only {
                if let Some(label) = label {
                    out.push_str(&format!("{}:{}\n", label, count));
                } else {
                    out.push_str(&format!("{}\n", count));
                }
            }
        }

        if !options.quiet {
            ctx.io.stdout.write_str(&out).await?;
        }
        Ok(if matched_any { 0 } else { 1 })
    }
}
