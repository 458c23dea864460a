//! Glob patterns: matching, prefix/suffix removal, replacement, and
//! pathname expansion against the VFS.
//!
//! Patterns are translated to anchored regexes (the `regex` crate); `*` and
//! `?` never match `/` during pathname expansion because matching happens
//! per path component.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::error::Result;
use crate::fs::FileSystem;
use crate::interpreter::ShellOptions;

/// Translate a glob pattern into a regex body (no anchors).
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                out.push_str(&regex::escape(&chars[i + 1].to_string()));
                i += 1;
            }
            '[' => {
                // Bracket expression; pass through with negation fixed up.
                let mut j = i + 1;
                let mut body = String::new();
                let negated = matches!(chars.get(j), Some('!') | Some('^'));
                if negated {
                    j += 1;
                }
                // A `]` first is literal.
                if chars.get(j) == Some(&']') {
                    body.push_str("\\]");
                    j += 1;
                }
                let mut closed = false;
                while j < chars.len() {
                    if chars[j] == ']' {
                        closed = true;
                        break;
                    }
                    if chars[j] == '[' && chars.get(j + 1) == Some(&':') {
                        // POSIX class like [:alpha:]
                        if let Some(end) = find_class_end(&chars, j) {
                            let class: String = chars[j + 2..end].iter().collect();
                            body.push_str(class_to_regex(&class));
                            j = end + 2;
                            continue;
                        }
                    }
                    match chars[j] {
                        '\\' => body.push_str("\\\\"),
                        '^' => body.push_str("\\^"),
                        c => body.push(c),
                    }
                    j += 1;
                }
                if closed {
                    out.push('[');
                    if negated {
                        out.push('^');
                    }
                    out.push_str(&body);
                    out.push(']');
                    i = j;
                } else {
                    out.push_str("\\[");
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out
}

fn find_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 2;
    while j + 1 < chars.len() {
        if chars[j] == ':' && chars[j + 1] == ']' {
            return Some(j);
        }
        j += 1;
    }
    None
}

fn class_to_regex(class: &str) -> &'static str {
    match class {
        "alpha" => "a-zA-Z",
        "digit" => "0-9",
        "alnum" => "a-zA-Z0-9",
        "upper" => "A-Z",
        "lower" => "a-z",
        "space" => r" \t\n\r",
        "punct" => r##"!-/:-@\[-`{-~"##,
        "xdigit" => "0-9a-fA-F",
        "blank" => r" \t",
        _ => "",
    }
}

/// Whole-string glob match (used by `case`, `[[ == ]]`, pattern operators).
pub fn match_glob(pattern: &str, text: &str) -> bool {
    match Regex::new(&format!("^{}$", glob_to_regex(pattern))) {
        Ok(re) => re.is_match(text),
        Err(_) => pattern == text,
    }
}

/// Does a pattern contain unescaped glob metacharacters?
pub fn has_glob_chars(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

/// Escape glob metacharacters so the text matches literally.
pub fn escape_glob(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Drop unescaped backslashes (a pattern used as a literal string).
pub fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(n) = chars.next() {
                out.push(n);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `${x#pat}` / `${x##pat}`: remove the shortest/longest matching prefix.
pub fn remove_prefix(value: &str, pattern: &str, greedy: bool) -> String {
    let re = match Regex::new(&format!("^{}$", glob_to_regex(pattern))) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    let boundaries: Vec<usize> = boundary_offsets(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if greedy {
        Box::new(boundaries.iter().rev())
    } else {
        Box::new(boundaries.iter())
    };
    for &end in candidates {
        if re.is_match(&value[..end]) {
            return value[end..].to_string();
        }
    }
    value.to_string()
}

/// `${x%pat}` / `${x%%pat}`: remove the shortest/longest matching suffix.
pub fn remove_suffix(value: &str, pattern: &str, greedy: bool) -> String {
    let re = match Regex::new(&format!("^{}$", glob_to_regex(pattern))) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    let boundaries: Vec<usize> = boundary_offsets(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if greedy {
        Box::new(boundaries.iter())
    } else {
        Box::new(boundaries.iter().rev())
    };
    for &start in candidates {
        if re.is_match(&value[start..]) {
            return value[..start].to_string();
        }
    }
    value.to_string()
}

fn boundary_offsets(value: &str) -> Vec<usize> {
    let mut out: Vec<usize> = value.char_indices().map(|(i, _)| i).collect();
    out.push(value.len());
    out
}

/// `${x/pat/rep}` family.
pub fn replace(
    value: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
    anchor_prefix: bool,
    anchor_suffix: bool,
) -> String {
    let body = glob_to_regex(pattern);
    let body = if anchor_prefix {
        format!("^(?:{})", body)
    } else if anchor_suffix {
        format!("(?:{})$", body)
    } else {
        body
    };
    let re = match Regex::new(&body) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    if all {
        re.replace_all(value, regex::NoExpand(replacement))
            .into_owned()
    } else {
        re.replace(value, regex::NoExpand(replacement)).into_owned()
    }
}

/// Pathname expansion: match a pattern against the VFS, one component at a
/// time. Returns sorted matches, or empty when nothing matched.
pub async fn expand_pathnames(
    fs: &Arc<dyn FileSystem>,
    cwd: &Path,
    pattern: &str,
    options: &ShellOptions,
) -> Result<Vec<String>> {
    let absolute = pattern.starts_with('/');
    let comps: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    if comps.is_empty() {
        return Ok(if absolute { vec!["/".to_string()] } else { Vec::new() });
    }

    // (real path to list, display string accumulated so far)
    let mut frontier: Vec<(PathBuf, String)> = vec![if absolute {
        (PathBuf::from("/"), String::new())
    } else {
        (cwd.to_path_buf(), String::new())
    }];

    for (depth, comp) in comps.iter().enumerate() {
        let last = depth == comps.len() - 1;
        let mut next: Vec<(PathBuf, String)> = Vec::new();

        for (dir, display) in &frontier {
            if *comp == "**" && options.globstar {
                collect_globstar(fs, dir, display, last, options, &mut next).await;
                continue;
            }
            if !has_glob_chars(comp) {
                let name = unescape(comp);
                let path = dir.join(&name);
                if fs.lstat(&path).await.is_ok() || name == "." || name == ".." {
                    next.push((path, join_display(display, &name)));
                }
                continue;
            }
            let entries = match fs.read_dir(dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries {
                if entry.name.starts_with('.') && !comp.starts_with('.') && !options.dotglob {
                    continue;
                }
                if match_glob(comp, &entry.name) {
                    next.push((dir.join(&entry.name), join_display(display, &entry.name)));
                }
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    let prefix = if absolute { "/" } else { "" };
    let mut out: Vec<String> = frontier
        .into_iter()
        .map(|(_, display)| format!("{}{}", prefix, display))
        .collect();
    out.sort();
    out.dedup();
    Ok(out)
}

/// `**`: this directory plus all descendants (directories always; files too
/// when `**` is the final component).
async fn collect_globstar(
    fs: &Arc<dyn FileSystem>,
    dir: &Path,
    display: &str,
    include_files: bool,
    options: &ShellOptions,
    out: &mut Vec<(PathBuf, String)>,
) {
    let mut stack: Vec<(PathBuf, String)> = vec![(dir.to_path_buf(), display.to_string())];
    while let Some((current, disp)) = stack.pop() {
        out.push((current.clone(), disp.clone()));
        let entries = match fs.read_dir(&current).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries {
            if entry.name.starts_with('.') && !options.dotglob {
                continue;
            }
            let child = current.join(&entry.name);
            let child_disp = join_display(&disp, &entry.name);
            if entry.metadata.file_type.is_dir() {
                stack.push((child, child_disp));
            } else if include_files {
                out.push((child, child_disp));
            }
        }
    }
}

fn join_display(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
