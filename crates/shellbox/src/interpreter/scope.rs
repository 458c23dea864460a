//! Shell variables, scope frames and session-wide mutable state.
//!
//! Variables live in a stack of frames; the bottom frame is global. Name
//! resolution walks top to bottom (dynamic scoping: a callee sees its
//! caller's locals). `local` binds in the top frame; plain assignment mutates
//! the nearest frame that already defines the name, else the global frame.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::parser::FunctionDef;

use super::state::ControlFlow;

/// A shell value: scalar, sparse indexed array, or associative array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Indexed(BTreeMap<u64, String>),
    Assoc(HashMap<String, String>),
}

impl Value {
    pub fn scalar(text: impl Into<String>) -> Self {
        Value::Scalar(text.into())
    }

    pub fn indexed_from(items: impl IntoIterator<Item = String>) -> Self {
        Value::Indexed(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i as u64, v))
                .collect(),
        )
    }

    /// The value a bare `$name` reference yields: the scalar itself, or
    /// element 0 of an array.
    pub fn as_scalar(&self) -> String {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::Indexed(map) => map.get(&0).cloned().unwrap_or_default(),
            Value::Assoc(map) => map.get("0").cloned().unwrap_or_default(),
        }
    }

    /// All elements in key order (insertion-independent for indexed arrays).
    pub fn elements(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::Indexed(map) => map.values().cloned().collect(),
            Value::Assoc(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter().map(|k| map[k].clone()).collect()
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Scalar(_) => vec!["0".to_string()],
            Value::Indexed(map) => map.keys().map(|k| k.to_string()).collect(),
            Value::Assoc(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Indexed(map) => map.len(),
            Value::Assoc(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array(&self) -> bool {
        !matches!(self, Value::Scalar(_))
    }
}

/// Attribute flags carried by every variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attrs {
    pub exported: bool,
    pub readonly: bool,
    pub integer: bool,
    pub lowercase: bool,
    pub uppercase: bool,
    pub nameref: bool,
}

impl Attrs {
    /// Attribute letters in `declare` display order, without the array
    /// kind (`a`/`A` comes from the value, not the attributes).
    pub fn flag_chars(&self) -> String {
        let mut flags = String::new();
        if self.integer {
            flags.push('i');
        }
        if self.lowercase {
            flags.push('l');
        }
        if self.nameref {
            flags.push('n');
        }
        if self.readonly {
            flags.push('r');
        }
        if self.uppercase {
            flags.push('u');
        }
        if self.exported {
            flags.push('x');
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: Value,
    pub attrs: Attrs,
}

impl Variable {
    pub fn scalar(text: impl Into<String>) -> Self {
        Self {
            value: Value::scalar(text),
            attrs: Attrs::default(),
        }
    }

    pub fn exported(text: impl Into<String>) -> Self {
        Self {
            value: Value::scalar(text),
            attrs: Attrs {
                exported: true,
                ..Attrs::default()
            },
        }
    }

    /// Apply the case-folding attributes to a scalar being stored.
    fn folded(&self, text: String) -> String {
        if self.attrs.lowercase {
            text.to_lowercase()
        } else if self.attrs.uppercase {
            text.to_uppercase()
        } else {
            text
        }
    }
}

/// Stack of scope frames; the bottom frame holds globals.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, Variable>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Resolve a name, following `nameref` chains (bounded, cycles fail).
    pub fn resolve_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        for _ in 0..10 {
            match self.lookup(&current) {
                Some(var) if var.attrs.nameref => match &var.value {
                    Value::Scalar(target) if !target.is_empty() => current = target.clone(),
                    _ => break,
                },
                _ => break,
            }
        }
        current
    }

    fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        let resolved = self.resolve_name(name);
        self.lookup(&resolved)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let resolved = self.resolve_name(name);
        self.frames
            .iter_mut()
            .rev()
            .find_map(|f| f.get_mut(&resolved))
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.get(name).map(|v| v.attrs.readonly).unwrap_or(false)
    }

    /// Assign a scalar: nearest defining frame, else the global frame.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let resolved = self.resolve_name(name);
        let text = value.into();
        if let Some(var) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| f.get_mut(&resolved))
        {
            if var.attrs.readonly {
                return Err(Error::Execution(format!("{}: readonly variable", resolved)));
            }
            let text = var.folded(text);
            var.value = Value::Scalar(text);
            return Ok(());
        }
        self.frames[0].insert(resolved, Variable::scalar(text));
        Ok(())
    }

    /// Replace a variable's whole value, preserving attributes if present.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        let resolved = self.resolve_name(name);
        if let Some(var) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| f.get_mut(&resolved))
        {
            if var.attrs.readonly {
                return Err(Error::Execution(format!("{}: readonly variable", resolved)));
            }
            var.value = value;
            return Ok(());
        }
        self.frames[0].insert(
            resolved,
            Variable {
                value,
                attrs: Attrs::default(),
            },
        );
        Ok(())
    }

    /// Assign one array element, converting a scalar to an array if needed.
    pub fn set_element(&mut self, name: &str, key: &str, value: String, assoc: bool) -> Result<()> {
        let resolved = self.resolve_name(name);
        if self.is_readonly(&resolved) {
            return Err(Error::Execution(format!("{}: readonly variable", resolved)));
        }
        let frame = self.frame_of_mut(&resolved);
        let var = frame.entry(resolved).or_insert_with(|| Variable {
            value: if assoc {
                Value::Assoc(HashMap::new())
            } else {
                Value::Indexed(BTreeMap::new())
            },
            attrs: Attrs::default(),
        });
        match &mut var.value {
            Value::Assoc(map) => {
                map.insert(key.to_string(), value);
            }
            Value::Indexed(map) => {
                let idx: u64 = key.parse().unwrap_or(0);
                map.insert(idx, value);
            }
            Value::Scalar(old) => {
                let mut map = BTreeMap::new();
                if !old.is_empty() {
                    map.insert(0u64, old.clone());
                }
                let idx: u64 = key.parse().unwrap_or(0);
                map.insert(idx, value);
                var.value = Value::Indexed(map);
            }
        }
        Ok(())
    }

    /// The frame a plain assignment to `name` lands in.
    fn frame_of_mut(&mut self, name: &str) -> &mut HashMap<String, Variable> {
        let pos = self
            .frames
            .iter()
            .rposition(|f| f.contains_key(name))
            .unwrap_or(0);
        &mut self.frames[pos]
    }

    /// Bind in the top frame (`local`).
    pub fn set_local(&mut self, name: &str, var: Variable) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), var);
        }
    }

    /// Install or overwrite in the nearest defining frame, keeping existing
    /// attributes merged (for `declare`/`export`).
    pub fn declare(&mut self, name: &str, value: Option<Value>, update: impl Fn(&mut Attrs)) -> Result<()> {
        let resolved = self.resolve_name(name);
        if let Some(var) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| f.get_mut(&resolved))
        {
            if var.attrs.readonly && value.is_some() {
                return Err(Error::Execution(format!("{}: readonly variable", resolved)));
            }
            update(&mut var.attrs);
            if let Some(value) = value {
                var.value = value;
            }
            return Ok(());
        }
        let mut attrs = Attrs::default();
        update(&mut attrs);
        self.frames[0].insert(
            resolved,
            Variable {
                value: value.unwrap_or_else(|| Value::scalar("")),
                attrs,
            },
        );
        Ok(())
    }

    /// Remove the nearest binding. Readonly variables cannot be unset.
    pub fn unset(&mut self, name: &str) -> Result<bool> {
        let resolved = self.resolve_name(name);
        if self.is_readonly(&resolved) {
            return Err(Error::Execution(format!(
                "unset: {}: cannot unset: readonly variable",
                resolved
            )));
        }
        for frame in self.frames.iter_mut().rev() {
            if frame.remove(&resolved).is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All visible names, top frame shadowing lower ones, sorted.
    pub fn visible_names(&self) -> Vec<String> {
        let mut seen: HashMap<&str, ()> = HashMap::new();
        for frame in self.frames.iter().rev() {
            for name in frame.keys() {
                seen.entry(name).or_insert(());
            }
        }
        let mut names: Vec<String> = seen.keys().map(|s| s.to_string()).collect();
        names.sort();
        names
    }

    /// Exported name→value snapshot for command environments.
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for name in self.visible_names() {
            if let Some(var) = self.get(&name) {
                if var.attrs.exported {
                    env.insert(name, var.value.as_scalar());
                }
            }
        }
        env
    }
}

/// Shell option flags, toggled by `set` and `shopt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellOptions {
    pub errexit: bool,
    pub nounset: bool,
    pub xtrace: bool,
    pub pipefail: bool,
    pub noglob: bool,
    pub globstar: bool,
    pub nullglob: bool,
    pub failglob: bool,
    pub dotglob: bool,
}

impl ShellOptions {
    /// `set -o` names.
    pub const SET_NAMES: &'static [&'static str] =
        &["errexit", "noglob", "nounset", "pipefail", "xtrace"];

    /// `shopt` names.
    pub const SHOPT_NAMES: &'static [&'static str] =
        &["dotglob", "failglob", "globstar", "nullglob"];

    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "errexit" => Some(self.errexit),
            "nounset" => Some(self.nounset),
            "xtrace" => Some(self.xtrace),
            "pipefail" => Some(self.pipefail),
            "noglob" => Some(self.noglob),
            "globstar" => Some(self.globstar),
            "nullglob" => Some(self.nullglob),
            "failglob" => Some(self.failglob),
            "dotglob" => Some(self.dotglob),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, on: bool) -> Result<()> {
        match name {
            "errexit" => self.errexit = on,
            "nounset" => self.nounset = on,
            "xtrace" => self.xtrace = on,
            "pipefail" => self.pipefail = on,
            "noglob" => self.noglob = on,
            "globstar" => self.globstar = on,
            "nullglob" => self.nullglob = on,
            "failglob" => self.failglob = on,
            "dotglob" => self.dotglob = on,
            _ => return Err(Error::Execution(format!("invalid option name: {}", name))),
        }
        Ok(())
    }

    /// Apply a short flag from `set -e` / `set +x` style arguments.
    pub fn set_short(&mut self, flag: char, on: bool) -> Result<()> {
        match flag {
            'e' => self.errexit = on,
            'u' => self.nounset = on,
            'x' => self.xtrace = on,
            'f' => self.noglob = on,
            _ => return Err(Error::Execution(format!("set: -{}: invalid option", flag))),
        }
        Ok(())
    }
}

/// The mutable session state threaded through evaluation.
///
/// Cloning yields a subshell view: same variables and functions by value,
/// changes discarded with the clone.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub scopes: ScopeStack,
    pub cwd: PathBuf,
    pub prev_dir: Option<PathBuf>,
    pub dir_stack: Vec<PathBuf>,
    pub options: ShellOptions,
    pub aliases: HashMap<String, String>,
    pub functions: HashMap<String, Arc<FunctionDef>>,
    pub positional: Vec<String>,
    pub script_name: String,
    pub last_status: i32,
    pub last_background: Option<u64>,
    pub control: ControlFlow,
    /// Depth of condition contexts (`if`/`while` conditions, `&&`/`||`
    /// non-final segments, `!`); errexit is suppressed inside.
    pub condition_depth: u32,
    /// State for the `$RANDOM` generator.
    pub rand_seed: u64,
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellState {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
            cwd: PathBuf::from("/home/user"),
            prev_dir: None,
            dir_stack: Vec::new(),
            options: ShellOptions::default(),
            aliases: HashMap::new(),
            functions: HashMap::new(),
            positional: Vec::new(),
            script_name: "shellbox".to_string(),
            last_status: 0,
            last_background: None,
            control: ControlFlow::None,
            condition_depth: 0,
            rand_seed: 0x5eed_cafe_f00d_1234,
        }
    }

    /// Scalar view of a variable, `None` when unset.
    pub fn get_scalar(&self, name: &str) -> Option<String> {
        self.scopes.get(name).map(|v| v.value.as_scalar())
    }

    /// The IFS in effect (unset defaults to space-tab-newline).
    pub fn ifs(&self) -> String {
        self.get_scalar("IFS").unwrap_or_else(|| " \t\n".to_string())
    }

    /// Resolve a possibly relative path against the cwd, lexically.
    pub fn absolute(&self, path: &str) -> PathBuf {
        if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn assignment_creates_global() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("x", "1").unwrap();
        scopes.push_frame();
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "1");
    }

    #[test]
    fn local_shadows_and_pops() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("x", "outer").unwrap();
        scopes.push_frame();
        scopes.set_local("x", Variable::scalar("inner"));
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "inner");
        scopes.pop_frame();
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "outer");
    }

    #[test]
    fn assignment_mutates_nearest_defining_frame() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame();
        scopes.set_local("x", Variable::scalar("local"));
        scopes.set_scalar("x", "changed").unwrap();
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "changed");
        scopes.pop_frame();
        // The local was mutated; the global was never created.
        assert!(scopes.get("x").is_none());
    }

    #[test]
    fn readonly_blocks_assignment_and_unset() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("x", "1").unwrap();
        scopes.get_mut("x").unwrap().attrs.readonly = true;
        assert!(scopes.set_scalar("x", "2").is_err());
        assert!(scopes.unset("x").is_err());
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "1");
    }

    #[test]
    fn unset_distinct_from_empty() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.is_set("x"));
        scopes.set_scalar("x", "").unwrap();
        assert!(scopes.is_set("x"));
        assert!(scopes.unset("x").unwrap());
        assert!(!scopes.is_set("x"));
    }

    #[test]
    fn nameref_resolution() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("target", "value").unwrap();
        scopes.set_scalar("ref", "target").unwrap();
        scopes.get_mut("ref").unwrap().attrs.nameref = true;
        assert_eq!(scopes.get("ref").unwrap().value.as_scalar(), "value");
        scopes.set_scalar("ref", "updated").unwrap();
        // Writes through the ref land on the target.
        assert_eq!(scopes.get("target").unwrap().value.as_scalar(), "updated");
    }

    #[test]
    fn nameref_cycle_stops() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("a", "b").unwrap();
        scopes.set_scalar("b", "a").unwrap();
        scopes.get_mut("a").unwrap().attrs.nameref = true;
        scopes.get_mut("b").unwrap().attrs.nameref = true;
        // Resolution is bounded; no hang, no panic.
        let _ = scopes.get("a");
    }

    #[test]
    fn element_assignment_promotes_scalar() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("a", "zero").unwrap();
        scopes.set_element("a", "2", "two".into(), false).unwrap();
        match &scopes.get("a").unwrap().value {
            Value::Indexed(map) => {
                assert_eq!(map[&0], "zero");
                assert_eq!(map[&2], "two");
            }
            other => panic!("expected indexed array, got {:?}", other),
        }
    }

    #[test]
    fn sparse_array_elements_in_key_order() {
        let value = Value::Indexed(BTreeMap::from([(5, "five".into()), (1, "one".into())]));
        assert_eq!(value.elements(), vec!["one".to_string(), "five".to_string()]);
        assert_eq!(value.keys(), vec!["1".to_string(), "5".to_string()]);
    }

    #[test]
    fn environment_only_exports() {
        let mut scopes = ScopeStack::new();
        scopes.set_local("PLAIN", Variable::scalar("x"));
        scopes.set_local("HOME", Variable::exported("/home/user"));
        let env = scopes.environment();
        assert_eq!(env.get("HOME").map(String::as_str), Some("/home/user"));
        assert!(!env.contains_key("PLAIN"));
    }

    #[test]
    fn case_fold_attributes() {
        let mut scopes = ScopeStack::new();
        scopes.set_scalar("x", "seed").unwrap();
        scopes.get_mut("x").unwrap().attrs.uppercase = true;
        scopes.set_scalar("x", "loud").unwrap();
        assert_eq!(scopes.get("x").unwrap().value.as_scalar(), "LOUD");
    }

    #[test]
    fn attrs_flag_chars_cover_every_attribute() {
        let mut attrs = Attrs::default();
        assert_eq!(attrs.flag_chars(), "");
        attrs.lowercase = true;
        attrs.exported = true;
        assert_eq!(attrs.flag_chars(), "lx");
        attrs.integer = true;
        attrs.nameref = true;
        attrs.readonly = true;
        attrs.uppercase = true;
        assert_eq!(attrs.flag_chars(), "ilnrux");
    }

    #[test]
    fn options_by_name() {
        let mut opts = ShellOptions::default();
        opts.set("pipefail", true).unwrap();
        assert_eq!(opts.get("pipefail"), Some(true));
        assert!(opts.set("bogus", true).is_err());
        opts.set_short('e', true).unwrap();
        assert!(opts.errexit);
    }
}
