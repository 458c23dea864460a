//! Variable and option builtins:
//! `set shopt export readonly local declare typeset unset shift let umask`

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::expand::arith;
use crate::interpreter::{Attrs, ShellOptions, Value, Variable};

/// Split `name=value` (or return just the name).
fn split_assign(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    }
}

pub struct Set;

#[async_trait]
impl Builtin for Set {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            let mut out = String::new();
            for name in ctx.state.scopes.visible_names() {
                if let Some(var) = ctx.state.scopes.get(&name) {
                    out.push_str(&format!("{}={}\n", name, var.value.as_scalar()));
                }
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }

        let args = ctx.args().to_vec();
        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "--" => {
                    ctx.state.positional = args[i + 1..].to_vec();
                    return Ok(0);
                }
                "-o" | "+o" => {
                    let on = arg.starts_with('-');
                    i += 1;
                    match args.get(i) {
                        Some(name) => {
                            if ctx.state.options.set(name, on).is_err() {
                                return ctx.error(format!("{}: invalid option name", name)).await;
                            }
                        }
                        None => {
                            let mut out = String::new();
                            for name in ShellOptions::SET_NAMES {
                                let enabled = ctx.state.options.get(name).unwrap_or(false);
                                out.push_str(&format!(
                                    "{:<15}\t{}\n",
                                    name,
                                    if enabled { "on" } else { "off" }
                                ));
                            }
                            ctx.io.stdout.write_str(&out).await?;
                        }
                    }
                }
                _ if arg.starts_with('-') || arg.starts_with('+') => {
                    let on = arg.starts_with('-');
                    for flag in arg[1..].chars() {
                        if ctx.state.options.set_short(flag, on).is_err() {
                            return ctx.error(format!("-{}: invalid option", flag)).await;
                        }
                    }
                }
                _ => {
                    ctx.state.positional = args[i..].to_vec();
                    return Ok(0);
                }
            }
            i += 1;
        }
        Ok(0)
    }
}

pub struct Shopt;

#[async_trait]
impl Builtin for Shopt {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let mut mode: Option<bool> = None;
        let mut quiet = false;
        let mut names = Vec::new();
        for arg in &args {
            match arg.as_str() {
                "-s" => mode = Some(true),
                "-u" => mode = Some(false),
                "-q" => quiet = true,
                name => names.push(name.to_string()),
            }
        }

        if names.is_empty() {
            let mut out = String::new();
            for name in ShellOptions::SHOPT_NAMES {
                let enabled = ctx.state.options.get(name).unwrap_or(false);
                out.push_str(&format!(
                    "{}\t{}\n",
                    name,
                    if enabled { "on" } else { "off" }
                ));
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }

        let mut status = 0;
        for name in names {
            match mode {
                Some(on) => {
                    if ctx.state.options.set(&name, on).is_err() {
                        status = ctx
                            .error(format!("{}: invalid shell option name", name))
                            .await?;
                    }
                }
                None => match ctx.state.options.get(&name) {
                    Some(enabled) => {
                        if !quiet {
                            ctx.io
                                .stdout
                                .write_str(&format!(
                                    "{}\t{}\n",
                                    name,
                                    if enabled { "on" } else { "off" }
                                ))
                                .await?;
                        }
                        if !enabled {
                            status = 1;
                        }
                    }
                    None => {
                        status = ctx
                            .error(format!("{}: invalid shell option name", name))
                            .await?;
                    }
                },
            }
        }
        Ok(status)
    }
}

pub struct Export;

#[async_trait]
impl Builtin for Export {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let unexport = args.first().map(String::as_str) == Some("-n");
        let print = args.is_empty() || args.first().map(String::as_str) == Some("-p");
        if print {
            let mut out = String::new();
            for name in ctx.state.scopes.visible_names() {
                if let Some(var) = ctx.state.scopes.get(&name) {
                    if var.attrs.exported {
                        out.push_str(&format!(
                            "declare -x {}=\"{}\"\n",
                            name,
                            var.value.as_scalar()
                        ));
                    }
                }
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }

        let names = if unexport { &args[1..] } else { &args[..] };
        for arg in names {
            let (name, value) = split_assign(arg);
            let value = value.map(|v| Value::scalar(v.to_string()));
            ctx.state
                .scopes
                .declare(name, value, |attrs| attrs.exported = !unexport)?;
        }
        Ok(0)
    }
}

pub struct Readonly;

#[async_trait]
impl Builtin for Readonly {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        for arg in ctx.args().to_vec() {
            let (name, value) = split_assign(&arg);
            let value = value.map(|v| Value::scalar(v.to_string()));
            ctx.state
                .scopes
                .declare(name, value, |attrs| attrs.readonly = true)?;
        }
        Ok(0)
    }
}

pub struct Local;

#[async_trait]
impl Builtin for Local {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.state.scopes.depth() == 1 {
            return ctx.error("can only be used in a function").await;
        }
        for arg in ctx.args().to_vec() {
            let (name, value) = split_assign(&arg);
            ctx.state.scopes.set_local(
                name,
                Variable::scalar(value.unwrap_or("").to_string()),
            );
        }
        Ok(0)
    }
}

pub struct Declare;

#[async_trait]
impl Builtin for Declare {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let mut set_attrs: Vec<(char, bool)> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut print = false;

        for arg in &args {
            if arg == "-p" {
                print = true;
            } else if let Some(flags) = arg.strip_prefix('-') {
                for flag in flags.chars() {
                    set_attrs.push((flag, true));
                }
            } else if let Some(flags) = arg.strip_prefix('+') {
                for flag in flags.chars() {
                    set_attrs.push((flag, false));
                }
            } else {
                names.push(arg.clone());
            }
        }

        if names.is_empty() || print {
            let mut out = String::new();
            let targets = if names.is_empty() {
                ctx.state.scopes.visible_names()
            } else {
                names.clone()
            };
            for name in targets {
                if let Some(var) = ctx.state.scopes.get(&name) {
                    out.push_str(&format_declare(&name, var));
                }
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }

        let local = ctx.state.scopes.depth() > 1;
        for arg in names {
            let (name, value) = split_assign(&arg);
            let make_array = set_attrs.iter().any(|(f, on)| *f == 'a' && *on);
            let make_assoc = set_attrs.iter().any(|(f, on)| *f == 'A' && *on);
            let value = match value {
                Some(v) => Some(Value::scalar(v.to_string())),
                None if make_assoc => Some(Value::Assoc(Default::default())),
                None if make_array => Some(Value::Indexed(Default::default())),
                None => None,
            };
            let update = |attrs: &mut Attrs| {
                for (flag, on) in &set_attrs {
                    match flag {
                        'x' => attrs.exported = *on,
                        'r' => attrs.readonly = *on,
                        'i' => attrs.integer = *on,
                        'l' => attrs.lowercase = *on,
                        'u' => attrs.uppercase = *on,
                        'n' => attrs.nameref = *on,
                        _ => {}
                    }
                }
            };
            if local {
                let mut var = Variable {
                    value: value.unwrap_or_else(|| Value::scalar("")),
                    attrs: Attrs::default(),
                };
                update(&mut var.attrs);
                ctx.state.scopes.set_local(name, var);
            } else {
                ctx.state.scopes.declare(name, value, update)?;
            }
        }
        Ok(0)
    }
}

fn format_declare(name: &str, var: &Variable) -> String {
    let mut flags = String::new();
    match &var.value {
        Value::Indexed(_) => flags.push('a'),
        Value::Assoc(_) => flags.push('A'),
        Value::Scalar(_) => {}
    }
    flags.push_str(&var.attrs.flag_chars());
    if flags.is_empty() {
        flags.push('-');
    }
    match &var.value {
        Value::Scalar(s) => format!("declare -{} {}=\"{}\"\n", flags, name, s),
        value => {
            let body: Vec<String> = value
                .keys()
                .iter()
                .zip(value.elements())
                .map(|(k, v)| format!("[{}]=\"{}\"", k, v))
                .collect();
            format!("declare -{} {}=({})\n", flags, name, body.join(" "))
        }
    }
}

pub struct Unset;

#[async_trait]
impl Builtin for Unset {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let mut functions_only = false;
        let mut variables_only = false;
        let mut names = Vec::new();
        for arg in &args {
            match arg.as_str() {
                "-f" => functions_only = true,
                "-v" => variables_only = true,
                name => names.push(name.to_string()),
            }
        }
        for name in names {
            if functions_only {
                ctx.state.functions.remove(&name);
                continue;
            }
            let removed = match ctx.state.scopes.unset(&name) {
                Ok(removed) => removed,
                Err(e) => return ctx.error(e.to_string()).await,
            };
            if !removed && !variables_only {
                ctx.state.functions.remove(&name);
            }
        }
        Ok(0)
    }
}

pub struct Shift;

#[async_trait]
impl Builtin for Shift {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let n: usize = match ctx.args().first() {
            Some(text) => match text.parse() {
                Ok(n) => n,
                Err(_) => return ctx.error(format!("{}: numeric argument required", text)).await,
            },
            None => 1,
        };
        if n > ctx.state.positional.len() {
            return Ok(1);
        }
        ctx.state.positional.drain(..n);
        Ok(0)
    }
}

/// `let expr...` — status 0 when the last expression is nonzero.
pub struct Let;

#[async_trait]
impl Builtin for Let {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            return ctx.error("expression expected").await;
        }
        let mut value = 0;
        for expr in ctx.args().to_vec() {
            value = match arith::eval(&expr, ctx.state) {
                Ok(value) => value,
                Err(e) => return ctx.error(e.to_string()).await,
            };
        }
        Ok(i32::from(value == 0))
    }
}

pub struct Umask;

#[async_trait]
impl Builtin for Umask {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        match ctx.args().first() {
            None => {
                let umask = ctx.fs.umask();
                ctx.io
                    .stdout
                    .write_str(&format!("{:04o}\n", umask))
                    .await?;
                Ok(0)
            }
            Some(text) => match u32::from_str_radix(text, 8) {
                Ok(mask) if mask <= 0o777 => {
                    ctx.fs.set_umask(mask);
                    Ok(0)
                }
                _ => ctx.error(format!("{}: octal number out of range", text)).await,
            },
        }
    }
}
