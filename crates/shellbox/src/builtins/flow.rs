//! Flow-control builtins: `: true false break continue return exit wait`
//!
//! break/continue/return/exit signal the evaluator through the control-flow
//! slot on the shell state rather than unwinding directly, so they still go
//! through the uniform command contract.

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ControlFlow;

/// `:` — does nothing, successfully.
pub struct Colon;

#[async_trait]
impl Builtin for Colon {
    async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<i32> {
        Ok(0)
    }
}

pub struct True;

#[async_trait]
impl Builtin for True {
    async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<i32> {
        Ok(0)
    }
}

pub struct False;

#[async_trait]
impl Builtin for False {
    async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<i32> {
        Ok(1)
    }
}

fn level_arg(ctx: &Context<'_>) -> std::result::Result<u32, String> {
    match ctx.args().first() {
        None => Ok(1),
        Some(text) => match text.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(format!("{}: numeric argument required", text)),
        },
    }
}

pub struct Break;

#[async_trait]
impl Builtin for Break {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        match level_arg(ctx) {
            Ok(n) => {
                ctx.state.control = ControlFlow::Break(n);
                Ok(0)
            }
            Err(message) => ctx.error(message).await,
        }
    }
}

pub struct Continue;

#[async_trait]
impl Builtin for Continue {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        match level_arg(ctx) {
            Ok(n) => {
                ctx.state.control = ControlFlow::Continue(n);
                Ok(0)
            }
            Err(message) => ctx.error(message).await,
        }
    }
}

pub struct Return;

#[async_trait]
impl Builtin for Return {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let code = match ctx.args().first() {
            Some(text) => text.parse::<i32>().unwrap_or(2) & 0xff,
            None => ctx.state.last_status,
        };
        ctx.state.control = ControlFlow::Return(code);
        Ok(code)
    }
}

pub struct Exit;

#[async_trait]
impl Builtin for Exit {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let code = match ctx.args().first() {
            Some(text) => text.parse::<i32>().unwrap_or(2) & 0xff,
            None => ctx.state.last_status,
        };
        ctx.state.control = ControlFlow::Exit(code);
        Ok(code)
    }
}

/// `wait [id...]` — collect background jobs.
pub struct Wait;

#[async_trait]
impl Builtin for Wait {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            return Ok(ctx.jobs.wait_all().await);
        }
        let mut status = 0;
        for arg in ctx.args().to_vec() {
            let id: u64 = match arg.parse() {
                Ok(id) => id,
                Err(_) => return ctx.error(format!("{}: not a valid job id", arg)).await,
            };
            status = match ctx.jobs.wait_for(id).await {
                Some(status) => status,
                None => 127,
            };
        }
        Ok(status)
    }
}
