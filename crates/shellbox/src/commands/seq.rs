//! seq utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `seq LAST` | `seq FIRST LAST` | `seq FIRST STEP LAST`
pub struct Seq;

#[async_trait]
impl Utility for Seq {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut separator = "\n".to_string();
        let mut operands: Vec<i64> = Vec::new();
        let args = ctx.args().to_vec();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-s" => {
                    if let Some(s) = iter.next() {
                        separator = s.clone();
                    }
                }
                text => match text.parse() {
                    Ok(n) => operands.push(n),
                    Err(_) => {
                        return ctx.fail(format!("invalid argument: '{}'", text)).await
                    }
                },
            }
        }

        let (first, step, last) = match operands.as_slice() {
            [last] => (1, 1, *last),
            [first, last] => (*first, if first <= last { 1 } else { -1 }, *last),
            [first, step, last] => (*first, *step, *last),
            _ => return ctx.fail("missing operand").await,
        };
        if step == 0 {
            return ctx.fail("step may not be zero").await;
        }

        let mut out = String::new();
        let mut value = first;
        let mut emitted = false;
        while (step > 0 && value <= last) || (step < 0 && value >= last) {
            if emitted {
                out.push_str(&separator);
            }
            out.push_str(&value.to_string());
            emitted = true;
            value = match value.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        if emitted {
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}
