//! sleep utility

use std::time::Duration;

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `sleep SECONDS` — suspends cooperatively; capped by the wall-clock
/// budget and interruptible by cancellation.
pub struct Sleep;

#[async_trait]
impl Utility for Sleep {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let operand = match ctx.args().first() {
            Some(operand) => operand.clone(),
            None => return ctx.fail("missing operand").await,
        };
        let seconds: f64 = match operand.trim_end_matches('s').parse() {
            Ok(seconds) => seconds,
            Err(_) => return ctx.fail(format!("invalid time interval '{}'", operand)).await,
        };
        if seconds < 0.0 {
            return ctx.fail(format!("invalid time interval '{}'", operand)).await;
        }

        let mut duration = Duration::from_secs_f64(seconds);
        let mut overruns_budget = false;
        if let Some(remaining) = ctx.remaining_time {
            if duration > remaining {
                // Sleeping past the deadline can only end one way; cut the
                // wait short and report the budget as exhausted.
                duration = remaining;
                overruns_budget = true;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                if overruns_budget {
                    Err(crate::LimitExceeded::WallClock(duration).into())
                } else {
                    Ok(0)
                }
            }
            _ = ctx.cancel.cancelled() => Err(crate::Error::Cancelled),
        }
    }
}
