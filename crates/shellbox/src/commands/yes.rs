//! yes utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::{Error, Result};

/// `yes [text]` — repeats until the consumer goes away (broken pipe) or the
/// session is cancelled.
pub struct Yes;

#[async_trait]
impl Utility for Yes {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let line = if ctx.args().is_empty() {
            "y\n".to_string()
        } else {
            format!("{}\n", ctx.args().join(" "))
        };
        // Emit in chunks so the pipe's backpressure is what paces us.
        let chunk = line.repeat((4096 / line.len()).max(1));
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            ctx.io.stdout.write_str(&chunk).await?;
            // Keep the cooperative scheduler breathing when the sink never
            // suspends (capture or /dev/null), so the deadline can fire.
            tokio::task::yield_now().await;
        }
    }
}
