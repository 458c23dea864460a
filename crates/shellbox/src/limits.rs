//! Resource limits for sandboxed execution
//!
//! Limits are enforced by the evaluator, not the OS: a fuel counter per AST
//! statement, a per-loop iteration cap, a function-depth cap and a wall-clock
//! deadline checked at statement boundaries.

use std::time::{Duration, Instant};

/// Resource limits for script execution.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum AST statements entered per `run`.
    pub max_statements: u64,

    /// Maximum iterations for a single loop instance.
    pub max_loop_iterations: u64,

    /// Maximum function call depth.
    pub max_function_depth: usize,

    /// Wall-clock budget per `run`.
    pub timeout: Duration,

    /// Maximum total bytes held by the virtual filesystem.
    pub max_vfs_bytes: u64,

    /// Pipe buffer capacity; a full buffer suspends the writer.
    pub max_pipe_buffer: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_statements: 1_000_000,
            max_loop_iterations: 100_000,
            max_function_depth: 256,
            timeout: Duration::from_secs(30),
            max_vfs_bytes: 64 * 1024 * 1024,
            max_pipe_buffer: 1024 * 1024,
        }
    }
}

impl ExecutionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_statements(mut self, count: u64) -> Self {
        self.max_statements = count;
        self
    }

    pub fn max_loop_iterations(mut self, count: u64) -> Self {
        self.max_loop_iterations = count;
        self
    }

    pub fn max_function_depth(mut self, depth: usize) -> Self {
        self.max_function_depth = depth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_vfs_bytes(mut self, bytes: u64) -> Self {
        self.max_vfs_bytes = bytes;
        self
    }

    pub fn max_pipe_buffer(mut self, bytes: usize) -> Self {
        self.max_pipe_buffer = bytes;
        self
    }
}

/// Mutable counters tracking resource usage for one `run`.
///
/// Shared between the root evaluator and its subshell tasks so a pipeline
/// cannot multiply its fuel.
#[derive(Debug, Default)]
pub struct ExecutionCounters {
    statements: u64,
    function_depth: usize,
    deadline: Option<Instant>,
}

impl ExecutionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the wall-clock deadline at the start of a run.
    pub fn start(&mut self, limits: &ExecutionLimits) {
        self.statements = 0;
        self.function_depth = 0;
        self.deadline = Some(Instant::now() + limits.timeout);
    }

    /// Account for one statement; checks fuel and the deadline.
    pub fn tick_statement(&mut self, limits: &ExecutionLimits) -> Result<(), LimitExceeded> {
        self.statements += 1;
        if self.statements > limits.max_statements {
            return Err(LimitExceeded::Statements(limits.max_statements));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(LimitExceeded::WallClock(limits.timeout));
            }
        }
        Ok(())
    }

    /// Checked on function call entry; callers must pair with [`pop_function`].
    ///
    /// [`pop_function`]: ExecutionCounters::pop_function
    pub fn push_function(&mut self, limits: &ExecutionLimits) -> Result<(), LimitExceeded> {
        if self.function_depth >= limits.max_function_depth {
            return Err(LimitExceeded::FunctionDepth(limits.max_function_depth));
        }
        self.function_depth += 1;
        Ok(())
    }

    pub fn pop_function(&mut self) {
        self.function_depth = self.function_depth.saturating_sub(1);
    }

    /// Remaining wall-clock budget, used to cap `sleep`.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Error returned when a resource limit is exceeded. Exit code 124.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitExceeded {
    #[error("maximum statement count exceeded ({0})")]
    Statements(u64),

    #[error("maximum loop iterations exceeded ({0})")]
    LoopIterations(u64),

    #[error("maximum function depth exceeded ({0})")]
    FunctionDepth(usize),

    #[error("wall-clock budget exhausted ({0:?})")]
    WallClock(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_statements, 1_000_000);
        assert_eq!(limits.max_loop_iterations, 100_000);
        assert_eq!(limits.max_function_depth, 256);
        assert_eq!(limits.timeout, Duration::from_secs(30));
        assert_eq!(limits.max_vfs_bytes, 64 * 1024 * 1024);
        assert_eq!(limits.max_pipe_buffer, 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let limits = ExecutionLimits::new()
            .max_statements(100)
            .max_loop_iterations(50)
            .max_function_depth(10)
            .timeout(Duration::from_secs(5));
        assert_eq!(limits.max_statements, 100);
        assert_eq!(limits.max_loop_iterations, 50);
        assert_eq!(limits.max_function_depth, 10);
        assert_eq!(limits.timeout, Duration::from_secs(5));
    }

    #[test]
    fn statement_fuel_runs_out() {
        let limits = ExecutionLimits::new().max_statements(5);
        let mut counters = ExecutionCounters::new();
        counters.start(&limits);

        for _ in 0..5 {
            assert!(counters.tick_statement(&limits).is_ok());
        }
        assert!(matches!(
            counters.tick_statement(&limits),
            Err(LimitExceeded::Statements(5))
        ));
    }

    #[test]
    fn function_depth_checked_on_push() {
        let limits = ExecutionLimits::new().max_function_depth(2);
        let mut counters = ExecutionCounters::new();
        counters.start(&limits);

        assert!(counters.push_function(&limits).is_ok());
        assert!(counters.push_function(&limits).is_ok());
        assert!(matches!(
            counters.push_function(&limits),
            Err(LimitExceeded::FunctionDepth(2))
        ));

        counters.pop_function();
        assert!(counters.push_function(&limits).is_ok());
    }

    #[test]
    fn deadline_trips_tick() {
        let limits = ExecutionLimits::new().timeout(Duration::ZERO);
        let mut counters = ExecutionCounters::new();
        counters.start(&limits);
        assert!(matches!(
            counters.tick_statement(&limits),
            Err(LimitExceeded::WallClock(_))
        ));
    }
}
