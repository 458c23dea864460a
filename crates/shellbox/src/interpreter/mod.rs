//! Interpreter: walks the AST, driving expansion, dispatch and streams.
//!
//! Pipelines run as cooperative tasks on the single-threaded runtime, each
//! stage on its own derived copy of the shell state (subshell semantics)
//! connected by bounded pipes. Expansion, filesystem and dispatch errors are
//! recovered at the command boundary: a line on stderr plus a nonzero status.

mod cond;
pub(crate) mod jobs;
mod scope;
mod state;
pub(crate) mod stream;

pub use scope::{Attrs, ScopeStack, ShellOptions, ShellState, Value, Variable};
pub use state::{ControlFlow, ExecResult};
pub use stream::{Input, Io, Output};

pub(crate) use cond::{file_test as cond_file_test, parse_int as cond_parse_int};

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use tokio_util::sync::CancellationToken;

use crate::builtins::{Context, Registry, UtilityContext};
use crate::error::{Error, Result};
use crate::expand::arith;
use crate::fs::FileSystem;
use crate::limits::{ExecutionCounters, ExecutionLimits, LimitExceeded};
use crate::parser::{
    AndOr, AssignValue, Assignment, CaseTerm, Command, CommandList, CompoundCommand, FunctionDef,
    Pipeline, Redirect, RedirectKind, Script, SimpleCommand,
};

use jobs::JobTable;

/// Command names the evaluator handles before registry dispatch, because
/// they re-enter the parser or change lookup semantics.
pub const SPECIAL_FORMS: &[&str] = &["eval", "source", ".", "command", "builtin", "exec"];

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct Interpreter {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) state: ShellState,
    pub(crate) limits: Arc<ExecutionLimits>,
    pub(crate) counters: Arc<StdMutex<ExecutionCounters>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) jobs: JobTable,
    /// Status of the most recent command substitution; the status of an
    /// assignment-only command.
    pub(crate) last_subst_status: Option<i32>,
}

impl Interpreter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        registry: Arc<Registry>,
        limits: Arc<ExecutionLimits>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fs,
            registry,
            state: ShellState::new(),
            limits,
            counters: Arc::new(StdMutex::new(ExecutionCounters::new())),
            cancel,
            jobs: JobTable::new(),
            last_subst_status: None,
        }
    }

    /// A derived interpreter for subshells and pipeline stages: copied state,
    /// shared filesystem, registry, fuel and cancellation.
    pub(crate) fn subshell(&self) -> Interpreter {
        Interpreter {
            fs: Arc::clone(&self.fs),
            registry: Arc::clone(&self.registry),
            state: self.state.clone(),
            limits: Arc::clone(&self.limits),
            counters: Arc::clone(&self.counters),
            cancel: self.cancel.clone(),
            jobs: JobTable::new(),
            last_subst_status: None,
        }
    }

    /// Statement-boundary check: cancellation, fuel, deadline.
    pub(crate) fn tick(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut counters = self.counters.lock().expect("counters lock");
        counters.tick_statement(&self.limits)?;
        Ok(())
    }

    /// Execute a script in the current shell. `$?` semantics: the returned
    /// status is the last command's, and `state.last_status` tracks it.
    pub async fn run_script(&mut self, script: &Script, io: &mut Io) -> Result<i32> {
        let mut status = self.state.last_status;
        for item in &script.items {
            self.tick()?;
            if item.background {
                status = self.spawn_background(&item.command, io);
            } else {
                status = self.exec_command(&item.command, io).await?;
            }
            self.state.last_status = status;
            if !self.state.control.is_none() {
                break;
            }
            // errexit: a negated pipeline is itself a condition and exempt.
            let negated = matches!(&item.command, Command::Pipeline(p) if p.negated);
            if status != 0
                && self.state.options.errexit
                && self.state.condition_depth == 0
                && !negated
            {
                self.state.control = ControlFlow::Exit(status);
                break;
            }
        }
        Ok(status)
    }

    fn spawn_background(&mut self, command: &Command, io: &Io) -> i32 {
        let mut sub = self.subshell();
        let command = command.clone();
        let mut sub_io = Io::new(Input::null(), io.stdout.clone(), io.stderr.clone());
        let handle = tokio::spawn(async move {
            sub.exec_command(&command, &mut sub_io).await.unwrap_or(1)
        });
        let id = self.jobs.spawn(handle);
        self.state.last_background = Some(id);
        0
    }

    pub(crate) fn exec_command<'a>(
        &'a mut self,
        command: &'a Command,
        io: &'a mut Io,
    ) -> BoxFuture<'a, Result<i32>> {
        Box::pin(async move {
            match command {
                Command::Simple(simple) => self.exec_simple(simple, io).await,
                Command::Pipeline(pipeline) => self.exec_pipeline(pipeline, io).await,
                Command::List(list) => self.exec_list(list, io).await,
                Command::Compound(compound, redirects) => {
                    self.exec_compound(compound, redirects, io).await
                }
                Command::FunctionDef(def) => {
                    self.state
                        .functions
                        .insert(def.name.clone(), Arc::new(def.clone()));
                    Ok(0)
                }
            }
        })
    }

    async fn exec_list(&mut self, list: &CommandList, io: &mut Io) -> Result<i32> {
        let total = list.rest.len();

        // Every segment but the final one is a condition for what follows,
        // so errexit does not fire on it.
        self.state.condition_depth += 1;
        let first_result = self.exec_command(&list.first, io).await;
        self.state.condition_depth -= 1;
        let mut status = first_result?;
        self.state.last_status = status;

        for (i, (op, command)) in list.rest.iter().enumerate() {
            if !self.state.control.is_none() {
                break;
            }
            let run = match op {
                AndOr::And => status == 0,
                AndOr::Or => status != 0,
            };
            if !run {
                continue;
            }
            let is_last = i == total - 1;
            if !is_last {
                self.state.condition_depth += 1;
            }
            let result = self.exec_command(command, io).await;
            if !is_last {
                self.state.condition_depth -= 1;
            }
            status = result?;
            self.state.last_status = status;
        }
        Ok(status)
    }

    async fn exec_pipeline(&mut self, pipeline: &Pipeline, io: &mut Io) -> Result<i32> {
        let negated = pipeline.negated;
        if negated {
            self.state.condition_depth += 1;
        }
        let result = self.exec_pipeline_inner(pipeline, io).await;
        if negated {
            self.state.condition_depth -= 1;
        }
        let status = result?;
        Ok(if negated {
            i32::from(status == 0)
        } else {
            status
        })
    }

    async fn exec_pipeline_inner(&mut self, pipeline: &Pipeline, io: &mut Io) -> Result<i32> {
        if pipeline.commands.len() == 1 {
            return self.exec_command(&pipeline.commands[0], io).await;
        }

        let n = pipeline.commands.len();
        let mut handles = Vec::with_capacity(n);
        let mut next_stdin = Some(io.take_stdin());

        for (i, command) in pipeline.commands.iter().enumerate() {
            let last = i == n - 1;
            let stdin = next_stdin.take().expect("stage stdin");
            let stdout = if last {
                io.stdout.clone()
            } else {
                let (writer, reader) = stream::pipe(self.limits.max_pipe_buffer);
                next_stdin = Some(Input::from_pipe(reader));
                Output::from_pipe(writer)
            };
            let mut stage_io = Io::new(stdin, stdout, io.stderr.clone());
            let mut sub = self.subshell();
            let command = command.clone();
            handles.push(tokio::spawn(async move {
                let status = sub.exec_command(&command, &mut stage_io).await;
                stage_io.stdout.close().await;
                status
            }));
        }

        let mut statuses = Vec::with_capacity(n);
        for handle in handles {
            match handle.await {
                Ok(Ok(status)) => statuses.push(status),
                Ok(Err(Error::BrokenPipe)) => statuses.push(141),
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(Error::Execution("pipeline task panicked".into())),
            }
        }

        let status = if self.state.options.pipefail {
            statuses.iter().copied().find(|s| *s != 0).unwrap_or(0)
        } else {
            *statuses.last().expect("nonempty pipeline")
        };
        Ok(status)
    }

    async fn exec_compound(
        &mut self,
        compound: &CompoundCommand,
        redirects: &[Redirect],
        io: &mut Io,
    ) -> Result<i32> {
        let (mut sub_io, restore) = match self.apply_redirects(io, redirects).await {
            Ok(pair) => pair,
            Err(e) => return self.report_command_error(io, e).await,
        };
        let status = self.exec_compound_body(compound, &mut sub_io).await;
        if restore {
            io.stdin = sub_io.take_stdin();
        }
        status
    }

    async fn exec_compound_body(
        &mut self,
        compound: &CompoundCommand,
        io: &mut Io,
    ) -> Result<i32> {
        match compound {
            CompoundCommand::If {
                cond,
                then,
                elifs,
                els,
            } => {
                if self.run_condition(cond, io).await? == 0 {
                    return self.run_script(then, io).await;
                }
                for (c, b) in elifs {
                    if self.run_condition(c, io).await? == 0 {
                        return self.run_script(b, io).await;
                    }
                }
                if let Some(els) = els {
                    return self.run_script(els, io).await;
                }
                Ok(0)
            }
            CompoundCommand::While { cond, body } => self.run_loop(cond, body, false, io).await,
            CompoundCommand::Until { cond, body } => self.run_loop(cond, body, true, io).await,
            CompoundCommand::For { var, words, body } => {
                let values = match words {
                    Some(words) => self.expand_words(words, &io.stderr.clone()).await?,
                    None => self.state.positional.clone(),
                };
                let mut status = 0;
                let mut iterations: u64 = 0;
                for value in values {
                    self.tick()?;
                    iterations += 1;
                    if iterations > self.limits.max_loop_iterations {
                        return Err(LimitExceeded::LoopIterations(
                            self.limits.max_loop_iterations,
                        )
                        .into());
                    }
                    self.state.scopes.set_scalar(var, value)?;
                    status = self.run_script(body, io).await?;
                    match self.loop_control() {
                        LoopSignal::Break => break,
                        LoopSignal::Continue => continue,
                        LoopSignal::Propagate => break,
                        LoopSignal::None => {}
                    }
                }
                Ok(status)
            }
            CompoundCommand::CFor {
                init,
                cond,
                step,
                body,
            } => {
                self.eval_arith(init, &io.stderr.clone()).await?;
                let mut status = 0;
                let mut iterations: u64 = 0;
                loop {
                    self.tick()?;
                    iterations += 1;
                    if iterations > self.limits.max_loop_iterations {
                        return Err(LimitExceeded::LoopIterations(
                            self.limits.max_loop_iterations,
                        )
                        .into());
                    }
                    if !cond.trim().is_empty()
                        && self.eval_arith(cond, &io.stderr.clone()).await? == 0
                    {
                        break;
                    }
                    status = self.run_script(body, io).await?;
                    match self.loop_control() {
                        LoopSignal::Break => break,
                        LoopSignal::Continue => {}
                        LoopSignal::Propagate => break,
                        LoopSignal::None => {}
                    }
                    self.eval_arith(step, &io.stderr.clone()).await?;
                }
                Ok(status)
            }
            CompoundCommand::Case { subject, arms } => {
                let stderr = io.stderr.clone();
                let subject = self.expand_word_single(subject, &stderr).await?;
                let mut status = 0;
                let mut fall_through = false;
                for arm in arms {
                    let mut matched = fall_through;
                    if !matched {
                        for pattern in &arm.patterns {
                            let pattern = self.expand_word_pattern(pattern, &stderr).await?;
                            if crate::expand::glob::match_glob(&pattern, &subject) {
                                matched = true;
                                break;
                            }
                        }
                    }
                    if !matched {
                        continue;
                    }
                    status = self.run_script(&arm.body, io).await?;
                    if !self.state.control.is_none() {
                        break;
                    }
                    match arm.terminator {
                        CaseTerm::Break => break,
                        CaseTerm::FallThrough => {
                            fall_through = true;
                            continue;
                        }
                        CaseTerm::Continue => {
                            fall_through = false;
                            continue;
                        }
                    }
                }
                Ok(status)
            }
            CompoundCommand::Subshell(script) => {
                let mut sub = self.subshell();
                let status = sub.run_script(script, io).await?;
                // Subshell state is discarded; an `exit` inside only ends it.
                Ok(match sub.state.control {
                    ControlFlow::Exit(code) => code,
                    _ => status,
                })
            }
            CompoundCommand::Group(script) => self.run_script(script, io).await,
            CompoundCommand::Arith(expr) => {
                match self.eval_arith_checked(expr, &io.stderr.clone()).await? {
                    Some(value) => Ok(i32::from(value == 0)),
                    None => Ok(1),
                }
            }
            CompoundCommand::Cond(words) => {
                let stderr = io.stderr.clone();
                match cond::eval_cond(self, words, &stderr).await {
                    Ok(true) => Ok(0),
                    Ok(false) => Ok(1),
                    Err(e) => {
                        stderr
                            .write_str(&format!("shellbox: [[: {}\n", e))
                            .await
                            .ok();
                        Ok(2)
                    }
                }
            }
        }
    }

    async fn run_condition(&mut self, script: &Script, io: &mut Io) -> Result<i32> {
        self.state.condition_depth += 1;
        let result = self.run_script(script, io).await;
        self.state.condition_depth -= 1;
        result
    }

    async fn run_loop(
        &mut self,
        cond: &Script,
        body: &Script,
        until: bool,
        io: &mut Io,
    ) -> Result<i32> {
        let mut status = 0;
        let mut iterations: u64 = 0;
        loop {
            self.tick()?;
            iterations += 1;
            if iterations > self.limits.max_loop_iterations {
                return Err(LimitExceeded::LoopIterations(self.limits.max_loop_iterations).into());
            }
            let cond_status = self.run_condition(cond, io).await?;
            if !self.state.control.is_none() {
                // break/continue/return inside the condition itself
                match self.loop_control() {
                    LoopSignal::Break => break,
                    LoopSignal::Continue => continue,
                    LoopSignal::Propagate => break,
                    LoopSignal::None => {}
                }
            }
            let truthy = cond_status == 0;
            if truthy == until {
                break;
            }
            status = self.run_script(body, io).await?;
            match self.loop_control() {
                LoopSignal::Break => break,
                LoopSignal::Continue => continue,
                LoopSignal::Propagate => break,
                LoopSignal::None => {}
            }
        }
        Ok(status)
    }

    /// Translate a pending control signal into this loop's action.
    fn loop_control(&mut self) -> LoopSignal {
        match self.state.control {
            ControlFlow::Break(n) => {
                if n > 1 {
                    self.state.control = ControlFlow::Break(n - 1);
                    LoopSignal::Propagate
                } else {
                    self.state.control = ControlFlow::None;
                    LoopSignal::Break
                }
            }
            ControlFlow::Continue(n) => {
                if n > 1 {
                    self.state.control = ControlFlow::Continue(n - 1);
                    LoopSignal::Propagate
                } else {
                    self.state.control = ControlFlow::None;
                    LoopSignal::Continue
                }
            }
            ControlFlow::Return(_) | ControlFlow::Exit(_) => LoopSignal::Propagate,
            ControlFlow::None => LoopSignal::None,
        }
    }

    async fn exec_simple(&mut self, simple: &SimpleCommand, io: &mut Io) -> Result<i32> {
        let stderr = io.stderr.clone();

        // Expand the command words first; an expansion failure kills only
        // this command.
        let fields = match self.expand_words(&simple.words, &stderr).await {
            Ok(fields) => fields,
            Err(e) => return self.report_command_error(io, e).await,
        };

        // Assignment-only command: assignments land in the current scope and
        // the status is the last command substitution's (0 without one).
        if fields.is_empty() {
            self.last_subst_status = None;
            for assignment in &simple.assignments {
                if let Err(e) = self.apply_assignment(assignment, false, &stderr).await {
                    return self.report_command_error(io, e).await;
                }
            }
            // Redirections still run (and can create files).
            match self.apply_redirects(io, &simple.redirects).await {
                Ok((mut sub_io, restore)) => {
                    if restore {
                        io.stdin = sub_io.take_stdin();
                    }
                }
                Err(e) => return self.report_command_error(io, e).await,
            }
            return Ok(self.last_subst_status.take().unwrap_or(0));
        }

        // Alias substitution on the command word.
        let fields = self.expand_aliases(fields);
        let name = fields[0].clone();

        if self.state.options.xtrace {
            stderr
                .write_str(&format!("+ {}\n", fields.join(" ")))
                .await
                .ok();
        }

        let (mut sub_io, restore) = match self.apply_redirects(io, &simple.redirects).await {
            Ok(pair) => pair,
            Err(e) => return self.report_command_error(io, e).await,
        };

        let result = self
            .dispatch(&name, &fields, &simple.assignments, &mut sub_io, io)
            .await;

        if restore {
            io.stdin = sub_io.take_stdin();
        }

        match result {
            Ok(status) => Ok(status),
            Err(e) => self.report_command_error(io, e).await,
        }
    }

    /// Resolve and invoke: special forms, functions, builtins, utilities.
    async fn dispatch(
        &mut self,
        name: &str,
        fields: &[String],
        assignments: &[Assignment],
        io: &mut Io,
        outer_io: &mut Io,
    ) -> Result<i32> {
        if SPECIAL_FORMS.contains(&name) {
            return self.exec_special_form(name, fields, io, outer_io).await;
        }

        if let Some(def) = self.state.functions.get(name).cloned() {
            return self.call_function(&def, &fields[1..], assignments, io).await;
        }

        // Transient assignments scoped to this invocation.
        let saved = self.apply_transient_assignments(assignments, &io.stderr.clone()).await?;
        let result = self.dispatch_registered(name, fields, io).await;
        self.restore_transient(saved);
        result
    }

    pub(crate) async fn dispatch_registered(
        &mut self,
        name: &str,
        fields: &[String],
        io: &mut Io,
    ) -> Result<i32> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let registry = Arc::clone(&self.registry);

        if let Some(builtin) = registry.builtin(name) {
            tracing::debug!(command = name, "builtin");
            let mut ctx = Context {
                argv: fields.to_vec(),
                io,
                state: &mut self.state,
                fs: &self.fs,
                registry: &registry,
                jobs: &mut self.jobs,
            };
            return builtin.invoke(&mut ctx).await;
        }

        if let Some(utility) = registry.utility(name) {
            tracing::debug!(command = name, "utility");
            let remaining = self
                .counters
                .lock()
                .expect("counters lock")
                .remaining_time();
            let mut ctx = UtilityContext {
                argv: fields.to_vec(),
                io,
                env: self.state.scopes.environment(),
                cwd: self.state.cwd.clone(),
                fs: Arc::clone(&self.fs),
                cancel: self.cancel.clone(),
                remaining_time: remaining,
            };
            return utility.invoke(&mut ctx).await;
        }

        Err(Error::CommandNotFound(name.to_string()))
    }

    async fn exec_special_form(
        &mut self,
        name: &str,
        fields: &[String],
        io: &mut Io,
        outer_io: &mut Io,
    ) -> Result<i32> {
        match name {
            "eval" => {
                let script_text = fields[1..].join(" ");
                if script_text.trim().is_empty() {
                    return Ok(0);
                }
                let script = crate::parser::Parser::new(&script_text).parse()?;
                self.run_script(&script, io).await
            }
            "source" | "." => {
                let path = match fields.get(1) {
                    Some(p) => self.state.absolute(p),
                    None => {
                        return Err(Error::Execution(format!("{}: filename argument required", name)))
                    }
                };
                let content = self.fs.read_file(&path).await?;
                let text = String::from_utf8_lossy(&content).into_owned();
                let script = crate::parser::Parser::new(&text).parse()?;
                let saved_positional = if fields.len() > 2 {
                    let saved = std::mem::replace(
                        &mut self.state.positional,
                        fields[2..].to_vec(),
                    );
                    Some(saved)
                } else {
                    None
                };
                let status = self.run_script(&script, io).await;
                if let Some(saved) = saved_positional {
                    self.state.positional = saved;
                }
                // `return` inside a sourced file stops the file, not the shell.
                if let ControlFlow::Return(code) = self.state.control {
                    self.state.control = ControlFlow::None;
                    return Ok(code);
                }
                status
            }
            // Both skip function lookup and go straight to the registry.
            "command" | "builtin" => match fields.get(1) {
                Some(target) => {
                    let target = target.clone();
                    self.dispatch_registered(&target, &fields[1..], io).await
                }
                None => Ok(0),
            },
            "exec" => {
                if fields.len() == 1 {
                    // Redirection-only exec: its redirects were already
                    // applied to `io`; make them stick on the caller's io.
                    outer_io.stdout = io.stdout.clone();
                    outer_io.stderr = io.stderr.clone();
                    return Ok(0);
                }
                let target = fields[1].clone();
                let status = self.dispatch_registered(&target, &fields[1..], io).await?;
                self.state.control = ControlFlow::Exit(status);
                Ok(status)
            }
            _ => unreachable!("not a special form: {}", name),
        }
    }

    async fn call_function(
        &mut self,
        def: &FunctionDef,
        args: &[String],
        assignments: &[Assignment],
        io: &mut Io,
    ) -> Result<i32> {
        {
            let mut counters = self.counters.lock().expect("counters lock");
            counters.push_function(&self.limits)?;
        }
        self.state.scopes.push_frame();
        let saved_positional =
            std::mem::replace(&mut self.state.positional, args.to_vec());

        // Command-prefix assignments become function-local (and exported for
        // the duration of the call).
        let stderr = io.stderr.clone();
        for assignment in assignments {
            let value = match &assignment.value {
                AssignValue::Scalar(word) => self.expand_word_single(word, &stderr).await?,
                AssignValue::Array(_) => String::new(),
            };
            self.state.scopes.set_local(
                &assignment.name,
                Variable {
                    value: Value::scalar(value),
                    attrs: Attrs {
                        exported: true,
                        ..Attrs::default()
                    },
                },
            );
        }

        let result = self.exec_command(&def.body, io).await;

        self.state.positional = saved_positional;
        self.state.scopes.pop_frame();
        self.counters.lock().expect("counters lock").pop_function();

        let status = result?;
        Ok(match self.state.control {
            ControlFlow::Return(code) => {
                self.state.control = ControlFlow::None;
                code
            }
            _ => status,
        })
    }

    fn expand_aliases(&self, mut fields: Vec<String>) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        while let Some(replacement) = self.state.aliases.get(&fields[0]) {
            if seen.contains(&fields[0]) {
                break;
            }
            seen.push(fields[0].clone());
            let mut expanded: Vec<String> =
                replacement.split_whitespace().map(str::to_string).collect();
            if expanded.is_empty() {
                fields.remove(0);
                if fields.is_empty() {
                    return fields;
                }
            } else {
                expanded.extend(fields.drain(1..));
                fields = expanded;
            }
        }
        fields
    }

    /// Apply an assignment to the current scope.
    pub(crate) async fn apply_assignment(
        &mut self,
        assignment: &Assignment,
        local: bool,
        stderr: &Output,
    ) -> Result<()> {
        let name = &assignment.name;
        match (&assignment.value, &assignment.index) {
            (AssignValue::Scalar(word), None) => {
                let mut value = self.expand_word_single(word, stderr).await?;
                if assignment.append {
                    let old = self.state.get_scalar(name).unwrap_or_default();
                    value = format!("{}{}", old, value);
                }
                if local {
                    let mut var = Variable::scalar(value);
                    if let Some(existing) = self.state.scopes.get(name) {
                        var.attrs = existing.attrs;
                    }
                    self.state.scopes.set_local(name, var);
                } else {
                    self.state.scopes.set_scalar(name, value)?;
                }
            }
            (AssignValue::Scalar(word), Some(index)) => {
                let value = self.expand_word_single(word, stderr).await?;
                let assoc = matches!(
                    self.state.scopes.get(name).map(|v| &v.value),
                    Some(Value::Assoc(_))
                );
                let key = if assoc {
                    self.expand_string(index, stderr).await?
                } else {
                    let n = self.eval_arith(index, stderr).await?;
                    n.to_string()
                };
                let value = if assignment.append {
                    let old = match self.state.scopes.get(name).map(|v| &v.value) {
                        Some(Value::Indexed(map)) => {
                            map.get(&key.parse().unwrap_or(0)).cloned().unwrap_or_default()
                        }
                        Some(Value::Assoc(map)) => map.get(&key).cloned().unwrap_or_default(),
                        Some(Value::Scalar(s)) if key == "0" => s.clone(),
                        _ => String::new(),
                    };
                    format!("{}{}", old, value)
                } else {
                    value
                };
                self.state.scopes.set_element(name, &key, value, assoc)?;
            }
            (AssignValue::Array(words), _) => {
                let mut map = std::collections::BTreeMap::new();
                let mut next_index: u64 = 0;
                if assignment.append {
                    if let Some(Value::Indexed(existing)) =
                        self.state.scopes.get(name).map(|v| v.value.clone())
                    {
                        next_index = existing.keys().max().map(|k| k + 1).unwrap_or(0);
                        map = existing;
                    }
                }
                for word in words {
                    // `[k]=v` element syntax inside the literal.
                    if let Some(text) = word.as_literal() {
                        if let Some(rest) = text.strip_prefix('[') {
                            if let Some((key, value)) = rest.split_once("]=") {
                                let idx = self
                                    .eval_arith(key, stderr)
                                    .await
                                    .unwrap_or(next_index as i64);
                                map.insert(idx as u64, value.to_string());
                                next_index = (idx as u64) + 1;
                                continue;
                            }
                        }
                    }
                    for field in self.expand_word_fields(word, stderr).await? {
                        map.insert(next_index, field);
                        next_index += 1;
                    }
                }
                self.state.scopes.set_value(name, Value::Indexed(map))?;
            }
        }
        Ok(())
    }

    async fn apply_transient_assignments(
        &mut self,
        assignments: &[Assignment],
        stderr: &Output,
    ) -> Result<Vec<(String, Option<Variable>)>> {
        let mut saved = Vec::new();
        for assignment in assignments {
            let value = match &assignment.value {
                AssignValue::Scalar(word) => self.expand_word_single(word, stderr).await?,
                AssignValue::Array(_) => String::new(),
            };
            let old = self.state.scopes.get(&assignment.name).cloned();
            saved.push((assignment.name.clone(), old));
            self.state.scopes.set_local(
                &assignment.name,
                Variable {
                    value: Value::scalar(value),
                    attrs: Attrs {
                        exported: true,
                        ..Attrs::default()
                    },
                },
            );
        }
        Ok(saved)
    }

    fn restore_transient(&mut self, saved: Vec<(String, Option<Variable>)>) {
        for (name, old) in saved.into_iter().rev() {
            match old {
                Some(var) => self.state.scopes.set_local(&name, var),
                None => {
                    let _ = self.state.scopes.unset(&name);
                }
            }
        }
    }

    /// Build a command's Io from the caller's plus its redirect list.
    /// The bool reports that the caller's stdin was moved in and should be
    /// restored afterwards.
    async fn apply_redirects(
        &mut self,
        io: &mut Io,
        redirects: &[Redirect],
    ) -> Result<(Io, bool)> {
        let stderr_handle = io.stderr.clone();
        let mut stdin: Option<Input> = None;
        let mut stdout = io.stdout.clone();
        let mut stderr = io.stderr.clone();

        for redirect in redirects {
            let fd = redirect.fd.unwrap_or_else(|| redirect.kind.default_fd());
            match redirect.kind {
                RedirectKind::In => {
                    let target = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    let path = self.state.absolute(&target);
                    let content = self
                        .fs
                        .read_file(&path)
                        .await
                        .map_err(|e| Error::Execution(format!("{}: {}", target, e)))?;
                    stdin = Some(Input::from_bytes(content));
                }
                RedirectKind::Out | RedirectKind::Append => {
                    let target = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    let path = self.state.absolute(&target);
                    let truncate = matches!(redirect.kind, RedirectKind::Out);
                    let output = Output::to_file(Arc::clone(&self.fs), path, truncate)
                        .await
                        .map_err(|e| Error::Execution(format!("{}: {}", target, e)))?;
                    match fd {
                        2 => stderr = output,
                        _ => stdout = output,
                    }
                }
                RedirectKind::HereDoc { .. } => {
                    let body = match &redirect.heredoc_body {
                        Some(body) => self.expand_word_single(body, &stderr_handle).await?,
                        None => String::new(),
                    };
                    stdin = Some(Input::from_bytes(body));
                }
                RedirectKind::HereString => {
                    let text = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    stdin = Some(Input::from_bytes(format!("{}\n", text)));
                }
                RedirectKind::DupOut => {
                    let target = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    match (fd, target.as_str()) {
                        (2, "1") => stderr = stdout.clone(),
                        (1, "2") => stdout = stderr.clone(),
                        (2, "2") | (1, "1") => {}
                        (2, "-") => stderr = Output::null(),
                        (_, "-") => stdout = Output::null(),
                        (_, t) => {
                            return Err(Error::Execution(format!(
                                "{}: bad file descriptor",
                                t
                            )))
                        }
                    }
                }
                RedirectKind::DupIn => {
                    let target = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    if target == "-" {
                        stdin = Some(Input::null());
                    }
                }
                RedirectKind::OutErr | RedirectKind::OutErrAppend => {
                    let target = self.expand_word_single(&redirect.target, &stderr_handle).await?;
                    let path = self.state.absolute(&target);
                    let truncate = matches!(redirect.kind, RedirectKind::OutErr);
                    let output = Output::to_file(Arc::clone(&self.fs), path, truncate)
                        .await
                        .map_err(|e| Error::Execution(format!("{}: {}", target, e)))?;
                    stdout = output.clone();
                    stderr = output;
                }
            }
        }

        let (stdin, restore) = match stdin {
            Some(stdin) => (stdin, false),
            None => (io.take_stdin(), true),
        };
        Ok((Io::new(stdin, stdout, stderr), restore))
    }

    /// Turn recoverable command-boundary errors into status + stderr line;
    /// propagate fatal ones (limits, cancellation, syntax).
    async fn report_command_error(&mut self, io: &Io, error: Error) -> Result<i32> {
        match &error {
            Error::Limit(_) | Error::Cancelled | Error::Syntax { .. } => Err(error),
            Error::BrokenPipe => Ok(141),
            Error::CommandNotFound(name) => {
                io.stderr
                    .write_str(&format!("shellbox: {}: command not found\n", name))
                    .await
                    .ok();
                Ok(127)
            }
            _ => {
                io.stderr
                    .write_str(&format!("shellbox: {}\n", error))
                    .await
                    .ok();
                Ok(1)
            }
        }
    }

    /// Arithmetic with its text pre-expanded (`$x`, `$(cmd)` inside `(( ))`).
    pub(crate) async fn eval_arith(&mut self, expr: &str, stderr: &Output) -> Result<i64> {
        let expanded = self.expand_arith_text(expr, stderr).await?;
        arith::eval(&expanded, &mut self.state)
    }

    /// Like [`eval_arith`] but reports arithmetic errors on stderr and
    /// returns `None` instead of failing the whole run.
    ///
    /// [`eval_arith`]: Interpreter::eval_arith
    async fn eval_arith_checked(&mut self, expr: &str, stderr: &Output) -> Result<Option<i64>> {
        match self.eval_arith(expr, stderr).await {
            Ok(v) => Ok(Some(v)),
            Err(e @ Error::Arith(_)) => {
                stderr.write_str(&format!("shellbox: {}\n", e)).await.ok();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

enum LoopSignal {
    None,
    Break,
    Continue,
    Propagate,
}
