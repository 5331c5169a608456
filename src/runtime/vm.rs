use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::bytecode::{stack_check, Node, Op, Program};
use crate::lang::value::Value;
use crate::runtime::host::{DialogueHandler, Library, OptionSelection, VariableStorage};
use crate::runtime::runtime_error::{Result, RuntimeError};
use crate::runtime::state::{ExecutionState, ExecutionStatus, PendingOption};

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Upper bound on instructions executed since the host last selected a
    /// node. `None` means unbounded.
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_steps: None,
            max_stack_size: 10_000,
        }
    }
}

/// A selection the VM refused. The handle is returned so the host can retry
/// with a corrected index.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RejectedSelection {
    pub selection: OptionSelection,
    pub error: RuntimeError,
}

/// What the dispatcher does with the program counter after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Advance,
    JumpTo(usize),
    /// A new node was loaded; the counter already points at its start.
    EnteredNode,
    Suspend,
    Halt,
}

/// Host-driven interpreter for compiled dialogue.
///
/// The host selects a node, then calls [`step`](Self::step) (or
/// [`run`](Self::run)) until the machine is `Stopped`. When `ShowOptions`
/// suspends execution the machine waits in `WaitingOnOptionSelection` until
/// the host returns the [`OptionSelection`] through
/// [`select_option`](Self::select_option).
pub struct VirtualMachine {
    program: Rc<Program>,
    variables: Rc<dyn VariableStorage>,
    library: Rc<dyn Library>,
    state: ExecutionState,
    status: ExecutionStatus,
    config: VmConfig,
    steps: usize,
    ticket: u64,
}

impl VirtualMachine {
    pub fn new(
        program: Rc<Program>,
        variables: Rc<dyn VariableStorage>,
        library: Rc<dyn Library>,
    ) -> Self {
        Self::with_config(program, variables, library, VmConfig::default())
    }

    pub fn with_config(
        program: Rc<Program>,
        variables: Rc<dyn VariableStorage>,
        library: Rc<dyn Library>,
        config: VmConfig,
    ) -> Self {
        Self {
            program,
            variables,
            library,
            state: ExecutionState::new(),
            status: ExecutionStatus::Stopped,
            config,
            steps: 0,
            ticket: 0,
        }
    }

    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn current_node(&self) -> Option<&str> {
        self.state.current_node.as_deref()
    }

    pub fn program_counter(&self) -> usize {
        self.state.program_counter
    }

    pub fn stack(&self) -> &[Value] {
        &self.state.stack
    }

    pub fn pending_options(&self) -> &[PendingOption] {
        &self.state.pending_options
    }

    // Host entry points

    /// Load a node and rewind to its first instruction.
    ///
    /// An unknown name is a content error, not a broken program: it is
    /// reported and the machine is left `Stopped` on whatever node it had.
    /// Any option prompt in progress is abandoned either way.
    pub fn select_node(&mut self, name: &str) -> Result<()> {
        self.steps = 0;
        if self.status == ExecutionStatus::WaitingOnOptionSelection {
            debug!(node = name, "abandoning pending option selection");
            self.state.pending_options.clear();
            self.status = ExecutionStatus::Stopped;
        }
        self.load_node(name)
    }

    /// Execute exactly one instruction.
    pub fn step<H: DialogueHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        match self.status {
            ExecutionStatus::WaitingOnOptionSelection => {
                let err = RuntimeError::host_usage("still waiting on option selection");
                warn!(error = %err, "step ignored");
                return Err(err);
            }
            ExecutionStatus::Stopped => self.status = ExecutionStatus::Running,
            ExecutionStatus::Running => {}
        }

        let program = Rc::clone(&self.program);
        let Some(node) = self
            .state
            .current_node
            .as_deref()
            .and_then(|name| program.node(name))
        else {
            self.status = ExecutionStatus::Stopped;
            let err = RuntimeError::NoNodeSelected;
            warn!(error = %err, "step ignored");
            return Err(err);
        };

        if self.state.program_counter >= node.ops.len() {
            self.complete_node(handler);
            return Ok(());
        }

        let op = &node.ops[self.state.program_counter];
        if let Err(e) = self.check_limits(op) {
            return Err(self.fail(e));
        }

        trace!(node = %node.name, pc = self.state.program_counter, ?op, "exec");

        match self.execute(&program, node, op, handler) {
            Ok(Flow::Advance) => self.state.program_counter += 1,
            Ok(Flow::JumpTo(target)) => self.state.program_counter = target,
            Ok(Flow::EnteredNode) => {}
            Ok(Flow::Suspend) => {
                self.state.program_counter += 1;
                return Ok(());
            }
            Ok(Flow::Halt) => return Ok(()),
            Err(e) => return Err(self.fail(e)),
        }

        if self.status == ExecutionStatus::Running && self.at_end_of_node() {
            self.complete_node(handler);
        }

        Ok(())
    }

    /// Step until the machine stops or suspends on an option prompt.
    pub fn run<H: DialogueHandler + ?Sized>(&mut self, handler: &mut H) -> Result<ExecutionStatus> {
        loop {
            self.step(handler)?;
            if self.status != ExecutionStatus::Running {
                return Ok(self.status);
            }
        }
    }

    /// Resume after `ShowOptions` with the option at `index`.
    ///
    /// The chosen destination node name is pushed and the pending options are
    /// cleared. Rejected selections leave the machine untouched.
    pub fn select_option(
        &mut self,
        selection: OptionSelection,
        index: usize,
    ) -> std::result::Result<(), RejectedSelection> {
        if self.status != ExecutionStatus::WaitingOnOptionSelection || selection.ticket != self.ticket
        {
            let error = RuntimeError::host_usage("selection does not belong to the current option prompt");
            warn!(error = %error, "selection rejected");
            return Err(RejectedSelection { selection, error });
        }

        let count = self.state.pending_options.len();
        if index >= count {
            let error = RuntimeError::host_usage(format!(
                "option index {} out of range for {} option(s)",
                index, count
            ));
            warn!(error = %error, "selection rejected");
            return Err(RejectedSelection { selection, error });
        }

        let chosen = self.state.pending_options.swap_remove(index);
        self.state.pending_options.clear();
        debug!(index, destination = %chosen.destination, "option selected");
        self.state.push(Value::String(chosen.destination));
        self.status = ExecutionStatus::Running;
        Ok(())
    }

    /// Abort immediately. Unlike the `Stop` instruction this does not fire
    /// node-complete.
    pub fn stop(&mut self) {
        debug!(node = ?self.state.current_node, "stopped by host");
        self.state.pending_options.clear();
        self.status = ExecutionStatus::Stopped;
    }

    // Execution

    fn load_node(&mut self, name: &str) -> Result<()> {
        if !self.program.contains_node(name) {
            self.status = ExecutionStatus::Stopped;
            let err = RuntimeError::UnknownNode(name.to_string());
            warn!(error = %err, "node selection failed");
            return Err(err);
        }

        debug!(node = name, "node selected");
        self.state.enter_node(name);
        self.state.pending_options.clear();
        Ok(())
    }

    fn check_limits(&mut self, op: &Op) -> Result<()> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::LimitExceeded(format!(
                    "execution step limit exceeded ({})",
                    max
                )));
            }
        }

        // Refuse before executing so the stack never grows past the bound.
        let (pops, pushes) = stack_check::effect(op, Some(self.library.as_ref())).unwrap_or((0, 0));
        let depth = self.state.stack.len();
        if depth.saturating_sub(pops) + pushes > self.config.max_stack_size {
            return Err(RuntimeError::LimitExceeded(format!(
                "stack size limit exceeded ({})",
                self.config.max_stack_size
            )));
        }

        Ok(())
    }

    fn at_end_of_node(&self) -> bool {
        self.state
            .current_node
            .as_deref()
            .and_then(|name| self.program.node(name))
            .is_none_or(|node| self.state.program_counter >= node.ops.len())
    }

    fn complete_node<H: DialogueHandler + ?Sized>(&mut self, handler: &mut H) {
        debug!(node = ?self.state.current_node, "node complete");
        self.status = ExecutionStatus::Stopped;
        handler.node_complete(None);
    }

    /// Fatal errors halt the machine; recoverable ones were logged where raised.
    fn fail(&mut self, err: RuntimeError) -> RuntimeError {
        if err.is_fatal() {
            error!(
                node = ?self.state.current_node,
                pc = self.state.program_counter,
                error = %err,
                "execution aborted"
            );
            self.status = ExecutionStatus::Stopped;
        }
        err
    }

    fn execute<H: DialogueHandler + ?Sized>(
        &mut self,
        program: &Program,
        node: &Node,
        op: &Op,
        handler: &mut H,
    ) -> Result<Flow> {
        match op {
            Op::Label(_) => {}

            Op::JumpTo(label) => return Ok(Flow::JumpTo(find_label(node, label)?)),

            // Jump and JumpIfFalse peek: the operand stays on the stack.
            Op::Jump => {
                let label = self.state.peek()?.as_string()?;
                return Ok(Flow::JumpTo(find_label(node, label)?));
            }
            Op::JumpIfFalse(label) => {
                if !self.state.peek()?.as_bool()? {
                    return Ok(Flow::JumpTo(find_label(node, label)?));
                }
            }

            Op::RunLine(index) => handler.run_line(program.string(*index)?),
            Op::RunCommand(text) => handler.run_command(text),

            Op::AddOption { text, destination } => {
                self.state.pending_options.push(PendingOption {
                    text: *text,
                    destination: destination.clone(),
                });
            }
            Op::ShowOptions => return self.show_options(program, handler),

            Op::PushString(index) => {
                let text = program.string(*index)?.to_string();
                self.state.push(Value::String(text));
            }
            Op::PushNumber(n) => self.state.push(Value::Number(*n)),
            Op::PushBool(b) => self.state.push(Value::Bool(*b)),
            Op::PushNull => self.state.push(Value::Null),

            Op::Pop => {
                self.state.pop()?;
            }

            Op::CallFunc(name) => self.call_function(name)?,

            Op::PushVariable(name) => {
                let value = self.variables.get_number(name);
                self.state.push(Value::Number(value));
            }
            // Only numbers can be stored.
            Op::StoreVariable(name) => {
                let value = self.state.peek()?.as_number()?;
                self.variables.set_number(name, value);
            }

            Op::Stop => {
                self.complete_node(handler);
                return Ok(Flow::Halt);
            }
            Op::RunNode => {
                let name = self.state.peek()?.as_string()?.to_string();
                self.load_node(&name)?;
                return Ok(Flow::EnteredNode);
            }
        }

        Ok(Flow::Advance)
    }

    fn call_function(&mut self, name: &str) -> Result<()> {
        let library = Rc::clone(&self.library);
        let function = library
            .lookup(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;

        let args = self.state.pop_n(function.arity)?;
        let result = function
            .invoke(&args)
            .map_err(|message| RuntimeError::FunctionFailed {
                name: name.to_string(),
                message,
            })?;

        if function.returns_value {
            self.state.push(result);
        }
        Ok(())
    }

    fn show_options<H: DialogueHandler + ?Sized>(
        &mut self,
        program: &Program,
        handler: &mut H,
    ) -> Result<Flow> {
        let options = &self.state.pending_options;

        if options.is_empty() {
            debug!("no options to show");
            self.complete_node(handler);
            return Ok(Flow::Halt);
        }

        if options.len() == 1 && options[0].text.is_none() {
            let destination = options[0].destination.clone();
            debug!(destination = %destination, "auto-selected unlabeled option");
            self.state.pending_options.clear();
            self.state.push(Value::String(destination));
            return Ok(Flow::Advance);
        }

        let texts = options
            .iter()
            .map(|option| match option.text {
                Some(index) => program.string(index).map(str::to_string),
                None => Ok(option.destination.clone()),
            })
            .collect::<Result<Vec<String>>>()?;

        self.ticket += 1;
        self.status = ExecutionStatus::WaitingOnOptionSelection;
        debug!(count = texts.len(), "waiting on option selection");

        handler.show_options(
            &texts,
            OptionSelection {
                ticket: self.ticket,
                option_count: texts.len(),
            },
        );
        Ok(Flow::Suspend)
    }
}

fn find_label(node: &Node, label: &str) -> Result<usize> {
    node.label_index(label)
        .ok_or_else(|| RuntimeError::UnknownLabel {
            node: node.name.clone(),
            label: label.to_string(),
        })
}
