//! Protocol engine
//!
//! A lockstep read, dispatch, acknowledge loop: one opcode in, at most one
//! action, exactly one ack out. The dispatch table itself is the pure
//! [`transition`] function; [`Engine`] adds the I/O around it.

use crate::channel::{recv_exact, send_ack, Channel};
use crate::error::{Fault, Transfer};
use crate::memory::{load_region, AddressSpace};
use crate::wire::{Ack, OpCode};
use crate::{EXIT_FAILURE, EXIT_SUCCESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitOpcode,
    /// Handed off: the supervisor now owns registers and memory.
    AwaitExternalResume,
    Exited(i32),
}

impl State {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, State::AwaitOpcode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    LoadMemory,
    /// Unrecognized opcode; the ack is sent, then the loader fails.
    Reject(u8),
}

/// One row of the dispatch table. `ack` is sent and `next` entered only if
/// `action` succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub ack: Ack,
    pub next: State,
}

/// Dispatch table. Terminal states have no outgoing transitions.
pub const fn transition(state: State, opcode: u8) -> Option<Transition> {
    if state.is_terminal() {
        return None;
    }

    let (action, ack, next) = match OpCode::from_byte(opcode) {
        Some(OpCode::Start) => (Action::None, Ack::Started, State::AwaitOpcode),
        Some(OpCode::MemLoad) => (Action::LoadMemory, Ack::MemLoaded, State::AwaitOpcode),
        Some(OpCode::Exec) => (Action::None, Ack::Executing, State::AwaitExternalResume),
        Some(OpCode::Abort) => (Action::None, Ack::Aborting, State::Exited(EXIT_SUCCESS)),
        None => (Action::Reject(opcode), Ack::Fail, State::Exited(EXIT_FAILURE)),
    };
    Some(Transition { action, ack, next })
}

/// How a run of the engine ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminate with `code`. `fault` is set for every failure.
    Exit { code: i32, fault: Option<Fault> },
    /// Executing was acknowledged; nothing further may be read, written or mapped.
    AwaitExternalResume,
}

pub struct Engine<C, M> {
    channel: C,
    memory: M,
    state: State,
}

impl<C: Channel, M: AddressSpace> Engine<C, M> {
    pub fn new(channel: C, memory: M) -> Self {
        Engine {
            channel,
            memory,
            state: State::AwaitOpcode,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Handle exactly one opcode. In a terminal state this is a no-op.
    ///
    /// Any fault moves the engine to `Exited(1)`; no ack is sent for the
    /// failed opcode except Fail for an unrecognized one.
    pub fn step(&mut self) -> Result<State, Fault> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let result = self.dispatch_one();
        if result.is_err() {
            self.state = State::Exited(EXIT_FAILURE);
        }
        result
    }

    fn dispatch_one(&mut self) -> Result<State, Fault> {
        let mut opcode = [0u8; 1];
        recv_exact(&mut self.channel, &mut opcode, Transfer::Opcode)?;

        let Some(t) = transition(self.state, opcode[0]) else {
            return Ok(self.state);
        };

        match t.action {
            Action::None => {}
            Action::LoadMemory => {
                load_region(&mut self.channel, &mut self.memory)?;
            }
            Action::Reject(byte) => {
                send_ack(&mut self.channel, t.ack)?;
                return Err(Fault::UnknownOpcode(byte));
            }
        }

        send_ack(&mut self.channel, t.ack)?;
        self.state = t.next;
        Ok(self.state)
    }

    /// Step until a terminal state is reached.
    pub fn run(&mut self) -> Outcome {
        loop {
            match self.step() {
                Ok(State::AwaitOpcode) => continue,
                Ok(State::AwaitExternalResume) => return Outcome::AwaitExternalResume,
                Ok(State::Exited(code)) => return Outcome::Exit { code, fault: None },
                Err(fault) => {
                    return Outcome::Exit {
                        code: fault.exit_code(),
                        fault: Some(fault),
                    }
                }
            }
        }
    }
}
