use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::runtime::runtime_error::RuntimeError;

/// What `,` stores when the input is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EofBehavior {
    #[default]
    Zero,
    Unchanged,
    Max,
}

impl EofBehavior {
    pub fn from_name(name: &str) -> Option<EofBehavior> {
        match name {
            "zero" => Some(EofBehavior::Zero),
            "unchanged" => Some(EofBehavior::Unchanged),
            "max" => Some(EofBehavior::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeVmConfig {
    pub tape_len: usize,
    pub max_steps: Option<usize>,
    pub eof: EofBehavior,
    /// Stop at breakpoint characters in `run_to_breakpoint`.
    pub breakpoints: bool,
    pub breakpoint_char: char,
}

impl Default for TapeVmConfig {
    fn default() -> Self {
        TapeVmConfig {
            tape_len: 30_000,
            max_steps: None,
            eof: EofBehavior::Zero,
            breakpoints: true,
            breakpoint_char: '#',
        }
    }
}

/// Decoded program operation. Runs of moves and increments are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Move(isize),
    Add(u8),
    Output,
    Input,
    /// `[`, with the index of the matching `]`.
    Open(usize),
    /// `]`, with the index of the matching `[`.
    Close(usize),
    Breakpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Breakpoint,
    Halted,
}

/// Interpreter for tape code: a circular tape of wrapping byte cells and a
/// single pointer starting at cell 0.
///
/// Every character outside the alphabet is ignored, except the breakpoint
/// character when breakpoints are enabled.
pub struct TapeVm<R: Read, W: Write> {
    ops: Vec<Op>,
    tape: Vec<u8>,
    ptr: usize,
    ip: usize,
    steps: usize,
    input: R,
    output: W,
    config: TapeVmConfig,
}

fn decode(code: &str, config: &TapeVmConfig) -> Result<Vec<Op>, RuntimeError> {
    let mut ops: Vec<Op> = Vec::new();
    let mut open = Vec::new();

    for (offset, c) in code.chars().enumerate() {
        match c {
            '<' | '>' => {
                let delta = if c == '>' { 1 } else { -1 };
                match ops.last_mut() {
                    Some(Op::Move(n)) => *n += delta,
                    _ => ops.push(Op::Move(delta)),
                }
            }
            '+' | '-' => {
                let delta = if c == '+' { 1 } else { u8::MAX };
                match ops.last_mut() {
                    Some(Op::Add(n)) => *n = n.wrapping_add(delta),
                    _ => ops.push(Op::Add(delta)),
                }
            }
            '.' => ops.push(Op::Output),
            ',' => ops.push(Op::Input),
            '[' => {
                open.push((ops.len(), offset));
                ops.push(Op::Open(0));
            }
            ']' => {
                let (start, _) = open.pop().ok_or(RuntimeError::UnmatchedClose(offset))?;
                ops[start] = Op::Open(ops.len());
                ops.push(Op::Close(start));
            }
            c if config.breakpoints && c == config.breakpoint_char => ops.push(Op::Breakpoint),
            _ => {}
        }
    }

    if let Some((_, offset)) = open.pop() {
        return Err(RuntimeError::UnmatchedOpen(offset));
    }
    Ok(ops)
}

impl<R: Read, W: Write> TapeVm<R, W> {
    pub fn new(
        code: &str,
        input: R,
        output: W,
        config: TapeVmConfig,
    ) -> Result<Self, RuntimeError> {
        if config.tape_len == 0 {
            return Err(RuntimeError::EmptyTape);
        }
        let ops = decode(code, &config)?;
        debug!(ops = ops.len(), tape = config.tape_len, "tape program loaded");
        Ok(Self {
            ops,
            tape: vec![0; config.tape_len],
            ptr: 0,
            ip: 0,
            steps: 0,
            input,
            output,
            config,
        })
    }

    pub fn pointer(&self) -> usize {
        self.ptr
    }

    /// Pointer as a signed offset from the origin; cells left of it are
    /// negative.
    pub fn relative_pointer(&self) -> isize {
        self.relative(self.ptr)
    }

    pub fn relative(&self, index: usize) -> isize {
        let len = self.tape.len();
        if index > len / 2 {
            index as isize - len as isize
        } else {
            index as isize
        }
    }

    /// Cell at a signed offset from the origin.
    pub fn cell(&self, offset: isize) -> u8 {
        self.tape[self.wrap(offset)]
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.ip >= self.ops.len()
    }

    fn wrap(&self, offset: isize) -> usize {
        offset.rem_euclid(self.tape.len() as isize) as usize
    }

    fn read_byte(&mut self) -> Result<Option<u8>, RuntimeError> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Executes one operation.
    pub fn step(&mut self) -> Result<StepResult, RuntimeError> {
        let Some(&op) = self.ops.get(self.ip) else {
            return Ok(StepResult::Halted);
        };

        self.steps += 1;
        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimit(max));
            }
        }

        let mut result = StepResult::Continue;
        match op {
            Op::Move(n) => self.ptr = self.wrap(self.ptr as isize + n),
            Op::Add(n) => self.tape[self.ptr] = self.tape[self.ptr].wrapping_add(n),
            Op::Output => self.output.write_all(&[self.tape[self.ptr]])?,
            Op::Input => match self.read_byte()? {
                Some(b) => self.tape[self.ptr] = b,
                None => match self.config.eof {
                    EofBehavior::Zero => self.tape[self.ptr] = 0,
                    EofBehavior::Max => self.tape[self.ptr] = u8::MAX,
                    EofBehavior::Unchanged => {}
                },
            },
            Op::Open(end) => {
                if self.tape[self.ptr] == 0 {
                    self.ip = end;
                }
            }
            Op::Close(start) => {
                if self.tape[self.ptr] != 0 {
                    self.ip = start;
                }
            }
            Op::Breakpoint => {
                trace!(ip = self.ip, ptr = self.relative_pointer(), "breakpoint");
                result = StepResult::Breakpoint;
            }
        }
        self.ip += 1;
        Ok(result)
    }

    /// Runs to the end, passing over breakpoints.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.step()? != StepResult::Halted {}
        self.output.flush()?;
        debug!(steps = self.steps, "tape program halted");
        Ok(())
    }

    /// Runs until the next breakpoint or the end of the program.
    pub fn run_to_breakpoint(&mut self) -> Result<StepResult, RuntimeError> {
        loop {
            match self.step()? {
                StepResult::Continue => {}
                StepResult::Breakpoint => {
                    self.output.flush()?;
                    return Ok(StepResult::Breakpoint);
                }
                StepResult::Halted => {
                    self.output.flush()?;
                    return Ok(StepResult::Halted);
                }
            }
        }
    }
}

/// Runs `code` on `input` and collects everything it prints.
pub fn run_program(
    code: &str,
    input: &[u8],
    config: TapeVmConfig,
) -> Result<Vec<u8>, RuntimeError> {
    let mut output = Vec::new();
    TapeVm::new(code, input, &mut output, config)?.run()?;
    Ok(output)
}
