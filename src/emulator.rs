//! [Machine] for executing Universal Machine programs.
//!
//! The machine fetches the word at the program counter from segment 0, advances the program
//! counter, decodes the word and executes it. It keeps doing that, one [step](Machine::step) at a
//! time, until the program halts or faults. Both are terminal.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufWriter, Read, Write};

use slog::{debug, error, o, trace, warn, Discard, Logger};

use crate::error::{Fault, FaultKind, ImageError};
use crate::event::{Event, EventDispatcher, EventListener};
use crate::instruction::{Instruction, Register};
use crate::segments::{Handle, Segments, PROGRAM};

/// Contains the execution environment of the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// Index of the next instruction in segment 0.
    pub pc: u32,

    /// Array containing values for all the eight general purpose registers.
    pub r: [u32; 8],
}

/// Interface to the byte streams of the machine.
pub trait InputOutput {
    /// Called when an input instruction is executed. Blocks until a byte is available.
    ///
    /// # Returns
    /// The next byte, or `None` at the end of the input.
    fn input(&mut self) -> io::Result<Option<u8>>;

    /// Called when an output instruction is executed.
    fn output(&mut self, byte: u8) -> io::Result<()>;

    /// Called before every input and when the machine stops.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: InputOutput + ?Sized> InputOutput for &mut T {
    fn input(&mut self) -> io::Result<Option<u8>> {
        (**self).input()
    }

    fn output(&mut self, byte: u8) -> io::Result<()> {
        (**self).output(byte)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Lifecycle state of a [Machine].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
    Faulted(Fault),
}

/// Outcome of a single [Machine::step].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The instruction completed and the machine can keep going.
    Continue,

    /// The machine is halted.
    Halted,

    /// The machine stopped on a fault.
    Faulted(Fault),
}

enum Flow {
    Continue,
    Halt,
}

/// Utility struct for implementing methods in the context of emulating a single instruction.
struct InstructionEmulationContext<'m, IO> {
    /// The machine in whose context the instruction is being emulated.
    machine: &'m mut Machine<IO>,
}

impl<'m, IO: InputOutput> InstructionEmulationContext<'m, IO> {
    fn register(&self, register: Register) -> u32 {
        self.machine.context.r[register.index()]
    }

    fn set_register(&mut self, register: Register, data: u32) {
        self.machine.context.r[register.index()] = data;
        self.machine.dispatch(Event::RegisterChange { register, data });
    }

    fn word(&self, handle: Handle, index: u32) -> Result<u32, FaultKind> {
        let segment = self.machine.segments.get(handle)?;

        segment
            .get(index as usize)
            .copied()
            .ok_or(FaultKind::OutOfBounds { handle, index, size: segment.len() })
    }

    fn word_mut(&mut self, handle: Handle, index: u32) -> Result<&mut u32, FaultKind> {
        let segment = self.machine.segments.access(handle)?;
        let size = segment.len();

        segment
            .get_mut(index as usize)
            .ok_or(FaultKind::OutOfBounds { handle, index, size })
    }

    fn arithmetic<F>(&mut self, a: Register, b: Register, c: Register, op: F) -> Result<Flow, FaultKind>
        where F: FnOnce(u32, u32) -> Result<u32, FaultKind>,
    {
        let value = op(self.register(b), self.register(c))?;
        self.set_register(a, value);

        Ok(Flow::Continue)
    }

    /// Execute the instruction.
    ///
    /// # Returns
    /// Whether the machine should keep running, or the reason it has to stop.
    fn emulate(&mut self, instruction: &Instruction) -> Result<Flow, FaultKind> {
        match *instruction {
            Instruction::ConditionalMove { a, b, c } => {
                if self.register(c) != 0 {
                    let value = self.register(b);
                    self.set_register(a, value);
                }
            }

            Instruction::SegmentedLoad { a, b, c } => {
                let value = self.word(self.register(b), self.register(c))?;
                self.set_register(a, value);
            }

            Instruction::SegmentedStore { a, b, c } => {
                let (handle, index, value) = (self.register(a), self.register(b), self.register(c));
                *self.word_mut(handle, index)? = value;
            }

            Instruction::Add { a, b, c } => {
                return self.arithmetic(a, b, c, |x, y| Ok(x.wrapping_add(y)));
            }

            Instruction::Multiply { a, b, c } => {
                return self.arithmetic(a, b, c, |x, y| Ok(x.wrapping_mul(y)));
            }

            Instruction::Divide { a, b, c } => {
                return self.arithmetic(a, b, c, |x, y| {
                    x.checked_div(y).ok_or(FaultKind::DivisionByZero)
                });
            }

            Instruction::Nand { a, b, c } => {
                return self.arithmetic(a, b, c, |x, y| Ok(!(x & y)));
            }

            Instruction::Halt => return Ok(Flow::Halt),

            Instruction::MapSegment { b, c } => {
                let size = self.register(c);
                let handle = self.machine.segments.allocate(size)?;

                debug!(self.machine.logger, "map segment"; "handle" => handle, "size" => size);
                self.machine.dispatch(Event::SegmentMapped { handle, size });

                self.set_register(b, handle);
            }

            Instruction::UnmapSegment { c } => {
                let handle = self.register(c);
                self.machine.segments.deallocate(handle)?;

                debug!(self.machine.logger, "unmap segment"; "handle" => handle);
                self.machine.dispatch(Event::SegmentUnmapped { handle });
            }

            Instruction::Output { c } => {
                let byte = self.register(c) as u8;
                self.machine.io.output(byte)?;
                self.machine.dispatch(Event::Output { byte });
            }

            Instruction::Input { c } => {
                self.machine.io.flush()?;

                let value = match self.machine.io.input()? {
                    Some(byte) => u32::from(byte),
                    None => u32::MAX,
                };

                self.set_register(c, value);
            }

            Instruction::LoadProgram { b, c } => {
                let source = self.register(b);
                let pc = self.register(c);

                if source != PROGRAM {
                    self.machine.segments.duplicate_into(source, PROGRAM)?;
                    debug!(self.machine.logger, "load program";
                        "source" => source, "size" => self.machine.segments.program().len(), "pc" => pc);
                }

                self.machine.context.pc = pc;
                self.machine.dispatch(Event::ProgramLoaded { source, pc });
            }

            Instruction::LoadValue { a, value } => self.set_register(a, value),
        }

        Ok(Flow::Continue)
    }
}

/// The machine contains all the state needed to execute a program: the segments, the registers
/// and the program counter, plus an interface for doing byte IO.
pub struct Machine<IO> {
    /// The memory of the machine. Segment 0 holds the running program.
    pub segments: Segments,

    /// The program counter and the registers.
    pub context: Context,

    /// Interface for the input and output instructions.
    pub io: IO,

    status: Status,
    steps: u64,
    logger: Logger,
    events: EventDispatcher,
}

impl<IO> fmt::Debug for Machine<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("status", &self.status)
            .field("context", &self.context)
            .field("steps", &self.steps)
            .field("live_segments", &self.segments.live())
            .finish()
    }
}

impl<IO> Machine<IO> where IO: InputOutput {
    /// Create a new machine from a program image.
    ///
    /// # Parameters
    /// - `image`: The program, as big-endian 32-bit words.
    /// - `io`: An [IO handler](InputOutput).
    ///
    /// # Errors
    /// [ImageError::MalformedImage] if `image` is not a whole number of words.
    pub fn new(image: &[u8], io: IO) -> Result<Machine<IO>, ImageError> {
        Machine::with_logger(image, io, None::<Logger>)
    }

    /// Same as [Machine::new], but logs to `logger`.
    pub fn with_logger<L>(image: &[u8], io: IO, logger: L) -> Result<Machine<IO>, ImageError>
        where L: Into<Option<Logger>>,
    {
        let mut machine = Machine::from_segments(Segments::new(image)?, io);
        machine.set_logger(logger);

        Ok(machine)
    }

    /// Create a new machine running the already decoded `program`.
    pub fn from_words(program: Vec<u32>, io: IO) -> Machine<IO> {
        Machine::from_segments(Segments::from_words(program), io)
    }

    fn from_segments(segments: Segments, io: IO) -> Machine<IO> {
        Machine {
            segments,
            context: Context::default(),
            io,
            status: Status::Running,
            steps: 0,
            logger: Logger::root(Discard, o!()),
            events: EventDispatcher::new(),
        }
    }

    /// Replace the logger of the machine. `None` discards everything.
    pub fn set_logger<L: Into<Option<Logger>>>(&mut self, logger: L) {
        self.logger = logger
            .into()
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("component" => "machine"));
    }

    /// Register a listener for the [events](Event) of this machine.
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.events.add_listener(listener);
    }

    fn dispatch(&mut self, event: Event) {
        if !self.events.is_empty() {
            self.events.dispatch(event);
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// True if the machine reached a halt instruction.
    pub fn halted(&self) -> bool {
        self.status == Status::Halted
    }

    /// Number of instructions decoded so far, the faulting one included.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current value of `register`.
    pub fn register(&self, register: Register) -> u32 {
        self.context.r[register.index()]
    }

    /// Fetches the word the program counter points at.
    pub fn current_word(&self) -> Result<u32, FaultKind> {
        let program = self.segments.program();
        let pc = self.context.pc;

        program
            .get(pc as usize)
            .copied()
            .ok_or(FaultKind::OutOfBounds { handle: PROGRAM, index: pc, size: program.len() })
    }

    /// Fetches and decodes the instruction the program counter points at.
    pub fn current_instruction(&self) -> Result<Instruction, FaultKind> {
        Instruction::decode(self.current_word()?).map_err(FaultKind::IllegalOpcode)
    }

    /// Fetches the next instruction, increments the program counter and executes the instruction.
    ///
    /// A machine that already halted or faulted doesn't execute anything and reports the same
    /// outcome again.
    pub fn step(&mut self) -> StepResult {
        match &self.status {
            Status::Running => (),
            Status::Halted => return StepResult::Halted,
            Status::Faulted(fault) => return StepResult::Faulted(fault.clone()),
        }

        let pc = self.context.pc;

        let word = match self.current_word() {
            Ok(word) => word,
            Err(kind) => return self.fault(kind, pc, None),
        };

        self.context.pc = pc.wrapping_add(1);
        self.steps += 1;

        let instruction = match Instruction::decode(word) {
            Ok(instruction) => instruction,
            Err(opcode) => return self.fault(FaultKind::IllegalOpcode(opcode), pc, Some(word)),
        };

        trace!(self.logger, "execute"; "pc" => pc, "instruction" => %instruction);

        let outcome = InstructionEmulationContext { machine: self }.emulate(&instruction);

        match outcome {
            Ok(Flow::Continue) => StepResult::Continue,
            Ok(Flow::Halt) => self.halt(pc, word),
            Err(kind) => self.fault(kind, pc, Some(word)),
        }
    }

    /// Executes the program until it halts or faults.
    ///
    /// # Errors
    /// The fault that stopped the machine.
    pub fn run(&mut self) -> Result<(), Fault> {
        loop {
            match self.step() {
                StepResult::Continue => (),
                StepResult::Halted => return Ok(()),
                StepResult::Faulted(fault) => return Err(fault),
            }
        }
    }

    /// Tears the machine down, freeing every segment, and hands back the IO handler.
    pub fn release(self) -> IO {
        let Machine { segments, io, logger, steps, .. } = self;

        debug!(logger, "release"; "live_segments" => segments.live(), "steps" => steps);
        drop(segments);

        io
    }

    fn halt(&mut self, pc: u32, word: u32) -> StepResult {
        if let Err(err) = self.io.flush() {
            return self.fault(err.into(), pc, Some(word));
        }

        debug!(self.logger, "halt"; "pc" => pc, "steps" => self.steps);
        self.status = Status::Halted;

        StepResult::Halted
    }

    fn fault(&mut self, kind: FaultKind, pc: u32, word: Option<u32>) -> StepResult {
        if let Err(err) = self.io.flush() {
            warn!(self.logger, "could not flush output"; "error" => %err);
        }

        let fault = Fault { kind, pc, word };

        error!(self.logger, "machine fault"; "reason" => %fault.kind, "pc" => pc, "word" => ?word);
        self.status = Status::Faulted(fault.clone());

        StepResult::Faulted(fault)
    }
}

/// An IO handler for testing purposes.
///
/// Reads input bytes from a pre-determined input buffer and appends written bytes to an output
/// buffer. The end of the input buffer is the end of the input.
#[derive(Debug, Clone, Default)]
pub struct TestIo {
    input_buffer: VecDeque<u8>,
    output_buffer: Vec<u8>,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo::default()
    }

    pub fn with_input<I: IntoIterator<Item = u8>>(input: I) -> TestIo {
        TestIo {
            input_buffer: input.into_iter().collect(),
            output_buffer: Vec::new(),
        }
    }

    /// Appends bytes to the pending input.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input_buffer.extend(bytes);
    }

    pub fn output(&self) -> &[u8] {
        &self.output_buffer[..]
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output_buffer
    }
}

impl InputOutput for TestIo {
    fn input(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input_buffer.pop_front())
    }

    fn output(&mut self, byte: u8) -> io::Result<()> {
        self.output_buffer.push(byte);
        Ok(())
    }
}

/// An IO handler connected to the standard streams of the process.
///
/// Output is buffered and flushed whenever the program asks for input or stops.
pub struct StdIo {
    stdin: io::Stdin,
    stdout: BufWriter<io::Stdout>,
}

impl StdIo {
    pub fn new() -> StdIo {
        StdIo {
            stdin: io::stdin(),
            stdout: BufWriter::new(io::stdout()),
        }
    }
}

impl Default for StdIo {
    fn default() -> StdIo {
        StdIo::new()
    }
}

impl InputOutput for StdIo {
    fn input(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0];

        loop {
            match self.stdin.lock().read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn output(&mut self, byte: u8) -> io::Result<()> {
        self.stdout.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}
