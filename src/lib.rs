//! An emulator for the Universal Machine, a 32-bit virtual CPU with eight registers, fourteen
//! instructions and segmented memory.
//!
//! Currently this crate provides the functionality to:
//! - Load program images (big-endian 32-bit words) into segment 0.
//! - Execute them one instruction at a time, including programs that replace their own code.
//! - Assemble programs from a small textual assembly language and disassemble images back.
//!
//! Every failure of a running program, such as an illegal opcode, an unmapped segment, an index
//! past the end of a segment or a division by zero, stops the machine with a [Fault](error::Fault)
//! instead of aborting the host process.
//!
//! # Example
//! ```
//! use um::{
//!     assembler::Program,
//!     emulator::{Machine, TestIo},
//! };
//!
//! let program = Program::parse(r#"
//!     lv   r1, 'H'
//!     out  r1
//!     lv   r1, '\n'
//!     out  r1
//!     halt
//! "#).expect("could not assemble the program");
//!
//! let mut machine = Machine::new(&program.to_bytes(), TestIo::new())
//!     .expect("the image is a whole number of words");
//!
//! machine.run()
//!     .expect("the program faulted");
//!
//! assert_eq!(machine.release().into_output(), b"H\n");
//! ```
//!
//! # Executables
//!
//! ## `umrun`
//!
//! Runs a program image, connecting the input and output instructions to the standard input and
//! output of the process. Exits with status 0 when the program halts and 1 when it faults.
//!
//! ```text
//! $ umrun hello.um
//! H
//! ```
//!
//! ## `umasm`
//!
//! Assembles a source file into a program image, or disassembles an image with `--disassemble`.
pub mod assembler;
pub mod bitpack;
pub mod emulator;
pub mod error;
pub mod event;
pub mod instruction;
pub mod segments;
