//! Assembling and disassembling programs.
//!
//! The assembly language has one statement per line. A `;` starts a comment that runs to the end
//! of the line.
//!
//! ```text
//! ; prints "H" and a newline
//!         lv   r1, 'H'
//!         out  r1
//!         lv   r1, 10
//!         out  r1
//!         halt
//! ```
//!
//! Three-register instructions (`cmov`, `sload`, `sstore`, `add`, `mul`, `div`, `nand`) take
//! `rA, rB, rC`. The others only name the registers they read: `map rB, rC`, `unmap rC`,
//! `out rC`, `in rC`, `loadp rB, rC`, `lv rA, VALUE` and `halt`. `.word VALUE` emits a raw word.
//! Values are decimal, hexadecimal with a `0x` prefix, or a quoted character such as `'\n'`.

mod parser;
mod program;

pub use self::parser::{ErrorKind, ParseError};
pub use self::program::Program;
