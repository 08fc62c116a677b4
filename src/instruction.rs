//! Types for representing instructions and their parts.
//!
//! Every instruction is a single 32-bit word. The top four bits select the [OpCode]. Thirteen of
//! the opcodes use the three-register form:
//!
//! ```text
//!  31    28 27                     9 8   6 5   3 2   0
//! +--------+------------------------+-----+-----+-----+
//! | opcode |         unused         |  A  |  B  |  C  |
//! +--------+------------------------+-----+-----+-----+
//! ```
//!
//! while [OpCode::LoadValue] carries a register and a 25-bit immediate:
//!
//! ```text
//!  31    28 27 25 24                                  0
//! +--------+-----+-------------------------------------+
//! |   13   |  A  |              immediate              |
//! +--------+-----+-------------------------------------+
//! ```

use std::fmt;
use std::str::FromStr;

use crate::bitpack::{extract_unsigned, insert_unsigned, WORD_BITS};

const OPCODE_BITS: u32 = 4;
const OPCODE_OFFSET: u32 = WORD_BITS - OPCODE_BITS;
const REGISTER_BITS: u32 = 3;
const VALUE_REGISTER_OFFSET: u32 = OPCODE_OFFSET - REGISTER_BITS;

/// Width of the immediate operand of [OpCode::LoadValue].
pub const VALUE_BITS: u32 = 25;

/// Largest immediate [OpCode::LoadValue] can carry.
pub const MAX_VALUE: u32 = (1 << VALUE_BITS) - 1;

/// The fourteen operations of the machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// `A := B` if `C` is not zero.
    ConditionalMove,

    /// `A := segment[B][C]`.
    SegmentedLoad,

    /// `segment[A][B] := C`.
    SegmentedStore,

    /// `A := B + C`, wrapping.
    Add,

    /// `A := B * C`, wrapping.
    Multiply,

    /// `A := B / C`, unsigned. Faults if `C` is zero.
    Divide,

    /// `A := !(B & C)`.
    Nand,

    /// Stops the machine.
    Halt,

    /// Maps a new segment of `C` words and puts its handle in `B`.
    MapSegment,

    /// Unmaps the segment with handle `C`.
    UnmapSegment,

    /// Writes the low byte of `C` to the output.
    Output,

    /// Reads a byte into `C`, or all ones at the end of the input.
    Input,

    /// Replaces segment 0 with a copy of segment `B` and jumps to `C`.
    LoadProgram,

    /// Loads a 25-bit immediate into a register.
    LoadValue,
}

impl OpCode {
    /// Every opcode, ordered by its numeric value.
    pub const ALL: [OpCode; 14] = [
        OpCode::ConditionalMove,
        OpCode::SegmentedLoad,
        OpCode::SegmentedStore,
        OpCode::Add,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Nand,
        OpCode::Halt,
        OpCode::MapSegment,
        OpCode::UnmapSegment,
        OpCode::Output,
        OpCode::Input,
        OpCode::LoadProgram,
        OpCode::LoadValue,
    ];

    /// The numeric value of the opcode field.
    pub fn as_bits(&self) -> u32 {
        match self {
            OpCode::ConditionalMove => 0,
            OpCode::SegmentedLoad => 1,
            OpCode::SegmentedStore => 2,
            OpCode::Add => 3,
            OpCode::Multiply => 4,
            OpCode::Divide => 5,
            OpCode::Nand => 6,
            OpCode::Halt => 7,
            OpCode::MapSegment => 8,
            OpCode::UnmapSegment => 9,
            OpCode::Output => 10,
            OpCode::Input => 11,
            OpCode::LoadProgram => 12,
            OpCode::LoadValue => 13,
        }
    }

    /// Looks up the opcode with the numeric value `bits`, `None` for 14 and 15.
    pub fn from_bits(bits: u32) -> Option<OpCode> {
        OpCode::ALL.get(bits as usize).copied()
    }

    /// The assembler mnemonic of the opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::ConditionalMove => "cmov",
            OpCode::SegmentedLoad => "sload",
            OpCode::SegmentedStore => "sstore",
            OpCode::Add => "add",
            OpCode::Multiply => "mul",
            OpCode::Divide => "div",
            OpCode::Nand => "nand",
            OpCode::Halt => "halt",
            OpCode::MapSegment => "map",
            OpCode::UnmapSegment => "unmap",
            OpCode::Output => "out",
            OpCode::Input => "in",
            OpCode::LoadProgram => "loadp",
            OpCode::LoadValue => "lv",
        }
    }

    /// Looks up an opcode by its mnemonic, ignoring case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        OpCode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Register {
    /// Decodes a three bit register field. Bits above the third are ignored.
    pub fn from_bits(bits: u32) -> Register {
        match bits & 0b111 {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            _ => Register::R7,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Register::R0 => 0,
            Register::R1 => 1,
            Register::R2 => 2,
            Register::R3 => 3,
            Register::R4 => 4,
            Register::R5 => 5,
            Register::R6 => 6,
            Register::R7 => 7,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Register, ()> {
        let mut chars = s.chars();

        match (chars.next(), chars.next(), chars.next()) {
            (Some('r'), Some(digit), None) | (Some('R'), Some(digit), None) => digit
                .to_digit(8)
                .map(Register::from_bits)
                .ok_or(()),
            _ => Err(()),
        }
    }
}

/// A decoded instruction.
///
/// Register fields an operation does not read are dropped while decoding and written as zero
/// while encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    ConditionalMove { a: Register, b: Register, c: Register },
    SegmentedLoad { a: Register, b: Register, c: Register },
    SegmentedStore { a: Register, b: Register, c: Register },
    Add { a: Register, b: Register, c: Register },
    Multiply { a: Register, b: Register, c: Register },
    Divide { a: Register, b: Register, c: Register },
    Nand { a: Register, b: Register, c: Register },
    Halt,
    MapSegment { b: Register, c: Register },
    UnmapSegment { c: Register },
    Output { c: Register },
    Input { c: Register },
    LoadProgram { b: Register, c: Register },
    LoadValue { a: Register, value: u32 },
}

impl Instruction {
    /// Decodes an instruction word.
    ///
    /// # Errors
    /// Returns the value of the opcode field if it doesn't name an operation.
    pub fn decode(word: u32) -> Result<Instruction, u32> {
        let bits = extract_unsigned(word, OPCODE_BITS, OPCODE_OFFSET);
        let opcode = OpCode::from_bits(bits).ok_or(bits)?;

        let field = |n: u32| Register::from_bits(extract_unsigned(word, REGISTER_BITS, n * REGISTER_BITS));
        let (a, b, c) = (field(2), field(1), field(0));

        Ok(match opcode {
            OpCode::ConditionalMove => Instruction::ConditionalMove { a, b, c },
            OpCode::SegmentedLoad => Instruction::SegmentedLoad { a, b, c },
            OpCode::SegmentedStore => Instruction::SegmentedStore { a, b, c },
            OpCode::Add => Instruction::Add { a, b, c },
            OpCode::Multiply => Instruction::Multiply { a, b, c },
            OpCode::Divide => Instruction::Divide { a, b, c },
            OpCode::Nand => Instruction::Nand { a, b, c },
            OpCode::Halt => Instruction::Halt,
            OpCode::MapSegment => Instruction::MapSegment { b, c },
            OpCode::UnmapSegment => Instruction::UnmapSegment { c },
            OpCode::Output => Instruction::Output { c },
            OpCode::Input => Instruction::Input { c },
            OpCode::LoadProgram => Instruction::LoadProgram { b, c },
            OpCode::LoadValue => Instruction::LoadValue {
                a: Register::from_bits(extract_unsigned(word, REGISTER_BITS, VALUE_REGISTER_OFFSET)),
                value: extract_unsigned(word, VALUE_BITS, 0),
            },
        })
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::ConditionalMove { .. } => OpCode::ConditionalMove,
            Instruction::SegmentedLoad { .. } => OpCode::SegmentedLoad,
            Instruction::SegmentedStore { .. } => OpCode::SegmentedStore,
            Instruction::Add { .. } => OpCode::Add,
            Instruction::Multiply { .. } => OpCode::Multiply,
            Instruction::Divide { .. } => OpCode::Divide,
            Instruction::Nand { .. } => OpCode::Nand,
            Instruction::Halt => OpCode::Halt,
            Instruction::MapSegment { .. } => OpCode::MapSegment,
            Instruction::UnmapSegment { .. } => OpCode::UnmapSegment,
            Instruction::Output { .. } => OpCode::Output,
            Instruction::Input { .. } => OpCode::Input,
            Instruction::LoadProgram { .. } => OpCode::LoadProgram,
            Instruction::LoadValue { .. } => OpCode::LoadValue,
        }
    }

    /// The registers of a three-register instruction as `(A, B, C)`, unused ones as `R0`.
    fn registers(&self) -> (Register, Register, Register) {
        use Register::R0;

        match *self {
            Instruction::ConditionalMove { a, b, c }
            | Instruction::SegmentedLoad { a, b, c }
            | Instruction::SegmentedStore { a, b, c }
            | Instruction::Add { a, b, c }
            | Instruction::Multiply { a, b, c }
            | Instruction::Divide { a, b, c }
            | Instruction::Nand { a, b, c } => (a, b, c),
            Instruction::MapSegment { b, c } | Instruction::LoadProgram { b, c } => (R0, b, c),
            Instruction::UnmapSegment { c }
            | Instruction::Output { c }
            | Instruction::Input { c } => (R0, R0, c),
            Instruction::Halt | Instruction::LoadValue { .. } => (R0, R0, R0),
        }
    }

    /// Encodes the instruction into a word.
    ///
    /// The immediate of [Instruction::LoadValue] must not exceed [MAX_VALUE].
    pub fn encode(&self) -> u32 {
        let word = insert_unsigned(0, OPCODE_BITS, OPCODE_OFFSET, self.opcode().as_bits());

        if let Instruction::LoadValue { a, value } = *self {
            let word = insert_unsigned(word, REGISTER_BITS, VALUE_REGISTER_OFFSET, a.index() as u32);
            return insert_unsigned(word, VALUE_BITS, 0, value);
        }

        let (a, b, c) = self.registers();

        [a, b, c]
            .iter()
            .zip((0..3).rev())
            .fold(word, |word, (register, n)| {
                insert_unsigned(word, REGISTER_BITS, n * REGISTER_BITS, register.index() as u32)
            })
    }
}

impl From<Instruction> for u32 {
    fn from(ins: Instruction) -> u32 {
        ins.encode()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let opcode = self.opcode();

        match *self {
            Instruction::Halt => write!(f, "{}", opcode),
            Instruction::LoadValue { a, value } => write!(f, "{} {}, {}", opcode, a, value),
            Instruction::MapSegment { b, c } | Instruction::LoadProgram { b, c } => {
                write!(f, "{} {}, {}", opcode, b, c)
            }
            Instruction::UnmapSegment { c }
            | Instruction::Output { c }
            | Instruction::Input { c } => write!(f, "{} {}", opcode, c),
            _ => {
                let (a, b, c) = self.registers();
                write!(f, "{} {}, {}, {}", opcode, a, b, c)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Register::*;

    #[test]
    fn test_decode_three_register() {
        // add r3, r1, r2
        assert_eq!(
            Instruction::decode(0x3000_00CA),
            Ok(Instruction::Add { a: R3, b: R1, c: R2 }),
        );

        // out r7, unused fields set
        assert_eq!(Instruction::decode(0xA000_01FF), Ok(Instruction::Output { c: R7 }));
    }

    #[test]
    fn test_decode_load_value_is_zero_extended() {
        assert_eq!(
            Instruction::decode(0xDFFF_FFFF),
            Ok(Instruction::LoadValue { a: R7, value: MAX_VALUE }),
        );
    }

    #[test]
    fn test_decode_illegal_opcode() {
        assert_eq!(Instruction::decode(0xE000_0000), Err(14));
        assert_eq!(Instruction::decode(0xFFFF_FFFF), Err(15));
    }

    #[test]
    fn test_encode() {
        assert_eq!(Instruction::Halt.encode(), 0x7000_0000);
        assert_eq!(Instruction::LoadValue { a: R1, value: 72 }.encode(), 0xD200_0048);
        assert_eq!(Instruction::MapSegment { b: R1, c: R3 }.encode(), 0x8000_000B);
        assert_eq!(u32::from(Instruction::Output { c: R1 }), 0xA000_0001);
    }

    #[test]
    fn test_opcode_lookup() {
        for (bits, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(op.as_bits(), bits as u32);
            assert_eq!(OpCode::from_mnemonic(&op.mnemonic().to_uppercase()), Some(*op));
        }

        assert_eq!(OpCode::from_bits(14), None);
        assert_eq!(OpCode::from_mnemonic("jmp"), None);
    }

    #[test]
    fn test_register_from_str() {
        assert_eq!("r0".parse::<Register>(), Ok(R0));
        assert_eq!("R7".parse::<Register>(), Ok(R7));
        assert_eq!("r8".parse::<Register>(), Err(()));
        assert_eq!("r10".parse::<Register>(), Err(()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::Nand { a: R3, b: R1, c: R2 }.to_string(), "nand r3, r1, r2");
        assert_eq!(Instruction::LoadProgram { b: R4, c: R0 }.to_string(), "loadp r4, r0");
        assert_eq!(Instruction::Input { c: R2 }.to_string(), "in r2");
        assert_eq!(Instruction::LoadValue { a: R1, value: 10 }.to_string(), "lv r1, 10");
        assert_eq!(Instruction::Halt.to_string(), "halt");
    }
}
