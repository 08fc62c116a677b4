use std::fmt;
use std::result::Result as StdResult;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, none_of, one_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::separated_list,
    sequence::{delimited, pair, preceded, tuple},
};

use super::program::Program;
use crate::bitpack::fits_unsigned;
use crate::instruction::{Instruction, OpCode, Register, VALUE_BITS};

/// Reasons an assembly source is rejected besides plain syntax errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The statement does not start with a known mnemonic.
    UnknownMnemonic(String),

    /// The operands do not match what the instruction takes.
    Operands {
        mnemonic: &'static str,
        expected: &'static str,
    },

    /// The immediate of `lv` does not fit in 25 bits.
    ValueTooLarge(u32),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::UnknownMnemonic(mnemonic) => write!(f, "unknown instruction '{}'", mnemonic),
            ErrorKind::Operands { mnemonic, expected } => {
                write!(f, "'{}' expects {}", mnemonic, expected)
            }
            ErrorKind::ValueTooLarge(value) => {
                write!(f, "{} does not fit in {} bits", value, VALUE_BITS)
            }
        }
    }
}

pub type ParseError = crate::error::ParseError<ErrorKind>;
type Result<'a, T> = IResult<&'a str, T, ParseError>;

const SPACE_CHARACTERS: &str = " \t";
const WORD_DIRECTIVE: &str = ".word";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Register(Register),
    Value(u32),
}

#[derive(Debug)]
struct Statement<'a> {
    /// The input starting at the statement, for error locations.
    at: &'a str,
    mnemonic: &'a str,
    operands: Vec<Operand>,
}

fn sp(input: &str) -> Result<&str> {
    take_while(|c| SPACE_CHARACTERS.contains(c))(input)
}

fn newline(input: &str) -> Result<&str> {
    alt((tag("\r\n"), tag("\n")))(input)
}

fn comment(input: &str) -> Result<&str> {
    preceded(char(';'), take_while(|c| c != '\n' && c != '\r'))(input)
}

fn register(input: &str) -> Result<Register> {
    map_res(
        recognize(pair(one_of("rR"), one_of("01234567"))),
        |s: &str| s.parse::<Register>(),
    )(input)
}

fn hexadecimal(input: &str) -> Result<u32> {
    preceded(
        alt((tag("0x"), tag("0X"))),
        map_res(take_while1(|c: char| c.is_digit(16)), |s| u32::from_str_radix(s, 16)),
    )(input)
}

fn decimal(input: &str) -> Result<u32> {
    map_res(take_while1(|c: char| c.is_digit(10)), |s| u32::from_str_radix(s, 10))(input)
}

fn escape(input: &str) -> Result<char> {
    preceded(
        char('\\'),
        alt((
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
            value('\0', char('0')),
            char('\\'),
            char('\''),
        )),
    )(input)
}

fn character(input: &str) -> Result<u32> {
    map(
        delimited(char('\''), alt((escape, none_of("\\'\r\n"))), char('\'')),
        |c: char| c as u32,
    )(input)
}

fn operand(input: &str) -> Result<Operand> {
    alt((
        map(register, Operand::Register),
        map(alt((hexadecimal, decimal, character)), Operand::Value),
    ))(input)
}

fn statement(input: &str) -> Result<Statement> {
    let at = input;

    let (input, mnemonic) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.')(input)?;
    let (input, _) = sp(input)?;
    let (input, operands) = separated_list(tuple((sp, char(','), sp)), operand)(input)?;

    Ok((input, Statement { at, mnemonic, operands }))
}

/// Parses one line, including its line break unless it is the last line.
fn line(input: &str) -> Result<Option<Statement>> {
    let (input, (_, statement, _, _)) = tuple((sp, opt(statement), sp, opt(comment)))(input)?;

    if input.is_empty() {
        return Ok((input, statement));
    }

    let (input, _) = newline(input)?;

    Ok((input, statement))
}

fn expected_operands(opcode: OpCode) -> &'static str {
    match opcode {
        OpCode::Halt => "no operands",
        OpCode::MapSegment | OpCode::LoadProgram => "rB, rC",
        OpCode::UnmapSegment | OpCode::Output | OpCode::Input => "rC",
        OpCode::LoadValue => "rA, VALUE",
        _ => "rA, rB, rC",
    }
}

impl<'a> Statement<'a> {
    fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError::from_kind(self.at, kind)
    }

    fn assemble(&self) -> StdResult<u32, ParseError> {
        use self::Operand::{Register as R, Value as V};

        if self.mnemonic.eq_ignore_ascii_case(WORD_DIRECTIVE) {
            return match self.operands[..] {
                [V(word)] => Ok(word),
                _ => Err(self.error(ErrorKind::Operands {
                    mnemonic: WORD_DIRECTIVE,
                    expected: "VALUE",
                })),
            };
        }

        let opcode = OpCode::from_mnemonic(self.mnemonic)
            .ok_or_else(|| self.error(ErrorKind::UnknownMnemonic(self.mnemonic.to_string())))?;

        let instruction = match (opcode, &self.operands[..]) {
            (OpCode::ConditionalMove, &[R(a), R(b), R(c)]) => Instruction::ConditionalMove { a, b, c },
            (OpCode::SegmentedLoad, &[R(a), R(b), R(c)]) => Instruction::SegmentedLoad { a, b, c },
            (OpCode::SegmentedStore, &[R(a), R(b), R(c)]) => Instruction::SegmentedStore { a, b, c },
            (OpCode::Add, &[R(a), R(b), R(c)]) => Instruction::Add { a, b, c },
            (OpCode::Multiply, &[R(a), R(b), R(c)]) => Instruction::Multiply { a, b, c },
            (OpCode::Divide, &[R(a), R(b), R(c)]) => Instruction::Divide { a, b, c },
            (OpCode::Nand, &[R(a), R(b), R(c)]) => Instruction::Nand { a, b, c },
            (OpCode::Halt, &[]) => Instruction::Halt,
            (OpCode::MapSegment, &[R(b), R(c)]) => Instruction::MapSegment { b, c },
            (OpCode::UnmapSegment, &[R(c)]) => Instruction::UnmapSegment { c },
            (OpCode::Output, &[R(c)]) => Instruction::Output { c },
            (OpCode::Input, &[R(c)]) => Instruction::Input { c },
            (OpCode::LoadProgram, &[R(b), R(c)]) => Instruction::LoadProgram { b, c },
            (OpCode::LoadValue, &[R(a), V(value)]) => {
                if !fits_unsigned(value, VALUE_BITS) {
                    return Err(self.error(ErrorKind::ValueTooLarge(value)));
                }

                Instruction::LoadValue { a, value }
            }
            (opcode, _) => {
                return Err(self.error(ErrorKind::Operands {
                    mnemonic: opcode.mnemonic(),
                    expected: expected_operands(opcode),
                }));
            }
        };

        Ok(instruction.encode())
    }
}

pub(crate) fn parse_program(input: &str) -> StdResult<Program, ParseError> {
    let mut program = Program::new();
    let mut rest = input;

    while !rest.is_empty() {
        let (next, statement) = match line(rest) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => return Err(err),
            Err(nom::Err::Incomplete(_)) => return Err(ParseError::incomplete()),
        };

        if let Some(statement) = statement {
            program.push_word(statement.assemble()?);
        }

        rest = next;
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Register::*;

    fn assemble(source: &str) -> Vec<u32> {
        Program::parse(source)
            .unwrap_or_else(|err| panic!("{}", err.verbose(source)))
            .to_words()
    }

    #[test]
    fn test_parse_hello() {
        let words = assemble(r#"
            ; prints H and a newline
            lv   r1, 'H'
            out  r1      ; H
            LV   R1, 0x0a
            out  r1
            halt
        "#);

        assert_eq!(words, vec![
            Instruction::LoadValue { a: R1, value: 72 }.encode(),
            Instruction::Output { c: R1 }.encode(),
            Instruction::LoadValue { a: R1, value: 10 }.encode(),
            Instruction::Output { c: R1 }.encode(),
            Instruction::Halt.encode(),
        ]);
    }

    #[test]
    fn test_parse_every_form() {
        let words = assemble(
            "cmov r1, r2, r3\r\nsload r4,r5,r6\nsstore r7, r0, r1\nadd r1, r2, r3\n\
             mul r1, r2, r3\ndiv r1, r2, r3\nnand r1, r2, r3\nmap r1, r2\nunmap r3\n\
             in r4\nloadp r5, r6\n.word 0xdeadbeef\nlv r7, 33554431",
        );

        assert_eq!(words.len(), 13);
        assert_eq!(Instruction::decode(words[1]), Ok(Instruction::SegmentedLoad { a: R4, b: R5, c: R6 }));
        assert_eq!(Instruction::decode(words[7]), Ok(Instruction::MapSegment { b: R1, c: R2 }));
        assert_eq!(words[11], 0xDEAD_BEEF);
        assert_eq!(Instruction::decode(words[12]), Ok(Instruction::LoadValue { a: R7, value: 0x1FF_FFFF }));
    }

    #[test]
    fn test_character_escapes() {
        let words = assemble("lv r0, '\\n'\nlv r0, '\\''\nlv r0, '\\\\'\nlv r0, ' '\n");

        let values: Vec<u32> = words.iter().map(|w| w & 0x1FF_FFFF).collect();
        assert_eq!(values, vec![10, 39, 92, 32]);
    }

    #[test]
    fn test_unknown_mnemonic() {
        let source = "lv r1, 72\n  jmp r1\n";
        let err = Program::parse(source).unwrap_err();

        assert_eq!(err.kind(), Some(&ErrorKind::UnknownMnemonic("jmp".into())));

        let verbose = err.verbose(source);
        assert_eq!((verbose.line, verbose.column), (2, 3));
    }

    #[test]
    fn test_operand_errors() {
        let err = Program::parse("map r1, r2, r3").unwrap_err();
        assert_eq!(err.kind(), Some(&ErrorKind::Operands { mnemonic: "map", expected: "rB, rC" }));

        let err = Program::parse("lv r1, r2").unwrap_err();
        assert_eq!(err.kind(), Some(&ErrorKind::Operands { mnemonic: "lv", expected: "rA, VALUE" }));

        let err = Program::parse("lv r1, 33554432").unwrap_err();
        assert_eq!(err.kind(), Some(&ErrorKind::ValueTooLarge(33_554_432)));
    }

    #[test]
    fn test_syntax_error_location() {
        let source = "halt\nadd r1, r2, r9\n";
        let err = Program::parse(source).unwrap_err();

        assert_eq!(err.kind(), None);

        let verbose = err.verbose(source);
        assert_eq!((verbose.line, verbose.column), (2, 11));
        assert!(verbose.to_string().starts_with("line 2 col 11: unexpected input ("));
    }

    #[test]
    fn test_listing_reassembles() {
        let mut program = Program::new();
        program
            .push(Instruction::LoadValue { a: R3, value: 100 })
            .push(Instruction::MapSegment { b: R1, c: R3 })
            .push_word(0x7000_01FF)
            .push_word(0xF000_0000)
            .push(Instruction::Halt);

        let listing = program.listing();

        assert!(listing.starts_with("lv r3, 100"));
        assert_eq!(Program::parse(&listing).unwrap(), program);
    }
}
