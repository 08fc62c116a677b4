use std::io::{self, Write};
use std::iter::FromIterator;

use super::parser::{parse_program, ParseError};
use crate::error::ImageError;
use crate::instruction::Instruction;
use crate::segments::image_words;

/// An assembled program: the words of segment 0, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Assembles a program from its textual form.
    pub fn parse(source: &str) -> Result<Program, ParseError> {
        parse_program(source)
    }

    /// Reads a program image back into a program.
    pub fn from_bytes(image: &[u8]) -> Result<Program, ImageError> {
        Ok(Program {
            words: image_words(image)?,
        })
    }

    /// Appends an instruction.
    pub fn push(&mut self, instruction: Instruction) -> &mut Program {
        self.push_word(instruction.encode())
    }

    /// Appends a raw word.
    pub fn push_word(&mut self, word: u32) -> &mut Program {
        self.words.push(word);
        self
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn to_words(&self) -> Vec<u32> {
        self.words.clone()
    }

    /// The program image: every word in big-endian byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|word| word.to_be_bytes().to_vec())
            .collect()
    }

    /// Writes the program image to `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        for word in &self.words {
            out.write_all(&word.to_be_bytes())?;
        }

        Ok(())
    }

    /// Disassembles the program.
    ///
    /// Every word gets a line with its address and raw value in a trailing comment. Words that
    /// do not decode, or that would not encode back to the same bits, are listed as `.word`, so
    /// assembling the listing gives back the same image.
    pub fn listing(&self) -> String {
        self.words
            .iter()
            .enumerate()
            .map(|(address, &word)| {
                let text = match Instruction::decode(word) {
                    Ok(instruction) if instruction.encode() == word => instruction.to_string(),
                    _ => format!(".word 0x{:08x}", word),
                };

                format!("{:<24}; {:>6}: 0x{:08x}\n", text, address, word)
            })
            .collect()
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Program {
        Program {
            words: iter.into_iter().map(|ins| ins.encode()).collect(),
        }
    }
}

impl Extend<Instruction> for Program {
    fn extend<I: IntoIterator<Item = Instruction>>(&mut self, iter: I) {
        self.words.extend(iter.into_iter().map(|ins| ins.encode()));
    }
}
