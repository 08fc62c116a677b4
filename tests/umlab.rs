use std::iter;

use um::{
    assembler::Program,
    emulator::{Machine, TestIo},
    instruction::{Instruction, Register::{self, *}},
};

fn lv(a: Register, value: u32) -> Instruction {
    Instruction::LoadValue { a, value }
}

fn out(c: Register) -> Instruction {
    Instruction::Output { c }
}

fn run_program(program: &Program, input: &[u8]) -> Vec<u8> {
    let mut machine = Machine::new(&program.to_bytes(), TestIo::with_input(input.to_vec()))
        .expect("could not initialize the machine");

    machine.run()
        .unwrap_or_else(|fault| panic!("the program faulted {}", fault));

    assert!(machine.halted());

    machine.release().into_output()
}

#[test]
fn test_halt() {
    let program: Program = iter::once(Instruction::Halt).collect();

    assert_eq!(run_program(&program, b""), b"");
}

#[test]
fn test_verbose_halt() {
    let mut program = Program::new();
    program.push(Instruction::Halt);

    for &c in b"Bad!\n" {
        program.push(lv(R1, c as u32)).push(out(R1));
    }

    assert_eq!(program.len(), 11);
    assert_eq!(run_program(&program, b""), b"");
}

#[test]
fn test_print_six() {
    let program: Program = vec![
        lv(R1, 48),
        lv(R2, 6),
        Instruction::Add { a: R3, b: R1, c: R2 },
        out(R3),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"6");
}

#[test]
fn test_divide() {
    let program: Program = vec![
        lv(R1, 900),
        lv(R2, 9),
        Instruction::Divide { a: R3, b: R1, c: R2 },
        out(R3),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"d");
}

#[test]
fn test_nand() {
    let program: Program = vec![
        lv(R1, 0x1FF_FFFB),
        lv(R2, 0x1FF_FFCF),
        Instruction::Nand { a: R3, b: R1, c: R2 },
        out(R3),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"4");
}

#[test]
fn test_multiply() {
    let program: Program = vec![
        lv(R1, 6),
        lv(R2, 9),
        Instruction::Multiply { a: R3, b: R1, c: R2 },
        out(R3),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"6");
}

#[test]
fn test_input() {
    let program: Program = vec![
        Instruction::Input { c: R1 },
        out(R1),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b"q"), b"q");
}

#[test]
fn test_conditional_move() {
    let program: Program = vec![
        lv(R3, 0),
        lv(R2, 'X' as u32),
        lv(R1, 'Y' as u32),
        Instruction::ConditionalMove { a: R1, b: R2, c: R3 },
        out(R1),
        lv(R3, 1),
        Instruction::ConditionalMove { a: R1, b: R2, c: R3 },
        out(R1),
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"YX");
}

#[test]
fn test_map_unmap() {
    let mut program: Program = vec![lv(R3, 100), lv(R0, 48)].into_iter().collect();

    for _ in 0..50 {
        program.extend(vec![
            Instruction::MapSegment { b: R1, c: R3 },
            Instruction::UnmapSegment { c: R1 },
            Instruction::Add { a: R2, b: R1, c: R0 },
            out(R2),
        ]);
    }

    program.push(Instruction::Halt);

    assert_eq!(run_program(&program, b""), vec![b'1'; 50]);
}

#[test]
fn test_map_unmap_load_store() {
    let program: Program = vec![
        lv(R3, 18),
        Instruction::MapSegment { b: R1, c: R3 },
        lv(R2, 'b' as u32),
        lv(R3, 8),
        Instruction::SegmentedStore { a: R1, b: R3, c: R2 },
        Instruction::SegmentedLoad { a: R5, b: R1, c: R3 },
        out(R5),
        lv(R4, 'a' as u32),
        lv(R3, 14),
        Instruction::SegmentedStore { a: R1, b: R3, c: R4 },
        Instruction::SegmentedLoad { a: R4, b: R1, c: R3 },
        out(R4),
        lv(R3, 8),
        Instruction::SegmentedLoad { a: R4, b: R1, c: R3 },
        out(R4),
        Instruction::UnmapSegment { c: R1 },
        Instruction::Halt,
    ].into_iter().collect();

    assert_eq!(run_program(&program, b""), b"bab");
}
