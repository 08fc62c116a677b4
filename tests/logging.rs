use um::{
    assembler::Program,
    emulator::{Machine, StepResult, TestIo},
    error::FaultKind,
};

use slog::{o, Drain, Logger};
use slog_term::{FullFormat, PlainSyncDecorator, TermDecorator};

fn terminal_logger() -> Logger {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

#[test]
fn test_run_with_logger() {
    let program = Program::parse(include_str!("hello.uma"))
        .expect("could not parse the source code");

    let mut machine = Machine::with_logger(&program.to_bytes(), TestIo::new(), terminal_logger())
        .expect("could not initialize the machine");

    let mut steps = 0;

    loop {
        match machine.step() {
            StepResult::Continue => steps += 1,
            StepResult::Halted => break,
            StepResult::Faulted(fault) => panic!("the program faulted {}", fault),
        }

        assert!(steps < 100, "the program did not halt");
    }

    assert_eq!(machine.steps(), 9);
    assert_eq!(machine.release().into_output(), b"Hi!\n");
}

#[test]
fn test_fault_is_logged() {
    let decorator = PlainSyncDecorator::new(std::io::sink());
    let logger = Logger::root(FullFormat::new(decorator).build().fuse(), o!());

    let mut machine = Machine::from_words(vec![0xE000_0000], TestIo::new());
    machine.set_logger(logger);

    match machine.step() {
        StepResult::Faulted(fault) => {
            assert_eq!(fault.kind, FaultKind::IllegalOpcode(14));
            assert_eq!(fault.word, Some(0xE000_0000));
        }
        other => panic!("expected a fault, got {:?}", other),
    }

    assert_eq!(machine.steps(), 1);
}
