use std::fmt;

use clap::{App, Arg, ArgMatches};
use slog::{error, o, Drain, Level, LevelFilter, Logger};
use slog_term::{FullFormat, TermDecorator};

use um::{
    emulator::{Machine, StdIo},
    error::{Fault, ImageError},
};

enum Error {
    Image(ImageError),
    Execution(Fault),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<ImageError> for Error {
    fn from(e: ImageError) -> Error {
        Error::Image(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Image(err) => write!(f, "{}", err),
            Error::Execution(fault) => write!(f, "program faulted {}", fault),
            Error::IO(err) => write!(f, "IO error: {}", err),
        }
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("umrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Executes Universal Machine program images")
        .arg(Arg::with_name("program")
             .help("Program image of big-endian 32-bit words")
             .value_name("PROGRAM")
             .required(true)
             .index(1))
        .get_matches()
}

/// Logs go to the standard error, the standard output belongs to the program.
fn build_logger() -> Logger {
    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = LevelFilter::new(drain, Level::Warning).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn main() {
    let args = parse_arguments();
    let file_path = args.value_of("program").unwrap();

    let status = {
        let logger = build_logger();

        match run(file_path, &logger) {
            Ok(()) => 0,
            // The machine has already logged the fault.
            Err(Error::Execution(_)) => 1,
            Err(err) => {
                error!(logger, "{}", err; "program" => file_path);
                2
            }
        }
    };

    std::process::exit(status);
}

fn run(file_path: &str, logger: &Logger) -> Result<(), Error> {
    let image = std::fs::read(file_path)?;
    let mut machine = Machine::with_logger(&image, StdIo::new(), logger.clone())?;
    drop(image);

    let outcome = machine.run();
    drop(machine.release());

    outcome.map_err(Error::Execution)
}
