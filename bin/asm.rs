use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{App, Arg, ArgMatches};
use slog::{debug, error, info, o, Drain, Level, LevelFilter, Logger};
use slog_term::{FullFormat, TermDecorator};

use um::{assembler::Program, error::ImageError};

enum Error {
    Parse(String),
    Image(ImageError),
    SameFile(PathBuf),
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
            Error::Parse(err) => write!(f, "Parse error: {}", err),
            Error::Image(err) => write!(f, "{}", err),
            Error::SameFile(path) => {
                write!(f, "refusing to overwrite the source {}, pass --output", path.display())
            }
            Error::IO(err) => write!(f, "IO error: {}", err),
        }
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("umasm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembler and disassembler for Universal Machine programs")
        .arg(Arg::with_name("source")
             .help("Assembly source, or a program image with --disassemble")
             .value_name("SOURCE")
             .required(true)
             .index(1))
        .arg(Arg::with_name("output")
             .help("Where to write the program image [default: SOURCE with a .um extension]")
             .long("output")
             .short("o")
             .value_name("OUTPUT")
             .takes_value(true)
             .conflicts_with("disassemble"))
        .arg(Arg::with_name("disassemble")
             .help("Prints a listing of a program image")
             .long("disassemble")
             .short("d"))
        .arg(Arg::with_name("verbose")
             .help("Enables verbose logging")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn build_logger(verbose: bool) -> Logger {
    let level = if verbose { Level::Debug } else { Level::Info };

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn main() {
    let args = parse_arguments();

    let status = {
        let logger = build_logger(args.is_present("verbose"));

        match run(&args, &logger) {
            Ok(()) => 0,
            Err(err) => {
                error!(logger, "{}", err);
                2
            }
        }
    };

    std::process::exit(status);
}

fn run(args: &ArgMatches, logger: &Logger) -> Result<(), Error> {
    let source_path = Path::new(args.value_of("source").unwrap());

    if args.is_present("disassemble") {
        return disassemble(source_path, logger);
    }

    let output_path = args
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| source_path.with_extension("um"));

    if same_file(source_path, &output_path) {
        return Err(Error::SameFile(output_path));
    }

    let source = std::fs::read_to_string(source_path)?;
    let program = Program::parse(&source)
        .map_err(|err| Error::Parse(err.verbose(&source).to_string()))?;

    debug!(logger, "assembled"; "words" => program.len());

    let mut output = BufWriter::new(File::create(&output_path)?);
    program.write_to(&mut output)?;
    output.flush()?;

    info!(logger, "wrote program image"; "path" => %output_path.display(), "bytes" => program.len() * 4);

    Ok(())
}

/// True if both paths lead to the same existing file, however they are spelled.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn disassemble(path: &Path, logger: &Logger) -> Result<(), Error> {
    let image = std::fs::read(path)?;
    let program = Program::from_bytes(&image)?;

    debug!(logger, "disassemble"; "path" => %path.display(), "words" => program.len());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(program.listing().as_bytes())?;
    out.flush()?;

    Ok(())
}
