use std::{
    io::{stdin, stdout, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;

use errors::Diagnostics;
use interpreter::Interpreter;

mod repl;
use repl::ChunkBuffer;

const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

#[derive(clap::Parser)]
#[command(about = "A tree-walking interpreter for Lox")]
struct Args {
    /// Script to run. Starts an interactive prompt if omitted.
    file: Option<PathBuf>,

    /// Print every parsed statement to stderr before running it.
    #[arg(long)]
    dump_ast: bool,
}

struct Session<W> {
    interpreter: Interpreter,
    dump_ast: bool,
    output: W,
}

impl<W: Write> Session<W> {
    fn new(dump_ast: bool, output: W) -> Self {
        Self { interpreter: Interpreter::new(), dump_ast, output }
    }

    fn run(&mut self, source: &str) -> anyhow::Result<Diagnostics> {
        let dump_ast = self.dump_ast;
        let diagnostics = self.interpreter.run_source_with(source, &mut self.output, |stmts| {
            if dump_ast {
                for stmt in stmts {
                    eprintln!("{}", parser::Placeholder(stmt));
                }
            }
        })?;

        for diagnostic in diagnostics.iter() {
            eprintln!("{}", diagnostic);
        }
        Ok(diagnostics)
    }
}

/// Compile errors take precedence over runtime errors.
fn exit_code(diagnostics: &Diagnostics) -> u8 {
    if diagnostics.had_compile_error() {
        EXIT_COMPILE_ERROR
    } else if diagnostics.had_runtime_error() {
        EXIT_RUNTIME_ERROR
    } else {
        0
    }
}

fn run_file(path: PathBuf, session: &mut Session<impl Write>) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Could not open file: {}", path.display()))?;

    log::debug!("Running {}", path.display());
    let diagnostics = session.run(&source)?;
    Ok(ExitCode::from(exit_code(&diagnostics)))
}

fn run_prompt(session: &mut Session<impl Write>, mut input: impl BufRead) -> anyhow::Result<()> {
    let mut buffer = ChunkBuffer::default();
    loop {
        write!(session.output, "{}", buffer.prompt())?;
        session.output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        // Errors only affect the chunk they were reported for
        if let Some(chunk) = buffer.push_line(&line) {
            log::trace!("Running chunk: {:?}", chunk);
            session.run(&chunk)?;
        }
    }

    if !buffer.is_empty() {
        log::debug!("Discarding unfinished input: {:?}", buffer.take());
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let mut session = Session::new(args.dump_ast, stdout());

    match args.file {
        Some(file) => run_file(file, &mut session),
        None => {
            run_prompt(&mut session, stdin().lock())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
