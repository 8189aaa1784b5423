use std::path::PathBuf;
use std::process::ExitCode;

use loxide as lox;

use clap::Parser as ClapParser;

use lox::error::LoxError;
use lox::lox::{error_exit_code, exit_code, Lox};
use lox::reporter::Reporter;
use lox::vm::Vm;

/// Lox interpreter: tree-walking by default, bytecode VM on request.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lox script to execute; starts a REPL when omitted.
    script: Option<PathBuf>,

    /// Compile and run through the bytecode VM (expressions only).
    #[arg(long)]
    bytecode: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        // Usage errors exit 64; `--help`/`--version` are not errors.
        Err(e) => {
            let _ = e.print();

            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp
                | clap::error::ErrorKind::DisplayVersion => ExitCode::SUCCESS,

                _ => ExitCode::from(64),
            };
        }
    };

    let code: i32 = if args.bytecode {
        run_bytecode(args.script)
    } else {
        run_treewalk(args.script)
    };

    ExitCode::from(code as u8)
}

fn run_treewalk(script: Option<PathBuf>) -> i32 {
    let mut lox = Lox::new();

    match script {
        Some(path) => match lox.run_file(&path) {
            Ok(outcome) => exit_code(outcome),

            Err(e) => {
                eprintln!("{}", e);
                error_exit_code(&e)
            }
        },

        None => match lox.run_prompt() {
            Ok(()) => 0,

            Err(e) => {
                eprintln!("{}", e);
                error_exit_code(&e)
            }
        },
    }
}

fn run_bytecode(script: Option<PathBuf>) -> i32 {
    let mut vm = Vm::new();
    let mut reporter = Reporter::new();

    match script {
        Some(path) => {
            let source: String = match std::fs::read(&path)
                .map_err(LoxError::from)
                .and_then(|bytes| String::from_utf8(bytes).map_err(LoxError::from))
            {
                Ok(source) => source,

                Err(e) => {
                    eprintln!("{}", e);
                    return 74;
                }
            };

            match vm.interpret(&source, &mut reporter) {
                Ok(()) => 0,

                Err(LoxError::Runtime { .. }) => 70,

                Err(_) => 65,
            }
        }

        None => {
            // Line-at-a-time VM REPL; errors never end the session.
            use std::io::{BufRead, Write};

            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();

            loop {
                if write!(stdout, "> ").and_then(|_| stdout.flush()).is_err() {
                    return 74;
                }

                let mut line = String::new();

                match stdin.lock().read_line(&mut line) {
                    Ok(0) => return 0,

                    Ok(_) => {
                        let _ = vm.interpret(&line, &mut reporter);
                        reporter.reset();
                    }

                    Err(e) => {
                        eprintln!("{}", e);
                        return 74;
                    }
                }
            }
        }
    }
}
