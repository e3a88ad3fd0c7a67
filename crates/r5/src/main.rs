//! `r5` — rotor JavaScript shell.
//!
//! Runs a script file or an inline `-e` snippet and prints the completion
//! value.  Parse errors and uncaught script exceptions go to stderr with
//! exit code 1.

use std::process::ExitCode;

use rotor_core::error::{RotorError, RotorResult};
use rotor_core::parser::parse;
use rotor_core::runtime::Runtime;

const USAGE: &str = "usage: r5 <file.js>\n       r5 -e <source>";

/// Parse and execute `source`, returning the printed form of the completion
/// value.
fn run_source(filename: &str, source: &str) -> RotorResult<String> {
    let (program, error) = parse(filename, source);
    if let Some(error) = error {
        return Err(RotorError::Parse(error));
    }
    let mut runtime = Runtime::new();
    let value = runtime.run(&program)?;
    Ok(value.describe())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (filename, source) = match args.as_slice() {
        [flag, source] if flag.as_str() == "-e" => ("<eval>".to_string(), source.clone()),
        [file] if file.as_str() != "-h" && file.as_str() != "--help" => match std::fs::read_to_string(file) {
            Ok(source) => (file.clone(), source),
            Err(err) => {
                eprintln!("r5: {file}: {err}");
                return ExitCode::FAILURE;
            }
        },
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match run_source(&filename, &source) {
        Ok(printed) => {
            println!("{printed}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source_prints_completion_value() {
        assert_eq!(run_source("t.js", "1 + 2").unwrap(), "3");
        assert_eq!(run_source("t.js", "'a' + 'b'").unwrap(), "ab");
    }

    #[test]
    fn test_run_source_reports_parse_error() {
        let err = run_source("t.js", "var = 1;").unwrap_err();
        assert!(matches!(&err, RotorError::Parse(_)), "{err}");
        assert!(err.to_string().starts_with("t.js: Line 1:"), "{err}");
    }

    #[test]
    fn test_run_source_reports_uncaught_exception() {
        let err = run_source("t.js", "undefinedFunction()").unwrap_err();
        assert!(matches!(&err, RotorError::Uncaught(_)), "{err}");
        assert!(err.to_string().contains("ReferenceError"), "{err}");
    }
}
