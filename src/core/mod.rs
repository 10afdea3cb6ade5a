use std::fmt;
use coloredpp::Colorize;
use crate::core::interpreter::Interpreter;
use crate::core::memory::RuntimeError;
use crate::core::parser::{ParseError, Parser};
use crate::core::resolver::{Resolver, SemanticError};
use crate::core::scanner::{ScanError, Scanner};
use crate::warn;

pub mod eval;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod types;

/// a failure from whichever stage gave up first
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    Lex(ScanError),
    Parse(ParseError),
    Analysis(Vec<SemanticError>),
    Runtime(RuntimeError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Lex(err) => write!(f, "Lexical error: {}", err),
            PipelineError::Parse(err) => write!(f, "Parsing error: {}", err),
            PipelineError::Analysis(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            PipelineError::Runtime(err) => write!(f, "Runtime error: {}", err),
        }
    }
}

/// run a source text through all four stages; warnings are surfaced even
/// when analysis succeeds, and evaluation only happens on a clean pass
pub fn run(input: &str) -> Result<(), PipelineError> {
    // input code tokenizer
    let tokens = Scanner::new(input).start().map_err(PipelineError::Lex)?;
    // token parser
    let mut parser = Parser::new(&tokens);
    let program = parser.start().map_err(PipelineError::Parse)?;
    // scoping, mutability and type diagnostics
    let mut resolver = Resolver::new();
    resolver.resolve(&program);
    for warning in &resolver.warnings {
        warn!(warning);
    }
    if !resolver.errors.is_empty() {
        return Err(PipelineError::Analysis(resolver.errors));
    }
    // interprets the code
    let mut interpreter = Interpreter::new();
    interpreter.start(&program).map_err(PipelineError::Runtime)?;
    Ok(())
}
