//! Compiler for the Thoth language, targeting x86-64 Linux assembly.
pub mod compile;
pub mod error;
pub mod lex;
pub mod literals;
pub mod parsing;
pub mod token_stream;
pub mod tokens;
pub mod types;

pub use error::{CompileError, CompileResult};

use log::debug;

/// Run the whole pipeline, returning the assembly text.
pub fn compile_str(source: &str) -> CompileResult<String> {
    // Lexical analysis
    let lexed = lex::tokenize(source)?;
    debug!(
        "lexed {} tokens, {} string literals",
        lexed.tokens.len(),
        lexed.strings.len()
    );

    // Syntactic analysis and type resolution
    let program = parsing::parse(lexed)?;

    // Code generation
    let module = compile::generate(&program)?;

    Ok(module.to_string())
}
