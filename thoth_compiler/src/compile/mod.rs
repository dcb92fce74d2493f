//! Code generation for x86-64 Linux, as NASM source.
mod codegen;
mod ir;
mod runtime;
mod symbol;

pub use codegen::{entry_label, exit_label, CodeGen, ENTRY_POINT};
pub use ir::{Base, Cond, Data, Mem, Module, Operand, Reg, Size, IR};
pub use runtime::ABORT_EXIT_CODE;
pub use symbol::{Symbol, SymbolTable};

use crate::{error::CompileResult, parsing::ParsedProgram};
use log::debug;
use std::io::{self, Write};

/// Lower a parsed program into an assembly module.
///
/// Nothing is produced unless the whole program passes.
pub fn generate(program: &ParsedProgram) -> CompileResult<Module> {
    let module = CodeGen::new(program).compile()?;
    debug!(
        "generated {} instructions for {} functions",
        module.text.len(),
        program.functions.len()
    );
    Ok(module)
}

/// Write the module's assembly text to the sink, flushing it
/// before returning.
pub fn write_module<W: Write>(module: &Module, out: W) -> io::Result<()> {
    let mut out = io::BufWriter::new(out);
    write!(out, "{module}")?;
    out.flush()
}
