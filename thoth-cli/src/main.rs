//! Entrypoint for CLI
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use thoth_compiler::{
    compile::{self, Module},
    lex,
    parsing::{self, ParsedProgram},
    CompileResult,
};

use crate::conf::ToolchainConf;

mod conf;
mod toolchain;

static USAGE: &str = r#"
usage: thoth FILE

Compiles FILE to FILE.asm, then assembles and links an
executable next to it named after the file stem.

environment:
    THOTH_TOOLCHAIN    YAML file with assembler and linker settings,
                       otherwise thoth.yaml next to FILE is used
    RUST_LOG           log level

examples:
    thoth fizzbuzz.thoth
"#;

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new().env().init()?;

    let filepath = match parse_args() {
        Some(filepath) => filepath,
        None => {
            print_usage();
            process::exit(1)
        }
    };

    if let Err(err) = run_compiler(&filepath) {
        error!("{err:#}");
        process::exit(1)
    }

    Ok(())
}

fn run_compiler(filepath: &Path) -> Result<()> {
    info!("compiling {}", filepath.display());

    let source_code = fs::read_to_string(filepath)
        .with_context(|| format!("failed to read {}", filepath.display()))?;
    let conf = ToolchainConf::discover(filepath)?;

    let asm_path = write_assembly(filepath, &source_code)?;
    let executable = toolchain::assemble_and_link(&conf, &asm_path)?;
    info!("linked {}", executable.display());

    Ok(())
}

/// Compile the source to `<stem>.asm` next to `filepath`.
///
/// A program that fails to compile writes nothing, and the assembly
/// file and executable left by an earlier run are removed.
fn write_assembly(filepath: &Path, source_code: &str) -> Result<PathBuf> {
    let asm_path = filepath.with_extension("asm");

    let module = match build_module(source_code) {
        Ok(module) => module,
        Err(err) => {
            remove_stale_outputs(filepath, &asm_path);
            return Err(anyhow!(err.display(source_code)));
        }
    };

    let outfile = fs::File::create(&asm_path)
        .with_context(|| format!("failed to create {}", asm_path.display()))?;
    compile::write_module(&module, outfile)
        .with_context(|| format!("failed to write {}", asm_path.display()))?;
    info!("wrote {}", asm_path.display());

    Ok(asm_path)
}

fn remove_stale_outputs(filepath: &Path, asm_path: &Path) {
    let executable = asm_path.with_extension("");

    for stale in [asm_path, executable.as_path()] {
        // Never the source itself, e.g. when it has no extension.
        if stale == filepath {
            continue;
        }
        match fs::remove_file(stale) {
            Ok(()) => info!("removed stale {}", stale.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove {}: {err}", stale.display()),
        }
    }
}

/// Front end and code generation, printing the token and
/// statement diagnostics along the way.
fn build_module(source_code: &str) -> CompileResult<Module> {
    let lexed = lex::tokenize(source_code)?;
    lex::debug_print_tokens(&lexed.tokens, source_code);

    let program = parsing::parse(lexed)?;
    print_program(&program);

    compile::generate(&program)
}

fn print_program(program: &ParsedProgram) {
    println!("statements:");
    for stmt in &program.stmts {
        println!("    {stmt}");
    }

    println!("functions:");
    for func in program.functions.iter() {
        let params: Vec<String> = func
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name))
            .collect();
        match &func.return_type {
            Some(ty) => println!("    {}({}) -> {ty}", func.name, params.join(", ")),
            None => println!("    {}({})", func.name, params.join(", ")),
        }
        println!("        {}", func.body);
    }
}

fn parse_args() -> Option<PathBuf> {
    let mut args = env::args_os().skip(1);
    match (args.next(), args.next()) {
        (Some(filepath), None) => Some(PathBuf::from(filepath)),
        _ => None,
    }
}

fn print_usage() {
    println!("Thoth v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

#[cfg(test)]
mod test {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("thoth-cli-{name}-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_failed_compile_removes_stale_outputs() {
        let dir = scratch_dir("stale");
        let source = dir.join("broken.thoth");
        let asm_path = dir.join("broken.asm");
        let executable = dir.join("broken");
        fs::write(&asm_path, "; from an earlier run").unwrap();
        fs::write(&executable, "").unwrap();

        assert!(write_assembly(&source, "int x = ;").is_err());
        assert!(!asm_path.exists());
        assert!(!executable.exists());

        // Nothing left to remove is not an error either.
        assert!(write_assembly(&source, "int x = ;").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_compile_keeps_source_without_extension() {
        let dir = scratch_dir("no-extension");
        let source = dir.join("program");
        fs::write(&source, "int x = ;").unwrap();

        assert!(write_assembly(&source, "int x = ;").is_err());
        assert!(source.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_successful_compile_writes_assembly() {
        let dir = scratch_dir("ok");
        let source = dir.join("ok.thoth");

        let asm_path = write_assembly(&source, "int x = 1;").unwrap();
        assert_eq!(asm_path, dir.join("ok.asm"));
        assert!(fs::read_to_string(&asm_path).unwrap().contains("_start:"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
