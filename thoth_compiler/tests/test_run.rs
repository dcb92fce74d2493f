//! Assemble, link and run generated programs.
//!
//! Skipped when `nasm` or `ld` cannot be found.
use anyhow::{anyhow, ensure, Context, Result};
use indoc::indoc;
use std::{env, fs, path::PathBuf, process::Command};
use thoth_compiler::compile_str;

const ARITHMETIC: &str = include_str!("programs/arithmetic.thoth");
const FUNCTIONS: &str = include_str!("programs/functions.thoth");
const LISTS: &str = include_str!("programs/lists.thoth");
const NESTED_FOR: &str = include_str!("programs/nested_for.thoth");
const PRINT: &str = include_str!("programs/print.thoth");

struct Outcome {
    code: i32,
    stdout: String,
}

fn toolchain_available() -> bool {
    [("nasm", "-v"), ("ld", "--version")]
        .iter()
        .all(|(tool, flag)| {
            Command::new(tool)
                .arg(flag)
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
        })
}

fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = env::temp_dir().join(format!("thoth-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

/// Compile, assemble, link and run `source`.
///
/// Returns `None` when the toolchain is missing.
fn run_program(name: &str, source: &str) -> Result<Option<Outcome>> {
    if !toolchain_available() {
        eprintln!("Skipping {name}: nasm or ld not found");
        return Ok(None);
    }

    let asm = compile_str(source).map_err(|err| anyhow!(err.display(source)))?;

    let dir = scratch_dir(name)?;
    let asm_path = dir.join(format!("{name}.asm"));
    let obj_path = dir.join(format!("{name}.o"));
    let exe_path = dir.join(name);
    fs::write(&asm_path, asm)?;

    let status = Command::new("nasm")
        .args(["-f", "elf64", "-o"])
        .arg(&obj_path)
        .arg(&asm_path)
        .status()
        .context("failed to run nasm")?;
    ensure!(status.success(), "nasm rejected {}", asm_path.display());

    let status = Command::new("ld")
        .arg("-o")
        .arg(&exe_path)
        .arg(&obj_path)
        .status()
        .context("failed to run ld")?;
    ensure!(status.success(), "ld failed on {}", obj_path.display());

    let output = Command::new(&exe_path)
        .output()
        .with_context(|| format!("failed to run {}", exe_path.display()))?;
    fs::remove_dir_all(&dir).ok();

    let code = output
        .status
        .code()
        .ok_or_else(|| anyhow!("{name} was terminated by a signal"))?;
    Ok(Some(Outcome {
        code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    }))
}

#[test]
fn test_run_exit_codes() -> Result<()> {
    let cases = [
        ("fall_through", "int x = 1;", 0),
        ("assert_passes", "assert(1 == 1); exit(0);", 0),
        ("assert_fails", "assert(1 == 2); exit(0);", 134),
        ("explicit_exit", "exit(42);", 42),
        ("exit_truncated", "exit(300);", 44),
        ("out_of_bounds", "var xs = [1]; int y = xs[1];", 134),
        ("negative_index", "var xs = [1]; int y = xs[-1];", 134),
    ];
    for (name, source, expected) in cases {
        let Some(outcome) = run_program(name, source)? else {
            return Ok(());
        };
        assert_eq!(outcome.code, expected, "{name}");
    }
    Ok(())
}

#[test]
fn test_run_nested_for() -> Result<()> {
    if let Some(outcome) = run_program("nested_for", NESTED_FOR)? {
        assert_eq!(outcome.code, 0);
    }
    Ok(())
}

#[test]
fn test_run_for_up_to_max_bound() -> Result<()> {
    let source = indoc! {"
        int n = 0;
        for (i in 9223372036854775806..9223372036854775807) {
            n = n + 1;
        }
        assert(n == 2);
    "};
    if let Some(outcome) = run_program("for_max_bound", source)? {
        assert_eq!(outcome.code, 0);
    }
    Ok(())
}

#[test]
fn test_run_functions() -> Result<()> {
    if let Some(outcome) = run_program("functions", FUNCTIONS)? {
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.stdout, "hello hi\n");
    }
    Ok(())
}

#[test]
fn test_run_lists() -> Result<()> {
    if let Some(outcome) = run_program("lists", LISTS)? {
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.stdout, "b");
    }
    Ok(())
}

#[test]
fn test_run_arithmetic() -> Result<()> {
    if let Some(outcome) = run_program("arithmetic", ARITHMETIC)? {
        assert_eq!(outcome.code, 0);
    }
    Ok(())
}

#[test]
fn test_run_print() -> Result<()> {
    if let Some(outcome) = run_program("print", PRINT)? {
        assert_eq!(outcome.stdout, "value: 42\n-17\n0\ntwice\n");
    }
    Ok(())
}

#[test]
fn test_run_scoped_assignment() -> Result<()> {
    let source = indoc! {"
        int x = 1;
        {
            int y = 2;
            x = y + 1;
        }
        assert(x == 3);
        int z = 4;
        assert(x + z == 7);
    "};
    if let Some(outcome) = run_program("scoped_assignment", source)? {
        assert_eq!(outcome.code, 0);
    }
    Ok(())
}

#[test]
fn test_run_function_exit_code() -> Result<()> {
    let source = indoc! {"
        exit(add(f(), 3));

        function f() -> int {
            return 7;
        }

        function add(int a, int b) -> int {
            int sum = a + b;
            return sum;
        }
    "};
    if let Some(outcome) = run_program("function_exit_code", source)? {
        assert_eq!(outcome.code, 10);
    }
    Ok(())
}

/// Generated assertions against results computed on the host.
#[test]
fn test_run_arithmetic_matches_host() -> Result<()> {
    let pairs: [(i64, i64); 6] = [
        (7, 3),
        (-7, 3),
        (7, -3),
        (0, 5),
        (1_000_000, 1_000_000),
        (i32::MAX as i64, 2),
    ];

    let mut source = String::new();
    for (a, b) in pairs {
        source.push_str(&format!("assert({a} + {b} == {});\n", a + b));
        source.push_str(&format!("assert({a} - {b} == {});\n", a - b));
        source.push_str(&format!("assert({a} * {b} == {});\n", a * b));
        source.push_str(&format!("assert({a} / {b} == {});\n", a / b));
        source.push_str(&format!("assert(({a} < {b}) == {});\n", a < b));
        source.push_str(&format!("assert(({a} >= {b}) == {});\n", a >= b));
    }

    if let Some(outcome) = run_program("arithmetic_matches_host", &source)? {
        assert_eq!(outcome.code, 0, "{source}");
    }
    Ok(())
}
