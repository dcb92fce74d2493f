//! x86-64 instructions and data definitions, rendered as NASM source.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rsp,
    Rbp,
    R8,
    /// Low byte of `rax`
    Al,
    /// Low byte of `rdx`
    Dl,
}

impl fmt::Display for Reg {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reg::Rax => write!(f, "rax"),
            Reg::Rcx => write!(f, "rcx"),
            Reg::Rdx => write!(f, "rdx"),
            Reg::Rsi => write!(f, "rsi"),
            Reg::Rdi => write!(f, "rdi"),
            Reg::Rsp => write!(f, "rsp"),
            Reg::Rbp => write!(f, "rbp"),
            Reg::R8  => write!(f, "r8"),
            Reg::Al  => write!(f, "al"),
            Reg::Dl  => write!(f, "dl"),
        }
    }
}

/// Explicit operand size, required when no register operand implies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Byte,
    Qword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    Reg(Reg),
    Symbol(String),
}

/// Memory operand `[base + index*8 + disp]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mem {
    pub size: Option<Size>,
    pub base: Base,
    pub index: Option<Reg>,
    pub disp: i64,
}

impl Mem {
    pub fn reg(base: Reg, disp: i64) -> Self {
        Self {
            size: None,
            base: Base::Reg(base),
            index: None,
            disp,
        }
    }

    pub fn symbol(name: impl Into<String>, disp: i64) -> Self {
        Self {
            size: None,
            base: Base::Symbol(name.into()),
            index: None,
            disp,
        }
    }

    pub fn indexed(base: Reg, index: Reg, disp: i64) -> Self {
        Self {
            index: Some(index),
            ..Self::reg(base, disp)
        }
    }

    pub fn sized(self, size: Size) -> Self {
        Self {
            size: Some(size),
            ..self
        }
    }
}

impl fmt::Display for Mem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.size {
            Some(Size::Byte) => write!(f, "byte ")?,
            Some(Size::Qword) => write!(f, "qword ")?,
            None => {}
        }
        match &self.base {
            Base::Reg(reg) => write!(f, "[{reg}")?,
            Base::Symbol(name) => write!(f, "[{name}")?,
        }
        if let Some(index) = self.index {
            write!(f, " + {index}*8")?;
        }
        match self.disp {
            0 => write!(f, "]"),
            disp if disp < 0 => write!(f, " - {}]", -disp),
            disp => write!(f, " + {disp}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    Mem(Mem),
    /// Assembler symbol used as an immediate, like a label
    /// address or an `equ` constant.
    Symbol(String),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl From<Mem> for Operand {
    fn from(mem: Mem) -> Self {
        Operand::Mem(mem)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Imm(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Mem(mem) => write!(f, "{mem}"),
            Operand::Symbol(name) => write!(f, "{name}"),
        }
    }
}

/// Condition code suffix for `jcc` and `setcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    E,
    Ne,
    L,
    Le,
    G,
    Ge,
    Z,
    Nz,
    Ns,
    A,
    Ae,
}

impl fmt::Display for Cond {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cond::E  => write!(f, "e"),
            Cond::Ne => write!(f, "ne"),
            Cond::L  => write!(f, "l"),
            Cond::Le => write!(f, "le"),
            Cond::G  => write!(f, "g"),
            Cond::Ge => write!(f, "ge"),
            Cond::Z  => write!(f, "z"),
            Cond::Nz => write!(f, "nz"),
            Cond::Ns => write!(f, "ns"),
            Cond::A  => write!(f, "a"),
            Cond::Ae => write!(f, "ae"),
        }
    }
}

/// Intermediate representation.
///
/// One variant per emitted line of the text section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IR {
    Label(String),
    Mov(Operand, Operand),
    Movzx(Reg, Reg),
    Lea(Reg, Mem),
    Push(Operand),
    Pop(Reg),
    Add(Operand, Operand),
    Sub(Operand, Operand),
    Imul(Reg, Reg),
    /// Sign extend `rax` into `rdx`
    Cqo,
    Idiv(Reg),
    Div(Reg),
    Neg(Reg),
    Inc(Operand),
    Dec(Operand),
    And(Reg, Reg),
    Or(Reg, Reg),
    Xor(Operand, Operand),
    Cmp(Operand, Operand),
    Test(Reg, Reg),
    Set(Cond, Reg),
    Jmp(String),
    Jcc(Cond, String),
    Call(String),
    Ret,
    Syscall,
}

/// Outputs instruction as assembly.
impl fmt::Display for IR {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IR::Label(name)       => write!(f, "{name}:"),
            IR::Mov(dst, src)     => write!(f, "    mov {dst}, {src}"),
            IR::Movzx(dst, src)   => write!(f, "    movzx {dst}, {src}"),
            IR::Lea(dst, mem)     => write!(f, "    lea {dst}, {mem}"),
            IR::Push(src)         => write!(f, "    push {src}"),
            IR::Pop(dst)          => write!(f, "    pop {dst}"),
            IR::Add(dst, src)     => write!(f, "    add {dst}, {src}"),
            IR::Sub(dst, src)     => write!(f, "    sub {dst}, {src}"),
            IR::Imul(dst, src)    => write!(f, "    imul {dst}, {src}"),
            IR::Cqo               => write!(f, "    cqo"),
            IR::Idiv(src)         => write!(f, "    idiv {src}"),
            IR::Div(src)          => write!(f, "    div {src}"),
            IR::Neg(dst)          => write!(f, "    neg {dst}"),
            IR::Inc(dst)          => write!(f, "    inc {dst}"),
            IR::Dec(dst)          => write!(f, "    dec {dst}"),
            IR::And(dst, src)     => write!(f, "    and {dst}, {src}"),
            IR::Or(dst, src)      => write!(f, "    or {dst}, {src}"),
            IR::Xor(dst, src)     => write!(f, "    xor {dst}, {src}"),
            IR::Cmp(a, b)         => write!(f, "    cmp {a}, {b}"),
            IR::Test(a, b)        => write!(f, "    test {a}, {b}"),
            IR::Set(cond, dst)    => write!(f, "    set{cond} {dst}"),
            IR::Jmp(label)        => write!(f, "    jmp {label}"),
            IR::Jcc(cond, label)  => write!(f, "    j{cond} {label}"),
            IR::Call(label)       => write!(f, "    call {label}"),
            IR::Ret               => write!(f, "    ret"),
            IR::Syscall           => write!(f, "    syscall"),
        }
    }
}

/// Line of the data or bss section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// `name equ value`
    Equ(String, String),
    /// Raw bytes, `db`
    Bytes(String, Vec<u8>),
    /// Quadwords, `dq`
    Quads(String, Vec<String>),
    /// Uninitialised space, `resb` or `resq`
    Reserve(String, Size, usize),
    Label(String),
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Data::Equ(name, value) => write!(f, "    {name} equ {value}"),
            Data::Bytes(label, bytes) if bytes.is_empty() => write!(f, "{label}:"),
            Data::Bytes(label, bytes) => write!(f, "{label}: db {}", DbOperands(bytes)),
            Data::Quads(label, values) => write!(f, "{label}: dq {}", values.join(", ")),
            Data::Reserve(label, Size::Byte, count) => write!(f, "{label}: resb {count}"),
            Data::Reserve(label, Size::Qword, count) => write!(f, "{label}: resq {count}"),
            Data::Label(label) => write!(f, "{label}:"),
        }
    }
}

/// Renders bytes as `db` operands.
///
/// Printable runs become quoted strings, everything else, including
/// the quote character itself, is written as a number.
struct DbOperands<'a>(&'a [u8]);

impl<'a> fmt::Display for DbOperands<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut operands: Vec<String> = vec![];
        let mut run = String::new();

        for &byte in self.0 {
            if (0x20..0x7f).contains(&byte) && byte != b'"' {
                run.push(byte as char);
                continue;
            }
            if !run.is_empty() {
                operands.push(format!("\"{run}\""));
                run.clear();
            }
            operands.push(byte.to_string());
        }
        if !run.is_empty() {
            operands.push(format!("\"{run}\""));
        }

        write!(f, "{}", operands.join(", "))
    }
}

/// Complete assembly module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub data: Vec<Data>,
    pub bss: Vec<Data>,
    pub text: Vec<IR>,
    /// Symbols exported with `global`.
    pub globals: Vec<String>,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "section .data")?;
        for line in &self.data {
            writeln!(f, "{line}")?;
        }
        writeln!(f)?;
        writeln!(f, "section .bss")?;
        for line in &self.bss {
            writeln!(f, "{line}")?;
        }
        writeln!(f)?;
        writeln!(f, "section .text")?;
        for global in &self.globals {
            writeln!(f, "    global {global}")?;
        }
        for ir in &self.text {
            if let IR::Label(_) = ir {
                writeln!(f)?;
            }
            writeln!(f, "{ir}")?;
        }
        Ok(())
    }
}
