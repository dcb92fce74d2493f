//! Fixed parts of every module: constants, the list arena and
//! the helper routines called from generated code.
use super::ir::{Cond, Data, Mem, Operand, Reg, Size, IR};
use crate::literals::LiteralTable;

pub const SYS_WRITE: &str = "sys_write";
pub const SYS_EXIT: &str = "sys_exit";
pub const STDOUT: &str = "stdout";

pub const PRINT_INTEGER: &str = "print_integer";
pub const RUNTIME_ABORT: &str = "runtime_abort";
pub const PRINT_BUFFER: &str = "print_buffer";
pub const LIST_HEAP: &str = "list_heap";
pub const LIST_HEAP_TOP: &str = "list_heap_top";
pub const LIST_HEAP_END: &str = "list_heap_end";

/// Process exit code of a failed assertion or runtime check.
pub const ABORT_EXIT_CODE: i64 = 134;

/// Capacity of the list arena, in quadwords.
pub const LIST_HEAP_QWORDS: usize = 65536;

const PRINT_BUFFER_SIZE: i64 = 32;

pub fn string_symbol(index: usize) -> String {
    format!("string_{index}")
}

pub fn string_len_symbol(index: usize) -> String {
    format!("string_{index}_len")
}

/// Two quadword `(address, length)` descriptor of a literal,
/// the runtime value of a string.
pub fn string_desc_symbol(index: usize) -> String {
    format!("string_{index}_desc")
}

pub fn data_section(strings: &LiteralTable) -> Vec<Data> {
    let mut data = vec![
        Data::Equ(SYS_WRITE.to_owned(), "1".to_owned()),
        Data::Equ(SYS_EXIT.to_owned(), "60".to_owned()),
        Data::Equ(STDOUT.to_owned(), "1".to_owned()),
    ];

    for (index, text) in strings.iter() {
        let label = string_symbol(index);
        data.push(Data::Bytes(label.clone(), text.as_bytes().to_vec()));
        data.push(Data::Equ(string_len_symbol(index), format!("$ - {label}")));
        data.push(Data::Quads(
            string_desc_symbol(index),
            vec![label, string_len_symbol(index)],
        ));
    }

    data.push(Data::Quads(
        LIST_HEAP_TOP.to_owned(),
        vec![LIST_HEAP.to_owned()],
    ));

    data
}

pub fn bss_section() -> Vec<Data> {
    vec![
        Data::Reserve(
            PRINT_BUFFER.to_owned(),
            Size::Byte,
            PRINT_BUFFER_SIZE as usize,
        ),
        Data::Reserve(LIST_HEAP.to_owned(), Size::Qword, LIST_HEAP_QWORDS),
        Data::Label(LIST_HEAP_END.to_owned()),
    ]
}

/// Write `rdx` bytes starting at `rsi` to standard output.
pub fn write_stdout() -> Vec<IR> {
    vec![
        IR::Mov(Reg::Rax.into(), Operand::Symbol(SYS_WRITE.to_owned())),
        IR::Mov(Reg::Rdi.into(), Operand::Symbol(STDOUT.to_owned())),
        IR::Syscall,
    ]
}

/// Terminate the process with the exit code in `rdi`.
pub fn exit_process() -> Vec<IR> {
    vec![
        IR::Mov(Reg::Rax.into(), Operand::Symbol(SYS_EXIT.to_owned())),
        IR::Syscall,
    ]
}

/// Helper routines, appended once after the user functions.
pub fn helpers() -> Vec<IR> {
    let mut code = print_integer();
    code.push(IR::Label(RUNTIME_ABORT.to_owned()));
    code.push(IR::Mov(Reg::Rdi.into(), ABORT_EXIT_CODE.into()));
    code.extend(exit_process());
    code
}

/// Print the signed integer in `rdi` in decimal.
///
/// Digits are produced by repeated division of the magnitude and
/// written backwards into the scratch buffer. The sign is kept in
/// `r8` across the conversion.
fn print_integer() -> Vec<IR> {
    let positive = format!("{PRINT_INTEGER}_positive");
    let digit = format!("{PRINT_INTEGER}_digit");
    let write = format!("{PRINT_INTEGER}_write");
    let buffer_end = || Mem::symbol(PRINT_BUFFER, PRINT_BUFFER_SIZE);

    let mut code = vec![
        IR::Label(PRINT_INTEGER.to_owned()),
        IR::Mov(Reg::Rax.into(), Reg::Rdi.into()),
        IR::Xor(Reg::R8.into(), Reg::R8.into()),
        IR::Test(Reg::Rax, Reg::Rax),
        IR::Jcc(Cond::Ns, positive.clone()),
        IR::Mov(Reg::R8.into(), Operand::Imm(1)),
        IR::Neg(Reg::Rax),
        IR::Label(positive),
        IR::Lea(Reg::Rsi, buffer_end()),
        IR::Mov(Reg::Rcx.into(), Operand::Imm(10)),
        IR::Label(digit.clone()),
        IR::Xor(Reg::Rdx.into(), Reg::Rdx.into()),
        IR::Div(Reg::Rcx),
        IR::Add(Reg::Rdx.into(), (b'0' as i64).into()),
        IR::Dec(Reg::Rsi.into()),
        IR::Mov(Mem::reg(Reg::Rsi, 0).into(), Reg::Dl.into()),
        IR::Test(Reg::Rax, Reg::Rax),
        IR::Jcc(Cond::Nz, digit),
        IR::Test(Reg::R8, Reg::R8),
        IR::Jcc(Cond::Z, write.clone()),
        IR::Dec(Reg::Rsi.into()),
        IR::Mov(
            Mem::reg(Reg::Rsi, 0).sized(Size::Byte).into(),
            (b'-' as i64).into(),
        ),
        IR::Label(write),
        IR::Lea(Reg::Rdx, buffer_end()),
        IR::Sub(Reg::Rdx.into(), Reg::Rsi.into()),
    ];
    code.extend(write_stdout());
    code.push(IR::Ret);
    code
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_data_section_per_literal() {
        let mut strings = LiteralTable::new();
        strings.intern("hi\n");
        strings.intern("");

        let lines: Vec<String> = data_section(&strings)
            .iter()
            .map(|data| data.to_string())
            .collect();

        assert_eq!(
            lines,
            vec![
                "    sys_write equ 1",
                "    sys_exit equ 60",
                "    stdout equ 1",
                "string_0: db \"hi\", 10",
                "    string_0_len equ $ - string_0",
                "string_0_desc: dq string_0, string_0_len",
                "string_1:",
                "    string_1_len equ $ - string_1",
                "string_1_desc: dq string_1, string_1_len",
                "list_heap_top: dq list_heap",
            ]
        );
    }
}
