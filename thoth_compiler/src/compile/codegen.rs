use super::{
    ir::{Cond, Mem, Module, Operand, Reg, Size, IR},
    runtime,
    symbol::SymbolTable,
};
use crate::{
    error::{CompileError, CompileResult},
    parsing::{
        index_type, BinaryOp, DefinedFunction, Expr, ExprKind, For, ParsedProgram, Return, Stmt,
        UnaryOp,
    },
    tokens::Span,
    types::{Type, TypeTag},
};
use log::trace;
use smol_str::SmolStr;
use std::mem;

/// Label of the program entry point.
pub const ENTRY_POINT: &str = "_start";

pub fn entry_label(function: &str) -> String {
    format!("function_{function}_entry")
}

pub fn exit_label(function: &str) -> String {
    format!("function_{function}_exit")
}

/// Function whose body is being generated.
struct FunctionContext {
    name: SmolStr,
    return_type: Option<Type>,
    exit_label: String,
}

/// Code generator.
///
/// Lowers a parsed program onto a single stack: every expression
/// leaves exactly one 64-bit value on top, and variables are stack
/// slots addressed relative to `rsp`.
pub struct CodeGen<'a> {
    program: &'a ParsedProgram,
    /// Resulting generated code.
    code: Vec<IR>,
    /// Variables of the body being generated.
    symbols: SymbolTable,
    functions: Vec<FunctionContext>,
    /// Counter for unique labels.
    labels: usize,
}

impl<'a> CodeGen<'a> {
    pub fn new(program: &'a ParsedProgram) -> Self {
        Self {
            program,
            code: vec![],
            symbols: SymbolTable::new(),
            functions: vec![],
            labels: 0,
        }
    }

    /// Generate the complete module.
    ///
    /// User functions come first in definition order, then the runtime
    /// helpers, then the entry point running the top level statements.
    pub fn compile(mut self) -> CompileResult<Module> {
        let program = self.program;

        for func in program.functions.iter() {
            self.emit_function(func)?;
        }

        self.emit_all(runtime::helpers());

        self.symbols = SymbolTable::new();
        self.emit(IR::Label(ENTRY_POINT.to_owned()));
        let terminated = self.emit_stmts(&program.stmts)?;
        if !terminated {
            self.emit(IR::Mov(Reg::Rdi.into(), Operand::Imm(0)));
            self.emit_all(runtime::exit_process());
        }

        Ok(Module {
            data: runtime::data_section(&program.strings),
            bss: runtime::bss_section(),
            text: self.code,
            globals: vec![ENTRY_POINT.to_owned()],
        })
    }
}

/// Bookkeeping
impl<'a> CodeGen<'a> {
    #[inline]
    fn emit(&mut self, ir: IR) {
        self.code.push(ir)
    }

    fn emit_all(&mut self, code: Vec<IR>) {
        self.code.extend(code)
    }

    fn push(&mut self, src: impl Into<Operand>) {
        self.emit(IR::Push(src.into()));
        self.symbols.grow(1);
    }

    fn pop(&mut self, dst: Reg) {
        self.emit(IR::Pop(dst));
        self.symbols.shrink(1);
    }

    /// Push a 64-bit constant. `push` only encodes a sign
    /// extended 32-bit immediate.
    fn push_int(&mut self, value: i64) {
        if i32::try_from(value).is_ok() {
            self.push(Operand::Imm(value));
        } else {
            self.emit(IR::Mov(Reg::Rax.into(), Operand::Imm(value)));
            self.push(Reg::Rax);
        }
    }

    fn new_label(&mut self) -> String {
        let label = format!("label_{}", self.labels);
        self.labels += 1;
        label
    }

    fn slot_mem(&self, slot: isize) -> Mem {
        Mem::reg(Reg::Rsp, self.symbols.offset(slot))
    }

    fn open_scope(&mut self) {
        self.symbols.open_scope();
    }

    /// Drop the variables of the innermost scope with one stack adjustment.
    fn close_scope(&mut self) {
        let released = self.symbols.close_scope();
        if released > 0 {
            self.emit(IR::Add(
                Reg::Rsp.into(),
                Operand::Imm(8 * released as i64),
            ));
        }
    }
}

/// Functions
impl<'a> CodeGen<'a> {
    fn emit_function(&mut self, func: &DefinedFunction) -> CompileResult<()> {
        trace!("generating function '{}'", func.name);

        // Above the saved frame pointer and the return address sits the
        // result slot, if any, then the arguments with the last one lowest.
        let mut symbols = SymbolTable::new();
        let result_slots = if func.return_type.is_some() { 1 } else { 0 };
        let count = func.params.len() as isize;
        for (i, param) in func.params.iter().enumerate() {
            if symbols.is_defined(&param.name.name) {
                return Err(CompileError::MultiplyDefinedVariable {
                    name: param.name.name.clone(),
                    span: param.name.span,
                });
            }
            let slot = -(2 + result_slots + count - i as isize);
            symbols.define_param(param.name.name.clone(), param.ty.clone(), slot);
        }

        let exit = exit_label(&func.name);
        let outer = mem::replace(&mut self.symbols, symbols);
        self.functions.push(FunctionContext {
            name: func.name.clone(),
            return_type: func.return_type.clone(),
            exit_label: exit.clone(),
        });

        // Prologue. The saved frame pointer is part of the frame
        // layout, not of the tracked depth.
        self.emit(IR::Label(entry_label(&func.name)));
        self.emit(IR::Push(Reg::Rbp.into()));
        self.emit(IR::Mov(Reg::Rbp.into(), Reg::Rsp.into()));

        let returned = self.emit_stmt(&func.body);

        self.functions.pop();
        self.symbols = outer;

        let returned = returned?;
        if func.return_type.is_some() && !returned {
            return Err(CompileError::MissingReturnStatement {
                name: func.name.clone(),
                span: func.span,
            });
        }

        // Epilogue, reached by every return through the exit label.
        self.emit(IR::Label(exit));
        self.emit(IR::Mov(Reg::Rsp.into(), Reg::Rbp.into()));
        self.emit(IR::Pop(Reg::Rbp));
        self.emit(IR::Ret);

        Ok(())
    }

    /// Call a function, leaving its result on the stack when `wants_value`.
    ///
    /// Returns the declared return type of the callee.
    fn emit_call(
        &mut self,
        name: &SmolStr,
        args: &[Expr],
        span: Span,
        wants_value: bool,
    ) -> CompileResult<Option<Type>> {
        let program = self.program;
        let func = program
            .functions
            .get(name)
            .ok_or_else(|| CompileError::UndefinedFunction {
                name: name.clone(),
                span,
            })?;

        if args.len() != func.params.len() {
            return Err(CompileError::InvalidParameterCount {
                name: name.clone(),
                expected: func.params.len(),
                found: args.len(),
                span,
            });
        }
        if wants_value && func.return_type.is_none() {
            return Err(CompileError::NoReturnValue {
                name: name.clone(),
                span,
            });
        }

        for (arg, param) in args.iter().zip(func.params.iter()) {
            let ty = self.emit_expr(arg)?;
            param.ty.require(&ty, arg.span)?;
        }

        let has_result = func.return_type.is_some();
        if has_result {
            self.emit(IR::Sub(Reg::Rsp.into(), Operand::Imm(8)));
            self.symbols.grow(1);
        }

        self.emit(IR::Call(entry_label(name)));

        if has_result {
            self.pop(Reg::Rax);
        }
        if !args.is_empty() {
            self.emit(IR::Add(
                Reg::Rsp.into(),
                Operand::Imm(8 * args.len() as i64),
            ));
            self.symbols.shrink(args.len() as isize);
        }
        if wants_value {
            self.push(Reg::Rax);
        }

        Ok(func.return_type.clone())
    }
}

/// Statements
impl<'a> CodeGen<'a> {
    /// Generate a statement sequence.
    ///
    /// Returns whether the sequence is guaranteed to return or exit.
    fn emit_stmts(&mut self, stmts: &[Stmt]) -> CompileResult<bool> {
        let mut returned = false;

        for stmt in stmts {
            // Definitions emit no code at their position.
            if returned && !matches!(stmt, Stmt::FuncDef(_)) {
                return Err(CompileError::UnexpectedStatement {
                    reason: "statement is unreachable",
                    span: stmt.span(),
                });
            }
            returned |= self.emit_stmt(stmt)?;
        }

        Ok(returned)
    }

    /// Generate the body of a control statement in its own scope.
    ///
    /// The body may not run, so its guarantee is dropped.
    fn emit_body(&mut self, body: &Stmt) -> CompileResult<()> {
        self.open_scope();
        self.emit_stmt(body)?;
        self.close_scope();
        Ok(())
    }

    fn emit_condition(&mut self, cond: &Expr, false_label: &str) -> CompileResult<()> {
        let ty = self.emit_expr(cond)?;
        Type::boolean().require(&ty, cond.span)?;
        self.pop(Reg::Rax);
        self.emit(IR::Test(Reg::Rax, Reg::Rax));
        self.emit(IR::Jcc(Cond::Z, false_label.to_owned()));
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<bool> {
        match stmt {
            Stmt::VarDef(def) => {
                let name = &def.name.name;
                if self.symbols.is_defined(name) {
                    return Err(CompileError::MultiplyDefinedVariable {
                        name: name.clone(),
                        span: def.name.span,
                    });
                }

                let init = self.emit_expr(&def.init)?;
                let ty = if def.ty.is_resolved() {
                    def.ty.require_unify(&init, def.init.span)?
                } else {
                    init
                };
                if !ty.is_resolved() {
                    return Err(CompileError::UnresolvedType {
                        context: format!("variable '{name}'"),
                        span: def.name.span,
                    });
                }

                // The initializer value becomes the variable's slot.
                self.symbols.define(name.clone(), ty);
                Ok(false)
            }
            Stmt::Assign(assign) => {
                let name = &assign.name.name;
                let (current, slot) = match self.symbols.lookup(name) {
                    Some(symbol) => (symbol.ty.clone(), symbol.slot),
                    None => {
                        return Err(CompileError::UndefinedVariable {
                            name: name.clone(),
                            span: assign.name.span,
                        })
                    }
                };

                let ty = self.emit_expr(&assign.value)?;
                let narrowed = current.require_unify(&ty, assign.value.span)?;
                if let Some(symbol) = self.symbols.lookup_mut(name) {
                    symbol.ty = narrowed;
                }

                // Overwrite in place, the stack does not grow.
                self.pop(Reg::Rax);
                let dst = self.slot_mem(slot);
                self.emit(IR::Mov(dst.into(), Reg::Rax.into()));
                Ok(false)
            }
            Stmt::If(stmt) => {
                let end = self.new_label();
                self.emit_condition(&stmt.cond, &end)?;
                self.emit_body(&stmt.body)?;
                self.emit(IR::Label(end));
                Ok(false)
            }
            Stmt::While(stmt) => {
                let cond = self.new_label();
                let end = self.new_label();
                self.emit(IR::Label(cond.clone()));
                self.emit_condition(&stmt.cond, &end)?;
                self.emit_body(&stmt.body)?;
                self.emit(IR::Jmp(cond));
                self.emit(IR::Label(end));
                Ok(false)
            }
            Stmt::For(stmt) => {
                self.emit_for(stmt)?;
                Ok(false)
            }
            Stmt::Call(call) => {
                self.emit_call(&call.name.name, &call.args, call.name.span, false)?;
                Ok(false)
            }
            Stmt::FuncDef(_) => Ok(false),
            Stmt::Return(ret) => self.emit_return(ret),
            Stmt::Print(print) => {
                self.emit_print(&print.value)?;
                Ok(false)
            }
            Stmt::Assert(assert) => {
                let ok = self.new_label();
                let ty = self.emit_expr(&assert.cond)?;
                Type::boolean().require(&ty, assert.cond.span)?;
                self.pop(Reg::Rax);
                self.emit(IR::Test(Reg::Rax, Reg::Rax));
                self.emit(IR::Jcc(Cond::Nz, ok.clone()));
                self.emit(IR::Mov(
                    Reg::Rdi.into(),
                    Operand::Imm(runtime::ABORT_EXIT_CODE),
                ));
                self.emit_all(runtime::exit_process());
                self.emit(IR::Label(ok));
                Ok(false)
            }
            Stmt::Exit(exit) => {
                let ty = self.emit_expr(&exit.code)?;
                Type::integer().require(&ty, exit.code.span)?;
                self.pop(Reg::Rdi);
                self.emit_all(runtime::exit_process());
                Ok(true)
            }
            Stmt::Block(block) => {
                self.open_scope();
                let returned = self.emit_stmts(&block.stmts)?;
                self.close_scope();
                Ok(returned)
            }
        }
    }

    /// The end bound is pushed first and stays below the loop
    /// variable. Both are compared in place, once on entry and again
    /// after each pass before the counter is incremented, so an end
    /// bound of `i64::MAX` never wraps the counter.
    fn emit_for(&mut self, stmt: &For) -> CompileResult<()> {
        let name = &stmt.var.name;
        if self.symbols.is_defined(name) {
            return Err(CompileError::MultiplyDefinedVariable {
                name: name.clone(),
                span: stmt.var.span,
            });
        }

        self.open_scope();

        let end_ty = self.emit_expr(&stmt.range.end)?;
        Type::integer().require(&end_ty, stmt.range.end.span)?;
        let end_slot = self.symbols.define_anonymous();

        let start_ty = self.emit_expr(&stmt.range.start)?;
        Type::integer().require(&start_ty, stmt.range.start.span)?;
        let var_slot = self.symbols.define(name.clone(), Type::integer());

        let body = self.new_label();
        let done = self.new_label();

        self.compare_counter(var_slot, end_slot);
        self.emit(IR::Jcc(Cond::G, done.clone()));
        self.emit(IR::Label(body.clone()));

        self.emit_body(&stmt.body)?;

        self.compare_counter(var_slot, end_slot);
        self.emit(IR::Jcc(Cond::Ge, done.clone()));
        let counter = self.slot_mem(var_slot).sized(Size::Qword);
        self.emit(IR::Inc(counter.into()));
        self.emit(IR::Jmp(body));
        self.emit(IR::Label(done));

        self.close_scope();
        Ok(())
    }

    /// Compare the loop counter against the end bound, leaving the flags set.
    fn compare_counter(&mut self, var_slot: isize, end_slot: isize) {
        let counter = self.slot_mem(var_slot);
        let bound = self.slot_mem(end_slot);
        self.emit(IR::Mov(Reg::Rax.into(), counter.into()));
        self.emit(IR::Mov(Reg::Rdi.into(), bound.into()));
        self.emit(IR::Cmp(Reg::Rax.into(), Reg::Rdi.into()));
    }

    fn emit_return(&mut self, ret: &Return) -> CompileResult<bool> {
        let (function, return_type, exit) = match self.functions.last() {
            Some(context) => (
                context.name.clone(),
                context.return_type.clone(),
                context.exit_label.clone(),
            ),
            None => {
                return Err(CompileError::UnexpectedStatement {
                    reason: "return outside of a function",
                    span: ret.span,
                })
            }
        };

        match (&ret.value, return_type) {
            (Some(value), Some(expected)) => {
                let ty = self.emit_expr(value)?;
                expected.require(&ty, value.span)?;
                // Result slot reserved by the caller, above the return address.
                self.pop(Reg::Rax);
                self.emit(IR::Mov(Mem::reg(Reg::Rbp, 16).into(), Reg::Rax.into()));
            }
            (None, Some(expected)) => {
                return Err(CompileError::MissingExpression {
                    function,
                    expected,
                    span: ret.span,
                })
            }
            (Some(value), None) => {
                return Err(CompileError::UnexpectedExpression {
                    function,
                    span: value.span,
                })
            }
            (None, None) => {}
        }

        self.emit(IR::Jmp(exit));
        Ok(true)
    }

    fn emit_print(&mut self, value: &Expr) -> CompileResult<()> {
        // Literals are written straight from the data section.
        if let ExprKind::Str(index) = value.kind {
            self.emit(IR::Mov(
                Reg::Rsi.into(),
                Operand::Symbol(runtime::string_symbol(index)),
            ));
            self.emit(IR::Mov(
                Reg::Rdx.into(),
                Operand::Symbol(runtime::string_len_symbol(index)),
            ));
            self.emit_all(runtime::write_stdout());
            return Ok(());
        }

        let ty = self.emit_expr(value)?;
        match ty.tag {
            TypeTag::String => {
                self.pop(Reg::Rax);
                self.emit(IR::Mov(Reg::Rsi.into(), Mem::reg(Reg::Rax, 0).into()));
                self.emit(IR::Mov(Reg::Rdx.into(), Mem::reg(Reg::Rax, 8).into()));
                self.emit_all(runtime::write_stdout());
                Ok(())
            }
            TypeTag::Integer => {
                self.pop(Reg::Rdi);
                self.emit(IR::Call(runtime::PRINT_INTEGER.to_owned()));
                Ok(())
            }
            TypeTag::Unresolved => Err(CompileError::UnresolvedType {
                context: "printed value".to_owned(),
                span: value.span,
            }),
            _ => Err(CompileError::mismatch(&Type::string(), &ty, value.span)),
        }
    }
}

/// Expressions
impl<'a> CodeGen<'a> {
    /// Generate an expression, leaving its value on top of the stack.
    ///
    /// Returns the expression type as known with every function
    /// signature available.
    fn emit_expr(&mut self, expr: &Expr) -> CompileResult<Type> {
        match &expr.kind {
            ExprKind::Int(value) => {
                self.push_int(*value);
                Ok(Type::integer())
            }
            ExprKind::Bool(value) => {
                self.push(Operand::Imm(*value as i64));
                Ok(Type::boolean())
            }
            ExprKind::Str(index) => {
                self.emit(IR::Mov(
                    Reg::Rax.into(),
                    Operand::Symbol(runtime::string_desc_symbol(*index)),
                ));
                self.push(Reg::Rax);
                Ok(Type::string())
            }
            ExprKind::Var(name) => {
                let (ty, slot) = match self.symbols.lookup(name) {
                    Some(symbol) => (symbol.ty.clone(), symbol.slot),
                    None => {
                        return Err(CompileError::UndefinedVariable {
                            name: name.clone(),
                            span: expr.span,
                        })
                    }
                };
                let src = self.slot_mem(slot).sized(Size::Qword);
                self.push(src);
                Ok(ty)
            }
            ExprKind::List { elem, items } => self.emit_list(elem, items),
            ExprKind::Index { list, index } => {
                let list_ty = self.emit_expr(list)?;
                let index_ty = self.emit_expr(index)?;
                let ty = index_type((&list_ty, list.span), (&index_ty, index.span))?;

                // Unsigned compare against the length rejects negative indices too.
                self.pop(Reg::Rdi);
                self.pop(Reg::Rax);
                self.emit(IR::Cmp(Reg::Rdi.into(), Mem::reg(Reg::Rax, 0).into()));
                self.emit(IR::Jcc(Cond::Ae, runtime::RUNTIME_ABORT.to_owned()));
                self.emit(IR::Mov(
                    Reg::Rax.into(),
                    Mem::indexed(Reg::Rax, Reg::Rdi, 8).into(),
                ));
                self.push(Reg::Rax);
                Ok(ty)
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let ty = self.emit_expr(operand)?;
                Type::boolean().require(&ty, operand.span)?;
                self.pop(Reg::Rax);
                self.emit(IR::Xor(Reg::Rax.into(), Operand::Imm(1)));
                self.push(Reg::Rax);
                Ok(Type::boolean())
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.emit_expr(lhs)?;
                let rhs_ty = self.emit_expr(rhs)?;
                let ty = op.check_operands((&lhs_ty, lhs.span), (&rhs_ty, rhs.span))?;

                self.pop(Reg::Rdi);
                self.pop(Reg::Rax);
                self.emit_binary(*op);
                self.push(Reg::Rax);
                Ok(ty)
            }
            ExprKind::Call { name, args } => self
                .emit_call(name, args, expr.span, true)
                .map(Option::unwrap_or_default),
        }
    }

    /// Combine `rax` and `rdi` into `rax`.
    fn emit_binary(&mut self, op: BinaryOp) {
        use BinaryOp as B;

        let cond = match op {
            B::Add => return self.emit(IR::Add(Reg::Rax.into(), Reg::Rdi.into())),
            B::Sub => return self.emit(IR::Sub(Reg::Rax.into(), Reg::Rdi.into())),
            B::Mul => return self.emit(IR::Imul(Reg::Rax, Reg::Rdi)),
            B::Div => {
                self.emit(IR::Cqo);
                self.emit(IR::Idiv(Reg::Rdi));
                return;
            }
            // Booleans are 0 or 1, so bitwise operators suffice.
            B::And => return self.emit(IR::And(Reg::Rax, Reg::Rdi)),
            B::Or => return self.emit(IR::Or(Reg::Rax, Reg::Rdi)),
            B::Eq => Cond::E,
            B::NotEq => Cond::Ne,
            B::Less => Cond::L,
            B::LessEq => Cond::Le,
            B::Greater => Cond::G,
            B::GreaterEq => Cond::Ge,
        };

        self.emit(IR::Cmp(Reg::Rax.into(), Reg::Rdi.into()));
        self.emit(IR::Set(cond, Reg::Al));
        self.emit(IR::Movzx(Reg::Rax, Reg::Al));
    }

    /// Members are pushed, then moved into a block carved from the
    /// list arena: `[length, member0, member1, ...]`. The block
    /// address is the list value.
    fn emit_list(&mut self, elem: &Type, items: &[Expr]) -> CompileResult<Type> {
        let mut elem = elem.clone();
        for item in items {
            let ty = self.emit_expr(item)?;
            elem = elem.require_unify(&ty, item.span)?;
        }

        let count = items.len() as i64;
        self.emit(IR::Mov(
            Reg::Rax.into(),
            Mem::symbol(runtime::LIST_HEAP_TOP, 0).into(),
        ));
        self.emit(IR::Lea(Reg::Rdi, Mem::reg(Reg::Rax, 8 * (count + 1))));
        self.emit(IR::Mov(
            Reg::Rcx.into(),
            Operand::Symbol(runtime::LIST_HEAP_END.to_owned()),
        ));
        self.emit(IR::Cmp(Reg::Rdi.into(), Reg::Rcx.into()));
        self.emit(IR::Jcc(Cond::A, runtime::RUNTIME_ABORT.to_owned()));
        self.emit(IR::Mov(
            Mem::symbol(runtime::LIST_HEAP_TOP, 0).into(),
            Reg::Rdi.into(),
        ));
        self.emit(IR::Mov(
            Mem::reg(Reg::Rax, 0).sized(Size::Qword).into(),
            Operand::Imm(count),
        ));

        for i in (0..count).rev() {
            self.pop(Reg::Rcx);
            self.emit(IR::Mov(
                Mem::reg(Reg::Rax, 8 * (i + 1)).into(),
                Reg::Rcx.into(),
            ));
        }

        self.push(Reg::Rax);
        Ok(Type::list_of(elem))
    }
}
