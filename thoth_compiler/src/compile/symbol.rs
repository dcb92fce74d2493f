use crate::types::Type;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Variable living on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: SmolStr,
    /// Narrowed when an unresolved variable is first assigned.
    pub ty: Type,
    /// Stack slot counted from the frame base. Parameters sit
    /// below the base and have negative slots.
    pub slot: isize,
}

/// Variables in scope during code generation, and the virtual
/// stack depth used to address them.
///
/// Every push and pop the generator emits must be mirrored here,
/// so that `offset` stays correct.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<SmolStr, Symbol>,
    /// One entry per stack slot owned by a scope, innermost last.
    /// Anonymous slots hold values like a loop bound.
    live: Vec<Option<SmolStr>>,
    /// Number of live slots when each open scope was entered.
    scopes: Vec<usize>,
    /// Number of values pushed since the frame base.
    depth: isize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn depth(&self) -> isize {
        self.depth
    }

    #[inline]
    pub fn grow(&mut self, count: isize) {
        self.depth += count;
    }

    #[inline]
    pub fn shrink(&mut self, count: isize) {
        self.depth -= count;
    }

    #[inline]
    pub fn lookup(&self, name: &SmolStr) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    #[inline]
    pub fn lookup_mut(&mut self, name: &SmolStr) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }

    #[inline]
    pub fn is_defined(&self, name: &SmolStr) -> bool {
        self.symbols.contains_key(name)
    }

    /// Bind `name` to the value on top of the stack.
    pub fn define(&mut self, name: SmolStr, ty: Type) -> isize {
        let slot = self.depth - 1;
        self.live.push(Some(name.clone()));
        self.symbols.insert(name.clone(), Symbol { name, ty, slot });
        slot
    }

    /// Claim the value on top of the stack for the current scope
    /// without naming it.
    pub fn define_anonymous(&mut self) -> isize {
        self.live.push(None);
        self.depth - 1
    }

    /// Bind a parameter at a fixed slot below the frame base.
    ///
    /// Parameters are owned by the caller and never unwound.
    pub fn define_param(&mut self, name: SmolStr, ty: Type, slot: isize) {
        self.symbols.insert(name.clone(), Symbol { name, ty, slot });
    }

    /// Byte offset of a slot from the current stack pointer.
    #[inline]
    pub fn offset(&self, slot: isize) -> i64 {
        8 * (self.depth - slot - 1) as i64
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(self.live.len());
    }

    /// Forget every slot claimed since the matching `open_scope`.
    ///
    /// Returns the number of slots released, which the caller must
    /// pop off the physical stack.
    pub fn close_scope(&mut self) -> usize {
        let mark = self.scopes.pop().unwrap_or(0);
        let count = self.live.len().saturating_sub(mark);

        for _ in 0..count {
            if let Some(Some(name)) = self.live.pop() {
                self.symbols.remove(&name);
            }
        }
        self.depth -= count as isize;

        count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_offsets_follow_depth() {
        let mut table = SymbolTable::new();
        let x = SmolStr::from("x");

        table.grow(1);
        let slot = table.define(x.clone(), Type::integer());
        assert_eq!(slot, 0);
        assert_eq!(table.offset(slot), 0);

        // Temporaries pushed on top move the variable further away.
        table.grow(2);
        assert_eq!(table.offset(slot), 16);
        table.shrink(2);
        assert_eq!(table.offset(slot), 0);
    }

    #[test]
    fn test_close_scope_unwinds() {
        let mut table = SymbolTable::new();
        let outer = SmolStr::from("outer");
        let inner = SmolStr::from("inner");

        table.grow(1);
        table.define(outer.clone(), Type::integer());

        table.open_scope();
        table.grow(1);
        table.define_anonymous();
        table.grow(1);
        table.define(inner.clone(), Type::boolean());
        assert_eq!(table.depth(), 3);

        assert_eq!(table.close_scope(), 2);
        assert_eq!(table.depth(), 1);
        assert!(!table.is_defined(&inner));
        assert!(table.is_defined(&outer));
    }

    #[test]
    fn test_parameter_offsets() {
        let mut table = SymbolTable::new();
        let a = SmolStr::from("a");
        // Saved rbp at +0, return address at +8, first argument above.
        table.define_param(a.clone(), Type::integer(), -3);
        assert_eq!(table.offset(table.lookup(&a).unwrap().slot), 16);

        // A scope with nothing in it releases nothing.
        table.open_scope();
        assert_eq!(table.close_scope(), 0);
        assert!(table.is_defined(&a));
    }
}
