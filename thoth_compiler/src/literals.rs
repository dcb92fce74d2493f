//! Literal string table.
use std::collections::HashMap;

/// Insertion ordered, deduplicated table of string literals.
///
/// Identical literals share one entry, and later one
/// data section symbol.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LiteralTable {
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl LiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the literal to the table, returning its index.
    ///
    /// Returns the existing index if the literal was seen before.
    pub fn intern(&mut self, text: &str) -> usize {
        if let Some(index) = self.lookup.get(text) {
            return *index;
        }

        let index = self.strings.len();
        self.strings.push(text.to_owned());
        self.lookup.insert(text.to_owned(), index);
        index
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate the literals in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.strings.iter().map(String::as_str).enumerate()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut table = LiteralTable::new();
        assert_eq!(table.intern("hello"), 0);
        assert_eq!(table.intern("world"), 1);
        assert_eq!(table.intern("hello"), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![(0, "hello"), (1, "world")]
        );
    }
}
