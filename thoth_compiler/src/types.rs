//! Value types and the type matching rules shared by
//! the parser and the code generator.
use crate::{
    error::{CompileError, CompileResult},
    tokens::Span,
};
use std::fmt;

/// Outer tag of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Placeholder for a type that is not known yet.
    Unresolved,
    Integer,
    Boolean,
    String,
    /// Takes exactly one parameter, the element type.
    List,
}

/// A value type: a tag plus ordered type parameters.
///
/// Scalars have no parameters. Two types are equal when their
/// tags and parameter lists are equal, recursively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub tag: TypeTag,
    pub params: Vec<Type>,
}

impl Type {
    #[inline]
    fn scalar(tag: TypeTag) -> Self {
        Self {
            tag,
            params: Vec::new(),
        }
    }

    pub fn unresolved() -> Self {
        Self::scalar(TypeTag::Unresolved)
    }

    pub fn integer() -> Self {
        Self::scalar(TypeTag::Integer)
    }

    pub fn boolean() -> Self {
        Self::scalar(TypeTag::Boolean)
    }

    pub fn string() -> Self {
        Self::scalar(TypeTag::String)
    }

    pub fn list_of(element: Type) -> Self {
        Self {
            tag: TypeTag::List,
            params: vec![element],
        }
    }

    /// Indicates whether the outer tag is known.
    ///
    /// `list<?>` counts as resolved at this level.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.tag != TypeTag::Unresolved
    }

    #[inline]
    pub fn is(&self, tag: TypeTag) -> bool {
        self.tag == tag
    }

    /// Element type of a list, if this is a list.
    pub fn element(&self) -> Option<&Type> {
        match self.tag {
            TypeTag::List => self.params.first(),
            _ => None,
        }
    }

    /// Type compatibility.
    ///
    /// An unresolved type matches anything. Two resolved types
    /// must have equal tags and pairwise matching parameters.
    /// Neither side is narrowed.
    pub fn check_matches(&self, other: &Type) -> bool {
        if !self.is_resolved() || !other.is_resolved() {
            return true;
        }

        self.tag == other.tag
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.check_matches(b))
    }

    /// Combine two matching types into the most specific one.
    ///
    /// Returns `None` when the types do not match.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        if !self.is_resolved() {
            return Some(other.clone());
        }
        if !other.is_resolved() {
            return Some(self.clone());
        }
        if self.tag != other.tag || self.params.len() != other.params.len() {
            return None;
        }

        let params = self
            .params
            .iter()
            .zip(other.params.iter())
            .map(|(a, b)| a.unify(b))
            .collect::<Option<Vec<_>>>()?;

        Some(Type { tag: self.tag, params })
    }

    /// Check-match `found` against this type.
    pub fn require(&self, found: &Type, span: Span) -> CompileResult<()> {
        if self.check_matches(found) {
            Ok(())
        } else {
            Err(CompileError::mismatch(self, found, span))
        }
    }

    /// Check-match `found` against this type, returning the
    /// unified type on success.
    pub fn require_unify(&self, found: &Type, span: Span) -> CompileResult<Type> {
        self.unify(found)
            .ok_or_else(|| CompileError::mismatch(self, found, span))
    }

    /// Left biased choice: this type when it is resolved, otherwise the other.
    pub fn or(&self, other: &Type) -> Type {
        if self.is_resolved() {
            self.clone()
        } else {
            other.clone()
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::unresolved()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.tag {
            TypeTag::Unresolved => write!(f, "?"),
            TypeTag::Integer => write!(f, "int"),
            TypeTag::Boolean => write!(f, "bool"),
            TypeTag::String => write!(f, "string"),
            TypeTag::List => {
                write!(f, "list<")?;
                for (i, param) in self.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ">")
            }
        }
    }
}
