use super::{annotation::parse_type, Delimited, Ident, Parse, Parser, Stmt, TypeEnv};
use crate::{
    error::{CompileError, CompileResult},
    tokens::{Keyword, Span},
    types::Type,
};
use smol_str::SmolStr;
use std::{collections::HashMap, mem};

/// Statement marking a function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefinedFunction {
    pub name: SmolStr,
    pub params: Vec<Param>,
    /// `None` when the function does not return a value.
    pub return_type: Option<Type>,
    pub body: Stmt,
    pub span: Span,
}

/// Functions by name, kept in definition order.
#[derive(Debug, Default)]
pub struct FunctionMap {
    functions: Vec<DefinedFunction>,
    lookup: HashMap<SmolStr, usize>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, func: DefinedFunction) -> CompileResult<()> {
        if self.lookup.contains_key(&func.name) {
            return Err(CompileError::MultiplyDefinedFunction {
                name: func.name,
                span: func.span,
            });
        }

        self.lookup.insert(func.name.clone(), self.functions.len());
        self.functions.push(func);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &SmolStr) -> Option<&DefinedFunction> {
        self.lookup.get(name).map(|index| &self.functions[*index])
    }

    #[inline]
    pub fn contains(&self, name: &SmolStr) -> bool {
        self.lookup.contains_key(name)
    }

    /// Iterate functions in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &DefinedFunction> {
        self.functions.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Parse for FuncDef {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::Function)?;
        let name = Ident::parse(parser)?;
        if parser.functions.contains(&name.name) {
            return Err(CompileError::MultiplyDefinedFunction {
                name: name.name,
                span: name.span,
            });
        }

        parser.stream.expect_symbol('(')?;
        let params = Delimited::<Param>::parse_until(parser, ')')?.items;
        let return_type = match parser.stream.match_compound(['-', '>']) {
            Some(_) => Some(parse_type(parser)?),
            None => None,
        };

        // The body sees its parameters, and nothing from the enclosing scope.
        let mut env = TypeEnv::new();
        for param in &params {
            env.define(param.name.name.clone(), param.ty.clone());
        }
        let outer = mem::replace(&mut parser.env, env);
        parser.returns.push(return_type.clone());

        let body = Stmt::parse(parser);

        parser.returns.pop();
        parser.env = outer;
        let body = body?;

        let span = keyword.span.merge(&body.span());
        parser.functions.insert(DefinedFunction {
            name: name.name.clone(),
            params,
            return_type,
            body,
            span,
        })?;

        Ok(FuncDef { name, span })
    }
}

impl Parse for Param {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let ty = parse_type(parser)?;
        let name = Ident::parse(parser)?;
        Ok(Param { ty, name })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lex::tokenize, parsing::parse};

    #[test]
    fn test_function_signature() {
        let program =
            parse(tokenize("function add(int a, int b) -> int { return a + b; }").unwrap())
                .unwrap();
        let func = program.functions.get(&"add".into()).unwrap();

        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[1].name.name, "b");
        assert_eq!(func.return_type, Some(Type::integer()));
        assert!(matches!(program.stmts[0], Stmt::FuncDef(_)));
    }

    #[test]
    fn test_function_without_return_type() {
        let program = parse(tokenize("function hello() print(\"hi\");").unwrap()).unwrap();
        let func = program.functions.get(&"hello".into()).unwrap();
        assert!(func.params.is_empty());
        assert_eq!(func.return_type, None);
    }

    #[test]
    fn test_multiply_defined_function() {
        let result = parse(
            tokenize("function f() { } function g() { } function f() -> int { return 1; }")
                .unwrap(),
        );
        match result {
            Err(CompileError::MultiplyDefinedFunction { name, span }) => {
                assert_eq!(name, "f");
                assert_eq!(span.column, 44);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_return_value_checked_against_signature() {
        let result = parse(tokenize("function f() -> bool { return 1; }").unwrap());
        assert!(matches!(result, Err(CompileError::MismatchedType { .. })));
    }

    #[test]
    fn test_body_does_not_see_outer_variables() {
        // `x` inside the body is unknown to the parser, so the
        // bool initializer is accepted here and rejected later.
        let program =
            parse(tokenize("int x = 1; function f() { bool b = x; }").unwrap()).unwrap();
        assert_eq!(program.functions.len(), 1);
    }

    #[test]
    fn test_function_map_keeps_definition_order() {
        let program = parse(
            tokenize("function b() { } function a() { } function c() { }").unwrap(),
        )
        .unwrap();
        let names: Vec<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
