use indoc::indoc;
use thoth_compiler::{
    lex::tokenize,
    parsing::{parse, ParsedProgram, Stmt},
    types::Type,
    CompileError, CompileResult,
};

const FUNCTIONS: &str = include_str!("programs/functions.thoth");
const LISTS: &str = include_str!("programs/lists.thoth");
const NESTED_FOR: &str = include_str!("programs/nested_for.thoth");

fn parse_str(source: &str) -> CompileResult<ParsedProgram> {
    parse(tokenize(source)?)
}

fn rendered(program: &ParsedProgram) -> Vec<String> {
    program.stmts.iter().map(|stmt| stmt.to_string()).collect()
}

#[test]
fn test_parse_functions_program() {
    let program = parse_str(FUNCTIONS).unwrap();

    let names: Vec<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["f", "fact", "sub", "greet"]);

    let fact = program.functions.get(&"fact".into()).unwrap();
    assert_eq!(fact.params.len(), 1);
    assert_eq!(fact.params[0].ty, Type::integer());
    assert_eq!(fact.return_type, Some(Type::integer()));

    let greet = program.functions.get(&"greet".into()).unwrap();
    assert_eq!(greet.params[0].ty, Type::string());
    assert_eq!(greet.return_type, None);

    // Definitions stay in the top level sequence, in source order.
    let defs = program
        .stmts
        .iter()
        .filter(|stmt| matches!(stmt, Stmt::FuncDef(_)))
        .count();
    assert_eq!(defs, 4);
    assert_eq!(program.stmts.len(), 9);
}

#[test]
fn test_parse_nested_for() {
    let program = parse_str(NESTED_FOR).unwrap();
    assert_eq!(
        rendered(&program),
        vec![
            "int count = 0;",
            "for (x in 1..3) { for (y in 1..5) { count = (count + 1); } }",
            "assert((count == 15));",
        ]
    );
}

#[test]
fn test_parse_lists_resolves_element_types() {
    let program = parse_str(LISTS).unwrap();

    let def = program
        .stmts
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::VarDef(def) if def.name.name == "grid" => Some(def),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        def.init.ty,
        Type::list_of(Type::list_of(Type::integer()))
    );

    // Literals are interned once each.
    assert_eq!(program.strings.len(), 2);
    assert_eq!(program.strings.get(0), Some("a"));
    assert_eq!(program.strings.get(1), Some("b"));
}

#[test]
fn test_parse_escapes_in_literals() {
    let program = parse_str(r#"print("tab\tquote\"\n"); print("tab\tquote\"\n");"#).unwrap();
    assert_eq!(program.strings.len(), 1);
    assert_eq!(program.strings.get(0), Some("tab\tquote\"\n"));
}

#[test]
fn test_parse_duplicate_function() {
    let source = indoc! {"
        function f() { }
        function f(int a) { }
    "};
    assert!(matches!(
        parse_str(source),
        Err(CompileError::MultiplyDefinedFunction { name, .. }) if name == "f"
    ));
}

#[test]
fn test_parse_type_errors() {
    let cases = [
        "int x = true;",
        "bool b = 1 + 2;",
        "int x = 1; x = \"one\";",
        "if (1) { }",
        "while (\"yes\") { }",
        "assert(3);",
        "exit(false);",
        "print(true);",
        "var xs = [1, true];",
        "list<int> xs = [\"a\"];",
        "var xs = [1]; int y = xs[true];",
        "int n = 1; int y = n[0];",
        "int x = 1 + true;",
        "bool b = not 1;",
        "bool b = true < false;",
        "bool b = \"a\" == \"a\";",
    ];
    for source in cases {
        let result = parse_str(source);
        assert!(
            matches!(result, Err(CompileError::MismatchedType { .. })),
            "{source} gave {result:?}"
        );
    }
}

#[test]
fn test_parse_syntax_errors() {
    let cases = [
        "int x = 1",
        "int = 1;",
        "print(1;",
        "for (i in 1) { }",
        "for (i in 1..) { }",
        "function () { }",
        "function f(int) { }",
        "x + 1;",
        "if (true) ",
        "{ int x = 1;",
    ];
    for source in cases {
        let result = parse_str(source);
        assert!(
            matches!(
                result,
                Err(CompileError::UnexpectedToken { .. })
                    | Err(CompileError::UnexpectedEndOfInput { .. })
            ),
            "{source} gave {result:?}"
        );
    }
}

#[test]
fn test_parse_error_location() {
    let source = indoc! {"
        int x = 1;
        bool flag = x;
    "};
    let err = parse_str(source).unwrap_err();
    let span = err.span().unwrap();
    assert_eq!((span.line, span.column), (2, 13));
    assert!(err.display(source).contains("bool flag = x;"));
}
