use mote_ir::{CompileError, Limits, Stmt, compile};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn parse(src: &str) -> mote_ir::Unit {
    compile(src, &Limits::default()).unwrap()
}

#[test]
fn dump_of_var_with_binary_init() {
    let unit = parse("var x = 1 + 2;");
    assert_eq!(
        unit.dump_text(),
        "unit nodes=4\n  var x\n    binary Add\n      number 1\n      number 2\n"
    );
}

#[test]
fn dump_of_if_else_with_call_and_member_assign() {
    let unit = parse("if (x < 10) { f(x); } else { y.z = 'hi'; }");
    let expected = "\
unit nodes=13
  if
    binary Lt
      ident x
      number 10
  then
    expr
      call argc=1
        ident f
        ident x
  else
    expr
      assign
        member z
          ident y
        string \"hi\"
";
    assert_eq!(unit.dump_text(), expected);
}

#[test]
fn dump_covers_loops_try_and_literals() {
    let unit = parse(
        "var a = [1, true, null, undefined];\n\
         var o = {tag: 'x', 'two words': 2};\n\
         while (a) { try { throw 1; } catch (e) { return e; } finally { b(); } }",
    );
    let text = unit.dump_text();
    assert!(text.contains("array len=4"));
    assert!(text.contains("object len=2"));
    assert!(text.contains("prop tag"));
    assert!(text.contains("prop two words"));
    assert!(text.contains("while\n"));
    assert!(text.contains("catch e"));
    assert!(text.contains("finally\n"));
    assert!(text.contains("throw\n"));
    assert!(text.contains("return\n"));
}

#[test]
fn named_function_statement_declares_a_variable() {
    let unit = parse("function add(a, b) { return a + b; }");
    match &unit.body[0] {
        Stmt::Var(name, Some(mote_ir::Expr::Func(f))) => {
            assert_eq!(name, "add");
            assert_eq!(f.name.as_deref(), Some("add"));
            assert_eq!(&*f.params, ["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected var-bound function, got {other:?}"),
    }
}

#[test]
fn final_expression_statement_needs_no_semicolon() {
    let unit = parse("var x = 2; x * 3");
    assert!(unit.dump_text().ends_with(
        "  expr\n    binary Mul\n      ident x\n      number 3\n"
    ));
    // Only the end of input terminates implicitly.
    let err = compile("1 + 2 var x;", &Limits::default()).unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
}

#[test]
fn anonymous_function_statements_terminate_like_expressions() {
    assert!(compile("function () { return 1; };", &Limits::default()).is_ok());
    assert!(compile("function () { return 1; }", &Limits::default()).is_ok());
    let err = compile("function () { return 1; } var x;", &Limits::default()).unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
}

#[test]
fn operator_precedence_shapes_the_tree() {
    let unit = parse("r = 1 + 2 * 3 == 7 && !done;");
    let expected = "\
unit nodes=13
  expr
    assign
      ident r
      binary And
        binary Eq
          binary Add
            number 1
            binary Mul
              number 2
              number 3
          number 7
        unary Not
          ident done
";
    assert_eq!(unit.dump_text(), expected);
}

#[test]
fn syntax_error_reports_token_position() {
    let err = compile("var x = 1;\nvar = 2;", &Limits::default()).unwrap_err();
    match err {
        CompileError::Syntax(e) => {
            assert_eq!(e.line, 2);
            assert_eq!(e.col, 5);
            assert!(e.message.contains("variable name"));
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn assignment_target_must_be_a_place() {
    let err = compile("1 + 2 = 3;", &Limits::default()).unwrap_err();
    match err {
        CompileError::Syntax(e) => assert!(e.message.contains("assignment target")),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn unterminated_block_is_rejected() {
    let err = compile("while (1) { f();", &Limits::default()).unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
}

#[test]
fn lone_try_without_handlers_is_rejected() {
    let err = compile("try { f(); }", &Limits::default()).unwrap_err();
    match err {
        CompileError::Syntax(e) => assert!(e.message.contains("catch")),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn node_budget_rejects_oversized_sources() {
    let mut src = String::from("1");
    for _ in 0..16 {
        src.push_str(" + 1");
    }
    src.push(';');
    // 1 statement + 17 literals + 16 operators.
    assert!(compile(&src, &Limits { max_nodes: 64 }).is_ok());
    let err = compile(&src, &Limits { max_nodes: 8 }).unwrap_err();
    match err {
        CompileError::TooLarge { nodes, limit } => {
            assert_eq!(limit, 8);
            assert!(nodes > limit);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn runaway_nesting_is_rejected() {
    let parens = format!("{}1{};", "(".repeat(1000), ")".repeat(1000));
    match compile(&parens, &Limits::default()).unwrap_err() {
        CompileError::Syntax(e) => assert!(e.message.contains("nesting")),
        other => panic!("expected syntax error, got {other:?}"),
    }
    let negations = format!("{}done;", "!".repeat(1000));
    assert!(compile(&negations, &Limits::default()).is_err());
    let blocks = format!("{}{}", "{".repeat(1000), "}".repeat(1000));
    assert!(compile(&blocks, &Limits::default()).is_err());
    // Ordinary nesting stays well inside the ceiling.
    let fine = format!("{}1{};", "(".repeat(64), ")".repeat(64));
    assert!(compile(&fine, &Limits::default()).is_ok());
}

#[test]
fn node_count_matches_budget_accounting() {
    let unit = parse("var x = f(1, 2);");
    // var + callee ident + call + two number args.
    assert_eq!(unit.node_count, 5);
}

fn any_script_like() -> impl Strategy<Value = String> {
    let ascii = proptest::collection::vec(
        any::<char>().prop_filter("ascii", |c| c.is_ascii()),
        0..60,
    )
    .prop_map(|v| v.into_iter().collect::<String>());
    let sym = "var if else while return throw try catch finally function \
               true false null undefined this {}[]().,;: = == != < > <= >= \
               + - * / % && || ! 'str' \"str\" 1.5 2e3 // comment \n /* c */"
        .to_string();
    (ascii, any::<bool>()).prop_map(move |(a, f)| {
        let mut s = a;
        if f {
            s.push_str(&sym);
        }
        s.chars().take(200).collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64, max_shrink_iters: 200, .. ProptestConfig::default()
    })]
    #[test]
    fn compile_of_random_input_never_panics(src in any_script_like()) {
        // Errors are fine; this only checks robustness.
        let _ = compile(&src, &Limits::default());
    }
}
