use mote_runtime::{ArenaOpts, CreateOpts, Error, Runtime, Value};

fn run(src: &str) -> Result<Value, Error> {
    Runtime::new().exec(src)
}

fn run_number(src: &str) -> f64 {
    run(src).unwrap().as_number()
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(run_number("1 + 2 * 3"), 7.0);
    assert_eq!(run_number("(1 + 2) * 3"), 9.0);
    assert_eq!(run_number("10 % 4"), 2.0);
    assert_eq!(run_number("7 / 2"), 3.5);
    assert_eq!(run_number("-3 + 1"), -2.0);
}

#[test]
fn string_concatenation_coerces_operands() {
    let mut rt = Runtime::new();
    let v = rt.exec("'n=' + 42 + ', b=' + true + ', x=' + null").unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "n=42, b=true, x=null");
}

#[test]
fn comparison_and_logic() {
    assert!(run("1 < 2 && 2 <= 2 && 3 > 2 && 3 >= 3").unwrap().as_boolean());
    assert!(run("'abc' < 'abd'").unwrap().as_boolean());
    assert!(run("1 == 1 && 'a' == 'a' && 1 != 2").unwrap().as_boolean());
    // Logic operators yield the deciding operand.
    assert_eq!(run_number("0 || 5"), 5.0);
    assert_eq!(run_number("3 && 4"), 4.0);
}

#[test]
fn variables_and_loops() {
    let src = "var total = 0;
               var i = 1;
               while (i <= 10) { total = total + i; i = i + 1; }
               total";
    assert_eq!(run_number(src), 55.0);
}

#[test]
fn if_else_branches() {
    assert_eq!(run_number("var x = 5; if (x > 3) { x = 1; } else { x = 2; } x"), 1.0);
    assert_eq!(run_number("var x = 1; if (x > 3) { x = 1; } else { x = 2; } x"), 2.0);
}

#[test]
fn functions_and_closures() {
    let src = "function adder(n) {
                 return function (m) { return n + m; };
               }
               var add3 = adder(3);
               add3(4)";
    assert_eq!(run_number(src), 7.0);
}

#[test]
fn closures_share_captured_state() {
    let src = "function counter() {
                 var n = 0;
                 return function () { n = n + 1; return n; };
               }
               var tick = counter();
               tick(); tick(); tick()";
    assert_eq!(run_number(src), 3.0);
}

#[test]
fn method_calls_bind_the_receiver() {
    let src = "var obj = {
                 base: 10,
                 bump: function (d) { this.base = this.base + d; return this.base; }
               };
               obj.bump(5);
               obj.bump(1)";
    assert_eq!(run_number(src), 16.0);
}

#[test]
fn exec_with_sets_the_receiver() {
    let mut rt = Runtime::new();
    let recv = rt.create_object().unwrap();
    let root = rt.own(recv);
    rt.set_prop(recv, "x", Value::number(99.0)).unwrap();
    let v = rt.exec_with("this.x", recv).unwrap();
    assert_eq!(v.as_number(), 99.0);
    rt.disown(&root);
}

#[test]
fn thrown_values_unwind_across_frames() {
    // Three frames deep: top catches what the innermost throws.
    let src = "function inner() { throw {code: 42}; }
               function middle() { inner(); return 'unreachable'; }
               var got = 0;
               try { middle(); } catch (e) { got = e.code; }
               got";
    assert_eq!(run_number(src), 42.0);
}

#[test]
fn uncaught_throws_surface_as_exceptions() {
    let mut rt = Runtime::new();
    match rt.exec("throw 'loose';") {
        Err(Error::Exception(v)) => {
            assert_eq!(rt.get_string(v).unwrap(), "loose");
        }
        other => panic!("expected exception, got {other:?}"),
    }
}

#[test]
fn finally_always_runs() {
    let src = "var log = '';
               try {
                 try { throw 'x'; } finally { log = log + 'F'; }
               } catch (e) { log = log + 'C'; }
               log";
    let mut rt = Runtime::new();
    let v = rt.exec(src).unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "FC");
}

#[test]
fn finally_return_overrides_pending_throw() {
    let src = "function f() {
                 try { throw 'boom'; } finally { return 7; }
               }
               f()";
    assert_eq!(run_number(src), 7.0);
}

#[test]
fn catch_binding_is_scoped_to_the_handler() {
    let src = "var e = 'outer';
               try { throw 'inner'; } catch (e) { }
               e";
    let mut rt = Runtime::new();
    let v = rt.exec(src).unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "outer");
}

#[test]
fn runtime_errors_are_catchable_script_values() {
    let src = "var msg = '';
               try { missing(); } catch (e) { msg = e.message; }
               msg";
    let mut rt = Runtime::new();
    let v = rt.exec(src).unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "missing is not defined");
}

#[test]
fn deep_recursion_reports_stack_overflow() {
    let opts = CreateOpts {
        max_call_depth: 32,
        ..CreateOpts::default()
    };
    let mut rt = Runtime::with_opts(opts);
    let result = rt.exec("function f(n) { return f(n + 1); } f(0)");
    assert!(matches!(result, Err(Error::StackOverflow)));
}

#[test]
fn stack_overflow_is_not_catchable_by_script() {
    let opts = CreateOpts {
        max_call_depth: 32,
        ..CreateOpts::default()
    };
    let mut rt = Runtime::with_opts(opts);
    let result = rt.exec(
        "function f(n) { return f(n + 1); }
         var caught = false;
         try { f(0); } catch (e) { caught = true; }",
    );
    assert!(matches!(result, Err(Error::StackOverflow)));
}

#[test]
fn runtime_survives_stack_overflow() {
    let opts = CreateOpts {
        max_call_depth: 32,
        object_arena: ArenaOpts::new(64, 4),
        ..CreateOpts::default()
    };
    let mut rt = Runtime::with_opts(opts);
    assert!(rt.exec("function f() { return f(); } f()").is_err());
    assert_eq!(rt.exec("1 + 1").unwrap().as_number(), 2.0);
}

#[test]
fn interrupt_stops_a_running_loop() {
    let mut rt = Runtime::new();
    rt.interrupt();
    let result = rt.exec("var i = 0; while (true) { i = i + 1; }");
    match result {
        Err(Error::Exception(v)) => {
            assert_eq!(rt.error_message(v).unwrap(), "Interrupted");
        }
        other => panic!("expected interrupt exception, got {other:?}"),
    }
}

#[test]
fn interrupt_reaches_empty_loop_bodies() {
    let mut rt = Runtime::new();
    rt.interrupt();
    let result = rt.exec("while (true) { }");
    assert!(matches!(result, Err(Error::Exception(_))));
}

#[test]
fn interrupt_is_catchable_by_script() {
    let mut rt = Runtime::new();
    rt.interrupt();
    let v = rt
        .exec("var msg = ''; try { while (true) { } } catch (e) { msg = e.message; } msg")
        .unwrap();
    assert_eq!(rt.get_string(v).unwrap(), "Interrupted");
}

#[test]
fn interrupt_handle_is_shareable() {
    let mut rt = Runtime::new();
    let handle = rt.interrupt_handle();
    assert!(!handle.is_set());
    std::thread::spawn(move || handle.trigger())
        .join()
        .unwrap();
    let result = rt.exec("while (true) { }");
    assert!(matches!(result, Err(Error::Exception(_))));
}

#[test]
fn syntax_errors_carry_position_and_are_remembered() {
    let mut rt = Runtime::new();
    let err = rt.exec("var = 3;").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    let last = rt.last_parse_error().expect("recorded");
    assert_eq!(last.line, 1);

    rt.exec("var ok = 1;").unwrap();
    assert!(rt.last_parse_error().is_none());
}

#[test]
fn oversized_units_are_rejected() {
    let mut rt = Runtime::new();
    // A long chain of additions overruns the default node budget.
    let mut src = String::from("0");
    for _ in 0..100_000 {
        src.push_str(" + 1");
    }
    match rt.exec(&src) {
        Err(Error::UnitTooLarge { nodes, limit }) => {
            assert!(nodes > limit);
        }
        other => panic!("expected UnitTooLarge, got {other:?}"),
    }
}

#[test]
fn named_function_statements_define_variables() {
    let src = "function twice(n) { return n * 2; } twice(21)";
    assert_eq!(run_number(src), 42.0);
}

#[test]
fn array_and_object_literals_nest() {
    let src = "var cfg = {name: 'box', dims: [2, 3, 4]};
               cfg.dims[0] * cfg.dims[1] * cfg.dims[2]";
    assert_eq!(run_number(src), 24.0);
}

#[test]
fn string_length_is_char_count() {
    assert_eq!(run_number("'hello'.length"), 5.0);
    assert_eq!(run_number("''.length"), 0.0);
}

#[test]
fn unary_operators() {
    assert!(run("!0").unwrap().as_boolean());
    assert!(!run("!'text'").unwrap().as_boolean());
    assert_eq!(run_number("-(2 + 3)"), -5.0);
}

#[test]
fn deep_operator_chains_report_stack_overflow() {
    // Long chains parse fine but each pending operand holds a native
    // frame during evaluation, so the interpreter bounds the depth.
    let mut rt = Runtime::new();
    let mut src = String::from("0");
    for i in 1..4000 {
        src.push_str(&format!(" + {}", i % 7));
    }
    src.push(';');
    let result = rt.exec(&src);
    assert!(matches!(result, Err(Error::StackOverflow)));

    // A merely long chain still evaluates.
    let mut src = String::from("0");
    for _ in 0..512 {
        src.push_str(" + 1");
    }
    let v = rt.exec(&src).unwrap();
    assert_eq!(v.as_number(), 512.0);
}
