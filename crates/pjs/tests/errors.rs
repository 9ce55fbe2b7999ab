use pjs::{Instance, Runtime, Value};

fn compile_err(src: &str) -> pjs::ParseError {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    instance.compile("test.js", src).unwrap_err()
}

fn run_err(src: &str) -> pjs::Exception {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    instance.eval(src).unwrap_err()
}

#[test]
fn syntax_errors_carry_positions() {
    let err = compile_err("var x = ;");
    assert_eq!(err.line, 1);
    assert!(err.column > 0);

    let err = compile_err("if (x");
    assert_eq!(err.line, 1);

    let err = compile_err("1 +\n+\n@");
    assert_eq!(err.line, 3);
}

#[test]
fn malformed_literals_are_syntax_errors() {
    assert!(compile_err("0x").message.contains("unknown token"));
    assert!(compile_err("'unterminated").message.contains("unknown token"));
    assert!(compile_err("1q2").message.contains("unknown token"));
}

#[test]
fn declare_errors() {
    assert_eq!(compile_err("break;").message, "illegal break");
    assert_eq!(compile_err("continue;").message, "illegal continue");
    assert_eq!(compile_err("return 1;").message, "illegal return");
    assert!(compile_err("function $f() { }").message.contains("reserved function name"));
    assert!(compile_err("var ($) = 1;").message != "");
}

#[test]
fn break_inside_a_loop_is_legal_but_not_across_functions() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    assert!(instance.compile("ok", "while (true) break;").is_ok());
    let err = instance
        .compile("bad", "while (true) { var f = () => { break; }; }")
        .unwrap_err();
    assert_eq!(err.message, "illegal break");
}

#[test]
fn runtime_error_messages() {
    assert_eq!(run_err("null.x").message, "cannot read property of null");
    assert_eq!(run_err("undefined.x").message, "cannot read property of undefined");
    assert_eq!(run_err("var o; o.a = 1").message, "cannot set property of undefined");
    assert_eq!(run_err("var x = 5; x()").message, "not a function");
    assert_eq!(run_err("var o = {}; new o()").message, "not a function");
    assert_eq!(run_err("missingName").message, "unresolved identifier");
    assert_eq!(run_err("1 in 2").message, "cannot use 'in' operator on non-objects");
    assert_eq!(run_err("3 = 4").message, "cannot assign to a right-value");
    assert_eq!(run_err("delete 5").message, "cannot delete a value");
    assert_eq!(run_err("var x = 1; delete x").message, "cannot delete a local variable");
}

#[test]
fn user_functions_are_not_constructors() {
    let err = run_err("function f() { } new f()");
    assert_eq!(err.message, "function is not a constructor");
}

#[test]
fn instanceof_requires_a_constructor() {
    let err = run_err("1 instanceof 2");
    assert_eq!(err.message, "right-hand side of 'instanceof' is not callable");
    let err = run_err("function f() { } 1 instanceof f");
    assert_eq!(err.message, "right-hand side of 'instanceof' is not a constructor");
}

#[test]
fn argument_type_errors_from_bindings() {
    let err = run_err("[1].filter(5)");
    assert!(err.message.contains("argument #1 expects a function"), "{}", err.message);
    let err = run_err("[1].forEach()");
    assert!(err.message.contains("requires 1 or more arguments"), "{}", err.message);
}

#[test]
fn backtrace_names_the_call_stack() {
    let src = "
        function inner() { null.x; }
        function outer() { inner(); }
        outer()
    ";
    let err = run_err(src);
    assert_eq!(err.message, "cannot read property of null");
    let names: Vec<&str> = err.backtrace.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"inner"), "{names:?}");
    assert!(names.contains(&"outer"), "{names:?}");
    assert_eq!(names.last(), Some(&"(root)"));
}

#[test]
fn where_finds_the_first_located_frame() {
    let err = run_err("function f() {\n  null.x;\n}\nf()");
    let frame = err.where_().expect("a located frame");
    assert_eq!(frame.line, 2);
}

#[test]
fn thrown_values_render_in_the_message() {
    assert_eq!(run_err("throw 'boom'").message, "boom");
    assert_eq!(run_err("throw 42").message, "42");
    assert_eq!(run_err("throw {toString: 1}").message, "[object Object]");
}

#[test]
fn errors_unwind_through_native_callbacks() {
    let err = run_err("[1, 2].map(n => { throw 'stop'; })");
    assert_eq!(err.message, "stop");
}

#[test]
fn caught_errors_do_not_escape() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let v = instance.eval("var r; try { null.x; } catch (e) { r = 1; } r").unwrap();
    assert!(matches!(v, Value::Number(n) if n == 1.0));
}

#[test]
fn display_formats_message_and_frames() {
    let err = run_err("function f() { null.x; } f()");
    let text = err.to_string();
    assert!(text.contains("cannot read property of null"));
    assert!(text.contains("f"));
}

#[test]
fn exceptions_serialize_for_host_reporting() {
    let err = run_err("function f() { null.x; } f()");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["message"], "cannot read property of null");
    assert_eq!(json["backtrace"][0]["name"], "f");

    let round_tripped: pjs::Exception = serde_json::from_value(json).unwrap();
    assert_eq!(round_tripped, err);
}
