use pjs::{Instance, Runtime, Value};

fn eval(src: &str) -> Value {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    instance.eval(src).unwrap()
}

fn eval_number(src: &str) -> f64 {
    match eval(src) {
        Value::Number(n) => n,
        other => panic!("expected a number from {src:?}, got {other:?}"),
    }
}

#[test]
fn default_parameters_with_pattern_default() {
    let src = "function f(a, b = 10, {c = 20} = {}) { return a + b + c; } f(1)";
    assert_eq!(eval_number(src), 31.0);
}

#[test]
fn defaults_apply_to_explicit_undefined() {
    let src = "function f(a = 5) { return a; } f(undefined)";
    assert_eq!(eval_number(src), 5.0);
    let src = "function f(a = 5) { return a; } f(null) === null ? 1 : 0";
    assert_eq!(eval_number(src), 1.0);
}

#[test]
fn missing_arguments_are_undefined() {
    let src = "function f(a, b) { return b === undefined ? 1 : 0; } f(1)";
    assert_eq!(eval_number(src), 1.0);
}

#[test]
fn extra_arguments_are_dropped() {
    let src = "function f(a) { return a; } f(1, 2, 3)";
    assert_eq!(eval_number(src), 1.0);
}

#[test]
fn object_destructuring_parameter() {
    let src = "function dist({x, y}) { return x * x + y * y; } dist({x: 3, y: 4})";
    assert_eq!(eval_number(src), 25.0);
}

#[test]
fn nested_destructuring_parameter() {
    let src = "function f({a: {b}}) { return b; } f({a: {b: 9}})";
    assert_eq!(eval_number(src), 9.0);
}

#[test]
fn array_destructuring_parameter() {
    let src = "function f([a, b]) { return a * 10 + b; } f([4, 2])";
    assert_eq!(eval_number(src), 42.0);
}

#[test]
fn destructuring_declaration() {
    assert_eq!(eval_number("var {a, b} = {a: 1, b: 2}; a + b"), 3.0);
    assert_eq!(eval_number("var [x, y] = [10, 20]; x + y"), 30.0);
    assert_eq!(eval_number("var {a = 3} = {}; a"), 3.0);
    assert_eq!(eval_number("var {a: {b}} = {a: {b: 5}}; b"), 5.0);
    assert_eq!(eval_number("var [{n}] = [{n: 6}]; n"), 6.0);
}

#[test]
fn arrow_function_forms() {
    assert_eq!(eval_number("(x => x + 1)(1)"), 2.0);
    assert_eq!(eval_number("((a, b) => a + b)(1, 2)"), 3.0);
    assert_eq!(eval_number("(() => 9)()"), 9.0);
    assert_eq!(eval_number("((a = 2) => a * 3)()"), 6.0);
    assert_eq!(eval_number("(({n}) => n)({n: 8})"), 8.0);
}

#[test]
fn arrow_block_body_needs_return() {
    assert!(matches!(eval("(() => { 5; })()"), Value::Undefined));
    assert_eq!(eval_number("(() => { return 5; })()"), 5.0);
}

#[test]
fn function_values_are_first_class() {
    let src = "
        function twice(f, x) { return f(f(x)); }
        twice(n => n * 3, 2)
    ";
    assert_eq!(eval_number(src), 18.0);
}

#[test]
fn function_statement_in_nested_block_assigns_at_execution() {
    let src = "
        var r = 0;
        if (true) { function g() { return 5; } r = g(); }
        r
    ";
    assert_eq!(eval_number(src), 5.0);
}

#[test]
fn duplicate_var_declarations_merge() {
    assert_eq!(eval_number("var x = 1; var x = 2; x"), 2.0);
}

#[test]
fn call_argument_order_is_left_to_right() {
    let src = "
        var log = [];
        function note(n) { log.push(n); return n; }
        function f(a, b, c) { return log.join(''); }
        f(note(1), note(2), note(3))
    ";
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let v = instance.eval(src).unwrap();
    match v {
        Value::String(s) => assert_eq!(&*rt.str(s), "123"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn reserved_dollar_parameter_names_are_rejected() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance.compile("t.js", "function f($x) { return $x; }").unwrap_err();
    assert!(err.message.contains("reserved argument name"), "{}", err.message);
}
