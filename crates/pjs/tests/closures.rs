use pjs::{Instance, Runtime, Value};

fn eval_number(src: &str) -> f64 {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    match instance.eval(src).unwrap() {
        Value::Number(n) => n,
        other => panic!("expected a number from {src:?}, got {other:?}"),
    }
}

#[test]
fn closure_survives_the_defining_call() {
    assert_eq!(eval_number("(() => { let x = 1; return () => ++x; })()()"), 2.0);
}

#[test]
fn closure_reads_by_reference_not_by_copy() {
    let src = "
        function make() {
            let n = 0;
            return { bump: () => ++n, read: () => n };
        }
        var c = make();
        c.bump(); c.bump(); c.bump();
        c.read()
    ";
    assert_eq!(eval_number(src), 3.0);
}

#[test]
fn sibling_closures_share_one_frame() {
    let src = "
        function pair() {
            let n = 10;
            return [() => n += 5, () => n];
        }
        var fns = pair();
        fns[0]();
        fns[1]()
    ";
    assert_eq!(eval_number(src), 15.0);
}

#[test]
fn separate_calls_get_separate_frames() {
    let src = "
        function counter() { let n = 0; return () => ++n; }
        var a = counter();
        var b = counter();
        a(); a(); a();
        b();
        a() * 10 + b()
    ";
    assert_eq!(eval_number(src), 42.0);
}

#[test]
fn non_captured_locals_reset_between_calls() {
    let src = "
        function f() { var local; var before = local; local = 1; return before; }
        f();
        f() === undefined ? 1 : 0
    ";
    assert_eq!(eval_number(src), 1.0);
}

#[test]
fn nested_closures_capture_through_levels() {
    let src = "
        function outer(a) {
            return function middle(b) {
                return function inner(c) {
                    return a * 100 + b * 10 + c;
                };
            };
        }
        outer(1)(2)(3)
    ";
    assert_eq!(eval_number(src), 123.0);
}

#[test]
fn module_level_variables_are_captured() {
    let src = "
        var total = 0;
        function add(n) { total += n; }
        add(4); add(5);
        total
    ";
    assert_eq!(eval_number(src), 9.0);
}

#[test]
fn recursion_through_hoisted_declaration() {
    let src = "
        function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
        fib(10)
    ";
    assert_eq!(eval_number(src), 55.0);
}

#[test]
fn hoisted_function_is_callable_before_its_statement() {
    let src = "
        var r = early();
        function early() { return 7; }
        r
    ";
    assert_eq!(eval_number(src), 7.0);
}

#[test]
fn arguments_are_ordinary_locals() {
    let src = "
        function f(x) { var g = () => x * 2; x += 1; return g(); }
        f(10)
    ";
    assert_eq!(eval_number(src), 22.0);
}
