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

fn eval_string(src: &str) -> String {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    match instance.eval(src).unwrap() {
        Value::String(s) => rt.str(s).to_string(),
        other => panic!("expected a string from {src:?}, got {other:?}"),
    }
}

#[test]
fn if_else_chains() {
    assert_eq!(eval_number("var x = 0; if (true) x = 1; else x = 2; x"), 1.0);
    assert_eq!(eval_number("var x = 0; if (false) x = 1; else if (true) x = 2; else x = 3; x"), 2.0);
}

#[test]
fn for_loop() {
    assert_eq!(eval_number("var s = 0; for (var i = 1; i <= 4; i++) s += i; s"), 10.0);
}

#[test]
fn for_loop_with_empty_sections() {
    let src = "var i = 0; for (;;) { i++; if (i >= 5) break; } i";
    assert_eq!(eval_number(src), 5.0);
}

#[test]
fn for_loop_continue_runs_the_step() {
    let src = "var s = 0; for (var i = 0; i < 10; i++) { if (i % 2) continue; s += i; } s";
    assert_eq!(eval_number(src), 20.0);
}

#[test]
fn while_and_do_while() {
    assert_eq!(eval_number("var n = 0; while (n < 7) n++; n"), 7.0);
    assert_eq!(eval_number("var n = 0; do n++; while (n < 7); n"), 7.0);
    // A do-while body runs at least once.
    assert_eq!(eval_number("var n = 0; do n++; while (false); n"), 1.0);
}

#[test]
fn labelled_break_exits_the_outer_loop() {
    let src = "
        var hits = 0;
        outer: for (var i = 0; i < 3; i++) {
            for (var j = 0; j < 3; j++) {
                hits++;
                if (i === 1 && j === 1) break outer;
            }
        }
        hits
    ";
    assert_eq!(eval_number(src), 5.0);
}

#[test]
fn switch_matches_with_loose_equality() {
    let src = "
        function pick(v) {
            switch (v) {
                case 1: return 'one';
                case 'x': return 'ex';
                default: return 'other';
            }
        }
        pick(1) + ' ' + pick('x') + ' ' + pick(2)
    ";
    assert_eq!(eval_string(src), "one ex other");
}

#[test]
fn switch_falls_through_without_break() {
    let src = "
        var trail = '';
        switch (2) {
            case 1: trail += 'a';
            case 2: trail += 'b';
            case 3: trail += 'c'; break;
            case 4: trail += 'd';
        }
        trail
    ";
    assert_eq!(eval_string(src), "bc");
}

#[test]
fn switch_default_only_when_nothing_matches() {
    let src = "
        var trail = '';
        switch (9) {
            case 1: trail += 'a'; break;
            default: trail += 'd';
            case 2: trail += 'b';
        }
        trail
    ";
    // default falls through into the following case body.
    assert_eq!(eval_string(src), "db");
}

#[test]
fn throw_and_catch() {
    assert_eq!(eval_number("try { throw {code: 42}; } catch (e) { e.code } finally { }"), 42.0);
    assert_eq!(eval_number("try { throw 5; } catch (e) { e * 2 }"), 10.0);
}

#[test]
fn catch_binds_runtime_errors_as_strings() {
    let src = "var what; try { null.x; } catch (e) { what = e; } what";
    assert_eq!(eval_string(src), "cannot read property of null");
}

#[test]
fn finally_runs_on_both_paths() {
    let src = "
        var trail = '';
        function f(fail) {
            try {
                trail += 'b';
                if (fail) throw 'x';
                trail += 'c';
            } catch (e) {
                trail += 'C';
            } finally {
                trail += 'f';
            }
        }
        f(false); f(true);
        trail
    ";
    assert_eq!(eval_string(src), "bcfbCf");
}

#[test]
fn uncaught_throw_in_finally_replaces_the_result() {
    let src = "
        function f() {
            try { return 1; } finally { return 2; }
        }
        f()
    ";
    assert_eq!(eval_number(src), 2.0);
}

#[test]
fn error_propagates_when_catch_rethrows() {
    let src = "
        var trail = '';
        try {
            try { throw 'inner'; } catch (e) { trail += 'c'; throw 'outer'; } finally { trail += 'f'; }
        } catch (e) {
            trail += e;
        }
        trail
    ";
    assert_eq!(eval_string(src), "cfouter");
}

#[test]
fn catch_scope_holds_the_thrown_value_only() {
    let src = "
        var e = 'outer';
        try { throw 'inner'; } catch (e) { }
        e
    ";
    assert_eq!(eval_string(src), "outer");
}

#[test]
fn catch_pattern_binding() {
    assert_eq!(eval_number("try { throw {code: 7}; } catch ({code}) { code }"), 7.0);
}

#[test]
fn return_value_of_a_block_is_its_last_expression() {
    assert_eq!(eval_number("1; 2; 3"), 3.0);
    assert!(matches!(eval("var x = 1;"), Value::Undefined));
}

#[test]
fn nested_loops_with_function_boundaries() {
    let src = "
        function sumTo(n) {
            var s = 0;
            for (var i = 1; i <= n; i++) s += i;
            return s;
        }
        var total = 0;
        for (var k = 1; k <= 3; k++) total += sumTo(k);
        total
    ";
    assert_eq!(eval_number(src), 10.0);
}
