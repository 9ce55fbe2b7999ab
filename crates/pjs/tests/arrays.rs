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

fn eval_bool(src: &str) -> bool {
    match eval(src) {
        Value::Bool(b) => b,
        other => panic!("expected a boolean from {src:?}, got {other:?}"),
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
fn indexed_access_goes_through_the_class_hooks() {
    assert_eq!(eval_number("[10, 20, 30][1]"), 20.0);
    assert_eq!(eval_number("var a = [1]; a[0] = 9; a[0]"), 9.0);
    assert!(matches!(eval("[1, 2][5]"), Value::Undefined));
}

#[test]
fn writing_past_the_end_grows_length() {
    assert_eq!(eval_number("var a = []; a[4] = 1; a.length"), 5.0);
    assert_eq!(eval_number("var a = [1]; a[0] = 2; a.length"), 1.0);
}

#[test]
fn length_can_shrink_the_array() {
    assert_eq!(eval_number("var a = [1, 2, 3]; a.length = 1; a.length"), 1.0);
    assert!(matches!(eval("var a = [1, 2, 3]; a.length = 1; a[1]"), Value::Undefined));
}

#[test]
fn holes_read_as_undefined_but_do_not_enumerate() {
    assert!(eval_bool("var a = []; a[3] = 1; a[1] === undefined"));
    let src = "
        var a = [];
        a[0] = 'x'; a[3] = 'y';
        var seen = 0;
        a.forEach(() => seen++);
        seen
    ";
    assert_eq!(eval_number(src), 2.0);
    assert_eq!(eval_number("var a = [1, 2, 3]; delete a[1]; var n = 0; a.forEach(() => n++); n"), 2.0);
}

#[test]
fn filter_then_reduce() {
    assert_eq!(eval_number("[1, 2, 3, 4].filter(n => n % 2).reduce((s, n) => s + n, 0)"), 4.0);
}

#[test]
fn reduce_without_initializer() {
    assert_eq!(eval_number("[1, 2, 3].reduce((a, b) => a + b)"), 6.0);
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance.eval("[].reduce((a, b) => a + b)").unwrap_err();
    assert!(err.message.contains("reduce of empty array"), "{}", err.message);
}

#[test]
fn map_preserves_indices() {
    assert_eq!(eval_string("[1, 2, 3].map(n => n * n).join('-')"), "1-4-9");
}

#[test]
fn map_callback_receives_the_index() {
    assert_eq!(eval_string("['a', 'b'].map((v, i) => v + i).join(',')"), "a0,b1");
}

#[test]
fn push_and_pop() {
    assert_eq!(eval_number("var a = [1]; a.push(2, 3)"), 3.0);
    assert_eq!(eval_number("var a = [1, 2]; a.pop() + a.length"), 3.0);
    assert!(matches!(eval("[].pop()"), Value::Undefined));
}

#[test]
fn join_prints_nullish_as_empty() {
    assert_eq!(eval_string("[1, null, 2, undefined, 3].join(',')"), "1,,2,,3");
    assert_eq!(eval_string("[1, 2].join()"), "1,2");
}

#[test]
fn index_of_and_includes() {
    assert_eq!(eval_number("[5, 6, 7].indexOf(6)"), 1.0);
    assert_eq!(eval_number("[5, 6, 7].indexOf(9)"), -1.0);
    assert!(eval_bool("[1, NaN].includes(NaN)"));
    assert!(!eval_bool("[1, 2].includes('1')"));
}

#[test]
fn slice_and_concat() {
    assert_eq!(eval_string("[1, 2, 3, 4].slice(1, 3).join('')"), "23");
    assert_eq!(eval_string("[1, 2, 3, 4].slice(-2).join('')"), "34");
    assert_eq!(eval_string("[1].concat([2, 3], 4).join('')"), "1234");
}

#[test]
fn spread_in_array_literals() {
    assert_eq!(eval_string("var mid = [2, 3]; [1, ...mid, 4].join('')"), "1234");
    assert_eq!(eval_string("[...'abc'].join('-')"), "a-b-c");
}

#[test]
fn array_to_string_joins_with_commas() {
    assert_eq!(eval_string("'' + [1, 2, 3]"), "1,2,3");
}

#[test]
fn object_statics() {
    assert_eq!(eval_string("Object.keys({a: 1, b: 2}).join(',')"), "a,b");
    assert_eq!(eval_number("Object.values({a: 1, b: 2}).reduce((s, n) => s + n, 0)"), 3.0);
    assert_eq!(eval_string("Object.entries({a: 1}).map(e => e[0] + '=' + e[1]).join('')"), "a=1");
    assert_eq!(eval_number("var t = {a: 1}; Object.assign(t, {b: 2}); t.a + t.b"), 3.0);
}

#[test]
fn in_on_arrays_is_not_supported() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance.eval("0 in [1, 2]").unwrap_err();
    assert!(err.message.contains("not supported"), "{}", err.message);
}
