use pjs::{Instance, Runtime, Value};

fn eval_with(rt: &std::rc::Rc<Runtime>, src: &str) -> Value {
    let instance = Instance::new(rt);
    instance.eval(src).unwrap()
}

fn eval_string(src: &str) -> String {
    let rt = Runtime::new();
    match eval_with(&rt, src) {
        Value::String(s) => rt.str(s).to_string(),
        other => panic!("expected a string from {src:?}, got {other:?}"),
    }
}

fn eval_number(src: &str) -> f64 {
    let rt = Runtime::new();
    match eval_with(&rt, src) {
        Value::Number(n) => n,
        other => panic!("expected a number from {src:?}, got {other:?}"),
    }
}

fn eval_bool(src: &str) -> bool {
    let rt = Runtime::new();
    match eval_with(&rt, src) {
        Value::Bool(b) => b,
        other => panic!("expected a boolean from {src:?}, got {other:?}"),
    }
}

#[test]
fn autoboxing_dispatches_methods_on_primitives() {
    assert_eq!(eval_string("'a.b.c'.split('.').map(s => s.toUpperCase()).join('-')"), "A-B-C");
}

#[test]
fn length_is_an_accessor() {
    assert_eq!(eval_number("'hello'.length"), 5.0);
    assert_eq!(eval_number("''.length"), 0.0);
    // Character count, not byte count.
    assert_eq!(eval_number("'héllo'.length"), 5.0);
}

#[test]
fn split_variants() {
    assert_eq!(eval_number("'a,b,c'.split(',').length"), 3.0);
    assert_eq!(eval_number("'abc'.split('').length"), 3.0);
    assert_eq!(eval_number("'abc'.split().length"), 1.0);
}

#[test]
fn case_mapping() {
    assert_eq!(eval_string("'MiXeD'.toLowerCase()"), "mixed");
    assert_eq!(eval_string("'MiXeD'.toUpperCase()"), "MIXED");
}

#[test]
fn char_access() {
    assert_eq!(eval_string("'abc'.charAt(1)"), "b");
    assert_eq!(eval_string("'abc'.charAt(9)"), "");
    assert_eq!(eval_number("'A'.charCodeAt(0)"), 65.0);
    assert!(eval_number("''.charCodeAt(0)").is_nan());
}

#[test]
fn searching() {
    assert_eq!(eval_number("'hello'.indexOf('ll')"), 2.0);
    assert_eq!(eval_number("'hello'.indexOf('z')"), -1.0);
    assert!(eval_bool("'hello'.includes('ell')"));
    assert!(eval_bool("'hello'.startsWith('he')"));
    assert!(eval_bool("'hello'.startsWith('ll', 2)"));
    assert!(eval_bool("'hello'.endsWith('lo')"));
    assert!(eval_bool("'hello'.endsWith('ll', 4)"));
}

#[test]
fn slicing() {
    assert_eq!(eval_string("'abcdef'.slice(1, 3)"), "bc");
    assert_eq!(eval_string("'abcdef'.slice(-2)"), "ef");
    assert_eq!(eval_string("'abcdef'.substring(3, 1)"), "bc");
    assert_eq!(eval_string("'abcdef'.substring(2)"), "cdef");
}

#[test]
fn repeat_trim_concat() {
    assert_eq!(eval_string("'ab'.repeat(3)"), "ababab");
    assert_eq!(eval_string("'  pad  '.trim()"), "pad");
    assert_eq!(eval_string("'a'.concat('b', 'c', 1)"), "abc1");
}

#[test]
fn boxed_strings_behave_like_strings() {
    assert_eq!(eval_string("new String('abc').toUpperCase()"), "ABC");
    assert!(eval_bool("new String('abc').valueOf() === 'abc'"));
}

#[test]
fn string_comparison_is_lexicographic() {
    assert!(eval_bool("'apple' < 'banana'"));
    assert!(eval_bool("'a' < 'ab'"));
}

#[test]
fn number_formatting_in_concatenation() {
    assert_eq!(eval_string("'' + 42"), "42");
    assert_eq!(eval_string("'' + 2.5"), "2.5");
    assert_eq!(eval_string("'' + -0.25"), "-0.25");
    assert_eq!(eval_string("'' + NaN"), "NaN");
    assert_eq!(eval_string("'' + 1 / 0"), "Infinity");
}

#[test]
fn string_parsing_in_coercion() {
    assert_eq!(eval_number("+' 42 '"), 42.0);
    assert_eq!(eval_number("+'3.5abc'"), 3.5);
    assert!(eval_number("+'abc'").is_nan());
}
