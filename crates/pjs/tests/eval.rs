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
fn arithmetic() {
    assert_eq!(eval_number("1 + 2 * 3"), 7.0);
    assert_eq!(eval_number("(1 + 2) * 3"), 9.0);
    assert_eq!(eval_number("7 % 4"), 3.0);
    assert_eq!(eval_number("2 ** 10"), 1024.0);
    assert_eq!(eval_number("2 ** 3 ** 2"), 512.0);
    assert_eq!(eval_number("10 / 4"), 2.5);
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(eval_number("1 / 0"), f64::INFINITY);
    assert_eq!(eval_number("-1 / 0"), f64::NEG_INFINITY);
    assert!(eval_number("0 / 0").is_nan());
}

#[test]
fn string_concatenation_wins_over_addition() {
    assert_eq!(eval_string("'a' + 'b'"), "ab");
    assert_eq!(eval_string("1 + '2'"), "12");
    assert_eq!(eval_string("'n=' + 42"), "n=42");
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(eval_number("5 & 3"), 1.0);
    assert_eq!(eval_number("5 | 3"), 7.0);
    assert_eq!(eval_number("5 ^ 3"), 6.0);
    assert_eq!(eval_number("~0"), -1.0);
    assert_eq!(eval_number("1 << 4"), 16.0);
    assert_eq!(eval_number("-8 >> 1"), -4.0);
    assert_eq!(eval_number("-1 >>> 28"), 15.0);
}

#[test]
fn equality_and_identity() {
    assert!(eval_bool("null == undefined"));
    assert!(!eval_bool("null === undefined"));
    assert!(!eval_bool("NaN == NaN"));
    assert!(!eval_bool("NaN === NaN"));
    assert!(eval_bool("1 === 1"));
    // No implicit conversion in loose equality.
    assert!(!eval_bool("1 == '1'"));
    assert!(!eval_bool("0 == false"));
    assert!(eval_bool("'a' == 'a'"));
    assert!(eval_bool("1 !== 2"));
}

#[test]
fn object_identity() {
    assert!(eval_bool("var a = {}, b = a; a === b"));
    assert!(!eval_bool("({}) === {}"));
}

#[test]
fn comparisons() {
    assert!(eval_bool("2 > 1"));
    assert!(eval_bool("'abc' < 'abd'"));
    assert!(!eval_bool("undefined < 1"));
    assert!(!eval_bool("undefined > 1"));
    assert!(!eval_bool("1 <= undefined"));
}

#[test]
fn short_circuiting() {
    assert_eq!(eval_number("var n = 0; false && n++; n"), 0.0);
    assert_eq!(eval_number("var n = 0; true || n++; n"), 0.0);
    assert_eq!(eval_number("var n = 0; null ?? n++; n"), 1.0);
    assert_eq!(eval_number("0 || 5"), 5.0);
    assert_eq!(eval_number("0 ?? 5"), 0.0);
    assert_eq!(eval_number("null ?? 5"), 5.0);
}

#[test]
fn conditional_operator() {
    assert_eq!(eval_number("true ? 1 : 2"), 1.0);
    assert_eq!(eval_number("false ? 1 : 2"), 2.0);
    assert_eq!(eval_number("1 < 2 ? 1 + 10 : 2 + 20"), 11.0);
    assert_eq!(eval_number("false ? 1 : true ? 2 : 3"), 2.0);
}

#[test]
fn typeof_classification() {
    assert_eq!(eval_string("typeof undefined"), "undefined");
    assert_eq!(eval_string("typeof true"), "boolean");
    assert_eq!(eval_string("typeof 1"), "number");
    assert_eq!(eval_string("typeof 'x'"), "string");
    assert_eq!(eval_string("typeof null"), "object");
    assert_eq!(eval_string("typeof {}"), "object");
    assert_eq!(eval_string("typeof []"), "object");
    assert_eq!(eval_string("typeof (() => 1)"), "function");
}

#[test]
fn coercions() {
    assert_eq!(eval_number("+'3.5'"), 3.5);
    assert!(eval_number("+'jam'").is_nan());
    assert!(eval_number("+''").is_nan());
    assert_eq!(eval_number("-'2'"), -2.0);
    assert!(eval_bool("!0"));
    assert!(eval_bool("!''"));
    assert!(!eval_bool("!'x'"));
    assert_eq!(eval_string("`${1.5}`"), "1.5");
    assert_eq!(eval_string("`${7}`"), "7");
}

#[test]
fn increments_and_compound_assignment() {
    assert_eq!(eval_number("var x = 1; x++; x"), 2.0);
    assert_eq!(eval_number("var x = 1; x++"), 1.0);
    assert_eq!(eval_number("var x = 1; ++x"), 2.0);
    assert_eq!(eval_number("var x = 1; x--; x"), 0.0);
    assert_eq!(eval_number("var x = 2; x += 3; x *= 2; x"), 10.0);
    assert_eq!(eval_number("var x = 2; x **= 3; x"), 8.0);
    assert_eq!(eval_number("var x = null; x ??= 7; x"), 7.0);
    assert_eq!(eval_number("var x = 1; x ??= 7; x"), 1.0);
    assert_eq!(eval_number("var x = 0; x ||= 9; x"), 9.0);
    assert_eq!(eval_number("var x = 1; x &&= 5; x"), 5.0);
}

#[test]
fn comma_and_void() {
    assert_eq!(eval_number("(1, 2, 3)"), 3.0);
    assert!(matches!(eval("void 42"), Value::Undefined));
}

#[test]
fn template_literals() {
    assert_eq!(eval_string("var x = 3; `a${x}b${x + 1}c`"), "a3b4c");
    assert_eq!(eval_string("`${'nested ' + `inner`}`"), "nested inner");
    assert_eq!(eval_string("`line\\n`"), "line\n");
}

#[test]
fn object_literals() {
    assert_eq!(eval_number("({a: 1, b: 2}).b"), 2.0);
    assert_eq!(eval_number("var k = 'key'; ({[k]: 5})[k]"), 5.0);
    assert_eq!(eval_number("var a = 7; ({a}).a"), 7.0);
    assert_eq!(eval_number("({'quoted': 1}).quoted"), 1.0);
    assert_eq!(eval_number("({1: 'x', other: 2})['1'] === 'x' ? 1 : 0"), 1.0);
    assert_eq!(eval_number("var base = {a: 1}; ({...base, b: 2}).a"), 1.0);
}

#[test]
fn property_access_forms() {
    assert_eq!(eval_number("var o = {a: {b: 3}}; o.a.b"), 3.0);
    assert_eq!(eval_number("var o = {a: 4}; o['a']"), 4.0);
    assert!(matches!(eval("var o = {}; o.missing"), Value::Undefined));
    assert_eq!(eval_number("var o = {n: 1}; o.n = 9; o.n"), 9.0);
}

#[test]
fn optional_chaining() {
    assert!(matches!(eval("var o = null; o?.a"), Value::Undefined));
    assert!(matches!(eval("var o = undefined; o?.a?.b"), Value::Undefined));
    assert_eq!(eval_number("var o = {a: 5}; o?.a"), 5.0);
    assert!(matches!(eval("var f = null; f?.()"), Value::Undefined));
    assert!(matches!(eval("var o = {}; o.f?.()"), Value::Undefined));
    assert!(matches!(eval("var a = null; a?.[0]"), Value::Undefined));
}

#[test]
fn delete_object_property() {
    assert!(eval_bool("var o = {}; o.x = 1; delete o.x"));
    assert!(matches!(eval("var o = {}; o.x = 1; delete o.x; o.x"), Value::Undefined));
}

#[test]
fn in_operator() {
    assert!(eval_bool("var o = {a: 1}; 'a' in o"));
    assert!(!eval_bool("var o = {a: 1}; 'b' in o"));
}

#[test]
fn instanceof_walks_the_class_chain() {
    assert!(eval_bool("[] instanceof Array"));
    assert!(eval_bool("[] instanceof Object"));
    assert!(!eval_bool("({}) instanceof Array"));
    assert!(eval_bool("new Number(1) instanceof Number"));
}

#[test]
fn constructors() {
    assert_eq!(eval_number("Number('42')"), 42.0);
    assert!(eval_bool("Boolean('x')"));
    assert_eq!(eval_string("String(12)"), "12");
    assert_eq!(eval_number("new Array(1, 2, 3).length"), 3.0);
    assert_eq!(eval_number("new Array(5).length"), 5.0);
    assert_eq!(eval_number("new Number(41).valueOf() + 1"), 42.0);
}

#[test]
fn int_arithmetic_delegates() {
    assert_eq!(eval_string("(Int(2) ** 0, Int(2) + Int(3)).toString()"), "5");
    assert_eq!(eval_string("(Int('9007199254740993') * Int(2)).toString()"), "18014398509481986");
    assert_eq!(eval_string("(Int(10) / Int(3)).toString()"), "3");
    assert!(eval_bool("Int(5) == 5"));
    assert!(eval_bool("Int(5) < 6"));
    assert_eq!(eval_string("(-Int(7)).toString()"), "-7");
    assert_eq!(eval_string("(Int(1) << 10).toString()"), "1024");
}

#[test]
fn expression_entry_point() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let v = instance.eval_expression("1 + 2 * 3").unwrap();
    assert!(matches!(v, Value::Number(n) if n == 7.0));
    assert!(instance.eval_expression("1; 2").is_err());
}

#[test]
fn host_globals_are_visible() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    instance.set_global("answer", Value::Number(42.0));
    let v = instance.eval("answer / 2").unwrap();
    assert!(matches!(v, Value::Number(n) if n == 21.0));
}
