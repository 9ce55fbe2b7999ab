use std::{collections::HashMap, rc::Rc};

use pjs::{Fiber, Instance, LegacyImports, ModuleId, Runtime, Value};

/// Compiles a set of named modules, links them against each other, and
/// executes them in registration order (dependencies first, the way a
/// host drives module initialisation).
struct World {
    instance: Rc<Instance>,
    order: Vec<(String, ModuleId)>,
    by_name: HashMap<String, ModuleId>,
}

impl World {
    fn new(modules: &[(&str, &str)]) -> Self {
        let rt = Runtime::new();
        let instance = Instance::new(&rt);
        let mut order = Vec::new();
        let mut by_name = HashMap::new();
        for (name, source) in modules {
            let id = instance.compile(name, source).unwrap();
            order.push(((*name).to_owned(), id));
            by_name.insert((*name).to_owned(), id);
        }
        Self { instance, order, by_name }
    }

    fn link(&self, name: &str) -> Result<(), pjs::Exception> {
        let id = self.by_name[name];
        let by_name = self.by_name.clone();
        self.instance.link(id, move |_, _, path| by_name.get(path).copied())
    }

    /// Links and runs every module up to and including `name`, returning
    /// the target's result.
    fn run(&self, name: &str) -> Result<Value, pjs::Exception> {
        let mut result = Value::Undefined;
        for (n, id) in &self.order {
            self.link(n)?;
            let value = self.instance.execute(*id, None)?;
            if n == name {
                result = value;
                break;
            }
        }
        Ok(result)
    }

    fn run_number(&self, name: &str) -> f64 {
        match self.run(name).unwrap() {
            Value::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }
}

#[test]
fn imports_see_live_bindings() {
    let world = World::new(&[
        ("a", "export let x = 1; export function bump() { x++; }"),
        ("b", "import {x, bump} from 'a'; bump(); bump(); x"),
    ]);
    assert_eq!(world.run_number("b"), 3.0);
}

#[test]
fn import_with_alias() {
    let world = World::new(&[
        ("lib", "export let value = 5;"),
        ("main", "import {value as v} from 'lib'; v * 2"),
    ]);
    assert_eq!(world.run_number("main"), 10.0);
}

#[test]
fn namespace_import() {
    let world = World::new(&[
        ("lib", "export let a = 1; export let b = 2;"),
        ("main", "import * as ns from 'lib'; ns.a + ns.b"),
    ]);
    assert_eq!(world.run_number("main"), 3.0);
}

#[test]
fn export_default_expression() {
    let world = World::new(&[
        ("lib", "export default 6 * 7;"),
        ("main", "import {default as it} from 'lib'; it"),
    ]);
    assert_eq!(world.run_number("main"), 42.0);
}

#[test]
fn export_default_function() {
    let world = World::new(&[
        ("lib", "export default function triple(n) { return n * 3; }"),
        ("main", "import {default as triple} from 'lib'; triple(5)"),
    ]);
    assert_eq!(world.run_number("main"), 15.0);
}

#[test]
fn reexport_forwards_reads() {
    let world = World::new(&[
        ("origin", "export let n = 11;"),
        ("relay", "export {n} from 'origin';"),
        ("main", "import {n} from 'relay'; n + 1"),
    ]);
    assert_eq!(world.run_number("main"), 12.0);
}

#[test]
fn reexport_sees_later_writes() {
    let world = World::new(&[
        ("origin", "export let n = 1; export function set(v) { n = v; }"),
        ("relay", "export {n, set} from 'origin';"),
        ("main", "import {n, set} from 'relay'; set(9); n"),
    ]);
    assert_eq!(world.run_number("main"), 9.0);
}

#[test]
fn unresolved_path_fails_the_link() {
    let world = World::new(&[("main", "import {x} from 'missing'; x")]);
    let err = world.link("main").unwrap_err();
    assert_eq!(err.message, "cannot load module: missing");
}

#[test]
fn cyclic_reexport_is_rejected() {
    let world = World::new(&[
        ("a", "export {x} from 'b';"),
        ("b", "export {x} from 'a';"),
    ]);
    let err = world.link("a").unwrap_err();
    assert_eq!(err.message, "cyclic import");
}

#[test]
fn value_import_cycles_resolve_lazily() {
    // a and b import each other's values; the cycle is fine because reads
    // go through the exports objects after both have initialised.
    let world = World::new(&[
        ("b", "import {fromA} from 'a'; export let fromB = 3;"),
        ("a", "import {fromB} from 'b'; export let fromA = 2; fromB"),
    ]);
    assert_eq!(world.run_number("a"), 3.0);
}

#[test]
fn module_body_value_is_returned() {
    let world = World::new(&[("m", "var x = 40; x + 2")]);
    assert_eq!(world.run_number("m"), 42.0);
}

#[test]
fn each_execution_gets_a_fresh_module_frame() {
    let world = World::new(&[("m", "var n = 0; n += 1; n")]);
    world.link("m").unwrap();
    let id = world.by_name["m"];
    for _ in 0..3 {
        let v = world.instance.execute(id, None).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 1.0));
    }
}

#[test]
fn import_is_not_assignable() {
    let world = World::new(&[
        ("lib", "export let x = 1;"),
        ("main", "import {x} from 'lib'; x = 2"),
    ]);
    let err = world.run("main").unwrap_err();
    assert!(err.message.contains("cannot assign to an imported variable"), "{}", err.message);
}

#[test]
fn import_only_at_module_scope() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance
        .compile("m", "function f() { import {x} from 'lib'; }")
        .unwrap_err();
    assert_eq!(err.message, "illegal import");
}

#[test]
fn export_only_at_module_scope() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance.compile("m", "if (true) { export let x = 1; }").unwrap_err();
    assert_eq!(err.message, "illegal export");
}

#[test]
fn fiber_variables_are_reserved_and_not_exportable() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let err = instance.compile("m", "export let $x = 1;").unwrap_err();
    assert_eq!(err.message, "cannot export a fiber variable");
    let err = instance.compile("m2", "var $ = 1;").unwrap_err();
    assert!(err.message.contains("reserved variable name"), "{}", err.message);
}

#[test]
fn fiber_variables_live_in_the_fiber() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let id = instance.compile("m", "var $count = ($count ?? 0) + 1; $count").unwrap();
    instance.link(id, |_, _, _| None).unwrap();
    assert_eq!(instance.module(id).fiber_variable_count(), 1);

    let fiber_a = Fiber::new();
    let fiber_b = Fiber::new();
    for expected in 1..=3 {
        let v = instance.execute(id, Some(&fiber_a)).unwrap();
        assert!(matches!(v, Value::Number(n) if n == f64::from(expected)), "run {expected}");
    }
    let v = instance.execute(id, Some(&fiber_b)).unwrap();
    assert!(matches!(v, Value::Number(n) if n == 1.0));
}

#[test]
fn fiber_variable_without_a_fiber_is_an_error() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let id = instance.compile("m", "var $n = 1; $n").unwrap();
    instance.link(id, |_, _, _| None).unwrap();
    let err = instance.execute(id, None).unwrap_err();
    assert!(err.message.contains("without a fiber"), "{}", err.message);
}

#[test]
fn legacy_import_table_binds_bare_names() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let lib = instance.compile("lib", "export let seven = 7;").unwrap();
    instance.link(lib, |_, _, _| None).unwrap();
    instance.execute(lib, None).unwrap();

    let main = instance.compile("main", "seven * 3").unwrap();
    instance.link(main, |_, _, _| None).unwrap();
    let mut legacy = LegacyImports::new();
    legacy.add(&rt, "seven", lib, "seven");
    let v = instance.execute_with(main, None, Some(&legacy), None).unwrap();
    assert!(matches!(v, Value::Number(n) if n == 21.0));
}

#[test]
fn module_tree_dump_is_reproducible() {
    let rt = Runtime::new();
    let instance = Instance::new(&rt);
    let a = instance.compile("a", "var x = 1; x + 2").unwrap();
    let b = instance.compile("b", "var x = 1; x + 2").unwrap();
    let dump_a = instance.module(a).tree_dump(&rt);
    let dump_b = instance.module(b).tree_dump(&rt);
    assert_eq!(dump_a, dump_b);
    assert!(dump_a.contains("identifier x"));
}
