use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pjs::{Instance, Runtime};

const FIB: &str = "
    function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
    fib(15)
";

const SCRIPT: &str = "
    var words = 'the quick brown fox jumps over the lazy dog'.split(' ');
    words.filter(w => w.length > 3).map(w => w.toUpperCase()).join('-')
";

fn bench_compile(c: &mut Criterion) {
    let rt = Runtime::new();
    c.bench_function("compile_fib", |b| {
        b.iter(|| {
            let instance = Instance::new(&rt);
            black_box(instance.compile("bench.js", black_box(FIB)).unwrap());
        });
    });
}

fn bench_execute(c: &mut Criterion) {
    let rt = Runtime::new();
    c.bench_function("execute_fib", |b| {
        let instance = Instance::new(&rt);
        let id = instance.compile("bench.js", FIB).unwrap();
        instance.link(id, |_, _, _| None).unwrap();
        b.iter(|| black_box(instance.execute(id, None).unwrap()));
    });
    c.bench_function("execute_strings", |b| {
        let instance = Instance::new(&rt);
        let id = instance.compile("bench.js", SCRIPT).unwrap();
        instance.link(id, |_, _, _| None).unwrap();
        b.iter(|| black_box(instance.execute(id, None).unwrap()));
    });
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
