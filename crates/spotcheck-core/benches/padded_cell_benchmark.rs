use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spotcheck_core::step::{FnStep, TrimTrailingWhitespaceStep};
use spotcheck_core::{DirtyState, Formatter, LineEnding, PaddedCell};
use std::path::Path;

fn generate_source(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line {} with trailing space   \r\n", i))
        .collect()
}

fn formatter_with(steps: Vec<Box<dyn spotcheck_core::FormatterStep>>) -> Formatter {
    Formatter::builder()
        .steps(steps)
        .line_ending(LineEnding::Unix)
        .root("/bench")
        .build()
        .unwrap()
}

fn bench_dirty_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("dirty_state");

    let formatter = formatter_with(vec![Box::new(TrimTrailingWhitespaceStep)]);
    let file = Path::new("/bench/src/file.txt");

    for lines in [10, 100, 1000, 10000] {
        let raw = generate_source(lines).into_bytes();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("dirty", lines), &raw, |b, raw| {
            b.iter(|| DirtyState::calculate(&formatter, file, black_box(raw)));
        });

        let clean = String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| format!("{}\n", line.trim_end()))
            .collect::<String>()
            .into_bytes();
        group.bench_with_input(BenchmarkId::new("clean", lines), &clean, |b, clean| {
            b.iter(|| DirtyState::calculate(&formatter, file, black_box(clean)));
        });
    }

    group.finish();
}

fn bench_misbehaving_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("misbehaving_steps");

    let file = Path::new("/bench/input");
    let ping_pong = formatter_with(vec![Box::new(FnStep::new("pingPong", |s: &str| {
        Ok(if s == "A" { "B".to_string() } else { "A".to_string() })
    }))]);
    let diverging = formatter_with(vec![Box::new(FnStep::new("diverge", |s: &str| {
        Ok(format!(" {}", s))
    }))]);

    group.bench_function("cycle", |b| {
        b.iter(|| DirtyState::calculate(&ping_pong, file, black_box(b"CCC")));
    });
    group.bench_function("diverge", |b| {
        b.iter(|| DirtyState::calculate(&diverging, file, black_box(b"x")));
    });

    group.finish();
}

fn bench_cycle_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_length");

    let file = Path::new("/bench/input");
    for period in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(period), &period, |b, &period| {
            b.iter(|| {
                PaddedCell::check_with(file, "0", 10, |input| {
                    let n: usize = input.parse().unwrap_or(0);
                    Ok(((n + 1) % period).to_string())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dirty_state,
    bench_misbehaving_steps,
    bench_cycle_length
);
criterion_main!(benches);
