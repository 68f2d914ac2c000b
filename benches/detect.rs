use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use motion_player::capture::synthetic_frame;
use motion_player::detection::{detect, FrameHistory};

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    for &(width, height) in &[(320u32, 240u32), (640, 480), (1280, 720)] {
        let a = synthetic_frame(width, height, 4);
        let b = synthetic_frame(width, height, 1);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(a, b),
            |bench, (a, b)| bench.iter(|| detect(black_box(a), black_box(b), 30)),
        );
    }
    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let frames: Vec<_> = (1..=64).map(|seq| synthetic_frame(640, 480, seq)).collect();
    c.bench_function("history_push_delta3", |bench| {
        bench.iter(|| {
            let mut history = FrameHistory::for_delta(3);
            for frame in &frames {
                history.push(frame.clone());
            }
            black_box(history.len())
        })
    });
}

criterion_group!(benches, bench_detect, bench_history);
criterion_main!(benches);
