use arbor_core::{use_effect, use_state, Element, MemoryApplier, Props, RenderResult, Root};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const ROW_COUNT_SAMPLES: &[usize] = &[16, 64, 256, 1024];

fn row(props: &Props) -> RenderResult {
    let id = props.int("id").unwrap_or_default();
    let (selected, _set_selected) = use_state(|| false);
    use_effect(Some(id), move || {
        black_box(id);
    });
    Ok(Element::host("li")
        .prop("selected", selected)
        .child(format!("Row {id}")))
}

fn rows(order: &[usize]) -> Element {
    Element::host("ul").children(order.iter().map(|&id| {
        Element::function("Row", row)
            .key(&id)
            .prop("id", id)
    }))
}

struct ListFixture {
    root: Root<MemoryApplier>,
    forward: Vec<usize>,
    rotated: Vec<usize>,
}

impl ListFixture {
    fn new(rows: usize) -> Self {
        let mut applier = MemoryApplier::new();
        let container = applier.create_container();
        let forward: Vec<usize> = (0..rows).collect();
        let mut rotated = forward.clone();
        rotated.rotate_left(rows / 3);
        Self {
            root: Root::new(applier, container),
            forward,
            rotated,
        }
    }

    fn render(&mut self, order: &[usize]) {
        self.root.render(&rows(order)).expect("render");
        self.root.flush().expect("flush");
        self.root.applier_mut().take_ops();
    }
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list_mount");
    for &count in ROW_COUNT_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            b.iter(|| {
                let mut fixture = ListFixture::new(count);
                let order = fixture.forward.clone();
                fixture.render(&order);
                black_box(fixture.root.applier().len());
            });
        });
    }
    group.finish();
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list_reorder");
    for &count in ROW_COUNT_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            let mut fixture = ListFixture::new(count);
            let (forward, rotated) = (fixture.forward.clone(), fixture.rotated.clone());
            // Steady state: every iteration swaps between two orders of the same keys.
            fixture.render(&forward);
            b.iter(|| {
                fixture.render(&rotated);
                fixture.render(&forward);
            });
        });
    }
    group.finish();
}

criterion_group!(keyed_list, bench_mount, bench_reorder);
criterion_main!(keyed_list);
