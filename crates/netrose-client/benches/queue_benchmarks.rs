//! Command queue throughput.
//!
//! Measures how quickly a queue drains a backlog of server-reported steps,
//! with and without acceleration kicking in, and the cost of decoding and
//! dispatching a frame of envelopes into a client world.
//!
//! Run with: `cargo bench --bench queue_benchmarks`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use netrose_client::prelude::*;
use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;

const DT: f64 = 1.0 / 60.0;
const SIZE: u16 = 1024;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn catalog() -> Arc<MapCatalog> {
    Arc::new(MapCatalog::new().with_map(GridMap::new(MapId(1), SIZE, SIZE)))
}

/// A queue with `steps` consecutive rightward steps pending.
fn backlogged_queue(steps: u16, queue_limit: usize) -> CommandQueue<MapObject> {
    let mut model = MapObject::new(catalog()).with_speed(8);
    let _ = model.attach(MapId(1), 0, 0, true);
    let mut queue = CommandQueue::new(model, &SyncConfig { queue_limit });
    for x in 0..steps {
        queue.enqueue(Command::StartMovement {
            direction: Direction::Right,
            start_x: x,
            start_y: 0,
        });
    }
    queue
}

fn drain(queue: &mut CommandQueue<MapObject>) -> u64 {
    let mut ticks = 0;
    while !queue.is_idle() || queue.model().is_moving() {
        queue.tick(DT);
        ticks += 1;
    }
    ticks
}

// ---------------------------------------------------------------------------
// Benchmark 1: draining a backlog
// ---------------------------------------------------------------------------

fn bench_backlog_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("backlog_drain");

    for &steps in &[8u16, 64, 512] {
        group.bench_with_input(BenchmarkId::new("accelerated", steps), &steps, |b, &steps| {
            b.iter(|| {
                let mut queue = backlogged_queue(steps, SyncConfig::MIN_QUEUE_LIMIT);
                black_box(drain(&mut queue));
            });
        });
        group.bench_with_input(BenchmarkId::new("full_duration", steps), &steps, |b, &steps| {
            b.iter(|| {
                let mut queue = backlogged_queue(steps, usize::MAX);
                black_box(drain(&mut queue));
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 2: receive + dispatch
// ---------------------------------------------------------------------------

fn bench_receive_frame(c: &mut Criterion) {
    let objects = 256u32;
    let scope = ScopeId(1);

    let spawns: Vec<Vec<u8>> = (0..objects)
        .map(|o| {
            let env: Envelope = Envelope::new(
                EntityHandle::new(scope, ObjectId(o)),
                Message::Spawned(ObjectSpawned {
                    data: vec![0; 16],
                    orientation: Direction::Down,
                    speed: 4,
                    attachment: Some(Attachment::new(MapId(1), (o % 512) as u16, 0)),
                    movement: None,
                }),
            );
            codec::encode(&env).unwrap()
        })
        .collect();
    let frame: Vec<Vec<u8>> = (0..objects)
        .map(|o| {
            let env: Envelope = Envelope::new(
                EntityHandle::new(scope, ObjectId(o)),
                Message::MovementStarted {
                    x: (o % 512) as u16,
                    y: 0,
                    direction: Direction::Up,
                },
            );
            codec::encode(&env).unwrap()
        })
        .collect();

    c.bench_function("receive_frame_256_objects", |b| {
        let shared = catalog();
        let mut world: ClientWorld<MapObject> =
            ClientWorld::new(ClientConfig::default(), move |_| MapObject::new(shared.clone()));
        for bytes in &spawns {
            world.receive(bytes).unwrap();
        }
        b.iter(|| {
            for bytes in &frame {
                world.receive(black_box(bytes)).unwrap();
            }
            world.tick();
            // Keep the queues from growing across iterations.
            for handle in world.handles().collect::<Vec<_>>() {
                let _ = world.dispatch(Envelope::new(handle, Message::Teleported {
                    x: handle.object.0 as u16 % 512,
                    y: 0,
                }));
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_backlog_drain, bench_receive_frame);
criterion_main!(benches);
