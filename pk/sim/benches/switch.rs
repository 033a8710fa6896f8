//! Dispatcher benchmarks on the host simulator.
//!
//! Ticks are disabled where they would only add noise, so each iteration
//! measures the kernel path named by the benchmark.

use std::cell::Cell;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pk_sim::pk_kernel::{priority, KernelConfig, ThreadConfig, ThreadId};
use pk_sim::{SimKernel, Simulator};

type BenchKernel = SimKernel<4, 2>;
type BenchSim<'a> = Simulator<'a, 4, 2>;

/// Resume the peer, then suspend until the peer returns the favour
fn ping_pong(me: usize, peers: &[Cell<Option<ThreadId>>; 2]) -> impl FnMut(&BenchKernel) + '_ {
    let mut resumed = false;
    move |k: &BenchKernel| loop {
        if !resumed {
            if let Some(peer) = peers[1 - me].get() {
                let _ = k.resume(peer);
            }
            resumed = true;
        }
        match k.suspend_self() {
            Ok(()) => resumed = false,
            Err(_) => return,
        }
    }
}

pub fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    group.bench_function("resume_suspend_switch", |b| {
        let peers: [Cell<Option<ThreadId>>; 2] = Default::default();
        let mut sim = BenchSim::new(KernelConfig::DEFAULT).with_steps_per_tick(u32::MAX);
        let ping = sim
            .spawn(ThreadConfig::new("ping", priority!(1)), ping_pong(0, &peers))
            .unwrap();
        let pong = sim
            .spawn(ThreadConfig::new("pong", priority!(1)).suspended(), ping_pong(1, &peers))
            .unwrap();
        peers[0].set(Some(ping));
        peers[1].set(Some(pong));
        sim.start().unwrap();

        b.iter(|| black_box(sim.step().unwrap()));
    });

    group.bench_function("semaphore_handoff", |b| {
        let mut sim = BenchSim::new(KernelConfig::DEFAULT).with_steps_per_tick(u32::MAX);
        let items = sim.kernel().semaphore("items", 0).unwrap();
        sim.spawn(ThreadConfig::new("consumer", priority!(2)), move |k: &BenchKernel| {
            while k.acquire(items).is_ok() {}
        })
        .unwrap();
        sim.spawn(ThreadConfig::new("producer", priority!(1)), move |k: &BenchKernel| {
            let _ = k.release(items);
        })
        .unwrap();
        sim.start().unwrap();

        b.iter(|| {
            black_box(sim.step().unwrap());
            black_box(sim.step().unwrap())
        });
    });

    group.finish();
}

pub fn interrupt_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("interrupt");

    group.bench_function("entry_exit", |b| {
        let mut sim = BenchSim::new(KernelConfig::DEFAULT);
        sim.start().unwrap();
        b.iter(|| sim.interrupt(|k| black_box(k.now())));
    });

    group.bench_function("tick_wakes_sleeper", |b| {
        let mut sim = BenchSim::new(KernelConfig::DEFAULT);
        sim.spawn(ThreadConfig::new("napper", priority!(1)), |k: &BenchKernel| {
            while k.sleep(1).is_ok() {}
        })
        .unwrap();
        sim.start().unwrap();

        b.iter(|| black_box(sim.step().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark, interrupt_benchmark);
criterion_main!(benches);
