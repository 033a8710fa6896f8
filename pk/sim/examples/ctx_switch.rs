//! Context switch timing
//!
//! Two switcher threads, registered suspended, resume each other and then
//! suspend themselves in a tight loop. A higher priority timer thread starts
//! the first switcher, sleeps through the measuring window and stops the
//! pair when it wakes. Every hand-over between the switchers is a context
//! switch through the dispatcher.
//!
//! ```text
//! cargo run -p pk-sim --release --example ctx_switch -- --seconds 10
//! ```

use std::cell::Cell;
use std::time::Instant;

use anyhow::{bail, ensure, Result};
use clap::Parser;
use pk_sim::pk_kernel::{priority, KernelConfig, PkError, ThreadConfig, ThreadId, TickRate};
use pk_sim::{SimKernel, Simulator};

type SwitchKernel = SimKernel<3, 0>;

const TICK_RATE: TickRate = TickRate::Hz1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Count PK context switches on the host simulator")]
struct Opts {
    /// Length of the measuring window in virtual seconds
    #[arg(long, default_value_t = 10)]
    seconds: u16,

    /// Thread steps that fit in one tick period
    #[arg(long = "steps-per-tick", default_value_t = 16, value_name = "N")]
    steps_per_tick: u32,
}

#[derive(Default)]
struct Bench {
    running: Cell<bool>,
    rounds: Cell<u64>,
    switchers: [Cell<Option<ThreadId>>; 2],
    failure: Cell<Option<PkError>>,
}

impl Bench {
    fn fail(&self, error: PkError) {
        log::error!("switching stopped: {}", error);
        self.failure.set(Some(error));
        self.running.set(false);
    }
}

fn switcher(me: usize, bench: &Bench) -> impl FnMut(&SwitchKernel) + '_ {
    let mut resumed_peer = false;
    move |k: &SwitchKernel| loop {
        if !bench.running.get() {
            let _ = k.suspend_self();
            return;
        }
        if !resumed_peer {
            let Some(peer) = bench.switchers[1 - me].get() else {
                return bench.fail(PkError::UnknownThread);
            };
            if let Err(error) = k.resume(peer) {
                return bench.fail(error);
            }
            resumed_peer = true;
        }
        match k.suspend_self() {
            Ok(()) => {
                resumed_peer = false;
                if me == 0 {
                    bench.rounds.set(bench.rounds.get() + 1);
                }
            }
            Err(nb::Error::WouldBlock) => return,
            Err(nb::Error::Other(error)) => return bench.fail(error),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();
    ensure!(
        (1..=60).contains(&opts.seconds),
        "the window must be between 1 and 60 seconds"
    );
    let window = TICK_RATE.secs(opts.seconds);

    let bench = Bench::default();
    let config = KernelConfig::builder().name("ctx-switch").tick_rate(TICK_RATE).build();
    let mut sim: Simulator<'_, 3, 0> = Simulator::new(config).with_steps_per_tick(opts.steps_per_tick);

    for (index, name) in ["switcher1", "switcher2"].into_iter().enumerate() {
        let id = sim.spawn(ThreadConfig::new(name, priority!(0)).suspended(), switcher(index, &bench))?;
        bench.switchers[index].set(Some(id));
    }

    let mut started = false;
    let bench_ref = &bench;
    sim.spawn(ThreadConfig::new("timer", priority!(1)), move |k: &SwitchKernel| {
        if !started {
            started = true;
            bench_ref.running.set(true);
            if let Some(first) = bench_ref.switchers[0].get() {
                if let Err(error) = k.resume(first) {
                    return bench_ref.fail(error);
                }
            }
        }
        match k.sleep(window) {
            Ok(()) => {
                bench_ref.running.set(false);
                let _ = k.suspend_self();
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(error)) => bench_ref.fail(error),
        }
    })?;

    sim.start()?;
    let wall = Instant::now();
    sim.step()?;
    while bench.running.get() {
        sim.step()?;
    }
    let elapsed = wall.elapsed();
    sim.settle()?;

    if let Some(error) = bench.failure.get() {
        bail!("switchers failed: {error}");
    }

    let stats = sim.stats();
    let rounds = bench.rounds.get();
    println!(
        "{} rounds, {} context switches in {} virtual seconds ({} ticks)",
        rounds,
        stats.switches,
        opts.seconds,
        sim.elapsed_ticks()
    );
    println!("{:.0} switches per virtual second", stats.switches as f64 / f64::from(opts.seconds));
    println!(
        "{:.0} switches per host second ({:.2?} wall clock)",
        stats.switches as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        elapsed
    );
    Ok(())
}
