//! Threads demo in virtual time
//!
//! Runs the classic PK demonstration on the host simulator:
//! - two ticker threads that flip a token every two and three seconds
//! - a producer and two consumers passing tokens through a semaphore, with a
//!   control semaphore bounding how far the producer may run ahead
//! - a LED counter that counts 0..15 twice a second
//! - a clock thread that alternates a greeting once per second without drift
//!
//! All threads print to their own area of a small text display guarded by a
//! lock. The lock starts out held and is released by the clock thread once
//! the "display" is ready.
//!
//! ```text
//! cargo run -p pk-sim --example tasks_demo -- --seconds 20
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pk_sim::pk_kernel::{
    priority, ticks, KernelConfig, PkError, PkResult, SemaphoreId, ThreadBody, ThreadConfig, Tick,
    TickRate, Ticks,
};
use pk_sim::{SimKernel, Simulator};

type DemoKernel = SimKernel<8, 4>;

const ROWS: usize = 4;
const COLUMNS: usize = 20;
const TICK_RATE: TickRate = TickRate::Hz1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "PK threads demo on the host simulator")]
struct Opts {
    /// Virtual seconds to simulate
    #[arg(long, default_value_t = 10)]
    seconds: u16,

    /// Thread steps that fit in one tick period
    #[arg(long = "steps-per-tick", default_value_t = 4, value_name = "N")]
    steps_per_tick: u32,

    /// Time-slice quota in ticks
    #[arg(long, default_value_t = 4, value_name = "TICKS")]
    quota: Ticks,
}

/// Text display shared by all threads
struct Lcd {
    lock: SemaphoreId,
    rows: RefCell<[String; ROWS]>,
}

impl Lcd {
    fn new(lock: SemaphoreId) -> Self {
        Self {
            lock,
            rows: RefCell::new(std::array::from_fn(|_| " ".repeat(COLUMNS))),
        }
    }

    fn print(&self, k: &DemoKernel, row: usize, col: usize, text: &str) -> nb::Result<(), PkError> {
        k.acquire(self.lock)?;
        {
            let mut rows = self.rows.borrow_mut();
            let end = (col + text.len()).min(COLUMNS);
            rows[row].replace_range(col..end, &text[..end - col]);
        }
        log::trace!("lcd {},{}: {}", row, col, text);
        k.release(self.lock).map_err(nb::Error::Other)
    }

    fn render(&self) -> String {
        let border = format!("+{}+", "-".repeat(COLUMNS));
        let mut out = border.clone();
        for row in self.rows.borrow().iter() {
            out.push_str(&format!("\n|{row}|"));
        }
        out.push('\n');
        out.push_str(&border);
        out
    }
}

struct Shared {
    lcd: Lcd,
    tokens: SemaphoreId,
    control: SemaphoreId,
    failure: Cell<Option<(&'static str, PkError)>>,
}

enum Role {
    Leds { period: Ticks, count: u8 },
    Ticker { period: Ticks, label: &'static str, col: usize, token: bool },
    Producer { produced: u32 },
    Consumer { label: &'static str, col: usize, consumed: u32 },
    Clock { period: Ticks, next: Tick, blank: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Wait,
    Print,
}

/// One demo thread: wait for something, then print about it
struct DemoThread {
    name: &'static str,
    shared: Rc<Shared>,
    role: Role,
    stage: Stage,
}

impl DemoThread {
    fn new(name: &'static str, shared: &Rc<Shared>, role: Role) -> Self {
        let stage = match role {
            Role::Clock { .. } => Stage::Start,
            _ => Stage::Wait,
        };
        Self {
            name,
            shared: Rc::clone(shared),
            role,
            stage,
        }
    }

    /// Display is ready: open the print lock and plan the first clock tick
    fn start(&mut self, k: &DemoKernel) -> PkResult<()> {
        if let Role::Clock { period, next, .. } = &mut self.role {
            *next = k.now().plus(*period);
        }
        k.release(self.shared.lcd.lock)
    }

    fn wait(&self, k: &DemoKernel) -> nb::Result<(), PkError> {
        match self.role {
            Role::Leds { period, .. } | Role::Ticker { period, .. } => k.sleep(period),
            Role::Producer { .. } => k.acquire(self.shared.control),
            Role::Consumer { .. } => k.acquire(self.shared.tokens),
            Role::Clock { next, .. } => k.sleep_until(next),
        }
    }

    fn woke(&mut self) {
        match &mut self.role {
            Role::Leds { count, .. } => {
                *count = (*count + 1) % 16;
                log::trace!("leds {:04b}", count);
            }
            Role::Ticker { token, .. } => *token = !*token,
            Role::Producer { produced } => *produced += 1,
            Role::Consumer { consumed, .. } => *consumed += 1,
            Role::Clock { blank, .. } => *blank = !*blank,
        }
    }

    fn message(&self) -> (usize, usize, String) {
        match self.role {
            Role::Leds { count, .. } => (3, 0, format!("  LEDS: {count:<3}")),
            Role::Ticker { label, col, token, .. } => (2, col, format!("{label}: {}  ", token as u8)),
            Role::Producer { produced } => (0, 10, format!("P: {produced}  ")),
            Role::Consumer { label, col, consumed } => (1, col, format!("{label}: {consumed}  ")),
            Role::Clock { blank: true, .. } => (0, 0, "          ".to_string()),
            Role::Clock { blank: false, .. } => (0, 0, "HELLO PK  ".to_string()),
        }
    }

    fn printed(&mut self, k: &DemoKernel) -> PkResult<()> {
        match &mut self.role {
            Role::Producer { .. } => k.release(self.shared.tokens),
            Role::Consumer { .. } => k.release(self.shared.control),
            Role::Clock { period, next, .. } => {
                *next = next.plus(*period);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn fail(&self, k: &DemoKernel, error: PkError) {
        log::error!("{} stopped: {}", self.name, error);
        self.shared.failure.set(Some((self.name, error)));
        let _ = k.suspend_self();
    }
}

impl ThreadBody<DemoKernel> for DemoThread {
    fn step(&mut self, k: &DemoKernel) {
        // One wait/print cycle per step
        loop {
            let result = match self.stage {
                Stage::Start => self.start(k).map_err(nb::Error::Other),
                Stage::Wait => self.wait(k),
                Stage::Print => {
                    let (row, col, text) = self.message();
                    self.shared.lcd.print(k, row, col, &text)
                }
            };
            match result {
                Ok(()) => {}
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(error)) => return self.fail(k, error),
            }

            match self.stage {
                Stage::Start => self.stage = Stage::Wait,
                Stage::Wait => {
                    self.woke();
                    self.stage = Stage::Print;
                }
                Stage::Print => {
                    if let Err(error) = self.printed(k) {
                        return self.fail(k, error);
                    }
                    self.stage = Stage::Wait;
                    return;
                }
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();

    let config = KernelConfig::builder()
        .name("tasks")
        .tick_rate(TICK_RATE)
        .time_slice_quota(opts.quota)
        .build();
    let mut sim: Simulator<'_, 8, 4> = Simulator::new(config).with_steps_per_tick(opts.steps_per_tick);

    let kernel = sim.kernel();
    let shared = Rc::new(Shared {
        lcd: Lcd::new(kernel.semaphore("print", 0)?),
        tokens: kernel.semaphore("tokens", 0)?,
        control: kernel.semaphore("control", 5)?,
        failure: Cell::new(None),
    });

    let threads = [
        ("leds", Role::Leds { period: ticks!(TICK_RATE, 500 ms), count: 0 }),
        ("consumer1", Role::Consumer { label: "C1", col: 0, consumed: 0 }),
        ("consumer2", Role::Consumer { label: "C2", col: 10, consumed: 0 }),
        ("ticker1", Role::Ticker { period: ticks!(TICK_RATE, 2 s), label: "T1", col: 0, token: false }),
        ("ticker2", Role::Ticker { period: ticks!(TICK_RATE, 3 s), label: "T2", col: 10, token: false }),
        ("producer", Role::Producer { produced: 0 }),
        ("clock", Role::Clock { period: ticks!(TICK_RATE, 1 s), next: Tick::ZERO, blank: false }),
    ];
    for (name, role) in threads {
        sim.spawn(ThreadConfig::new(name, priority!(0)), DemoThread::new(name, &shared, role))
            .with_context(|| format!("registering {name}"))?;
    }

    sim.start()?;
    for second in 1..=opts.seconds {
        sim.run_for(u64::from(TICK_RATE.ticks_per_second()))?;
        if let Some((name, error)) = shared.failure.get() {
            bail!("thread {name} failed after {second}s: {error}");
        }
        log::info!("{}s: {} switches", second, sim.stats().switches);
    }

    let stats = sim.stats();
    println!("{}", shared.lcd.render());
    println!(
        "{} ticks, {} steps, {} switches, {} power-save and {} idle sleeps",
        sim.elapsed_ticks(),
        sim.steps(),
        stats.switches,
        stats.power_save_sleeps,
        stats.idle_sleeps
    );
    Ok(())
}
