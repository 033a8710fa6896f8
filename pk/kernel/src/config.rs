//! Kernel configuration

use pk_core::{TickRate, Ticks};

use crate::trace::TraceHook;

/// Ticks a thread may run before yielding to an equal-priority peer
pub const DEFAULT_TIME_SLICE_QUOTA: Ticks = 4;

/// Static configuration of a kernel instance.
///
/// Everything here is fixed before [`Kernel::setup`](crate::Kernel::setup);
/// the structure is `Copy` so it can be built in a `const` context and
/// handed to [`Kernel::new`](crate::Kernel::new).
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Name used in diagnostics
    pub name: &'static str,
    /// Frequency of the periodic tick interrupt
    pub tick_rate: TickRate,
    /// Time-slice length in ticks, never zero
    pub time_slice_quota: Ticks,
    /// Receiver for scheduler trace records
    pub trace: Option<TraceHook>,
    /// Application hook run each time the CPU is about to sleep
    pub idle_callback: Option<fn()>,
}

impl KernelConfig {
    pub const DEFAULT: Self = Self {
        name: "pk",
        tick_rate: TickRate::Hz1024,
        time_slice_quota: DEFAULT_TIME_SLICE_QUOTA,
        trace: None,
        idle_callback: None,
    };

    pub const fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::new()
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for [`KernelConfig`]
#[derive(Debug, Clone, Copy)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    pub const fn new() -> Self {
        Self {
            config: KernelConfig::DEFAULT,
        }
    }

    pub const fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    pub const fn tick_rate(mut self, rate: TickRate) -> Self {
        self.config.tick_rate = rate;
        self
    }

    /// Set the time-slice quota; zero is raised to one tick
    pub const fn time_slice_quota(mut self, quota: Ticks) -> Self {
        self.config.time_slice_quota = if quota == 0 { 1 } else { quota };
        self
    }

    pub const fn trace_hook(mut self, hook: TraceHook) -> Self {
        self.config.trace = Some(hook);
        self
    }

    pub const fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    pub const fn build(self) -> KernelConfig {
        self.config
    }
}

impl Default for KernelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
