//! Runtime configuration

/// Capacity of the module registry
pub const MAX_MODULES: usize = 4;

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// Sizes the task pool and frame arena, and sets the readiness timeouts the
/// scheduler passes to installed modules.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Instance name used in log messages
    pub name: &'static str,
    /// Task pool size
    pub max_tasks: usize,
    /// Limit on live call frames across all tasks
    pub max_frames: usize,
    /// Module timeout while tasks are runnable
    pub busy_timeout_us: u64,
    /// Module timeout after a sweep found nothing to run
    pub idle_timeout_us: u64,
    /// Called after every idle sweep
    pub idle_callback: Option<fn()>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "tasklet",
            max_tasks: 16,
            max_frames: 16 * 8,
            busy_timeout_us: 0,
            idle_timeout_us: 100_000,
            idle_callback: None,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new runtime configuration builder.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

/// Builder for ergonomic runtime configuration construction.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
    max_frames: Option<usize>,
}

impl RuntimeConfigBuilder {
    /// Sets the runtime name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the task pool size.
    ///
    /// Unless set explicitly, the frame limit follows at eight frames per
    /// task.
    pub fn max_tasks(mut self, max: usize) -> Self {
        self.config.max_tasks = max;
        self
    }

    /// Sets the limit on live call frames.
    pub fn max_frames(mut self, max: usize) -> Self {
        self.max_frames = Some(max);
        self
    }

    /// Sets the readiness timeouts for busy and idle sweeps.
    pub fn timeouts(mut self, busy_us: u64, idle_us: u64) -> Self {
        self.config.busy_timeout_us = busy_us;
        self.config.idle_timeout_us = idle_us;
        self
    }

    /// Sets the idle callback function.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Builds the runtime configuration.
    pub fn build(self) -> RuntimeConfig {
        let mut config = self.config;
        config.max_frames = self
            .max_frames
            .unwrap_or_else(|| config.max_tasks.saturating_mul(8));
        config
    }
}
