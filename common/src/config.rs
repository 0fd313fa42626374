//! Configuration types for runtime and pipeline settings

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// How much of each task iteration runs under its transaction lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TransactionMode {
    /// Read-log-enqueue and dequeue-log-write sequences are atomic among tasks of the same kind
    #[default]
    Exclusive,
    /// Only the source read is serialized, logging and ring access of different tasks interleave
    Interleaved,
}

/// Producer/consumer pipeline configuration
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of producer tasks
    pub producers: usize,
    /// Number of consumer tasks
    pub consumers: usize,
    /// Maximum number of live items in the ring buffer
    pub buffer_size: usize,
    /// Upper bound of the random pause taken after each iteration (zero disables pausing)
    pub max_delay: std::time::Duration,
    pub transaction_mode: TransactionMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            buffer_size: 1,
            max_delay: DEFAULT_MAX_DELAY,
            transaction_mode: TransactionMode::default(),
        }
    }
}

pub const DEFAULT_MAX_DELAY: std::time::Duration = std::time::Duration::from_millis(10);

impl PipelineConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.producers == 0 {
            return Err("at least one producer task is required".to_string());
        }
        if self.consumers == 0 {
            return Err("at least one consumer task is required".to_string());
        }
        if self.buffer_size == 0 {
            return Err("buffer size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Parses a human readable delay such as "10ms", "1s" or "0s".
pub fn parse_delay(value: &str) -> Result<std::time::Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}
