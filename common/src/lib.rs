//! Common library for `ringcp` - producer/consumer byte copy through a bounded ring buffer
//!
//! The copy is performed by a pool of producer tasks reading the source byte by byte and a pool of
//! consumer tasks writing each byte to the destination at the offset it was read from. Bytes travel
//! through a shared [`bounded::RingBuffer`], and every step is recorded in an audit log.
//!
//! # Modules
//!
//! - [`pipeline`] - sets up shared state, spawns and joins the tasks, aggregates the [`Summary`]
//! - [`producer`] / [`consumer`] - the task bodies
//! - [`audit`] - audit line format and the log sink
//! - [`source`] / [`destination`] - serialized source cursor and positional destination writes
//! - [`backoff`] - random pauses between iterations
//! - [`config`] - runtime, output and pipeline settings
//!
//! # Lifecycle
//!
//! 1. Source, destination and audit log are opened, the ring is created
//! 2. Producers and consumers are spawned onto the runtime
//! 3. Each producer stops when it reads end-of-file; the last one closes the ring
//! 4. Consumers drain the ring and stop once it is closed and empty
//! 5. The audit log is flushed and the summary returned
//!
//! Any task failure aborts the remaining tasks and fails the copy.

pub mod audit;
pub mod backoff;
pub mod config;
pub mod consumer;
pub mod destination;
pub mod item;
pub mod pipeline;
pub mod producer;
pub mod source;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, PipelineConfig, RuntimeConfig, TransactionMode};
pub use pipeline::{Error, Summary, copy};

fn init_tracing(output: &OutputConfig) {
    let level = if output.quiet {
        "off"
    } else {
        match output.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

/// Runs `func` on a freshly built tokio runtime with logging configured from `output`.
///
/// Prints the summary when requested (or when verbose) and the full error chain unless quiet.
/// Returns `None` if the runtime could not be started or `func` failed.
pub fn run<Fut, S, E>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<S>
where
    S: std::fmt::Display,
    E: std::fmt::Display,
    Fut: std::future::Future<Output = Result<S, E>>,
{
    init_tracing(&output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(error) => {
            if !output.quiet {
                eprintln!("failed to start the async runtime: {error}");
            }
            return None;
        }
    };
    match rt.block_on(func()) {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}
