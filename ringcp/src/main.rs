use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ringcp",
    version,
    about = "Copy a file through a bounded ring buffer shared by concurrent reader and writer tasks",
    long_about = "`ringcp` copies SRC to DST one byte at a time. N_IN producer tasks read the source and push
each byte, tagged with its offset, into a ring buffer holding at most BUFFER_SIZE items. N_OUT
consumer tasks pop bytes from the ring and write each one at its offset in the destination.

Every read, enqueue, dequeue and write is recorded in the audit LOG, one line per event:

    <event> <PT|CT><ordinal> O<offset> B<byte> I<slot index or -1>

EXAMPLES:
    # Two readers, three writers, room for 16 bytes in flight
    ringcp 2 3 /tmp/source /tmp/copy 16 /tmp/copy.log

    # No random pauses between iterations, print a summary
    ringcp 4 4 /tmp/source /tmp/copy 8 /tmp/copy.log --max-delay 0s --summary"
)]
struct Args {
    // Copy options
    /// Upper bound of the random pause each task takes after every byte
    ///
    /// Accepts human readable durations like "10ms", "500us" or "0s" (no pauses).
    #[arg(
        long,
        default_value = "10ms",
        value_name = "DELAY",
        value_parser = common::config::parse_delay,
        help_heading = "Copy options"
    )]
    max_delay: std::time::Duration,

    /// Which part of each task iteration runs under the per-kind transaction lock
    #[arg(
        long,
        value_enum,
        default_value_t = common::TransactionMode::Exclusive,
        value_name = "MODE",
        help_heading = "Copy options"
    )]
    transaction_mode: common::TransactionMode,

    // Progress & output
    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help_heading = "Progress & output"
    )]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Number of producer tasks reading the source
    #[arg(value_name = "N_IN")]
    producers: std::num::NonZeroUsize,

    /// Number of consumer tasks writing the destination
    #[arg(value_name = "N_OUT")]
    consumers: std::num::NonZeroUsize,

    /// File to copy
    #[arg(value_name = "SRC")]
    src: std::path::PathBuf,

    /// Copy to create (truncated if it exists)
    #[arg(value_name = "DST")]
    dst: std::path::PathBuf,

    /// Maximum number of bytes held in the ring buffer at once
    #[arg(value_name = "BUFFER_SIZE")]
    buffer_size: std::num::NonZeroUsize,

    /// Audit log to create (truncated if it exists)
    #[arg(value_name = "LOG")]
    log: std::path::PathBuf,
}

async fn async_main(args: Args) -> Result<common::Summary, common::Error> {
    let config = common::PipelineConfig {
        producers: args.producers.get(),
        consumers: args.consumers.get(),
        buffer_size: args.buffer_size.get(),
        max_delay: args.max_delay,
        transaction_mode: args.transaction_mode,
    };
    tracing::info!("copy: {:?} -> {:?} ({:?})", &args.src, &args.dst, &config);
    common::copy(&args.src, &args.dst, &args.log, &config).await
}

fn main() {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    match common::run(output, runtime, func) {
        Some(_) => std::process::exit(0),
        None => std::process::exit(1),
    }
}
