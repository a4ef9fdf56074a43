use std::time::Duration;

use crate::cmd::PingArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};
use crate::output::{print_ping, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::usage("--count must be at least 1"));
    }
    let mut link = args.link.open()?;

    let mut latencies: Vec<Duration> = Vec::with_capacity(args.count as usize);
    for attempt in 1..=args.count {
        let latency = link
            .ping()
            .map_err(|err| peer_error("ping failed", err))?;
        tracing::debug!(attempt, latency_us = latency.as_micros() as u64, "pong");
        latencies.push(latency);
    }

    print_ping(&latencies, args.count, format);
    Ok(SUCCESS)
}
