use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, info};
use vow::{
    task::{Executor, Schedule},
    Cancelable, Promise,
};

/// A vow pipeline example.
///
/// Fakes a handful of requests whose responses arrive on later executor ticks,
/// waits for all of them and sums the response sizes.
#[derive(Parser, Debug)]
struct Args {
    /// How many fake requests to issue.
    #[arg(short, long, default_value_t = 3)]
    requests: usize,

    /// Make this request (by index) fail.
    #[arg(short, long)]
    fail: Option<usize>,

    /// Cancel this request (by index) before it completes.
    #[arg(short, long)]
    cancel: Option<usize>,
}

fn fake_request(idx: usize, fail: bool) -> Cancelable<usize, String> {
    let request = Cancelable::new(move || debug!("request {idx}: transport aborted"));
    let resolver = request.resolver();

    Executor.schedule(Box::new(move || {
        if fail {
            resolver.reject(format!("request {idx} failed"));
        } else {
            debug!("request {idx}: response arrived");
            resolver.resolve((idx + 1) * 100);
        }
    }));

    request
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let requests: Vec<_> = (0..args.requests)
        .map(|idx| fake_request(idx, args.fail == Some(idx)))
        .collect();

    if let Some(request) = args.cancel.and_then(|idx| requests.get(idx)) {
        request.cancel("request cancelled".to_string());
    }

    let total = Promise::all(requests.iter().map(|r| (**r).clone()))
        .then(|sizes| Ok(sizes.iter().sum::<usize>()))
        .finally(|| info!("all requests settled"));

    match Executor::block_on(&total) {
        Some(Ok(bytes)) => println!("received {bytes} bytes"),
        Some(Err(reason)) => bail!(reason),
        None => bail!("pipeline never settled"),
    }

    Ok(())
}
