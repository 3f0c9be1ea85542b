#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use council_paxos::{serve, DeliveryProfile, Engine, NodeContext, PeerDirectory, TcpTransport};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

const USAGE: &str = "\
Type a value and press enter to propose it.
  /help     show this message
  /q, exit  stop reading input (the member keeps serving)";

#[derive(StructOpt)]
#[structopt(name = "council-member")]
struct Opt {
    /// ID of this member, as listed in the peer directory
    id: String,

    /// Delivery profile applied to inbound messages
    #[structopt(short = "p", long = "profile")]
    profile: DeliveryProfile,

    /// Value to propose
    #[structopt(long = "propose")]
    propose: Option<String>,

    /// Delay before proposing (in milliseconds)
    #[structopt(long = "trigger-after")]
    trigger_after: Option<u64>,

    /// Peer directory file
    #[structopt(short = "c", long = "config", default_value = "network.config", parse(from_os_str))]
    config: PathBuf,

    /// Time before an undecided round is retried (in milliseconds)
    #[structopt(short = "r", long = "retry-delay", default_value = "3000")]
    retry_delay: u64,

    /// Log verbosity; repeat for more
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u8,
}

fn logger(id: &str, verbose: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbose {
    | 0 => log::LevelFilter::Info,
    | 1 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    let id = id.to_string();
    let start = Instant::now();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}ms] {} {}",
                id,
                start.elapsed().as_millis(),
                record.level(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}

async fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let directory = PeerDirectory::load(&opt.config)?;
    let context = NodeContext::new(opt.id.clone(), directory)?
        .with_retry_delay(Duration::from_millis(opt.retry_delay));

    let port = context.directory().address(context.id())?.port;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(
        "listening on port {} with {} profile (tag {}, quorum {} of {})",
        port,
        opt.profile,
        context.tag(),
        context.quorum(),
        context.directory().len(),
    );

    let transport = TcpTransport::new(&context);
    let engine = Engine::<String>::new(context, opt.profile, Arc::new(transport));

    if let Some(value) = opt.propose {
        let engine = engine.clone();
        let delay = Duration::from_millis(opt.trigger_after.unwrap_or(0));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.propose(value);
        });
    }

    tokio::spawn(prompt(engine.clone()));

    let mut decided = engine.subscribe();
    let id = engine.id().to_string();
    tokio::spawn(async move {
        if let Ok(decision) = decided.wait_for(Option::is_some).await {
            if let Some(decision) = decision.as_ref() {
                println!("[{}] CONSENSUS: {} (proposal {})", id, decision.value, decision.number);
            }
        }
    });

    serve(listener, engine).await;
    Ok(())
}

/// Proposes each line typed on stdin until told to stop.
async fn prompt(engine: Engine<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
        | Ok(Some(line)) => line,
        | Ok(None) => break,
        | Err(err) => {
            warn!("failed to read input: {}", err);
            break
        }
        };
        match line.trim() {
        | "" => (),
        | "/help" => println!("{}", USAGE),
        | "/q" | "exit" => break,
        | value => engine.propose(value.to_string()),
        }
    }
    debug!("no longer reading input");
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(err) = logger(&opt.id, opt.verbose) {
        eprintln!("failed to install logger: {}", err);
    }

    if let Err(err) = run(opt).await {
        error!("{}", err);
        std::process::exit(1);
    }
}
