#[macro_use]
extern crate log;

use std::collections::HashMap as Map;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Stdio};

use council_paxos::PeerDirectory;
use structopt::StructOpt;

mod command;

use crate::command::{Command, Execution};

#[derive(StructOpt)]
#[structopt(name = "harness")]
struct Opt {
    /// Path to the council-member binary
    #[structopt(short = "s", long = "server", parse(from_os_str))]
    server: PathBuf,

    /// Test script to execute
    #[structopt(short = "f", long = "file", parse(from_os_str))]
    file: PathBuf,

    /// Peer directory shared with the started members
    #[structopt(short = "c", long = "config", default_value = "network.config", parse(from_os_str))]
    config: PathBuf,
}

/// Running members, killed when the harness exits.
#[derive(Default)]
struct Members(Map<String, Child>);

impl Drop for Members {
    fn drop(&mut self) {
        for (id, mut child) in self.0.drain() {
            if child.kill().is_ok() {
                debug!("killed {}", id);
            }
            let _ = child.wait();
        }
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let Execution(commands) = serde_json::from_reader(std::fs::File::open(&opt.file)?)?;
    let directory = PeerDirectory::load(&opt.config)?;
    let mut members = Members::default();

    for command in commands {
        info!("executing {:?}", command);
        match command {
        | Command::Start { id, profile } => {
            let child = std::process::Command::new(&opt.server)
                .arg(&id)
                .args(&["--profile", &profile])
                .arg("--config")
                .arg(&opt.config)
                .stdin(Stdio::piped())
                .spawn()?;
            if let Some(mut previous) = members.0.insert(id.clone(), child) {
                warn!("{} was already running; replacing it", id);
                let _ = previous.kill();
            }
        }
        | Command::Propose { id, value } => {
            match members.0.get_mut(&id).and_then(|child| child.stdin.as_mut()) {
            | Some(stdin) => writeln!(stdin, "{}", value)?,
            | None => warn!("cannot propose through {}: not running", id),
            }
        }
        | Command::Inject { id, message } => {
            let address = directory.address(&id)?;
            match std::net::TcpStream::connect((address.host.as_str(), address.port)) {
            | Ok(mut stream) => writeln!(stream, "{}", message)?,
            | Err(err) => warn!("cannot inject into {} at {}: {}", id, address, err),
            }
        }
        | Command::Crash { id } => {
            if let Some(mut child) = members.0.remove(&id) {
                child.kill()?;
                let _ = child.wait();
            }
        }
        | Command::Sleep { ms } => {
            std::thread::sleep(std::time::Duration::from_millis(ms))
        }
        }
    }

    Ok(())
}

fn main() {
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[harness] {} {}", record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply();

    if let Err(err) = run(Opt::from_args()) {
        error!("{}", err);
        std::process::exit(1);
    }
}
