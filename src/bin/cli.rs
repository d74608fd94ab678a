//! lanekv CLI Client
//!
//! Command-line interface for interacting with a lanekv server.

use std::time::Duration;

use clap::Parser;
use lanekv::protocol::{Request, Response, Status};
use lanekv::Client;

/// lanekv CLI
#[derive(Parser, Debug)]
#[command(name = "lanekv-cli")]
#[command(about = "CLI for the lanekv key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4141")]
    server: String,

    /// Target database; omit for catalog commands (CREATE, DROP, LIST, ...)
    #[arg(short, long, default_value = "")]
    db: String,

    /// Seconds to wait for a reply
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    /// Command name, e.g. GET, PUT, CREATE
    command: String,

    /// Command arguments
    args: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = client.set_timeout(Some(Duration::from_secs(args.timeout))) {
        eprintln!("Failed to set timeout: {}", e);
        std::process::exit(1);
    }

    let request = Request::new(
        args.command,
        args.db,
        args.args.into_iter().map(String::into_bytes).collect(),
    );

    match client.call(&request) {
        Ok(response) => print_response(&response),
        Err(e) => {
            eprintln!("No reply: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_response(response: &Response) {
    match response.status {
        Status::Success => {
            if response.data.is_empty() {
                println!("OK");
            }
            for value in &response.data {
                println!("{}", String::from_utf8_lossy(value));
            }
        }
        Status::Failure => {
            if let Some(error) = &response.error {
                println!("ERROR ({:?}): {}", error.code, error.message);
            } else {
                println!("ERROR");
            }
            std::process::exit(2);
        }
    }
}
