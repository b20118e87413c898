//! Decode an archive and write every intermediate form next to it
//!
//! Outputs `<file>.raw.pickle` (the inflated stream), `<file>.decoded.txt`
//! (the decoded object graph) and the plain sphere report.

use std::env;
use std::process;
use worldpicker::{run, Config};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <file.archipelago>", args[0]);
        println!();
        println!("Writes <file>.raw.pickle, <file>.decoded.txt and <file>_spheres_readable.txt");
        process::exit(1);
    }

    let config = Config::dump_for_input(&args[1]);
    println!("Processing: {}", config.input.display());

    match run(&config) {
        Ok(outcome) => {
            match &outcome.raw_dump {
                Some(path) => println!("Raw stream:    {}", path.display()),
                None => println!("Raw stream:    not written (see log)"),
            }
            match &outcome.decoded_dump {
                Some(path) => println!("Decoded graph: {}", path.display()),
                None => println!("Decoded graph: not written (see log)"),
            }
            println!("Report:        {}", outcome.report_path.display());
        }
        Err(e) => {
            eprintln!("Error during {}: {}", e.stage(), e);
            process::exit(e.exit_code());
        }
    }
}
