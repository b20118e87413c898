use log::debug;
use std::env;
use std::process;
use worldpicker::{run, Config};

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("worldpicker - sphere 1 start order for Archipelago multiworld archives");
        println!();
        println!("Usage: {} <file.archipelago>", args[0]);
        println!();
        println!("Writes <file>_spheres_readable.txt next to the archive, listing every");
        println!("sphere and ranking players by their sphere 1 check count.");
        println!("Set RUST_LOG=debug (or trace) for decoding details.");
        process::exit(1);
    }

    let config = Config::for_input(&args[1]);
    debug!("Configuration: {:?}", config);
    println!("Processing: {}", config.input.display());

    match run(&config) {
        Ok(outcome) => {
            println!(
                "SUCCESS: Report generated: {} ({} spheres)",
                outcome.report_path.display(),
                outcome.sphere_count
            );
            if !outcome.unresolved_slots.is_empty() {
                println!(
                    "Note: {} player slot(s) could not be named; run with RUST_LOG=warn for details",
                    outcome.unresolved_slots.len()
                );
            }
        }
        Err(e) => {
            eprintln!("Error during {}: {}", e.stage(), e);
            process::exit(e.exit_code());
        }
    }
}
