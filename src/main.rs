//! Save-file inspector: prints a summary of a Quetzal save file.
#[macro_use]
extern crate log;

use std::{env, fs, process::exit};

use gnusto::{files, quetzal::Quetzal};

fn main() {
    if files::check_existing("log4rs.yml").is_some() {
        if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
            eprintln!("Error initializing logging: {}", e);
        }
    }

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} save-file", args[0]);
        exit(1);
    }

    let data = match fs::read(&args[1]) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{}: {}", args[1], e);
            exit(1);
        }
    };

    trace!(target: "app::trace", "Inspecting '{}'", args[1]);
    match Quetzal::try_from(data.as_slice()) {
        Ok(quetzal) => {
            println!("{}", quetzal);
            if let Some(intd) = quetzal.intd() {
                println!("Story file: {}", intd.story_file());
            }
            if let Some(anno) = quetzal.anno() {
                println!("Annotation: {}", anno);
            }
            if let Some(args) = quetzal.args() {
                println!("Interrupted opcode: {:?} {:?}", args.opcode(), args.operands());
            }
            if let Some(undo) = quetzal.undo() {
                println!("Undo states: {}", undo.entries().len());
            }
            if let Some(msav) = quetzal.msav() {
                println!("User saves: {}", msav.entries().len());
            }
            if let Some(rand) = quetzal.rand() {
                println!("PRNG state: {:08x}", rand.state());
            }
        }
        Err(e) => {
            eprintln!("{}: {}", args[1], e);
            exit(1);
        }
    }
}
