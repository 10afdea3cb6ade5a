use std::fs::File;
use std::path::Path;
use std::process::exit;
use std::str::from_utf8;
use std::time::Instant;
use coloredpp::Colorize;
use memmap2::Mmap;
use crate::consts::{C2, C3};
use crate::core;
use crate::throw;

/// `sable run <target> [args]`
pub fn cmd_run(target: String, args: Vec<String>) {
    let start_time = Instant::now();
    let valid_extensions = ["sb", "sable"];
    let path = Path::new(&target);

    // check the file extension
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(extension) if valid_extensions.contains(&extension) => {}
        Some(_) => {
            throw!(
                format!(
                    "'{}' has an invalid extension, allowed extensions are '.sb' and '.sable'",
                    target
                ),
                true
            );
        }
        None => {
            throw!(format!("'{}' is not a valid file.", target), true);
        }
    }

    // open and memory-map the target file
    let file = match File::open(&target) {
        Ok(file) => file,
        Err(err) => {
            throw!(format!("failed to read file '{}': {}", target, err), true);
            return;
        }
    };
    let map = match unsafe { Mmap::map(&file) } {
        Ok(map) => map,
        Err(err) => {
            throw!(format!("failed to memory-map file '{}': {}", target, err), true);
            return;
        }
    };
    let input = match from_utf8(&map) {
        Ok(input) => input,
        Err(_) => {
            throw!(format!("'{}' is not valid UTF-8", target), true);
            return;
        }
    };

    eprintln!("{}", format!("running: {}", target).fg_hex(C2));
    if !args.is_empty() {
        eprintln!("{}", format!("arguments: {:?}", args).fg_hex(C3));
    }

    match core::run(input) {
        Ok(()) => {
            eprintln!(
                "\n{}{:?}ms",
                "executed in: ".green(),
                start_time.elapsed().as_millis()
            );
        }
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            exit(1);
        }
    }
}
