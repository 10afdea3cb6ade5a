use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use coloredpp::Colorize;
use crate::consts::C1;

mod run;
mod utils;

#[derive(Parser)]
#[command(author, version, about, long_about = None, color = clap::ColorChoice::Always)]
struct Cli {
    #[command(subcommand)]
    command: Option<Cmds>,
}

#[derive(Subcommand)]
enum Cmds {
    /// sable run <target> [args]
    Run {
        /// The script file to run
        target: String,
        /// Additional arguments for the program
        #[arg()]
        args: Vec<String>,
    },
    /// sable version
    Version,
}

pub fn cli() {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Cmds::Run { target, args } => run::cmd_run(target, args),
            Cmds::Version => cmd_version(),
        }
    } else {
        let args: Vec<String> = std::env::args().collect();
        if args.len() > 1 {
            let input_command = &args[1];
            let error = Cli::command().error(
                ErrorKind::UnknownArgument,
                format!("unknown command '{}'", input_command),
            );
            eprintln!("{}", error.to_string().red());
        } else {
            eprintln!(
                "{}",
                "no command provided. try 'sable --help' for usage.".red()
            );
        }
        std::process::exit(1);
    }
}

/// `sable version`
fn cmd_version() {
    println!("{}", format!("sable v{}", env!("CARGO_PKG_VERSION")).fg_hex(C1));
}
