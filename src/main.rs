use sable::cli::cli;

fn main() {
    cli();
}
