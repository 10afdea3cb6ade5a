#[macro_export]
macro_rules! throw {
    ($msg:expr, $exit:expr) => {
        eprintln!("{}{}", "error: ".red().bold(), $msg.to_string().red());
        if $exit {
            std::process::exit(1);
        }
    };
    ($msg:expr) => {
        eprintln!("{}{}", "error: ".red().bold(), $msg.to_string().red())
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:expr) => {
        eprintln!("{}{}", "warning: ".yellow().bold(), $msg.to_string().yellow());
    };
}
