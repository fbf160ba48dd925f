use std::process::ExitCode;

fn main() -> ExitCode {
    aprova_cli::run()
}
