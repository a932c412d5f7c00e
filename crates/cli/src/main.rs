use std::process::ExitCode;

fn main() -> ExitCode {
    ledgerpilot_cli::run()
}
