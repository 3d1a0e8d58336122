//! `opennettyctl` binary entrypoint
// (c) 2026 OpenNetty contributors

fn main() -> std::process::ExitCode {
    match opennetty::cli::cli() {
        Ok(code) => code,
        Err(e) => {
            if opennetty::util::is_initialized() {
                tracing::error!("{e}");
            } else {
                eprintln!("Error: {e}");
            }
            std::process::ExitCode::FAILURE
        }
    }
}
