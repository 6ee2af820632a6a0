use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match digital_triage::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
