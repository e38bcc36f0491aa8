use anyhow::Result;

use qlagent::cli::RootCommand;

#[tokio::main]
async fn main() -> Result<()> {
    // Handle Ctrl+C gracefully
    tokio::select! {
        result = RootCommand::execute() => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted by user");
            std::process::exit(130);
        }
    }
}
