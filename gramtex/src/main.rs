//! The gramtex binary corrects LaTeX grammar one sentence at a time.

use clap::Parser;
use gramtex::app;
use gramtex::cli::{Cli, Commands};
use gramtex::errors::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    gramtex::logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Correct(args) => {
            let outcome = app::correct(&args).await?;
            println!(
                "Corrected {} of {} sentences -> {}",
                outcome.report.changed_count(),
                outcome.report.sentences.len(),
                outcome.output_path.display()
            );
            println!("Change log: {}", outcome.change_log_path.display());
            if let Some(path) = outcome.report_path {
                println!("Report: {}", path.display());
            }
            if let Some(path) = outcome.events_path {
                println!("Events: {}", path.display());
            }
        }
        Commands::Segment(args) => {
            let mut stdout = std::io::stdout().lock();
            let segments = app::segment(&args, &mut stdout).await?;
            tracing::info!(sentences = segments.len(), "Segmentation complete");
        }
        Commands::Check(args) => {
            let status = app::check(&args).await?;
            println!("{status}");
        }
    }

    Ok(())
}
