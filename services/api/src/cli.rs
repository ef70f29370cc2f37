use crate::commands::{run_storage_check, run_submissions, SubmissionsArgs};
use crate::server;
use assessment_portal::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Assessment Portal",
    about = "Serve the assessment portal or inspect its record and file stores",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// List submitted assessments, newest first
    Submissions(SubmissionsArgs),
    /// Upload a probe object to the storage bucket, print its public URL, then remove it
    StorageCheck,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Submissions(args) => run_submissions(args).await,
        Command::StorageCheck => run_storage_check().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["assessment-portal-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn submissions_flags_parse() {
        let cli = Cli::try_parse_from(["assessment-portal-api", "submissions", "--unreviewed", "--json"])
            .expect("parses");
        match cli.command {
            Some(Command::Submissions(args)) => {
                assert!(args.unreviewed);
                assert!(args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_overrides_parse() {
        let cli = Cli::try_parse_from(["assessment-portal-api", "serve", "--port", "8080"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn storage_check_uses_kebab_case() {
        let cli = Cli::try_parse_from(["assessment-portal-api", "storage-check"]).expect("parses");
        assert!(matches!(cli.command, Some(Command::StorageCheck)));
    }
}
