use crate::{maintenance, server};
use clap::{Args, Parser, Subcommand};
use hsearch::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "hsearch-api",
    about = "Serve and maintain the apartment offer listing",
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
    /// Database housekeeping
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Offer maintenance tasks
    Offers {
        #[command(subcommand)]
        command: OffersCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Create the offer tables and indexes, then exit
    Init(DatabaseArgs),
}

#[derive(Subcommand, Debug)]
enum OffersCommand {
    /// Recompute every offer's image counter from its image rows
    Recount(DatabaseArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) database: DatabaseArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DatabaseArgs {
    /// Override DATABASE_URL
    #[arg(long)]
    pub(crate) database_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Db {
            command: DbCommand::Init(args),
        } => maintenance::init_schema(args).await,
        Command::Offers {
            command: OffersCommand::Recount(args),
        } => maintenance::recount_images(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["hsearch-api"]).expect("no arguments parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "hsearch-api",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--database-url",
            "sqlite://other.db",
        ])
        .expect("serve arguments parse");

        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.database.database_url.as_deref(), Some("sqlite://other.db"));
    }

    #[test]
    fn maintenance_commands_parse() {
        let cli = Cli::try_parse_from(["hsearch-api", "offers", "recount"])
            .expect("recount parses");
        assert!(matches!(
            cli.command,
            Some(Command::Offers {
                command: OffersCommand::Recount(_)
            })
        ));

        let cli = Cli::try_parse_from(["hsearch-api", "db", "init", "--database-url", "sqlite::memory:"])
            .expect("db init parses");
        assert!(matches!(
            cli.command,
            Some(Command::Db {
                command: DbCommand::Init(_)
            })
        ));
    }
}
