use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codevec::commands::{delete_project, index_path, run_config, run_search, show_stats};

#[derive(Parser)]
#[command(name = "codevec")]
#[command(about = "Semantic code indexing and similarity search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a file or directory tree into a project
    Index {
        /// File or directory to index
        path: PathBuf,
        /// Project the indexed records belong to
        #[arg(long)]
        project: String,
        /// Language tag to use for every file, instead of inferring from extensions
        #[arg(long)]
        language: Option<String>,
    },
    /// Search indexed code semantically
    Search {
        /// Free-text query
        query: String,
        /// Restrict results to one project
        #[arg(long)]
        project: Option<String>,
        /// Restrict results to one language
        #[arg(long)]
        language: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Minimum similarity score in [0, 1]
        #[arg(long, default_value_t = 0.7)]
        threshold: f32,
    },
    /// Show stored-record statistics
    Stats {
        /// Limit the report to one project
        #[arg(long)]
        project: Option<String>,
    },
    /// Delete every indexed record of a project
    Delete {
        /// Project to delete
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            run_config(show)?;
        }
        Commands::Index {
            path,
            project,
            language,
        } => {
            index_path(&path, &project, language.as_deref()).await?;
        }
        Commands::Search {
            query,
            project,
            language,
            limit,
            threshold,
        } => {
            run_search(&query, project, language, limit, threshold).await?;
        }
        Commands::Stats { project } => {
            show_stats(project.as_deref()).await?;
        }
        Commands::Delete { project } => {
            delete_project(&project).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["codevec", "stats"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Stats { .. });
        }
    }

    #[test]
    fn index_requires_project() {
        let cli = Cli::try_parse_from(["codevec", "index", "src/"]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["codevec", "index", "src/", "--project", "p1"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Index { path, project, language } = parsed.command {
                assert_eq!(path, PathBuf::from("src/"));
                assert_eq!(project, "p1");
                assert_eq!(language, None);
            }
        }
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::try_parse_from(["codevec", "search", "parse tokens"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                query,
                limit,
                threshold,
                ..
            } = parsed.command
            {
                assert_eq!(query, "parse tokens");
                assert_eq!(limit, 10);
                assert!((threshold - 0.7).abs() < f32::EPSILON);
            }
        }
    }

    #[test]
    fn search_accepts_filters() {
        let cli = Cli::try_parse_from([
            "codevec",
            "search",
            "hash map insert",
            "--project",
            "p1",
            "--language",
            "rust",
            "--limit",
            "3",
            "--threshold",
            "0.5",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["codevec", "bogus"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["codevec", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
