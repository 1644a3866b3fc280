mod config;
mod run_cmd;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use run_cmd::RunArgs;

#[derive(Parser)]
#[command(
    name = "ctxopt",
    version,
    about = "Analyse a repository with Claude Code and recommend a CLAUDE.md or AGENTS.md",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis (default when no subcommand is given)
    Run(RunArgs),
    /// Write a ctxopt config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            let status = run_cmd::run_analysis(&cli.run).await;
            std::process::exit(status.code());
        }
        Some(Commands::Run(args)) => {
            let status = run_cmd::run_analysis(&args).await;
            std::process::exit(status.code());
        }
        Some(Commands::Init { force }) => cmd_init(force)?,
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "ctxopt", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Execute the `ctxopt init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::starter();
    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(binary) = &cfg.agent.binary {
        println!("  agent.binary = {binary}");
    }
    if let Some(secs) = cfg.agent.idle_timeout_secs {
        println!("  agent.idle_timeout_secs = {secs}");
    }
    println!();
    println!("Next: export CLAUDE_API_KEY and CONTEXT_FILE, then run `ctxopt`.");

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_runs_with_flags() {
        let cli = Cli::try_parse_from(["ctxopt", "--context-file", "AGENTS.md", "--idle-timeout", "90"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.context_file.as_deref(), Some("AGENTS.md"));
        assert_eq!(cli.run.idle_timeout, Some(90));
    }

    #[test]
    fn run_subcommand_takes_the_same_flags() {
        let cli = Cli::try_parse_from(["ctxopt", "run", "--workspace", "/repo"]).unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.workspace, Some(std::path::PathBuf::from("/repo")));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn init_accepts_force() {
        let cli = Cli::try_parse_from(["ctxopt", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init { force: true })));
    }

    #[test]
    fn completions_parse_shell_name() {
        let cli = Cli::try_parse_from(["ctxopt", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Zsh })
        ));
    }
}
