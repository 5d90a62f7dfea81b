//! Interface de linha de comando do trainbot baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`CliCommand`] (run, status,
//! cancel, demo) e flags globais (--requester, --verbose).

use clap::{Parser, Subcommand};

/// trainbot — bot de comandos ML para threads de revisão de código.
#[derive(Debug, Parser)]
#[command(name = "trainbot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Nome do autor atribuído aos jobs submetidos.
    #[arg(long, global = true, default_value = "local")]
    pub requester: String,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Interpreta um comentário como se postado na thread de revisão.
    Run {
        /// Texto do comentário, ex.: "/train --epochs=5".
        text: String,
    },

    /// Mostra o status de um job ou de todos os jobs ativos.
    Status {
        /// Id do job; omita para listar os jobs ativos.
        #[arg(long)]
        job: Option<String>,
    },

    /// Solicita o cancelamento de um job em execução.
    Cancel {
        /// Id do job a cancelar.
        job: String,
    },

    /// Executa a demonstração embutida do ciclo de vida de jobs.
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["trainbot", "run", "/train --epochs=5"]);
        match cli.command {
            CliCommand::Run { text } => assert_eq!(text, "/train --epochs=5"),
            _ => panic!("expected Run command"),
        }
        assert_eq!(cli.requester, "local");
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["trainbot", "--requester", "alice", "--verbose", "demo"]);
        assert!(cli.verbose);
        assert_eq!(cli.requester, "alice");
        assert!(matches!(cli.command, CliCommand::Demo));
    }

    #[test]
    fn cli_parses_status_with_job() {
        let cli = Cli::parse_from(["trainbot", "status", "--job", "abc123"]);
        match cli.command {
            CliCommand::Status { job } => assert_eq!(job.as_deref(), Some("abc123")),
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
