//! Interface de terminal do trainbot — barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! a execução de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::jobs::{JobError, JobReport, JobState, ProgressEvent};

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe uma barra de 0 a 100 durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e cancelamento (amarelo).
pub struct JobProgress {
    // Barra de progresso do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para mensagens de cancelamento.
    yellow: Style,
}

impl JobProgress {
    /// Inicia a barra com o id e o tipo do job.
    pub fn start(job_id: &str, kind: &str) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30.cyan/blue} {pos:>3}% {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("{kind} job {job_id}"));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a barra com um evento de progresso.
    pub fn update(&self, event: &ProgressEvent) {
        self.pb.set_position(event.percent.round() as u64);
        self.pb.set_message(event.message.clone());
    }

    /// Finaliza a barra e exibe o estado terminal do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X;
    /// cancelamento em amarelo.
    pub fn complete(&self, state: JobState, result: Option<&JobReport>, error: Option<&JobError>) {
        self.pb.finish_and_clear();
        match state {
            JobState::Succeeded => {
                let summary = result.map(|r| r.summary.as_str()).unwrap_or("done");
                println!("  {} {summary}", self.green.apply_to("✓"));
            }
            JobState::Failed => match error {
                Some(error) => println!("  {} {error}", self.red.apply_to("✗")),
                None => println!("  {} Job failed", self.red.apply_to("✗")),
            },
            JobState::Cancelled => {
                println!("  {} Job cancelled", self.yellow.apply_to("⊘"));
            }
            _ => {}
        }
    }

    /// Imprime o relatório final formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &JobReport) {
        println!();
        println!("{}", self.green.apply_to("─── Job Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}
