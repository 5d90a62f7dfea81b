//! Configuração do trainbot carregada a partir de `trainbot.toml`.
//!
//! A struct [`BotConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::command::SpecDefaults;

/// Configuração de nível superior carregada de `trainbot.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// `--epochs` padrão quando ausente em `/train`.
    #[serde(default = "default_epochs")]
    pub default_epochs: u32,

    /// `--lr` padrão quando ausente em `/train`.
    #[serde(default = "default_learning_rate")]
    pub default_learning_rate: f64,

    /// `--samples` padrão quando ausente em `/test`.
    #[serde(default = "default_samples")]
    pub default_samples: u32,

    /// Atraso simulado por passo, em milissegundos.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Capacidade do buffer de eventos por job.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Quantos jobs terminados são retidos antes da remoção dos mais antigos.
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
}

// Valor padrão para épocas de treino: 10.
fn default_epochs() -> u32 {
    10
}

// Valor padrão para a taxa de aprendizado: 0.001.
fn default_learning_rate() -> f64 {
    0.001
}

// Valor padrão para amostras de teste: 100.
fn default_samples() -> u32 {
    100
}

// Valor padrão para o atraso por passo: 250ms.
fn default_step_delay_ms() -> u64 {
    250
}

// Valor padrão para o buffer de eventos: 256.
fn default_event_capacity() -> usize {
    256
}

// Valor padrão para retenção de jobs terminados: 100.
fn default_max_finished_jobs() -> usize {
    100
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_epochs: default_epochs(),
            default_learning_rate: default_learning_rate(),
            default_samples: default_samples(),
            step_delay_ms: default_step_delay_ms(),
            event_capacity: default_event_capacity(),
            max_finished_jobs: default_max_finished_jobs(),
        }
    }
}

impl BotConfig {
    /// Carrega a configuração de `trainbot.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("trainbot.toml"))
    }

    /// Carrega a configuração de um caminho específico.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<BotConfig>(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Defaults documentados aplicados pelo construtor de especificações.
    pub fn spec_defaults(&self) -> SpecDefaults {
        SpecDefaults {
            epochs: self.default_epochs,
            learning_rate: self.default_learning_rate,
            sample_count: self.default_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BotConfig::default();
        assert_eq!(config.default_epochs, 10);
        assert_eq!(config.default_learning_rate, 0.001);
        assert_eq!(config.default_samples, 100);
        assert_eq!(config.step_delay_ms, 250);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.max_finished_jobs, 100);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            default_epochs = 3
            step_delay_ms = 5
        "#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_epochs, 3);
        assert_eq!(config.step_delay_ms, 5);
        assert_eq!(config.default_samples, 100);
        assert_eq!(config.max_finished_jobs, 100);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_from(&dir.path().join("trainbot.toml")).unwrap();
        assert_eq!(config.default_epochs, 10);
    }

    #[test]
    fn load_from_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainbot.toml");
        std::fs::write(&path, "default_samples = 7\n").unwrap();
        let config = BotConfig::load_from(&path).unwrap();
        assert_eq!(config.default_samples, 7);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainbot.toml");
        std::fs::write(&path, "default_epochs = \"ten\"\n").unwrap();
        assert!(BotConfig::load_from(&path).is_err());
    }

    #[test]
    fn spec_defaults_mirror_the_config() {
        let mut config = BotConfig::default();
        config.default_epochs = 4;
        let defaults = config.spec_defaults();
        assert_eq!(defaults.epochs, 4);
        assert_eq!(defaults.sample_count, 100);
    }
}
