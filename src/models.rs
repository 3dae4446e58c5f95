//! Metadata-Driven Configuration Models
//!
//! ## Visão Geral
//! Este módulo define as estruturas de configuração do data lake: raízes
//! físicas das camadas (raw, landing, validated), convenção de partição e
//! declarações por dataset (tipagem de colunas e padronização canônica).
//!
//! ## Boas Práticas
//! - **Encapsulamento**: Validações de integridade ocorrem no momento da carga.
//! - **Sem estado global**: o `Config` é passado explicitamente para cada etapa.

use crate::errors::LakeError;
use crate::schema::normalize_column_name;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PARTITION_KEY: &str = "data";
pub const DEFAULT_THRESHOLD: f64 = 80.0;
pub const DEFAULT_INFER_LIMIT: usize = 5;

/// Configuração raiz do pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub paths: LakePaths,

    #[serde(default)]
    pub partition: PartitionConfig,

    /// Datasets indexados pelo nome lógico (ex: "clientes", "transacoes").
    pub datasets: BTreeMap<String, DatasetConfig>,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Raízes físicas das camadas do lake.
#[derive(Debug, Deserialize, Clone)]
pub struct LakePaths {
    /// Onde chegam os extratos brutos (entrada da ingestão).
    pub raw: PathBuf,

    /// Camada bronze congelada: `<landing>/data=YYYY-MM-DD/<dataset>/<arquivo>`.
    pub landing: PathBuf,

    /// Camada validada. Se ausente, usa `<pai do landing>/validated`.
    pub validated: Option<PathBuf>,

    /// Log de ingestão em JSON Lines.
    pub catalog: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartitionConfig {
    #[serde(default = "default_partition_key")]
    pub key: String,
}

/// Tipo alvo de uma coluna declarada.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Numeric,
    /// Texto de largura fixa (preserva zeros à esquerda, nunca vira número).
    Text,
}

/// Declaração de um dataset.
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Nome do arquivo bruto (ex: "clientes.csv").
    pub file: String,

    #[serde(default = "default_separator")]
    pub separator: char,

    /// Formatos `chrono` aceitos para colunas de data, na ordem de tentativa.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Coluna (já normalizada) -> tipo alvo.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnType>,

    /// Padronização de uma coluna categórica, se houver.
    pub canonical: Option<CanonicalConfig>,
}

/// Parâmetros da padronização canônica de uma coluna.
#[derive(Debug, Deserialize, Clone)]
pub struct CanonicalConfig {
    pub column: String,
    pub display_column: String,
    pub key_column: String,
    pub score_column: String,

    /// Lista canônica declarada diretamente no TOML.
    pub vocabulary: Option<Vec<String>>,

    /// Arquivo com um rótulo canônico por linha.
    pub vocabulary_file: Option<PathBuf>,

    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Quantos valores mais frequentes compõem o vocabulário inferido.
    #[serde(default = "default_infer_limit")]
    pub infer_limit: usize,

    pub audit_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Grava também `<dataset>_final.parquet`.
    #[serde(default)]
    pub parquet: bool,
}

fn default_partition_key() -> String {
    DEFAULT_PARTITION_KEY.to_string()
}

fn default_separator() -> char {
    ','
}

fn default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_infer_limit() -> usize {
    DEFAULT_INFER_LIMIT
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            key: default_partition_key(),
        }
    }
}

impl Config {
    /// Carrega e valida o arquivo de configuração TOML.
    ///
    /// # Erros
    /// Retorna `LakeError::Io` se o arquivo não for encontrado ou
    /// `LakeError::Config` se a estrutura for inválida.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LakeError> {
        let content = fs::read_to_string(path).map_err(LakeError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LakeError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validação pós-carga (Fail-Fast).
    fn validate(&self) -> Result<(), LakeError> {
        let key = &self.partition.key;
        if key.is_empty() || key.contains('=') || key.contains(std::path::MAIN_SEPARATOR) {
            return Err(LakeError::Config(format!(
                "Chave de partição inválida: '{}'",
                key
            )));
        }

        if self.datasets.is_empty() {
            return Err(LakeError::Config("Nenhum dataset declarado".to_string()));
        }

        for (name, dataset) in &self.datasets {
            dataset.validate(name)?;
        }
        Ok(())
    }

    pub fn validated_root(&self) -> PathBuf {
        match &self.paths.validated {
            Some(path) => path.clone(),
            None => self
                .paths
                .landing
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("validated"),
        }
    }
}

impl DatasetConfig {
    fn validate(&self, name: &str) -> Result<(), LakeError> {
        if self.file.trim().is_empty() {
            return Err(LakeError::Config(format!("'{}' sem arquivo bruto", name)));
        }

        if !self.separator.is_ascii() {
            return Err(LakeError::Config(format!(
                "'{}': separador deve ser ASCII, recebido '{}'",
                name, self.separator
            )));
        }

        if self.columns.values().any(|t| *t == ColumnType::Date) && self.date_formats.is_empty() {
            return Err(LakeError::Config(format!(
                "'{}' declara colunas de data sem date_formats",
                name
            )));
        }

        // As declarações referenciam nomes já normalizados.
        for column in self.columns.keys() {
            if normalize_column_name(column) != *column {
                return Err(LakeError::Config(format!(
                    "'{}': coluna declarada '{}' não está normalizada (esperado '{}')",
                    name,
                    column,
                    normalize_column_name(column)
                )));
            }
        }

        if let Some(canonical) = &self.canonical {
            canonical.validate(name)?;
        }
        Ok(())
    }
}

impl CanonicalConfig {
    fn validate(&self, dataset: &str) -> Result<(), LakeError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(LakeError::Config(format!(
                "'{}': threshold fora de [0, 100]: {}",
                dataset, self.threshold
            )));
        }

        let outputs = [&self.display_column, &self.key_column, &self.score_column];
        for (i, out) in outputs.iter().enumerate() {
            if out.is_empty() || **out == self.column {
                return Err(LakeError::Config(format!(
                    "'{}': coluna de saída inválida '{}'",
                    dataset, out
                )));
            }
            if outputs[i + 1..].contains(out) {
                return Err(LakeError::Config(format!(
                    "'{}': coluna de saída repetida '{}'",
                    dataset, out
                )));
            }
        }
        Ok(())
    }

    pub fn audit_file_name(&self, dataset: &str) -> String {
        self.audit_file
            .clone()
            .unwrap_or_else(|| format!("{}_mapping_audit.csv", dataset))
    }
}
