//! # Definição de Erros do Data Lake
//!
//! Este módulo centraliza as falhas possíveis nas etapas do pipeline
//! (ingestão, validação e padronização).
//!
//! # Error Handling Strategy
//! - **Tipagem:** Enums para tratamento exaustivo.
//! - **Extensibilidade:** Marcado como `non_exhaustive` para permitir evolução sem quebra de contrato.
//! - **Granularidade:** Falhas de célula (coerção, match abaixo do limiar) nunca viram erro;
//!   apenas falhas de etapa ou de dataset chegam aqui.

use std::path::PathBuf;

/// Enumeração central de falhas do pipeline.
#[derive(Debug)]
#[non_exhaustive]
pub enum LakeError {
    /// Falhas no sistema de arquivos (permissão, disco cheio, arquivo inexistente).
    Io(std::io::Error),

    /// Encapsula `serde_json::Error` (catálogo de ingestão).
    Json(serde_json::Error),

    /// Erros originados na engine de DataFrames.
    /// Armazenados como `String` para reduzir acoplamento direto.
    Polars(String),

    /// Arquivo de configuração ausente ou inconsistente.
    Config(String),

    /// Nenhuma partição `chave=valor` encontrada onde ao menos uma era exigida.
    NotFound { root: PathBuf, key: String },

    /// O arquivo bruto não pôde ser lido com nenhum dos encodings suportados.
    Decode {
        path: PathBuf,
        tried: Vec<&'static str>,
    },

    /// Violações de schema (coluna obrigatória ausente, colisão de nomes).
    Schema(String),

    /// Falha de uma etapa para um dataset específico, com contexto de diagnóstico.
    Dataset {
        dataset: String,
        path: PathBuf,
        source: Box<LakeError>,
    },
}

impl LakeError {
    /// Anexa o contexto de dataset/arquivo a um erro de etapa.
    pub fn in_dataset(self, dataset: &str, path: impl Into<PathBuf>) -> Self {
        LakeError::Dataset {
            dataset: dataset.to_string(),
            path: path.into(),
            source: Box::new(self),
        }
    }
}
