//! Vocabulário canônico usado pelo matcher.
//!
//! A origem é decidida uma única vez, antes do matching: lista declarada
//! (TOML ou arquivo, um rótulo por linha) ou inferência pelos valores mais
//! frequentes da própria coluna. A inferência é um fallback orientado a
//! dados: reflete o ruído mais comum, não uma referência curada.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::errors::LakeError;
use crate::models::CanonicalConfig;
use crate::text::{normalize, title_case};

/// Um rótulo canônico e sua chave normalizada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub key: String,
    pub label: String,
}

/// Conjunto ordenado de rótulos canônicos, imutável durante o matching.
///
/// A ordem de declaração é o critério de desempate do matcher.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    /// Monta o vocabulário descartando rótulos de chave vazia. Em chaves
    /// repetidas prevalece o primeiro rótulo, na posição original.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<VocabularyEntry> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            let key = normalize(Some(label));
            if key.is_empty() || entries.iter().any(|e| e.key == key) {
                continue;
            }
            entries.push(VocabularyEntry {
                key,
                label: label.to_string(),
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }
}

/// Origem do vocabulário, resolvida uma vez por execução.
#[derive(Debug, Clone, PartialEq)]
pub enum VocabularySource {
    Declared(Vec<String>),
    Inferred { limit: usize },
}

impl VocabularySource {
    /// Escolhe a origem: lista no TOML, senão arquivo (se existir), senão inferência.
    pub fn select(config: &CanonicalConfig) -> Result<Self, LakeError> {
        if let Some(labels) = &config.vocabulary {
            return Ok(VocabularySource::Declared(labels.clone()));
        }

        if let Some(path) = &config.vocabulary_file {
            if path.is_file() {
                return Ok(VocabularySource::Declared(read_vocabulary_file(path)?));
            }
            warn!(
                path = %path.display(),
                "arquivo de vocabulário ausente, inferindo da coluna"
            );
        }

        Ok(VocabularySource::Inferred {
            limit: config.infer_limit,
        })
    }

    /// Materializa o vocabulário (a coluna só é lida na inferência).
    pub fn resolve(&self, column: &Column) -> Result<Vocabulary, LakeError> {
        let vocabulary = match self {
            VocabularySource::Declared(labels) => Vocabulary::from_labels(labels),
            VocabularySource::Inferred { limit } => {
                let as_text = column.cast(&DataType::String)?;
                let top = infer_top_values(as_text.str()?.into_iter(), *limit);
                info!(labels = ?top, "vocabulário inferido dos valores mais frequentes");
                Vocabulary::from_labels(top)
            }
        };
        Ok(vocabulary)
    }
}

/// Um rótulo por linha; linhas em branco ignoradas.
pub fn read_vocabulary_file(path: &Path) -> Result<Vec<String>, LakeError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Os `limit` valores mais frequentes (aparados, em Title Case).
///
/// Empates na contagem seguem a ordem da primeira aparição.
pub fn infer_top_values<'a, I>(values: I, limit: usize) -> Vec<String>
where
    I: Iterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for value in values.flatten() {
        let titled = title_case(value.trim());
        if titled.is_empty() {
            continue;
        }
        let next_rank = counts.len();
        counts.entry(titled).or_insert((0, next_rank)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(label, _)| label)
        .collect()
}
