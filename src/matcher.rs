//! # Padronização Canônica
//!
//! Mapeia valores categóricos ruidosos ("manaus ", "MANAUS-AM", "Manaos")
//! para rótulos de um vocabulário pequeno, com limiar e score de confiança.
//!
//! ## Regras
//! - Comparação sempre no espaço normalizado ([`normalize`]).
//! - Maior score vence; empate fica com o primeiro rótulo declarado.
//! - `score >= threshold` (inclusivo) é match: exibe o rótulo em Title Case.
//! - Abaixo do limiar o valor original é mantido para revisão manual, e o
//!   score é preservado para a auditoria.
//!
//! ## Custo
//! Cada valor distinto é avaliado uma vez (e cada chave normalizada
//! distinta, uma vez) e o resultado é espalhado para todas as linhas:
//! O(distintos × vocabulário), não O(linhas × vocabulário).

use std::collections::HashMap;

use polars::prelude::*;
use tracing::debug;

use crate::errors::LakeError;
use crate::models::CanonicalConfig;
use crate::similarity::{Similarity, WeightedRatio};
use crate::text::{normalize, title_case};
use crate::vocabulary::Vocabulary;

/// Resultado do match de um valor.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Rótulo canônico (Title Case) no match, senão o valor original.
    pub display_label: String,
    /// Chave normalizada do rótulo; vazia sem match.
    pub matched_key: String,
    pub score: f64,
}

impl MatchResult {
    fn unmatched(original: &str, score: f64) -> Self {
        Self {
            display_label: original.to_string(),
            matched_key: String::new(),
            score,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.matched_key.is_empty()
    }
}

/// Nomes das colunas de entrada e de saída da padronização.
#[derive(Debug, Clone, Copy)]
pub struct MatchColumns<'a> {
    pub source: &'a str,
    pub display: &'a str,
    pub key: &'a str,
    pub score: &'a str,
}

impl<'a> From<&'a CanonicalConfig> for MatchColumns<'a> {
    fn from(config: &'a CanonicalConfig) -> Self {
        Self {
            source: &config.column,
            display: &config.display_column,
            key: &config.key_column,
            score: &config.score_column,
        }
    }
}

/// Contadores de uma passada de padronização.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchSummary {
    pub rows: usize,
    pub null_rows: usize,
    pub distinct_values: usize,
    pub matched_rows: usize,
}

impl MatchSummary {
    /// Percentual de linhas com match (nulos contam como sem match).
    pub fn coverage(&self) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        self.matched_rows as f64 / self.rows as f64 * 100.0
    }
}

/// Matcher sobre um vocabulário fixo e uma estratégia de similaridade.
#[derive(Debug, Clone)]
pub struct CanonicalMatcher<S = WeightedRatio> {
    vocabulary: Vocabulary,
    similarity: S,
    threshold: f64,
}

impl CanonicalMatcher<WeightedRatio> {
    pub fn new(vocabulary: Vocabulary, threshold: f64) -> Self {
        Self::with_similarity(vocabulary, WeightedRatio, threshold)
    }
}

impl<S: Similarity> CanonicalMatcher<S> {
    pub fn with_similarity(vocabulary: Vocabulary, similarity: S, threshold: f64) -> Self {
        Self {
            vocabulary,
            similarity,
            threshold,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Melhor entrada para uma consulta normalizada: (índice, score).
    /// Só um score estritamente maior troca o vencedor.
    fn best_match(&self, query: &str) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, entry) in self.vocabulary.entries().iter().enumerate() {
            let score = self.similarity.score(query, &entry.key);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
        best
    }

    fn resolve(&self, original: &str, best: Option<(usize, f64)>) -> MatchResult {
        match best {
            Some((idx, score)) if score >= self.threshold => {
                let entry = &self.vocabulary.entries()[idx];
                MatchResult {
                    display_label: title_case(&entry.label),
                    matched_key: entry.key.clone(),
                    score,
                }
            }
            Some((_, score)) => MatchResult::unmatched(original, score),
            None => MatchResult::unmatched(original, 0.0),
        }
    }

    /// Faz o match de um único valor.
    pub fn match_value(&self, value: &str) -> MatchResult {
        let query = normalize(Some(value));
        if query.is_empty() || self.vocabulary.is_empty() {
            return MatchResult::unmatched(value, 0.0);
        }
        self.resolve(value, self.best_match(&query))
    }

    /// Igual a [`match_value`](Self::match_value), reaproveitando o melhor
    /// candidato já calculado para a mesma chave normalizada.
    fn match_value_cached(
        &self,
        value: &str,
        by_query: &mut HashMap<String, Option<(usize, f64)>>,
    ) -> MatchResult {
        let query = normalize(Some(value));
        if query.is_empty() || self.vocabulary.is_empty() {
            return MatchResult::unmatched(value, 0.0);
        }
        let best = *by_query
            .entry(query)
            .or_insert_with_key(|q| self.best_match(q));
        self.resolve(value, best)
    }

    /// Adiciona as colunas de rótulo, chave e score à tabela.
    ///
    /// A coluna de origem é preservada. Células nulas resultam em rótulo
    /// nulo, chave vazia e score 0.
    ///
    /// # Errors
    ///
    /// `LakeError::Schema` se a coluna de origem não existir.
    pub fn standardize(
        &self,
        df: &DataFrame,
        columns: MatchColumns<'_>,
    ) -> Result<(DataFrame, MatchSummary), LakeError> {
        let source = df.column(columns.source).map_err(|_| {
            LakeError::Schema(format!("Coluna '{}' não encontrada", columns.source))
        })?;
        let as_text = source.cast(&DataType::String)?;
        let values = as_text.str()?;

        // 1. Agrupa por valor distinto e calcula uma vez
        let mut by_value: HashMap<&str, usize> = HashMap::new();
        let mut by_query: HashMap<String, Option<(usize, f64)>> = HashMap::new();
        let mut results: Vec<MatchResult> = Vec::new();
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(df.height());

        for value in values.into_iter() {
            let slot = value.map(|v| {
                *by_value.entry(v).or_insert_with(|| {
                    results.push(self.match_value_cached(v, &mut by_query));
                    results.len() - 1
                })
            });
            slots.push(slot);
        }

        debug!(
            distinct = results.len(),
            queries = by_query.len(),
            vocabulary = self.vocabulary.len(),
            "matching concluído"
        );

        // 2. Espalha os resultados para as linhas
        let mut summary = MatchSummary {
            rows: slots.len(),
            distinct_values: results.len(),
            ..MatchSummary::default()
        };
        let mut display: Vec<Option<&str>> = Vec::with_capacity(slots.len());
        let mut keys: Vec<&str> = Vec::with_capacity(slots.len());
        let mut scores: Vec<f64> = Vec::with_capacity(slots.len());

        for slot in &slots {
            match slot {
                Some(idx) => {
                    let result = &results[*idx];
                    if result.is_match() {
                        summary.matched_rows += 1;
                    }
                    display.push(Some(result.display_label.as_str()));
                    keys.push(result.matched_key.as_str());
                    scores.push(result.score);
                }
                None => {
                    summary.null_rows += 1;
                    display.push(None);
                    keys.push("");
                    scores.push(0.0);
                }
            }
        }

        let mut out = df.clone();
        out.with_column(Column::new(columns.display.into(), display))?;
        out.with_column(Column::new(columns.key.into(), keys))?;
        out.with_column(Column::new(columns.score.into(), scores))?;

        Ok((out, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_THRESHOLD;
    use std::cell::Cell;

    fn without_vocabulary() -> CanonicalMatcher {
        CanonicalMatcher::new(Vocabulary::default(), DEFAULT_THRESHOLD)
    }

    /// Similaridade fixa para testar limiar e desempate.
    struct Fixed(f64);

    impl Similarity for Fixed {
        fn score(&self, _a: &str, _b: &str) -> f64 {
            self.0
        }
    }

    /// Conta chamadas ao scorer real.
    #[derive(Default)]
    struct Counting {
        calls: Cell<usize>,
    }

    impl Similarity for Counting {
        fn score(&self, a: &str, b: &str) -> f64 {
            self.calls.set(self.calls.get() + 1);
            WeightedRatio.score(a, b)
        }
    }

    const COLUMNS: MatchColumns<'static> = MatchColumns {
        source: "CIDADE",
        display: "CIDADE_PADRONIZADA",
        key: "CITY_MATCH_KEY",
        score: "CITY_MATCH_SCORE",
    };

    fn cities(values: &[Option<&str>]) -> DataFrame {
        DataFrame::new(vec![
            Column::new("ID".into(), (0..values.len() as i64).collect::<Vec<_>>()),
            Column::new("CIDADE".into(), values.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn exact_match_after_normalization() {
        let matcher = CanonicalMatcher::new(Vocabulary::from_labels(["Manaus"]), 80.0);
        let result = matcher.match_value("manaus ");

        assert_eq!(result.display_label, "Manaus");
        assert_eq!(result.matched_key, "manaus");
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn accented_product_matches_first_label() {
        let vocab = Vocabulary::from_labels(["Vale Pre Pago", "Recarga Digital"]);
        let matcher = CanonicalMatcher::new(vocab, 80.0);
        let result = matcher.match_value("Vale Pré-Pago");

        assert_eq!(result.matched_key, "vale pre pago");
        assert_eq!(result.display_label, "Vale Pre Pago");
        assert!(result.score >= 80.0);
    }

    #[test]
    fn display_label_is_title_cased() {
        let matcher = CanonicalMatcher::new(Vocabulary::from_labels(["SÃO PAULO"]), 80.0);
        assert_eq!(matcher.match_value("sao paulo").display_label, "São Paulo");
    }

    #[test]
    fn empty_vocabulary_keeps_original() {
        let matcher = without_vocabulary();
        let result = matcher.match_value("Manaus");
        assert_eq!(result, MatchResult::unmatched("Manaus", 0.0));
    }

    #[test]
    fn empty_query_scores_zero() {
        let matcher = CanonicalMatcher::new(Vocabulary::from_labels(["Manaus"]), 80.0);
        assert_eq!(matcher.match_value(" 123 "), MatchResult::unmatched(" 123 ", 0.0));
    }

    #[test]
    fn threshold_is_inclusive() {
        let vocab = Vocabulary::from_labels(["Manaus"]);

        let at = CanonicalMatcher::with_similarity(vocab.clone(), Fixed(80.0), 80.0);
        let hit = at.match_value("qualquer");
        assert_eq!(hit.matched_key, "manaus");
        assert_eq!(hit.score, 80.0);

        let below = CanonicalMatcher::with_similarity(vocab, Fixed(79.0), 80.0);
        let miss = below.match_value("qualquer");
        assert_eq!(miss.display_label, "qualquer");
        assert_eq!(miss.matched_key, "");
        // score preservado para auditoria
        assert_eq!(miss.score, 79.0);
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let vocab = Vocabulary::from_labels(["Recarga Digital", "Vale Pre Pago"]);
        let matcher = CanonicalMatcher::with_similarity(vocab, Fixed(90.0), 80.0);
        assert_eq!(matcher.match_value("x").matched_key, "recarga digital");
    }

    #[test]
    fn matched_key_always_from_vocabulary() {
        let vocab = Vocabulary::from_labels(["Manaus", "Belém", "São Paulo", "Rio de Janeiro"]);
        let matcher = CanonicalMatcher::new(vocab.clone(), 80.0);
        let inputs = [
            "manaus", "MANAOS", "belem do para", "Sampa", "rio", "janeiro rio", "", "Curitiba",
        ];
        for input in inputs {
            let result = matcher.match_value(input);
            assert!(result.matched_key.is_empty() || vocab.contains_key(&result.matched_key));
        }
    }

    #[test]
    fn same_normalized_key_same_result() {
        let matcher = CanonicalMatcher::new(Vocabulary::from_labels(["Manaus", "Belém"]), 80.0);
        let a = matcher.match_value("MANAUS");
        let b = matcher.match_value("  manaus!");
        let c = matcher.match_value("Manaus");
        assert_eq!(a, b);
        assert_eq!(b, c);

        let miss_a = matcher.match_value("Curitiba");
        let miss_b = matcher.match_value("curitiba");
        assert_eq!(miss_a.matched_key, miss_b.matched_key);
        assert_eq!(miss_a.score, miss_b.score);
    }

    #[test]
    fn standardize_appends_columns_and_keeps_source() {
        let df = cities(&[Some("manaus "), Some("Manaos"), None, Some("Curitiba"), Some("manaus ")]);
        let matcher = CanonicalMatcher::new(Vocabulary::from_labels(["Manaus", "Belém"]), 80.0);

        let (out, summary) = matcher.standardize(&df, COLUMNS).unwrap();

        assert_eq!(out.width(), 5);
        let original = out.column("CIDADE").unwrap().str().unwrap();
        assert_eq!(original.get(0), Some("manaus "));

        let display = out.column("CIDADE_PADRONIZADA").unwrap().str().unwrap();
        assert_eq!(display.get(0), Some("Manaus"));
        assert_eq!(display.get(1), Some("Manaus"));
        assert_eq!(display.get(2), None);
        assert_eq!(display.get(3), Some("Curitiba"));

        let keys = out.column("CITY_MATCH_KEY").unwrap().str().unwrap();
        assert_eq!(keys.get(2), Some(""));
        assert_eq!(keys.get(3), Some(""));

        let scores = out.column("CITY_MATCH_SCORE").unwrap().f64().unwrap();
        assert_eq!(scores.get(0), Some(100.0));
        assert_eq!(scores.get(2), Some(0.0));
        assert!(scores.get(3).unwrap() > 0.0);

        assert_eq!(
            summary,
            MatchSummary {
                rows: 5,
                null_rows: 1,
                distinct_values: 3,
                matched_rows: 3,
            }
        );
        assert!((summary.coverage() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn scoring_runs_once_per_distinct_query() {
        let values: Vec<Option<&str>> = (0..200)
            .map(|i| match i % 4 {
                0 => Some("manaus"),
                1 => Some("MANAUS"),
                2 => Some("belem"),
                _ => Some("manaus"),
            })
            .collect();
        let df = cities(&values);

        let matcher = CanonicalMatcher::with_similarity(
            Vocabulary::from_labels(["Manaus", "Belém"]),
            Counting::default(),
            80.0,
        );
        let (_, summary) = matcher.standardize(&df, COLUMNS).unwrap();

        // 3 valores distintos, 2 chaves normalizadas, 2 rótulos.
        assert_eq!(summary.distinct_values, 3);
        assert_eq!(matcher.similarity.calls.get(), 4);
    }

    #[test]
    fn empty_vocabulary_table_scenario() {
        let df = cities(&[Some("Manaus"), Some("belem")]);
        let (out, summary) = without_vocabulary().standardize(&df, COLUMNS).unwrap();

        let display = out.column("CIDADE_PADRONIZADA").unwrap().str().unwrap();
        assert_eq!(display.get(1), Some("belem"));
        let scores = out.column("CITY_MATCH_SCORE").unwrap().f64().unwrap();
        assert!(scores.into_iter().all(|s| s == Some(0.0)));
        assert_eq!(summary.matched_rows, 0);
    }

    #[test]
    fn missing_source_column_is_schema_error() {
        let df = cities(&[Some("Manaus")]);
        let columns = MatchColumns {
            source: "PRODUTO",
            ..COLUMNS
        };
        let err = without_vocabulary().standardize(&df, columns).unwrap_err();
        assert!(matches!(err, LakeError::Schema(_)));
    }
}
