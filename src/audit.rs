//! Tabela de auditoria da padronização: uma linha por combinação distinta
//! de (original, padronizado, chave, score), ordenada por
//! (padronizado, original) para revisão humana.

use std::cmp::Ordering;
use std::collections::HashSet;

use polars::prelude::*;

use crate::errors::LakeError;
use crate::matcher::MatchColumns;

#[derive(Debug, Clone, Copy)]
struct AuditRow<'a> {
    original: Option<&'a str>,
    display: Option<&'a str>,
    key: Option<&'a str>,
    score: Option<f64>,
}

impl<'a> AuditRow<'a> {
    fn identity(&self) -> (Option<&'a str>, Option<&'a str>, Option<&'a str>, Option<u64>) {
        (
            self.original,
            self.display,
            self.key,
            self.score.map(f64::to_bits),
        )
    }
}

/// Ordem ascendente com nulos no fim.
fn cmp_nulls_last(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Projeta as quatro colunas, remove duplicatas e ordena.
///
/// Colunas ausentes são erro de programação e propagam como `LakeError`.
pub fn audit(df: &DataFrame, columns: MatchColumns<'_>) -> Result<DataFrame, LakeError> {
    let original = df.column(columns.source)?.cast(&DataType::String)?;
    let display = df.column(columns.display)?.cast(&DataType::String)?;
    let key = df.column(columns.key)?.cast(&DataType::String)?;
    let score = df.column(columns.score)?.cast(&DataType::Float64)?;

    let mut seen = HashSet::new();
    let mut rows: Vec<AuditRow<'_>> = Vec::new();

    let tuples = original
        .str()?
        .into_iter()
        .zip(display.str()?)
        .zip(key.str()?)
        .zip(score.f64()?);

    for (((original, display), key), score) in tuples {
        let row = AuditRow {
            original,
            display,
            key,
            score,
        };
        if seen.insert(row.identity()) {
            rows.push(row);
        }
    }

    rows.sort_by(|a, b| {
        cmp_nulls_last(a.display, b.display).then_with(|| cmp_nulls_last(a.original, b.original))
    });

    let frame = DataFrame::new(vec![
        Column::new(
            columns.source.into(),
            rows.iter().map(|r| r.original).collect::<Vec<_>>(),
        ),
        Column::new(
            columns.display.into(),
            rows.iter().map(|r| r.display).collect::<Vec<_>>(),
        ),
        Column::new(
            columns.key.into(),
            rows.iter().map(|r| r.key).collect::<Vec<_>>(),
        ),
        Column::new(
            columns.score.into(),
            rows.iter().map(|r| r.score).collect::<Vec<_>>(),
        ),
    ])?;

    Ok(frame)
}
