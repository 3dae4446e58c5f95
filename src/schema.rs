//! # Validação de Schema (bronze validado)
//!
//! Limpeza mínima e segura, sem regra de negócio:
//! 1. Nomes de coluna em UPPER_SNAKE_CASE.
//! 2. Espaços removidos das células de texto.
//! 3. Linhas 100% vazias descartadas.
//! 4. Coerção tolerante das colunas declaradas (falha de parse vira nulo).
//! 5. Coluna técnica `INGEST_DATE` com a tag da partição.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use regex::Regex;
use tracing::{debug, info};

use crate::encoding::{TextEncoding, read_csv_tolerant};
use crate::errors::LakeError;
use crate::models::{ColumnType, DatasetConfig};
use crate::partition::Partition;
use crate::text::fold_accents;

pub const INGEST_DATE_COLUMN: &str = "INGEST_DATE";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());
static UNDERSCORE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Resultado da validação: tabela tipada e o encoding usado na leitura.
#[derive(Debug, Clone)]
pub struct ValidatedTable {
    pub frame: DataFrame,
    pub encoding: TextEncoding,
}

/// UPPER_SNAKE_CASE simples ("Data Transação!" -> "DATA_TRANSACAO").
pub fn normalize_column_name(name: &str) -> String {
    let folded = fold_accents(name.trim());
    let n = WHITESPACE_RUN.replace_all(&folded, "_");
    let n = NON_WORD.replace_all(&n, "_");
    let n = UNDERSCORE_RUN.replace_all(&n, "_");
    n.to_uppercase().trim_matches('_').to_string()
}

/// Renomeia todas as colunas, falhando em colisões.
///
/// Cabeçalhos que ficam vazios (ex: vírgula final na linha de cabeçalho)
/// recebem o nome posicional `UNNAMED_<índice>`.
pub fn normalize_column_names(df: &mut DataFrame) -> Result<(), LakeError> {
    let originals: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut seen: HashMap<String, &str> = HashMap::with_capacity(originals.len());
    let mut renamed = Vec::with_capacity(originals.len());

    for (idx, original) in originals.iter().enumerate() {
        let mut normalized = normalize_column_name(original);
        if normalized.is_empty() {
            normalized = format!("UNNAMED_{}", idx);
        }
        if let Some(previous) = seen.insert(normalized.clone(), original) {
            return Err(LakeError::Schema(format!(
                "Colunas '{}' e '{}' colidem em '{}'",
                previous, original, normalized
            )));
        }
        renamed.push(normalized);
    }

    df.set_column_names(renamed)?;
    Ok(())
}

/// Tira espaços das células de todas as colunas de texto.
pub fn strip_text_cells(df: &DataFrame) -> Result<DataFrame, LakeError> {
    let mut columns = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        if column.dtype() == &DataType::String {
            let trimmed: Vec<Option<String>> = column
                .str()?
                .into_iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect();
            columns.push(Column::new(column.name().clone(), trimmed));
        } else {
            columns.push(column.clone());
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Remove linhas em que todas as células são nulas ou string vazia.
///
/// A string vazia só conta como nula para esta checagem; as células
/// mantidas não são alteradas.
pub fn drop_empty_rows(df: &DataFrame) -> Result<DataFrame, LakeError> {
    let mut keep = vec![false; df.height()];

    for column in df.get_columns() {
        let as_text = column.cast(&DataType::String)?;
        for (idx, value) in as_text.str()?.into_iter().enumerate() {
            if matches!(value, Some(v) if !v.is_empty()) {
                keep[idx] = true;
            }
        }
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

fn parse_datetime(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(value, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Aplica as declarações de tipo do dataset. Colunas declaradas que não
/// existem na tabela são ignoradas.
pub fn coerce_types(mut df: DataFrame, dataset: &DatasetConfig) -> Result<DataFrame, LakeError> {
    for (name, column_type) in &dataset.columns {
        let Ok(column) = df.column(name) else {
            debug!(column = %name, "coluna declarada ausente, ignorando");
            continue;
        };
        let as_text = column.cast(&DataType::String)?;
        let values = as_text.str()?;

        let coerced = match column_type {
            ColumnType::Date => {
                let parsed: Vec<Option<NaiveDateTime>> = values
                    .into_iter()
                    .map(|v| v.and_then(|s| parse_datetime(s, &dataset.date_formats)))
                    .collect();
                Column::new(name.as_str().into(), parsed)
            }
            ColumnType::Numeric => {
                let parsed: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|v| v.and_then(parse_number))
                    .collect();
                Column::new(name.as_str().into(), parsed)
            }
            // Texto fixo: preserva zeros à esquerda, apenas sem espaços.
            ColumnType::Text => {
                let kept: Vec<Option<String>> = values
                    .into_iter()
                    .map(|v| v.map(|s| s.trim().to_string()))
                    .collect();
                Column::new(name.as_str().into(), kept)
            }
        };

        df.with_column(coerced)?;
    }
    Ok(df)
}

/// Executa a validação completa sobre uma tabela já lida.
pub fn validate_frame(
    mut df: DataFrame,
    dataset: &DatasetConfig,
    partition_value: &str,
) -> Result<DataFrame, LakeError> {
    normalize_column_names(&mut df)?;

    let df = strip_text_cells(&df)?;
    let df = drop_empty_rows(&df)?;
    let mut df = coerce_types(df, dataset)?;

    let stamp = vec![partition_value; df.height()];
    df.with_column(Column::new(INGEST_DATE_COLUMN.into(), stamp))?;

    Ok(df)
}

/// Lê o arquivo bruto de uma partição e devolve a tabela validada.
pub fn validate_file(
    path: &Path,
    dataset: &DatasetConfig,
    partition: &Partition,
) -> Result<ValidatedTable, LakeError> {
    let decoded = read_csv_tolerant(path, dataset.separator as u8)?;
    let raw_height = decoded.frame.height();

    let frame = validate_frame(decoded.frame, dataset, &partition.value)?;

    info!(
        path = %path.display(),
        encoding = %decoded.encoding,
        rows_in = raw_height,
        rows_out = frame.height(),
        "tabela validada"
    );

    Ok(ValidatedTable {
        frame,
        encoding: decoded.encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::parse_csv;
    use std::collections::BTreeMap;

    fn dataset(columns: &[(&str, ColumnType)]) -> DatasetConfig {
        DatasetConfig {
            file: "x.csv".to_string(),
            separator: ',',
            date_formats: vec!["%Y-%m-%d %H:%M:%S".to_string(), "%Y-%m-%d".to_string(), "%d/%m/%Y".to_string()],
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), *t))
                .collect::<BTreeMap<_, _>>(),
            canonical: None,
        }
    }

    #[test]
    fn column_names_become_upper_snake() {
        assert_eq!(normalize_column_name("Data Transação!"), "DATA_TRANSACAO");
        assert_eq!(normalize_column_name("  valor   transacao "), "VALOR_TRANSACAO");
        assert_eq!(normalize_column_name("num-loja"), "NUM_LOJA");
        assert_eq!(normalize_column_name("__Nível__Cliente__"), "NIVEL_CLIENTE");
        assert_eq!(normalize_column_name("CIDADE"), "CIDADE");
    }

    #[test]
    fn colliding_columns_fail_fast() {
        let mut df = parse_csv("Cidade,cidade \n a,b\n", b',').unwrap();
        let err = normalize_column_names(&mut df).unwrap_err();
        assert!(matches!(err, LakeError::Schema(_)));
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let mut df = parse_csv("Cidade,Nivel,\nManaus,1,\n", b',').unwrap();
        normalize_column_names(&mut df).unwrap();
        assert_eq!(names(&df), ["CIDADE", "NIVEL", "UNNAMED_2"]);

        let mut df = parse_csv("A,!!!\n1,2\n", b',').unwrap();
        normalize_column_names(&mut df).unwrap();
        assert_eq!(names(&df), ["A", "UNNAMED_1"]);
    }

    #[test]
    fn positional_name_still_checked_for_collision() {
        let mut df = parse_csv("Unnamed 1,!!!\n1,2\n", b',').unwrap();
        let err = normalize_column_names(&mut df).unwrap_err();
        assert!(matches!(err, LakeError::Schema(_)));
    }

    #[test]
    fn drops_only_fully_empty_rows() {
        let raw = "cidade,nivel\n Manaus ,1\n  ,  \n,\n , 2\n";
        let df = parse_csv(raw, b',').unwrap();
        let out = validate_frame(df, &dataset(&[]), "2024-02-15").unwrap();

        assert_eq!(out.height(), 2);
        let cidade = out.column("CIDADE").unwrap().str().unwrap();
        assert_eq!(cidade.get(0), Some("Manaus"));
        // célula vazia mantida como está
        assert_eq!(cidade.get(1), Some(""));
    }

    #[test]
    fn coercion_degrades_to_null() {
        let raw = "DATA,VALOR_TRANSACAO,NUM_LOJA\n\
                   2024-01-05 10:30:00,10.50,007\n\
                   31/12/2023,abc,0420\n\
                   ontem,,12\n";
        let df = parse_csv(raw, b',').unwrap();
        let cfg = dataset(&[
            ("DATA", ColumnType::Date),
            ("VALOR_TRANSACAO", ColumnType::Numeric),
            ("NUM_LOJA", ColumnType::Text),
            ("AUSENTE", ColumnType::Numeric),
        ]);
        let out = validate_frame(df, &cfg, "2024-02-15").unwrap();

        let data = out.column("DATA").unwrap();
        assert!(matches!(data.dtype(), DataType::Datetime(_, _)));
        assert_eq!(data.null_count(), 1);

        let valor = out.column("VALOR_TRANSACAO").unwrap().f64().unwrap();
        assert_eq!(valor.get(0), Some(10.5));
        assert_eq!(valor.get(1), None);
        assert_eq!(valor.get(2), None);

        let loja = out.column("NUM_LOJA").unwrap().str().unwrap();
        assert_eq!(loja.get(0), Some("007"));
        assert_eq!(loja.get(1), Some("0420"));

        assert!(out.column("AUSENTE").is_err());
    }

    #[test]
    fn stamps_partition_value() {
        let df = parse_csv("a\nx\ny\n", b',').unwrap();
        let out = validate_frame(df, &dataset(&[]), "2024-02-15").unwrap();

        let stamp = out.column(INGEST_DATE_COLUMN).unwrap().str().unwrap();
        assert!(stamp.into_iter().all(|v| v == Some("2024-02-15")));
    }

    #[test]
    fn parses_date_only_formats() {
        let formats = vec!["%Y-%m-%d".to_string()];
        let parsed = parse_datetime("2024-02-15", &formats).unwrap();
        assert_eq!(parsed.to_string(), "2024-02-15 00:00:00");
        assert!(parse_datetime("15/02/2024", &formats).is_none());
    }
}
