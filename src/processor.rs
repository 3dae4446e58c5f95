//! # Execução das Etapas do Lake
//!
//! ## Engenharia de Dados
//! Cada etapa lê a partição mais recente da camada anterior, processa cada
//! dataset de forma independente e substitui integralmente a própria saída.
//!
//! ## Princípios
//! - **Fail-Soft por dataset**: falha em um dataset não aborta os irmãos.
//! - **Fail-Fast por etapa**: sem partição de entrada não há o que processar.

use polars::prelude::StatisticsOptions;
use polars::prelude::*;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::audit::audit;
use crate::encoding::{TextEncoding, read_csv_tolerant};
use crate::errors::LakeError;
use crate::ingest::{IngestRecord, append_catalog, ingest_dataset};
use crate::matcher::{CanonicalMatcher, MatchColumns, MatchSummary};
use crate::models::{CanonicalConfig, Config, DatasetConfig};
use crate::partition::{Partition, latest_partition};
use crate::schema::validate_file;
use crate::vocabulary::VocabularySource;

/// Resultado de uma etapa para um dataset.
#[derive(Debug)]
pub struct DatasetOutcome<T> {
    pub dataset: String,
    pub result: Result<T, LakeError>,
}

impl<T> DatasetOutcome<T> {
    fn new(dataset: &str, result: Result<T, LakeError>) -> Self {
        if let Err(e) = &result {
            error!(dataset, error = %e, "falha no dataset");
        }
        Self {
            dataset: dataset.to_string(),
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub output: PathBuf,
    pub encoding: TextEncoding,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct CanonicalReport {
    pub final_path: PathBuf,
    pub parquet_path: Option<PathBuf>,
    pub audit_path: PathBuf,
    pub vocabulary_size: usize,
    pub inferred_vocabulary: bool,
    pub threshold: f64,
    pub summary: MatchSummary,
    pub audit_rows: usize,
}

/* ========================================================================== */
/* Caminhos                                                                   */
/* ========================================================================== */

pub fn dataset_dir(partition: &Partition, dataset: &str) -> PathBuf {
    partition.path.join(dataset)
}

pub fn validated_path(partition: &Partition, dataset: &str) -> PathBuf {
    dataset_dir(partition, dataset).join(format!("{}_validated.csv", dataset))
}

pub fn final_path(partition: &Partition, dataset: &str) -> PathBuf {
    dataset_dir(partition, dataset).join(format!("{}_final.csv", dataset))
}

/* ========================================================================== */
/* Escrita                                                                    */
/* ========================================================================== */

/// Grava (substituindo) um CSV com cabeçalho.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), LakeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path).map_err(LakeError::Io)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| LakeError::Polars(format!("Erro ao gravar CSV {}: {}", path.display(), e)))?;
    Ok(())
}

/// Grava Parquet com compressão Snappy e estatísticas de coluna.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), LakeError> {
    let file_out = File::create(path).map_err(LakeError::Io)?;

    let stats_options = StatisticsOptions {
        min_value: true,
        max_value: true,
        null_count: true,
        distinct_count: false,
    };

    ParquetWriter::new(file_out)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(stats_options)
        .finish(df)
        .map_err(|e| LakeError::Polars(format!("Erro ao gravar Parquet: {}", e)))?;

    Ok(())
}

/* ========================================================================== */
/* Ingestão                                                                   */
/* ========================================================================== */

/// Congela os extratos brutos de todos os datasets na partição `ingest_date`.
pub fn run_ingest(
    config: &Config,
    ingest_date: &str,
) -> Result<Vec<DatasetOutcome<IngestRecord>>, LakeError> {
    if ingest_date.is_empty() || ingest_date.contains(['/', '\\']) {
        return Err(LakeError::Config(format!(
            "Data de ingestão inválida: '{}'",
            ingest_date
        )));
    }

    let partition = Partition::under(&config.paths.landing, &config.partition.key, ingest_date);
    info!(partition = %partition.path.display(), "ingestão iniciada");

    let outcomes = config
        .datasets
        .iter()
        .map(|(name, dataset)| {
            let result = ingest_dataset(&config.paths.raw, name, dataset, &partition)
                .and_then(|record| {
                    append_catalog(&config.paths.catalog, &record)?;
                    Ok(record)
                })
                .map_err(|e| e.in_dataset(name, config.paths.raw.join(&dataset.file)));
            DatasetOutcome::new(name, result)
        })
        .collect();

    Ok(outcomes)
}

/* ========================================================================== */
/* Validação                                                                  */
/* ========================================================================== */

fn validate_dataset(
    name: &str,
    dataset: &DatasetConfig,
    landing: &Partition,
    validated: &Partition,
) -> Result<ValidationReport, LakeError> {
    let input = dataset_dir(landing, name).join(&dataset.file);
    let output = validated_path(validated, name);

    let validated_table =
        validate_file(&input, dataset, landing).map_err(|e| e.in_dataset(name, &input))?;

    let mut frame = validated_table.frame;
    write_csv(&mut frame, &output).map_err(|e| e.in_dataset(name, &output))?;

    Ok(ValidationReport {
        output,
        encoding: validated_table.encoding,
        rows: frame.height(),
        columns: frame.width(),
    })
}

/// Valida a partição mais recente do landing, espelhando a mesma tag na
/// camada validada.
pub fn run_validation(
    config: &Config,
) -> Result<(Partition, Vec<DatasetOutcome<ValidationReport>>), LakeError> {
    let landing = latest_partition(&config.paths.landing, &config.partition.key)?;
    let validated = landing.mirrored(&config.validated_root());
    info!(partition = %landing.name(), "validação iniciada");

    let outcomes = config
        .datasets
        .iter()
        .map(|(name, dataset)| {
            DatasetOutcome::new(name, validate_dataset(name, dataset, &landing, &validated))
        })
        .collect();

    Ok((validated, outcomes))
}

/* ========================================================================== */
/* Padronização canônica                                                      */
/* ========================================================================== */

fn canonicalize_dataset(
    name: &str,
    canonical: &CanonicalConfig,
    partition: &Partition,
    write_parquet_copy: bool,
) -> Result<CanonicalReport, LakeError> {
    let input = validated_path(partition, name);
    let df = read_csv_tolerant(&input, b',')
        .map_err(|e| e.in_dataset(name, &input))?
        .frame;

    let column = df.column(&canonical.column).map_err(|_| {
        LakeError::Schema(format!(
            "Coluna '{}' não encontrada em {}",
            canonical.column,
            input.display()
        ))
        .in_dataset(name, &input)
    })?;

    // Origem do vocabulário decidida uma única vez.
    let source = VocabularySource::select(canonical).map_err(|e| e.in_dataset(name, &input))?;
    let vocabulary = source
        .resolve(column)
        .map_err(|e| e.in_dataset(name, &input))?;
    let inferred_vocabulary = matches!(source, VocabularySource::Inferred { .. });

    let matcher = CanonicalMatcher::new(vocabulary, canonical.threshold);
    let columns = MatchColumns::from(canonical);

    let (mut standardized, summary) = matcher
        .standardize(&df, columns)
        .map_err(|e| e.in_dataset(name, &input))?;

    let final_csv = final_path(partition, name);
    write_csv(&mut standardized, &final_csv).map_err(|e| e.in_dataset(name, &final_csv))?;

    let parquet_path = if write_parquet_copy {
        let path = final_csv.with_extension("parquet");
        write_parquet(&mut standardized, &path).map_err(|e| e.in_dataset(name, &path))?;
        Some(path)
    } else {
        None
    };

    let mut audit_table =
        audit(&standardized, columns).map_err(|e| e.in_dataset(name, &input))?;
    let audit_path = dataset_dir(partition, name).join(canonical.audit_file_name(name));
    write_csv(&mut audit_table, &audit_path).map_err(|e| e.in_dataset(name, &audit_path))?;

    info!(
        dataset = name,
        coverage = %format!("{:.1}%", summary.coverage()),
        threshold = canonical.threshold,
        distinct = summary.distinct_values,
        "padronização concluída"
    );

    Ok(CanonicalReport {
        final_path: final_csv,
        parquet_path,
        audit_path,
        vocabulary_size: matcher.vocabulary().len(),
        inferred_vocabulary,
        threshold: canonical.threshold,
        summary,
        audit_rows: audit_table.height(),
    })
}

/// Padroniza as colunas categóricas da partição validada mais recente.
///
/// Datasets sem seção `canonical` são ignorados.
pub fn run_canonicalization(
    config: &Config,
) -> Result<(Partition, Vec<DatasetOutcome<CanonicalReport>>), LakeError> {
    let partition = latest_partition(&config.validated_root(), &config.partition.key)?;
    info!(partition = %partition.name(), "padronização iniciada");

    let mut outcomes = Vec::new();
    for (name, dataset) in &config.datasets {
        let Some(canonical) = &dataset.canonical else {
            debug!(dataset = %name, "sem seção canonical, ignorando");
            continue;
        };
        outcomes.push(DatasetOutcome::new(
            name,
            canonicalize_dataset(name, canonical, &partition, config.output.parquet),
        ));
    }

    Ok((partition, outcomes))
}
