//! # Camada Bronze (Ingestão)
//!
//! - Congela os arquivos brutos em `<landing>/data=<data>/<dataset>/`
//! - Gera metadados (sha256, encoding usado, contagem de linhas/colunas)
//! - Registra cada ingestão no catálogo em JSON Lines
//!
//! Um arquivo congelado nunca é sobrescrito: reingestões na mesma partição
//! apenas recalculam os metadados e marcam `already_frozen`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::encoding::{TextEncoding, parse_csv_tolerant};
use crate::errors::LakeError;
use crate::models::DatasetConfig;
use crate::partition::Partition;

/// Linha do catálogo de ingestão.
#[derive(Debug, Clone, Serialize)]
pub struct IngestRecord {
    pub dataset: String,
    pub partition: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub sha256: String,
    pub bytes: u64,
    pub encoding: TextEncoding,
    pub rows: usize,
    pub columns: usize,
    pub already_frozen: bool,
    pub ingested_at: DateTime<Utc>,
}

/// SHA-256 em hexadecimal minúsculo.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn progress_bar(total: u64, label: &Path) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(format!("Congelando {}", label.display()));
    pb
}

/// Copia `source` para `target` e marca o destino como somente leitura.
///
/// A cópia vai primeiro para um arquivo `.partial`, renomeado só após o
/// sucesso. Retorna `false` se `target` já existia (nada é escrito).
pub fn freeze_file(source: &Path, target: &Path) -> Result<bool, LakeError> {
    if target.exists() {
        return Ok(false);
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let input = File::open(source)?;
    let total = input.metadata()?.len();
    let partial = target.with_extension("partial");

    let copied = (|| -> io::Result<()> {
        let pb = progress_bar(total, source);
        let mut reader = pb.wrap_read(input);
        let mut writer = BufWriter::new(File::create(&partial)?);
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        pb.finish_and_clear();
        Ok(())
    })();

    if let Err(e) = copied {
        let _ = fs::remove_file(&partial);
        return Err(LakeError::Io(e));
    }

    fs::rename(&partial, target)?;

    let mut permissions = fs::metadata(target)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(target, permissions)?;

    Ok(true)
}

/// Acrescenta um registro ao catálogo JSON Lines.
pub fn append_catalog(catalog: &Path, record: &IngestRecord) -> Result<(), LakeError> {
    if let Some(parent) = catalog.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(catalog)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Congela o extrato bruto de um dataset na partição e coleta os metadados.
pub fn ingest_dataset(
    raw_root: &Path,
    name: &str,
    dataset: &DatasetConfig,
    partition: &Partition,
) -> Result<IngestRecord, LakeError> {
    let source = raw_root.join(&dataset.file);
    let target = partition.path.join(name).join(&dataset.file);

    let newly_frozen = freeze_file(&source, &target)?;
    if !newly_frozen {
        warn!(
            dataset = name,
            path = %target.display(),
            "arquivo já congelado nesta partição, mantendo o existente"
        );
    }

    let bytes = fs::read(&target)?;
    let decoded = parse_csv_tolerant(&bytes, dataset.separator as u8, &target)?;
    let (rows, columns) = decoded.frame.shape();

    let record = IngestRecord {
        dataset: name.to_string(),
        partition: partition.name(),
        source,
        target,
        sha256: sha256_hex(&bytes),
        bytes: bytes.len() as u64,
        encoding: decoded.encoding,
        rows,
        columns,
        already_frozen: !newly_frozen,
        ingested_at: Utc::now(),
    };

    info!(
        dataset = name,
        sha256 = %record.sha256,
        encoding = %record.encoding,
        rows,
        columns,
        "extrato congelado"
    );

    Ok(record)
}
