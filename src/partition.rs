//! Endereçamento de partições `chave=valor` do lake.
//!
//! A tag é tratada como string opaca ordenável: para valores ISO
//! `YYYY-MM-DD` a ordem lexical coincide com a ordem de datas, e a tag
//! nunca é convertida em data.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::LakeError;

/// Um diretório de partição (ex: `landing/data=2024-02-15`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub path: PathBuf,
    pub key: String,
    pub value: String,
}

impl Partition {
    /// Caminho de uma nova partição sob `root` (não cria nada no disco).
    pub fn under(root: &Path, key: &str, value: &str) -> Self {
        Self {
            path: root.join(format!("{}={}", key, value)),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Nome do diretório (`chave=valor`).
    pub fn name(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    /// A mesma partição espelhada em outra camada (landing -> validated).
    pub fn mirrored(&self, root: &Path) -> Self {
        Self::under(root, &self.key, &self.value)
    }
}

/// Lista as partições `key=*` imediatamente abaixo de `root`.
///
/// Um `root` inexistente conta como vazio.
pub fn list_partitions(root: &Path, key: &str) -> Result<Vec<Partition>, LakeError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}=", key);
    let mut partitions = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(value) = name.strip_prefix(&prefix)
            && !value.is_empty()
        {
            partitions.push(Partition {
                path: entry.path(),
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    partitions.sort_by(|a, b| a.value.cmp(&b.value));
    Ok(partitions)
}

/// Retorna a partição mais recente (maior nome na ordem lexical).
///
/// # Errors
///
/// `LakeError::NotFound` quando não existe nenhuma partição `key=*`.
pub fn latest_partition(root: &Path, key: &str) -> Result<Partition, LakeError> {
    list_partitions(root, key)?
        .pop()
        .ok_or_else(|| LakeError::NotFound {
            root: root.to_path_buf(),
            key: key.to_string(),
        })
}
