//! Implementações de traits para os enums de erro do sistema
//!
//! Este módulo existe exclusivamente para desacoplar:
//! - definição de erros (enums)
//! - implementação de traits (`Display`, `Error`, `From`)

use std::error::Error as StdError;
use std::fmt;

use polars::prelude::PolarsError;

use crate::errors::LakeError;

/* ========================================================================== */
/* Display                                                                    */
/* ========================================================================== */

impl fmt::Display for LakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LakeError::Io(err) => {
                write!(f, "[I/O] {}", err)
            }

            LakeError::Json(err) => {
                write!(f, "[JSON] {}", err)
            }

            LakeError::Polars(err) => {
                write!(f, "[Polars] {}", err)
            }

            LakeError::Config(msg) => {
                write!(f, "[Config] {}", msg)
            }

            LakeError::NotFound { root, key } => {
                write!(
                    f,
                    "[NotFound] Nenhuma partição '{}=*' encontrada em {}",
                    key,
                    root.display()
                )
            }

            LakeError::Decode { path, tried } => {
                write!(
                    f,
                    "[Decode] Falha ao ler {} (encodings tentados: {})",
                    path.display(),
                    tried.join(", ")
                )
            }

            LakeError::Schema(msg) => {
                write!(f, "[Schema] {}", msg)
            }

            LakeError::Dataset {
                dataset,
                path,
                source,
            } => {
                write!(f, "[{}] {}: {}", dataset, path.display(), source)
            }
        }
    }
}

/* ========================================================================== */
/* std::error::Error                                                          */
/* ========================================================================== */

impl StdError for LakeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LakeError::Io(err) => Some(err),
            LakeError::Json(err) => Some(err),
            LakeError::Dataset { source, .. } => Some(source.as_ref()),
            LakeError::Polars(_)
            | LakeError::Config(_)
            | LakeError::NotFound { .. }
            | LakeError::Decode { .. }
            | LakeError::Schema(_) => None,
        }
    }
}

/* ========================================================================== */
/* Conversions                                                                */
/* ========================================================================== */

impl From<std::io::Error> for LakeError {
    fn from(err: std::io::Error) -> Self {
        LakeError::Io(err)
    }
}

impl From<serde_json::Error> for LakeError {
    fn from(err: serde_json::Error) -> Self {
        LakeError::Json(err)
    }
}

impl From<PolarsError> for LakeError {
    fn from(err: PolarsError) -> Self {
        LakeError::Polars(err.to_string())
    }
}

impl From<toml::de::Error> for LakeError {
    fn from(err: toml::de::Error) -> Self {
        LakeError::Config(format!("Erro no TOML: {}", err))
    }
}
