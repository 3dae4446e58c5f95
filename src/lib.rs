//! # Bronze Lake
//!
//! Ingestão, validação e padronização canônica de extratos CSV em um data
//! lake particionado por data (`data=AAAA-MM-DD`).

pub mod audit;
pub mod encoding;
pub mod errors;
pub mod impl_errors;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod partition;
pub mod processor;
pub mod schema;
pub mod similarity;
pub mod text;
pub mod vocabulary;
