//! Leitura tolerante de CSV em múltiplos encodings.
//!
//! Extratos legados chegam em UTF-8, Latin-1 ou Windows-1252. A leitura
//! tenta cada encoding na ordem fixa e fica com o primeiro que decodifica
//! e é aceito pelo parser CSV.

use std::borrow::Cow;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use polars::io::SerReader;
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::errors::LakeError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Encodings suportados, na ordem de tentativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "latin-1")]
    Latin1,
    #[serde(rename = "cp1252")]
    Cp1252,
}

impl TextEncoding {
    pub const FALLBACK_ORDER: [TextEncoding; 3] =
        [TextEncoding::Utf8, TextEncoding::Latin1, TextEncoding::Cp1252];

    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Cp1252 => "cp1252",
        }
    }

    /// Decodifica sem substituição: `None` se houver byte inválido.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            // ISO-8859-1 mapeia cada byte direto para U+0000..U+00FF.
            TextEncoding::Latin1 => Some(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            // Latin-1 aceita qualquer byte; cp1252 fica só pela paridade da ordem.
            TextEncoding::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Tabela lida e o encoding que funcionou.
#[derive(Debug, Clone)]
pub struct DecodedTable {
    pub frame: DataFrame,
    pub encoding: TextEncoding,
}

/// Faz o parse de um CSV já decodificado, com todas as colunas como texto.
pub fn parse_csv(text: &str, separator: u8) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        // 0 = nenhuma inferência: tudo entra como String
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(separator))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()
}

/// Tenta cada encoding de `FALLBACK_ORDER` sobre os bytes brutos.
///
/// # Errors
///
/// `LakeError::Decode` se nenhum encoding produzir um CSV válido.
pub fn parse_csv_tolerant(
    bytes: &[u8],
    separator: u8,
    origin: &Path,
) -> Result<DecodedTable, LakeError> {
    for encoding in TextEncoding::FALLBACK_ORDER {
        let Some(text) = encoding.decode(bytes) else {
            debug!(path = %origin.display(), %encoding, "bytes inválidos para o encoding");
            continue;
        };

        match parse_csv(&text, separator) {
            Ok(frame) => return Ok(DecodedTable { frame, encoding }),
            Err(e) => {
                debug!(path = %origin.display(), %encoding, error = %e, "parse CSV falhou");
            }
        }
    }

    Err(LakeError::Decode {
        path: origin.to_path_buf(),
        tried: TextEncoding::FALLBACK_ORDER
            .iter()
            .map(|e| e.label())
            .collect(),
    })
}

/// Lê um CSV do disco com fallback de encodings.
pub fn read_csv_tolerant(path: &Path, separator: u8) -> Result<DecodedTable, LakeError> {
    let bytes = fs::read(path)?;
    parse_csv_tolerant(&bytes, separator, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_wins_when_valid() {
        let bytes = "CIDADE,NIVEL\nSão Paulo,1\n".as_bytes();
        let table = parse_csv_tolerant(bytes, b',', Path::new("mem.csv")).unwrap();

        assert_eq!(table.encoding, TextEncoding::Utf8);
        assert_eq!(table.frame.shape(), (1, 2));
        let cidade = table.frame.column("CIDADE").unwrap().str().unwrap();
        assert_eq!(cidade.get(0), Some("São Paulo"));
    }

    #[test]
    fn latin1_decodes_every_byte() {
        let all: Vec<u8> = (0..=255).collect();
        let text = TextEncoding::Latin1.decode(&all).unwrap();
        assert_eq!(text.chars().count(), 256);
    }

    #[test]
    fn utf8_bom_is_dropped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"A,B\n1,2\n");
        let table = parse_csv_tolerant(&bytes, b',', Path::new("bom.csv")).unwrap();
        assert!(table.frame.column("A").is_ok());
    }

    #[test]
    fn falls_back_to_latin1() {
        // "Belém" em ISO-8859-1: 0xE9 sozinho é UTF-8 inválido.
        let bytes = b"CIDADE\nBel\xe9m\n";
        let table = parse_csv_tolerant(bytes, b',', Path::new("legacy.csv")).unwrap();

        assert_eq!(table.encoding, TextEncoding::Latin1);
        let cidade = table.frame.column("CIDADE").unwrap().str().unwrap();
        assert_eq!(cidade.get(0), Some("Belém"));
    }

    #[test]
    fn all_columns_are_text() {
        let table =
            parse_csv_tolerant(b"NUM_LOJA;VALOR\n007;10.5\n", b';', Path::new("t.csv")).unwrap();
        let loja = table.frame.column("NUM_LOJA").unwrap();
        assert_eq!(loja.dtype(), &DataType::String);
        assert_eq!(loja.str().unwrap().get(0), Some("007"));
    }

    #[test]
    fn cp1252_decodes_windows_punctuation() {
        let decoded = TextEncoding::Cp1252.decode(b"Recarga \x96 Digital").unwrap();
        assert_eq!(decoded, "Recarga \u{2013} Digital");
    }

    #[test]
    fn empty_file_is_decode_error() {
        let err = parse_csv_tolerant(b"", b',', Path::new("empty.csv")).unwrap_err();
        match err {
            LakeError::Decode { tried, .. } => assert_eq!(tried.len(), 3),
            other => panic!("erro inesperado: {other}"),
        }
    }
}
