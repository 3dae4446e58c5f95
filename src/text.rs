//! Normalização de texto para comparação aproximada.
//!
//! Toda comparação do matcher acontece neste espaço normalizado, nunca
//! sobre o texto cru.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z\s]").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Remove acentos (NFKD sem marcas combinantes).
pub fn fold_accents(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Gera a chave normalizada de um valor: minúsculas, sem acentos, apenas
/// `[a-z]` e espaços.
///
/// `None` vira string vazia. A função é total e idempotente.
pub fn normalize(value: Option<&str>) -> String {
    let Some(raw) = value else {
        return String::new();
    };

    let folded = fold_accents(&raw.trim().to_lowercase());
    let replaced = NON_ALPHA.replace_all(&folded, " ");
    MULTI_SPACE.replace_all(&replaced, " ").trim().to_string()
}

/// Capitaliza cada sequência de letras ("sao PAULO" -> "Sao Paulo").
///
/// Qualquer caractere que não seja letra abre uma nova palavra, então
/// "são-paulo" vira "São-Paulo". Espaços repetidos viram um só.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut titled = String::with_capacity(word.len());
            let mut in_word = false;
            for c in word.chars() {
                if c.is_alphabetic() {
                    if in_word {
                        titled.extend(c.to_lowercase());
                    } else {
                        titled.extend(c.to_uppercase());
                    }
                    in_word = true;
                } else {
                    titled.push(c);
                    in_word = false;
                }
            }
            titled
        })
        .collect::<Vec<_>>()
        .join(" ")
}
