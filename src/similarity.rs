//! Estratégias de similaridade de strings na escala [0, 100].
//!
//! O matcher depende apenas do trait [`Similarity`]; a implementação
//! padrão é a razão ponderada ([`WeightedRatio`]), que combina a razão
//! simples de Indel com variantes por tokens e por janela parcial,
//! tolerante a diferenças de tamanho entre as strings.

use std::collections::BTreeSet;

/// Pontuação de similaridade entre duas strings já normalizadas.
pub trait Similarity {
    /// Retorna um valor em `[0, 100]`.
    fn score(&self, a: &str, b: &str) -> f64;
}

const UNBASE_SCALE: f64 = 0.95;

/// Razão ponderada token-aware ("weighted ratio").
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRatio;

impl Similarity for WeightedRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let ac: Vec<char> = a.chars().collect();
        let bc: Vec<char> = b.chars().collect();
        if ac.is_empty() || bc.is_empty() {
            return 0.0;
        }

        let shorter = ac.len().min(bc.len()) as f64;
        let longer = ac.len().max(bc.len()) as f64;
        let len_ratio = longer / shorter;

        let mut end_ratio = ratio_chars(&ac, &bc);

        if len_ratio < 1.5 {
            let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
            return end_ratio.max(token * UNBASE_SCALE).clamp(0.0, 100.0);
        }

        let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };

        end_ratio = end_ratio.max(partial_ratio_chars(&ac, &bc) * partial_scale);
        end_ratio
            .max(partial_token_ratio(a, b) * UNBASE_SCALE * partial_scale)
            .clamp(0.0, 100.0)
    }
}

/// Tamanho da maior subsequência comum (DP em duas linhas).
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Distância Indel: inserções + remoções para transformar `a` em `b`.
fn indel_distance(a: &[char], b: &[char]) -> usize {
    a.len() + b.len() - 2 * lcs_len(a, b)
}

fn normalized_similarity(distance: usize, lensum: usize) -> f64 {
    if lensum == 0 {
        return 100.0;
    }
    100.0 - 100.0 * distance as f64 / lensum as f64
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    normalized_similarity(indel_distance(a, b), a.len() + b.len())
}

/// Razão simples: `100 * 2 * LCS / (len(a) + len(b))`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    ratio_chars(&ac, &bc)
}

/// Melhor alinhamento de `needle` contra janelas de `haystack`, incluindo
/// prefixos e sufixos mais curtos que a agulha.
fn best_window(needle: &[char], haystack: &[char]) -> f64 {
    let n = needle.len();
    let m = haystack.len();
    let mut best: f64 = 0.0;

    for end in 1..n {
        best = best.max(ratio_chars(needle, &haystack[..end]));
    }

    for start in 0..=(m - n) {
        best = best.max(ratio_chars(needle, &haystack[start..start + n]));
        if best >= 100.0 {
            return 100.0;
        }
    }

    for start in (m - n + 1)..m {
        best = best.max(ratio_chars(needle, &haystack[start..]));
    }

    best
}

fn partial_ratio_chars(a: &[char], b: &[char]) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let mut best = best_window(short, long);
    if best < 100.0 && short.len() == long.len() {
        best = best.max(best_window(long, short));
    }
    best
}

/// Razão parcial: a string menor contra a melhor janela da maior.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    partial_ratio_chars(&ac, &bc)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Razão após ordenar os tokens de cada lado.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Razão sobre interseção e diferenças dos conjuntos de tokens.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersect: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    // Um lado contido no outro.
    if !intersect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let diff_ab_joined: Vec<char> = diff_ab.join(" ").chars().collect();
    let diff_ba_joined: Vec<char> = diff_ba.join(" ").chars().collect();

    let ab_len = diff_ab_joined.len();
    let ba_len = diff_ba_joined.len();
    let sect_len = intersect.join(" ").chars().count();

    let sep = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;

    let distance = indel_distance(&diff_ab_joined, &diff_ba_joined);
    let result = normalized_similarity(distance, sect_ab_len + sect_ba_len);

    if sect_len == 0 {
        return result;
    }

    // "sect" contra "sect + diff": a distância é só o trecho acrescentado.
    let sect_ab_ratio = normalized_similarity(sep + ab_len, sect_len + sect_ab_len);
    let sect_ba_ratio = normalized_similarity(sep + ba_len, sect_len + sect_ba_len);

    result.max(sect_ab_ratio).max(sect_ba_ratio)
}

/// Razão parcial sobre tokens ordenados (e sobre as diferenças).
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let split_a: Vec<&str> = a.split_whitespace().collect();
    let split_b: Vec<&str> = b.split_whitespace().collect();

    let tokens_a: BTreeSet<&str> = split_a.iter().copied().collect();
    let tokens_b: BTreeSet<&str> = split_b.iter().copied().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    if !tokens_a.is_disjoint(&tokens_b) {
        return 100.0;
    }

    let result = partial_ratio(&sorted_tokens(a), &sorted_tokens(b));

    // Sem tokens repetidos as diferenças são as próprias listas ordenadas.
    if split_a.len() == tokens_a.len() && split_b.len() == tokens_b.len() {
        return result;
    }

    let diff_ab = tokens_a.into_iter().collect::<Vec<_>>().join(" ");
    let diff_ba = tokens_b.into_iter().collect::<Vec<_>>().join(" ");
    result.max(partial_ratio(&diff_ab, &diff_ba))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "esperado {expected}, obtido {actual}"
        );
    }

    #[test]
    fn identical_strings_score_100() {
        approx(WeightedRatio.score("manaus", "manaus"), 100.0);
        approx(WeightedRatio.score("vale pre pago", "vale pre pago"), 100.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        approx(WeightedRatio.score("", "manaus"), 0.0);
        approx(WeightedRatio.score("manaus", ""), 0.0);
    }

    #[test]
    fn plain_ratio_is_indel_based() {
        approx(ratio("this is a test", "this is a test!"), 2.0 * 14.0 / 29.0 * 100.0);
        approx(ratio("abc", "xyz"), 0.0);
        approx(ratio("", ""), 100.0);
    }

    #[test]
    fn token_set_handles_subsets() {
        approx(token_set_ratio("sao paulo", "paulo sao sp"), 100.0);
        // Conjunto contido: escala UNBASE na razão ponderada.
        approx(WeightedRatio.score("sao paulo", "sao paulo sp"), 95.0);
    }

    #[test]
    fn token_sort_ignores_order() {
        approx(token_sort_ratio("pago pre vale", "vale pre pago"), 100.0);
    }

    #[test]
    fn partial_ratio_finds_substring() {
        approx(partial_ratio("recarga", "recarga digital"), 100.0);
        // Proporção 15/7 >= 1.5: caminho parcial com escala 0.9.
        approx(WeightedRatio.score("recarga", "recarga digital"), 90.0);
    }

    #[test]
    fn typo_stays_above_default_threshold() {
        let score = WeightedRatio.score("manaos", "manaus");
        approx(score, 2.0 * 5.0 / 12.0 * 100.0);
        assert!(score >= 80.0);
    }

    #[test]
    fn partial_token_path_reference_value() {
        approx(
            WeightedRatio.score("this is a test", "this is a new test!!!"),
            85.5,
        );
    }

    #[test]
    fn unrelated_labels_stay_low() {
        assert!(WeightedRatio.score("vale pre pago", "recarga digital") < 80.0);
    }

    #[test]
    fn scores_are_bounded_and_symmetric() {
        let pairs = [
            ("belem", "belem do para"),
            ("rio de janeiro", "janeiro rio"),
            ("a", "abcdefghijklmnop"),
            ("recarga digital", "digital"),
        ];
        for (a, b) in pairs {
            let ab = WeightedRatio.score(a, b);
            let ba = WeightedRatio.score(b, a);
            assert!((0.0..=100.0).contains(&ab));
            approx(ab, ba);
        }
    }
}
