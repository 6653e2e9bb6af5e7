//! Weighted string similarity.
//!
//! Scores are integers in `[0, 100]`. The weighted ratio picks the best of
//! several measures:
//!
//! - plain ratio, `2*M/T` over the matching blocks of the two strings
//! - token-sort ratio, comparing the strings with their words sorted
//! - token-set ratio, comparing the shared words against each side's extras
//!
//! When one string is at least 1.5 times longer than the other, the partial
//! (best window) variants are used instead, scaled down so a substring hit
//! never outranks an exact match.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.90;
const LONG_PARTIAL_SCALE: f64 = 0.60;

/// Normalize a string before scoring.
///
/// Drops characters in the Latin-1 upper half, turns every non-word character
/// into a space, lowercases and trims.
pub fn normalize(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !(128..256).contains(&(*c as u32)))
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    cleaned.to_lowercase().trim().to_string()
}

/// Weighted ratio of two raw strings.
pub fn weighted_ratio(s1: &str, s2: &str) -> u8 {
    let p1: Vec<char> = normalize(s1).chars().collect();
    let p2: Vec<char> = normalize(s2).chars().collect();
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }

    let base = ratio(&p1, &p2) as f64;
    let longer = p1.len().max(p2.len()) as f64;
    let shorter = p1.len().min(p2.len()) as f64;
    let len_ratio = longer / shorter;

    let best = if len_ratio < 1.5 {
        let tsor = token_sort(&p1, &p2, false) as f64 * UNBASE_SCALE;
        let tser = token_set(&p1, &p2, false) as f64 * UNBASE_SCALE;
        base.max(tsor).max(tser)
    } else {
        let scale = if len_ratio > 8.0 {
            LONG_PARTIAL_SCALE
        } else {
            PARTIAL_SCALE
        };
        let partial = partial_ratio(&p1, &p2) as f64 * scale;
        let ptsor = token_sort(&p1, &p2, true) as f64 * UNBASE_SCALE * scale;
        let ptser = token_set(&p1, &p2, true) as f64 * UNBASE_SCALE * scale;
        base.max(partial).max(ptsor).max(ptser)
    };

    round_score(best)
}

/// Plain ratio on already-normalized text.
pub fn simple_ratio(s1: &str, s2: &str) -> u8 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    ratio(&a, &b)
}

/// Scores above `threshold`, best first. Ties keep `choices` order.
pub fn extract<'a, I>(query: &str, choices: I, threshold: u8) -> Vec<(&'a str, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(&str, u8)> = choices
        .into_iter()
        .map(|choice| (choice, weighted_ratio(query, choice)))
        .filter(|(_, score)| *score > threshold)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
}

fn round_score(score: f64) -> u8 {
    score.round_ties_even().clamp(0.0, 100.0) as u8
}

fn ratio(a: &[char], b: &[char]) -> u8 {
    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    round_score(100.0 * sequence_ratio(a, b))
}

fn sequence_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = matching_blocks(a, b).iter().map(|block| block.2).sum();
    2.0 * matched as f64 / total as f64
}

fn partial_ratio(a: &[char], b: &[char]) -> u8 {
    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut best = 0.0f64;
    for (i, j, _) in matching_blocks(shorter, longer) {
        let start = j.saturating_sub(i);
        let end = (start + shorter.len()).min(longer.len());
        let window = &longer[start.min(longer.len())..end];
        let r = sequence_ratio(shorter, window);
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    round_score(100.0 * best)
}

fn tokens(s: &[char]) -> Vec<String> {
    let text: String = s.iter().collect();
    text.split_whitespace().map(str::to_string).collect()
}

fn token_sort(a: &[char], b: &[char], partial: bool) -> u8 {
    let sorted = |s: &[char]| -> Vec<char> {
        let mut words = tokens(s);
        words.sort();
        words.join(" ").chars().collect()
    };
    let (sa, sb) = (sorted(a), sorted(b));
    if partial {
        partial_ratio(&sa, &sb)
    } else {
        ratio(&sa, &sb)
    }
}

fn token_set(a: &[char], b: &[char], partial: bool) -> u8 {
    let set_a: BTreeSet<String> = tokens(a).into_iter().collect();
    let set_b: BTreeSet<String> = tokens(b).into_iter().collect();

    let join = |words: Vec<&String>| -> String {
        words.into_iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    };
    let sect = join(set_a.intersection(&set_b).collect());
    let diff_ab = join(set_a.difference(&set_b).collect());
    let diff_ba = join(set_b.difference(&set_a).collect());

    let combined_ab: Vec<char> = format!("{} {}", sect, diff_ab).trim().chars().collect();
    let combined_ba: Vec<char> = format!("{} {}", sect, diff_ba).trim().chars().collect();
    let sect: Vec<char> = sect.trim().chars().collect();

    let score = |x: &[char], y: &[char]| {
        if partial {
            partial_ratio(x, y)
        } else {
            ratio(x, y)
        }
    };
    score(&sect, &combined_ab)
        .max(score(&sect, &combined_ba))
        .max(score(&combined_ab, &combined_ba))
}

/// Longest common block within `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Among equally long blocks the one starting earliest in `a` wins, then the
/// one starting earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0usize);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                cur[slot] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Non-overlapping matching blocks `(i, j, len)` in ascending order, adjacent
/// blocks merged, terminated by a `(a.len(), b.len(), 0)` sentinel.
fn matching_blocks(a: &[char], b: &[char]) -> Vec<(usize, usize, usize)> {
    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        blocks.push((i, j, k));
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    blocks.sort_unstable();

    let mut merged: Vec<(usize, usize, usize)> = Vec::with_capacity(blocks.len() + 1);
    for (i, j, k) in blocks {
        match merged.last_mut() {
            Some(last) if last.0 + last.2 == i && last.1 + last.2 == j => last.2 += k,
            _ => merged.push((i, j, k)),
        }
    }
    merged.push((a.len(), b.len(), 0));
    merged
}
