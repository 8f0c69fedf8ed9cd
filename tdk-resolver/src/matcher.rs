//! Title normalization and fuzzy matching
//!
//! Provider search results are ranked against the library's own titles.
//! Scoring has two passes:
//! - Jaro-Winkler over the candidate's titles, Romaji titles first, then
//!   titles in other scripts. Tolerant of prefix/suffix noise such as
//!   "Season 2" or subtitles.
//! - Sørensen-Dice bigram overlap, consulted only when the best Jaro-Winkler
//!   score is below [`PRIMARY_SIGNAL_FLOOR`]. Catches reordered words.
//!
//! Manga and streaming results go through the same contract.

use crate::error::ResolveError;
use crate::providers::SearchResult;

/// Minimum Jaro-Winkler score treated as a usable primary signal
pub const PRIMARY_SIGNAL_FLOOR: f64 = 0.7;

/// Punctuation allowed inside a Romaji title
const ROMAJI_PUNCTUATION: &[char] = &['\'', '-', '!', '?', ',', '.', ':'];

/// Script family of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Romaji,
    Other,
}

/// Lower-case, drop punctuation and symbols, collapse whitespace
///
/// # Examples
///
/// ```
/// use tdk_resolver::matcher::normalize;
///
/// assert_eq!(normalize("  Re:Zero -  Starting Life! "), "rezero starting life");
/// ```
pub fn normalize(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hiragana, Katakana and Han ideographs
fn is_japanese(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'     // Hiragana
        | '\u{30A0}'..='\u{30FF}'   // Katakana
        | '\u{31F0}'..='\u{31FF}'   // Katakana phonetic extensions
        | '\u{FF66}'..='\u{FF9F}'   // Half-width Katakana
        | '\u{3400}'..='\u{4DBF}'   // CJK extension A
        | '\u{4E00}'..='\u{9FFF}'   // CJK unified ideographs
        | '\u{F900}'..='\u{FAFF}'   // CJK compatibility ideographs
        | '\u{20000}'..='\u{2A6DF}' // CJK extension B
    )
}

pub fn classify_script(title: &str) -> Script {
    let romaji = title.chars().all(|c| {
        if is_japanese(c) {
            return false;
        }
        c.is_alphanumeric() || c.is_whitespace() || ROMAJI_PUNCTUATION.contains(&c)
    });

    if romaji {
        Script::Romaji
    } else {
        Script::Other
    }
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c,
            '\u{00C0}'..='\u{024F}'   // Latin-1 supplement, extended A/B
            | '\u{1E00}'..='\u{1EFF}' // Latin extended additional
        )
}

/// More than half of the title's letters are Latin (titles without letters count as Latin)
///
/// Providers search against Latin-script catalogs, so other titles are not sent.
pub fn is_mostly_latin(title: &str) -> bool {
    let (latin, letters) = title
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(latin, letters), c| {
            (latin + usize::from(is_latin_letter(c)), letters + 1)
        });

    letters == 0 || latin * 2 > letters
}

fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Normalized candidate titles, Romaji first, deduplicated, input order otherwise kept
fn ordered_candidate_titles(candidate: &SearchResult) -> Vec<String> {
    let all = std::iter::once(&candidate.title).chain(candidate.synonyms.iter());

    let (romaji, other): (Vec<&String>, Vec<&String>) =
        all.partition(|t| classify_script(t) == Script::Romaji);

    let mut ordered: Vec<String> = Vec::new();
    for title in romaji.into_iter().chain(other) {
        let normalized = normalize(title);
        if !normalized.is_empty() && !ordered.contains(&normalized) {
            ordered.push(normalized);
        }
    }
    ordered
}

/// Similarity of `query` to the best of the candidate's titles, in [0, 1]
pub fn score(query: &str, candidate: &SearchResult) -> f64 {
    let query = normalize(query);
    if query.is_empty() {
        return 0.0;
    }

    let titles = ordered_candidate_titles(candidate);

    let primary = titles
        .iter()
        .map(|t| strsim::jaro_winkler(&query, t))
        .fold(0.0_f64, f64::max);

    if primary >= PRIMARY_SIGNAL_FLOOR {
        return clamp_rating(primary);
    }

    let secondary = titles
        .iter()
        .map(|t| strsim::sorensen_dice(&query, t))
        .fold(0.0_f64, f64::max);

    clamp_rating(primary.max(secondary))
}

/// Score a provider's results against `query`
///
/// Providers that rate their own results keep those ratings (clamped into
/// [0, 1]); only an entirely unrated result set is scored here.
pub fn hydrate_ratings(query: &str, results: &mut [SearchResult]) {
    if results.iter().all(|r| r.rating == 0.0) {
        for result in results.iter_mut() {
            result.rating = score(query, result);
        }
    } else {
        for result in results.iter_mut() {
            result.rating = clamp_rating(result.rating);
        }
    }
}

/// Result with the strictly greatest rating; the earliest wins ties
pub fn select_best(results: &[SearchResult]) -> Result<&SearchResult, ResolveError> {
    let mut iter = results.iter();
    let first = iter
        .next()
        .ok_or(ResolveError::NoResults { last_error: None })?;

    Ok(iter.fold(first, |best, r| if r.rating > best.rating { r } else { best }))
}
