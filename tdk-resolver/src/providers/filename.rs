//! Chapter and volume numbers from archive file names
//!
//! Handles the usual layouts: `Ch.12`, `Chapter_3.5`, `Vol.2 Ch.10`,
//! `Berserk 045`. A chapter marker (`ch`, `chap`, `chapter`) wins; otherwise
//! the first number not claimed by a volume marker is the chapter.

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
}

/// Split into lowercase letter runs and numbers; a dot is only a decimal
/// point when digits sit on both sides of it
fn tokenize(stem: &str) -> Vec<Token> {
    let chars: Vec<char> = stem.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            if let Ok(n) = text.parse::<f64>() {
                tokens.push(Token::Number(n));
            }
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token::Word(word.to_lowercase()));
        } else {
            i += 1;
        }
    }

    tokens
}

fn is_chapter_marker(word: &str) -> bool {
    matches!(word, "ch" | "chap" | "chapter" | "c")
}

fn is_volume_marker(word: &str) -> bool {
    matches!(word, "vol" | "volume" | "v")
}

/// Number directly following a word matching `marker`
fn number_after(tokens: &[Token], marker: fn(&str) -> bool) -> Option<f64> {
    tokens.windows(2).find_map(|pair| match pair {
        [Token::Word(w), Token::Number(n)] if marker(w) => Some(*n),
        _ => None,
    })
}

/// Chapter number of an archive file stem, if any
pub fn parse_chapter_number(stem: &str) -> Option<f64> {
    let tokens = tokenize(stem);

    if let Some(n) = number_after(&tokens, is_chapter_marker) {
        return Some(n);
    }

    let mut after_volume_marker = false;
    for token in &tokens {
        match token {
            Token::Word(w) => after_volume_marker = is_volume_marker(w),
            Token::Number(n) if !after_volume_marker => return Some(*n),
            Token::Number(_) => after_volume_marker = false,
        }
    }
    None
}

/// Volume number of an archive file stem, if it names one
pub fn parse_volume_number(stem: &str) -> Option<f64> {
    number_after(&tokenize(stem), is_volume_marker)
}

/// One decimal place, with a trailing `.0` dropped: `3` → "3", `3.5` → "3.5"
pub fn normalize_chapter_number(number: f64) -> String {
    let text = format!("{:.1}", number);
    match text.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => text,
    }
}

/// Zero-padded volume label: `2` → "002"
pub fn volume_label(number: f64) -> String {
    format!("{:03.0}", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_markers() {
        assert_eq!(parse_chapter_number("Ch.12"), Some(12.0));
        assert_eq!(parse_chapter_number("Chapter_3.5"), Some(3.5));
        assert_eq!(parse_chapter_number("Vol.2 Ch.10"), Some(10.0));
        assert_eq!(parse_chapter_number("Dorohedoro c045 [Group]"), Some(45.0));
        assert_eq!(parse_chapter_number("ch7"), Some(7.0));
    }

    #[test]
    fn test_bare_numbers() {
        assert_eq!(parse_chapter_number("Berserk 045"), Some(45.0));
        assert_eq!(parse_chapter_number("Vol.3 - 21"), Some(21.0));
        assert_eq!(parse_chapter_number("Extras"), None);
    }

    #[test]
    fn test_trailing_dot_is_not_decimal() {
        assert_eq!(parse_chapter_number("Ch.12."), Some(12.0));
        assert_eq!(parse_chapter_number("12.cbz"), Some(12.0));
    }

    #[test]
    fn test_volume_numbers() {
        assert_eq!(parse_volume_number("Vol.2 Ch.10"), Some(2.0));
        assert_eq!(parse_volume_number("Volume 11 Chapter 90"), Some(11.0));
        assert_eq!(parse_volume_number("Ch.10"), None);
    }

    #[test]
    fn test_normalize_chapter_number() {
        assert_eq!(normalize_chapter_number(3.0), "3");
        assert_eq!(normalize_chapter_number(3.5), "3.5");
        assert_eq!(normalize_chapter_number(0.0), "0");
    }

    #[test]
    fn test_volume_label_is_zero_padded() {
        assert_eq!(volume_label(2.0), "002");
        assert_eq!(volume_label(0.0), "000");
        assert_eq!(volume_label(123.0), "123");
    }
}
