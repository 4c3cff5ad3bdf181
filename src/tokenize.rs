//! Corpus tokenizer.
//!
//! Index build and query evaluation must produce identical tokens, so this is
//! the only tokenization routine in the crate. Characters outside ASCII
//! letters, digits and spaces become spaces, with one exception: a period
//! directly after a single letter survives when that letter starts or extends
//! an acronym (`U.S.` stays one token instead of splitting into `u` / `s`).

/// Tokenize a sequence of paragraph strings into lowercase tokens.
///
/// Paragraphs are joined with a single space before scanning, so tokens never
/// span a paragraph boundary.
pub fn tokenize_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    let joined = paragraphs
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    tokenize(&joined)
}

/// Tokenize a single string into lowercase tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == ' ' {
            cleaned.push(c);
        } else if c == '.' && extends_acronym(&cleaned) {
            cleaned.push('.');
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Whether a period at the current position continues an acronym: the scanned
/// text must end in a single letter whose predecessor is a word boundary — a
/// space, the start of the text, or the period of a previous letter-period
/// group.
fn extends_acronym(scanned: &str) -> bool {
    let mut rev = scanned.chars().rev();
    match rev.next() {
        Some(c) if c.is_ascii_alphabetic() => matches!(rev.next(), Some(' ') | Some('.') | None),
        _ => false,
    }
}
