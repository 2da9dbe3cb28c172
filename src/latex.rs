//! LaTeX to plain-text / Markdown conversion.
//!
//! Bibliography values are written for LaTeX (`\'{e}`, `--`, `\emph{...}`).
//! This module turns them into text that can be dropped into a Markdown page.
//! It is a pure string transform and knows nothing about entries or fields.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// Symbol accents: `\'e`, `\'{e}`, `\"{\i}`, `{\'e}`.
    static ref SYMBOL_ACCENT: Regex =
        Regex::new(r#"\\([`'^"~=.])\s*(?:\{\s*(\\?[A-Za-z])\s*\}|(\\?[A-Za-z]))"#)
            .expect("valid accent regex");

    /// Letter accents need a brace or a space before the base: `\c{c}`, `\v s`.
    static ref LETTER_ACCENT: Regex =
        Regex::new(r"\\([cvuHkr])(?:\s*\{\s*(\\?[A-Za-z])\s*\}|\s+([A-Za-z]))")
            .expect("valid letter accent regex");

    /// Standalone letters such as `\ss` or `\o`, optionally followed by `{}`.
    static ref SPECIAL_LETTER: Regex =
        Regex::new(r"\\(ss|ae|AE|oe|OE|aa|AA|o|O|l|L|i|j)\b(?:\{\}|\s+)?")
            .expect("valid special letter regex");

    static ref HREF: Regex = Regex::new(r"\\href\{([^{}]*)\}\{([^{}]*)\}").expect("valid href regex");

    static ref FORMATTING: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"\\textbf\{([^{}]*)\}").expect("valid regex"), "**$1**"),
        (Regex::new(r"\\textit\{([^{}]*)\}").expect("valid regex"), "*$1*"),
        (Regex::new(r"\\emph\{([^{}]*)\}").expect("valid regex"), "*$1*"),
        (Regex::new(r"\\textsuperscript\{([^{}]*)\}").expect("valid regex"), "<sup>$1</sup>"),
        (Regex::new(r"\\textsubscript\{([^{}]*)\}").expect("valid regex"), "<sub>$1</sub>"),
        (Regex::new(r"\\(?:url|texttt|textrm|textsc|mbox)\{([^{}]*)\}").expect("valid regex"), "$1"),
    ];

    static ref GROUPING_BRACES: Regex = Regex::new(r"\{([^{}]*)\}").expect("valid brace regex");

    static ref LEFTOVER_COMMAND: Regex = Regex::new(r"\\[A-Za-z]+\s*").expect("valid command regex");

    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid whitespace regex");
}

/// Named symbols, matched before any command stripping. Longest first.
const SYMBOLS: &[(&str, &str)] = &[
    ("\\textemdash", "—"),
    ("\\textendash", "–"),
    ("\\ldots", "…"),
    ("\\dots", "…"),
    ("\\textregistered", "®"),
    ("\\texttrademark", "™"),
    ("\\copyright", "©"),
    ("\\pounds", "£"),
    ("\\euro", "€"),
    ("\\&", "&"),
    ("\\%", "%"),
    ("\\$", "$"),
    ("\\#", "#"),
    ("\\_", "_"),
    ("\\{", "\u{0}LBRACE\u{0}"),
    ("\\}", "\u{0}RBRACE\u{0}"),
    ("\\ ", " "),
    ("``", "\u{201c}"),
    ("''", "\u{201d}"),
    ("---", "—"),
    ("--", "–"),
    ("~", " "),
];

/// Converts LaTeX markup in a field value to Markdown / plain text.
///
/// # Examples
///
/// ```
/// use bib_pages::latex::to_markdown;
///
/// assert_eq!(to_markdown(r"Caf\'{e} -- \emph{open}"), "Café – *open*");
/// ```
pub fn to_markdown(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let mut text = SYMBOL_ACCENT
        .replace_all(input, |caps: &Captures| accent_replacement(caps))
        .into_owned();
    text = LETTER_ACCENT
        .replace_all(&text, |caps: &Captures| accent_replacement(caps))
        .into_owned();
    text = SPECIAL_LETTER
        .replace_all(&text, |caps: &Captures| special_letter(&caps[1]).to_string())
        .into_owned();

    for (pattern, replacement) in SYMBOLS {
        text = text.replace(pattern, replacement);
    }

    text = HREF.replace_all(&text, "[$2]($1)").into_owned();
    // Commands match innermost first, so nested ones need further passes.
    loop {
        let mut next = text.clone();
        for (pattern, replacement) in FORMATTING.iter() {
            next = pattern.replace_all(&next, *replacement).into_owned();
        }
        if next == text {
            break;
        }
        text = next;
    }

    text = LEFTOVER_COMMAND.replace_all(&text, "").into_owned();

    // Innermost groups first until no braces are left to unwrap.
    loop {
        let next = GROUPING_BRACES.replace_all(&text, "$1").into_owned();
        if next == text {
            break;
        }
        text = next;
    }

    text = text
        .replace("\u{0}LBRACE\u{0}", "{")
        .replace("\u{0}RBRACE\u{0}", "}");

    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn accent_replacement(caps: &Captures) -> String {
    let accent = caps[1].chars().next().unwrap_or_default();
    let base = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default();

    // `\i` and `\j` are the dotless bases used under accents.
    let base_char = match base {
        "\\i" => 'i',
        "\\j" => 'j',
        other => other.chars().next().unwrap_or_default(),
    };

    match compose(accent, base_char) {
        Some(c) => c.to_string(),
        None => base_char.to_string(),
    }
}

fn special_letter(name: &str) -> &'static str {
    match name {
        "ss" => "ß",
        "ae" => "æ",
        "AE" => "Æ",
        "oe" => "œ",
        "OE" => "Œ",
        "aa" => "å",
        "AA" => "Å",
        "o" => "ø",
        "O" => "Ø",
        "l" => "ł",
        "L" => "Ł",
        "i" => "ı",
        "j" => "ȷ",
        _ => "",
    }
}

/// Precomposed character for an accent command applied to a base letter.
#[rustfmt::skip]
fn compose(accent: char, base: char) -> Option<char> {
    let composed = match (accent, base) {
        ('\'', 'a') => 'á', ('\'', 'A') => 'Á',
        ('\'', 'e') => 'é', ('\'', 'E') => 'É',
        ('\'', 'i') => 'í', ('\'', 'I') => 'Í',
        ('\'', 'o') => 'ó', ('\'', 'O') => 'Ó',
        ('\'', 'u') => 'ú', ('\'', 'U') => 'Ú',
        ('\'', 'y') => 'ý', ('\'', 'Y') => 'Ý',
        ('\'', 'c') => 'ć', ('\'', 'C') => 'Ć',
        ('\'', 'n') => 'ń', ('\'', 'N') => 'Ń',
        ('\'', 's') => 'ś', ('\'', 'S') => 'Ś',
        ('\'', 'z') => 'ź', ('\'', 'Z') => 'Ź',
        ('`', 'a') => 'à', ('`', 'A') => 'À',
        ('`', 'e') => 'è', ('`', 'E') => 'È',
        ('`', 'i') => 'ì', ('`', 'I') => 'Ì',
        ('`', 'o') => 'ò', ('`', 'O') => 'Ò',
        ('`', 'u') => 'ù', ('`', 'U') => 'Ù',
        ('^', 'a') => 'â', ('^', 'A') => 'Â',
        ('^', 'e') => 'ê', ('^', 'E') => 'Ê',
        ('^', 'i') => 'î', ('^', 'I') => 'Î',
        ('^', 'o') => 'ô', ('^', 'O') => 'Ô',
        ('^', 'u') => 'û', ('^', 'U') => 'Û',
        ('"', 'a') => 'ä', ('"', 'A') => 'Ä',
        ('"', 'e') => 'ë', ('"', 'E') => 'Ë',
        ('"', 'i') => 'ï', ('"', 'I') => 'Ï',
        ('"', 'o') => 'ö', ('"', 'O') => 'Ö',
        ('"', 'u') => 'ü', ('"', 'U') => 'Ü',
        ('"', 'y') => 'ÿ', ('"', 'Y') => 'Ÿ',
        ('~', 'a') => 'ã', ('~', 'A') => 'Ã',
        ('~', 'n') => 'ñ', ('~', 'N') => 'Ñ',
        ('~', 'o') => 'õ', ('~', 'O') => 'Õ',
        ('=', 'a') => 'ā', ('=', 'A') => 'Ā',
        ('=', 'e') => 'ē', ('=', 'E') => 'Ē',
        ('=', 'i') => 'ī', ('=', 'I') => 'Ī',
        ('=', 'o') => 'ō', ('=', 'O') => 'Ō',
        ('=', 'u') => 'ū', ('=', 'U') => 'Ū',
        ('.', 'z') => 'ż', ('.', 'Z') => 'Ż',
        ('.', 'e') => 'ė', ('.', 'E') => 'Ė',
        ('c', 'c') => 'ç', ('c', 'C') => 'Ç',
        ('c', 's') => 'ş', ('c', 'S') => 'Ş',
        ('v', 'c') => 'č', ('v', 'C') => 'Č',
        ('v', 's') => 'š', ('v', 'S') => 'Š',
        ('v', 'z') => 'ž', ('v', 'Z') => 'Ž',
        ('v', 'r') => 'ř', ('v', 'R') => 'Ř',
        ('v', 'e') => 'ě', ('v', 'E') => 'Ě',
        ('u', 'a') => 'ă', ('u', 'A') => 'Ă',
        ('u', 'g') => 'ğ', ('u', 'G') => 'Ğ',
        ('H', 'o') => 'ő', ('H', 'O') => 'Ő',
        ('H', 'u') => 'ű', ('H', 'U') => 'Ű',
        ('k', 'a') => 'ą', ('k', 'A') => 'Ą',
        ('k', 'e') => 'ę', ('k', 'E') => 'Ę',
        ('r', 'a') => 'å', ('r', 'A') => 'Å',
        ('r', 'u') => 'ů', ('r', 'U') => 'Ů',
        _ => return None,
    };
    Some(composed)
}
