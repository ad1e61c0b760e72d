//! Metric-specific text tokenization.

/// The "13a" tokenization used by mteval-v13a and sacreBLEU's default BLEU.
///
/// Symbols are split off as their own tokens; periods and commas are split unless
/// they sit between two digits, and a dash directly after a digit is split.
#[must_use]
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let mut line = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if line.contains('&') {
        line = line
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }

    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(chars.len() * 2);
    for (i, &c) in chars.iter().enumerate() {
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(char::is_ascii_digit);

        let split = match c {
            '.' | ',' => !(prev_digit && next_digit),
            '-' => prev_digit,
            _ => is_13a_symbol(c),
        };
        if split {
            out.push(' ');
            out.push(c);
            out.push(' ');
        } else {
            out.push(c);
        }
    }

    out.split_whitespace().map(str::to_string).collect()
}

// [{-~[-` -&(-+:-@/]
fn is_13a_symbol(c: char) -> bool {
    matches!(c, '{'..='~' | '['..='`' | ' '..='&' | '('..='+' | ':'..='@' | '/')
}

/// ROUGE's default tokenization: lowercase, keep only ASCII alphanumeric runs.
#[must_use]
pub fn tokenize_rouge(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Hello, world!", &["Hello", ",", "world", "!"] ; "punctuation")]
    #[test_case("It costs 3.50 dollars.", &["It", "costs", "3.50", "dollars", "."] ; "decimal_kept")]
    #[test_case("1,000 people", &["1,000", "people"] ; "thousands_kept")]
    #[test_case("pages 10-20", &["pages", "10", "-", "20"] ; "digit_dash")]
    #[test_case("well-known", &["well-known"] ; "word_dash")]
    #[test_case("a &amp; b", &["a", "&", "b"] ; "html_entity")]
    #[test_case("(see: x/y)", &["(", "see", ":", "x", "/", "y", ")"] ; "symbols")]
    #[test_case("line one\nline two", &["line", "one", "line", "two"] ; "newline")]
    fn test_13a(input: &str, expected: &[&str]) {
        assert_eq!(tokenize_13a(input), expected);
    }

    #[test]
    fn test_13a_empty() {
        assert!(tokenize_13a("").is_empty());
        assert!(tokenize_13a("   ").is_empty());
    }

    #[test_case("The Cat, sat!", &["the", "cat", "sat"] ; "case_and_punct")]
    #[test_case("state-of-the-art", &["state", "of", "the", "art"] ; "dashes")]
    #[test_case("café 42", &["caf", "42"] ; "non_ascii_dropped")]
    fn test_rouge_tokens(input: &str, expected: &[&str]) {
        assert_eq!(tokenize_rouge(input), expected);
    }
}
