/// Score a case-insensitive subsequence match of `needle` in `haystack`.
///
/// Returns `None` when the needle is not a subsequence. Higher scores for
/// consecutive runs and matches at word boundaries, so "intro rust" ranks
/// "Introduction to Rust" above "Iron Rusting Timelapse".
pub fn fuzzy_match(needle: &str, haystack: &str) -> Option<i64> {
    if needle.is_empty() {
        return Some(0);
    }

    let needle: Vec<char> = needle.to_lowercase().chars().collect();
    let haystack: Vec<char> = haystack.to_lowercase().chars().collect();

    let mut score: i64 = 0;
    let mut needle_idx = 0;
    let mut previous_matched = false;

    for (i, &c) in haystack.iter().enumerate() {
        if needle_idx < needle.len() && c == needle[needle_idx] {
            score += 1;
            if previous_matched {
                score += 4;
            }
            let at_word_start = i == 0 || is_word_separator(haystack[i - 1]);
            if at_word_start {
                score += 8;
            }
            needle_idx += 1;
            previous_matched = true;
        } else {
            previous_matched = false;
        }
    }

    if needle_idx == needle.len() {
        // Prefer tighter haystacks when everything else is equal
        Some(score - haystack.len() as i64 / 4)
    } else {
        None
    }
}

fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '.' | '/' | ':')
}

/// Replace characters that are unsafe in file names across platforms.
pub fn sanitize_filename(name: &str) -> String {
    const INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    name.chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
