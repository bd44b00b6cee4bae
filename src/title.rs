//! Title cleanup heuristics.
//!
//! Streaming titles drag suffixes like "(Remastered 2011)" or
//! "- Live at Wembley" along; on a status bar that is wasted space.
//! [`clean`] splits a title into bracketed or dash-separated fractions,
//! drops trailing fractions that are clearly edition noise, and
//! reassembles the rest. When in doubt the title is returned verbatim.

/// Tokens that mark a fraction as edition noise when they dominate it.
const KEYWORDS: &[&str] = &[
    "album",
    "alternate",
    "anniversary",
    "bonus",
    "deluxe",
    "digital",
    "edition",
    "from",
    "live",
    "mono",
    "recorded",
    "remaster",
    "remastered",
    "rerecorded",
    "sessions",
    "single",
    "soundtrack",
    "special",
    "spotify",
    "studio",
    "studios",
    "sxsw",
    "unreleased",
    "version",
];

/// Phrases that condemn a fraction outright.
const PHRASES: &[&str] = &[
    "album version",
    "intro version",
    "session version",
    "hall version",
    "anniversary version",
    "recorded at",
    "recorded in",
    "recorded live at",
    "recorded during",
    "live at",
    "live from",
    "spotify session",
    "jim eno session",
    "john peel session",
    "from tokyo disneysea",
    "lennon legend version",
    "curated by",
    "ep version",
    "саундтрек к компьютерной игре",
];

const KEYWORD_RATIO_THRESHOLD: f64 = 0.5;

/// Return a copy of `title` without the noise fractions.
///
/// The leading fraction always survives. A title that is one fraction, or
/// where no fraction was dropped, comes back verbatim.
pub fn clean(title: &str) -> String {
    let tokens = tokenize(title);
    let fractions = fractionate(&tokens);
    if fractions.len() <= 1 {
        return title.to_string();
    }

    let kept: Vec<&Vec<String>> = std::iter::once(&fractions[0])
        .chain(
            fractions[1..]
                .iter()
                .filter(|group| keyword_ratio_ok(group) && no_known_phrase(group)),
        )
        .collect();
    if kept.len() == fractions.len() {
        return title.to_string();
    }

    let flat: Vec<String> = kept.into_iter().flatten().cloned().collect();
    defragment(&flat)
}

/// Split on spaces, with brackets and slashes as their own tokens.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chunk = String::new();

    for c in text.chars() {
        match c {
            ' ' => {
                if !chunk.is_empty() {
                    tokens.push(std::mem::take(&mut chunk));
                }
            }
            '(' | '[' | '{' | '/' | ')' | ']' | '}' => {
                if !chunk.is_empty() {
                    tokens.push(std::mem::take(&mut chunk));
                }
                tokens.push(c.to_string());
            }
            _ => chunk.push(c),
        }
    }
    if !chunk.is_empty() {
        tokens.push(chunk);
    }

    tokens
}

/// Group tokens into fractions: bracketed runs, and runs started by a
/// freestanding "/" or "-" outside brackets.
fn fractionate(tokens: &[String]) -> Vec<Vec<String>> {
    let mut fractions = Vec::new();
    let mut chunk: Vec<String> = Vec::new();

    for token in tokens {
        if is_opener(token) {
            if !chunk.is_empty() {
                fractions.push(std::mem::take(&mut chunk));
            }
            chunk.push(token.clone());
        } else if is_separator(token) && !chunk.is_empty() && !is_opener(&chunk[0]) {
            fractions.push(std::mem::take(&mut chunk));
            chunk.push(token.clone());
        } else if is_closer(token) {
            chunk.push(token.clone());
            fractions.push(std::mem::take(&mut chunk));
        } else {
            chunk.push(token.clone());
        }
    }
    if !chunk.is_empty() {
        fractions.push(chunk);
    }

    fractions
}

/// Rebuild a title from tokens. Brackets hug their content and a "/"
/// between digits keeps no surrounding spaces ("24/7", "7/11").
fn defragment(tokens: &[String]) -> String {
    let mut title = String::new();

    for (i, token) in tokens.iter().enumerate() {
        if is_opener(token) {
            title.push_str(token);
        } else if is_closer(token) {
            if title.ends_with(' ') {
                title.pop();
            }
            title.push_str(token);
            title.push(' ');
        } else if token == "/" && joins_digits(tokens, i) {
            if title.ends_with(' ') {
                title.pop();
            }
            title.push('/');
        } else {
            title.push_str(token);
            title.push(' ');
        }
    }

    title.trim_end().to_string()
}

/// True when the fraction is mostly real words rather than edition
/// keywords and years. A fraction with no multi-character tokens at all
/// fails too.
fn keyword_ratio_ok(group: &[String]) -> bool {
    let meaningful: Vec<&String> = group.iter().filter(|t| t.chars().count() > 1).collect();
    if meaningful.is_empty() {
        return false;
    }

    let hits = meaningful
        .iter()
        .filter(|token| KEYWORDS.contains(&distill(token).as_str()) || is_year(token))
        .count();
    (hits as f64 / meaningful.len() as f64) < KEYWORD_RATIO_THRESHOLD
}

fn no_known_phrase(group: &[String]) -> bool {
    let joined = group.join(" ").to_lowercase();
    !PHRASES.iter().any(|phrase| joined.contains(phrase))
}

/// Strip everything but ASCII alphanumerics and lowercase the rest, so
/// "Remastered," and "(Remastered)" hit the keyword list.
fn distill(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

fn is_year(text: &str) -> bool {
    text.len() == 4 && text.chars().all(|c| c.is_ascii_digit())
}

fn is_opener(token: &str) -> bool {
    matches!(token, "(" | "[" | "{")
}

fn is_closer(token: &str) -> bool {
    matches!(token, ")" | "]" | "}")
}

fn is_separator(token: &str) -> bool {
    matches!(token, "/" | "-")
}

fn joins_digits(tokens: &[String], i: usize) -> bool {
    let prev = i > 0
        && tokens[i - 1]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_digit());
    let next = tokens
        .get(i + 1)
        .and_then(|t| t.chars().next())
        .is_some_and(|c| c.is_ascii_digit());
    prev && next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_titles_are_untouched() {
        assert_eq!(clean("Karma Police"), "Karma Police");
        assert_eq!(clean("No Surprises "), "No Surprises ");
    }

    #[test]
    fn edition_brackets_are_dropped() {
        assert_eq!(clean("Creep (Acoustic Version)"), "Creep");
        assert_eq!(clean("Airbag (Remastered 2009)"), "Airbag");
    }

    #[test]
    fn edition_dashes_are_dropped() {
        assert_eq!(clean("Time - 2011 Remaster"), "Time");
        assert_eq!(
            clean("Paranoid Android - Deluxe Edition Bonus"),
            "Paranoid Android"
        );
    }

    #[test]
    fn phrase_fractions_are_dropped() {
        assert_eq!(clean("Alive (Live at Wembley 1992)"), "Alive");
        assert_eq!(clean("Idioteque - Live from Oxford"), "Idioteque");
    }

    #[test]
    fn meaningful_brackets_survive_verbatim() {
        // Nothing is dropped, so the exact original string comes back.
        assert_eq!(clean("Song 2 (feat. Someone)"), "Song 2 (feat. Someone)");
        assert_eq!(
            clean("Track (Blue Mix) - 2005 Remaster"),
            "Track (Blue Mix)"
        );
    }

    #[test]
    fn digit_slashes_rejoin_tightly() {
        assert_eq!(
            clean("Song Name 7 / 11 (Live at SXSW)"),
            "Song Name 7/11"
        );
    }

    #[test]
    fn years_count_as_noise() {
        assert_eq!(clean("Reckoner - 2008 Version"), "Reckoner");
    }
}
