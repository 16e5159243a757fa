//! Metadata normalization for play-log to scrobble matching.
//!
//! Two outputs are built from the same ordered passes:
//! - `clean_track_metadata` gives display/submission-grade strings.
//! - `normalize_for_comparison` additionally lowercases and strips punctuation.
//!   It is only ever used to compute similarity, never submitted.
//!
//! Every pass is a pure `&str -> String` function and treats "" as "".

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Channel branding the platform appends to artist and title fields.
/// Anchored to the end: "Drake VEVO" → "Drake", "Taylor Swift - Topic" → "Taylor Swift"
pub static PLATFORM_SUFFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s*-\s*Topic$").unwrap(),
        Regex::new(r"(?i)\s*VEVO$").unwrap(),
        Regex::new(r"(?i)\s*Records$").unwrap(),
        Regex::new(r"(?i)\s*Music$").unwrap(),
        Regex::new(r"(?i)\s*Official$").unwrap(),
    ]
});

/// Promotional qualifiers on video titles: "(Official Video)", "[HD]", "(4K)", "(Lyrics)"
const PROMO_QUALIFIER: &str = r"[\(\[](?:official\s+(?:music\s+)?video|official\s+audio|lyric\s+video|lyrics|hd|4k)[\)\]]";

/// Qualifier at the end of a title, deleted entirely.
pub static PROMO_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\s*{}$", PROMO_QUALIFIER)).unwrap());

/// Qualifier followed by more text ("Animals (Official Video) feat. X"), collapsed to one space.
pub static PROMO_INFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\s*{}\s+", PROMO_QUALIFIER)).unwrap());

/// Collaboration markers, each a whole word or symbol.
/// Alternation is leftmost-first, so "feat." wins over "feat" and "vs." over "vs".
pub static FEATURING_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*(?:\bfeaturing\b|\bfeat\.|\bfeat\b|\bft\.|\bft\b|\bwith\b|\bx\b|\bversus\b|\bvs\.|\bvs\b|\band\b|&)\s*",
    )
    .unwrap()
});

/// Runs of the canonical token left behind by "feat. &" style input.
pub static REPEATED_FT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bft(?:\s+ft\b)+").unwrap());

/// Version/remix qualifiers with their canonical spelling. An empty
/// replacement drops the qualifier ("Original Mix" is the default release).
pub static VERSION_TAGS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\s*\(radio\s+edit\)").unwrap(), " (Radio Edit)"),
        (Regex::new(r"(?i)\s*\(extended\s+mix\)").unwrap(), " (Extended Mix)"),
        (Regex::new(r"(?i)\s*\(club\s+mix\)").unwrap(), " (Club Mix)"),
        (Regex::new(r"(?i)\s*\(original\s+mix\)").unwrap(), ""),
        (Regex::new(r"(?i)\s*\(remix\)").unwrap(), " (Remix)"),
        (Regex::new(r"(?i)\s*\(remaster\)").unwrap(), " (Remaster)"),
        (Regex::new(r"(?i)\s*\(remastered\)").unwrap(), " (Remastered)"),
        (Regex::new(r"(?i)\s*\(deluxe\s+(?:edition|version)\)").unwrap(), " (Deluxe Edition)"),
        (Regex::new(r"(?i)\s*\(acoustic\)").unwrap(), " (Acoustic)"),
        (Regex::new(r"(?i)\s*\(live\)").unwrap(), " (Live)"),
        (Regex::new(r"(?i)\s*\(instrumental\)").unwrap(), " (Instrumental)"),
    ]
});

/// "&" and "+" joiners, read as "and" for comparison.
pub static AND_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[&+]").unwrap());

/// Everything except word characters, whitespace, apostrophes and hyphens.
pub static NON_COMPARABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s'\-]").unwrap());

pub static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII: NFKD, drop combining marks, transliterate the rest.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// One pass of platform cleanup. `clean_platform_metadata` repeats it to a fixpoint.
fn clean_platform_pass(text: &str, is_artist: bool) -> String {
    let mut result = text.trim().to_string();

    for suffix in PLATFORM_SUFFIXES.iter() {
        result = suffix.replace(&result, "").to_string();
    }

    if !is_artist {
        result = PROMO_SUFFIX.replace(&result, "").to_string();
        result = PROMO_INFIX.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Strip platform-injected noise from an artist or title.
///
/// Suffixes like "VEVO" or "- Topic" are removed from both fields. Titles
/// also lose promotional qualifiers: deleted at the end, collapsed to a
/// single space when more text follows. Passes repeat until nothing changes,
/// so "Song (Lyrics) [HD]" and "Artist VEVO Official" are fully cleaned and
/// the function is idempotent.
pub fn clean_platform_metadata(text: &str, is_artist: bool) -> String {
    let mut current = text.trim().to_string();
    loop {
        // Every effective pass shortens the string, so this terminates.
        let next = clean_platform_pass(&current, is_artist);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Unify collaboration markers into a single " ft " token.
/// e.g., "Post Malone feat. 21 Savage" → "Post Malone ft 21 Savage"
///       "Artist & Other" → "Artist ft Other"
pub fn normalize_featuring_markers(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let marked = FEATURING_MARKER.replace_all(text, " ft ");
    let collapsed = collapse_whitespace(&marked);
    let deduped = REPEATED_FT.replace_all(&collapsed, "ft");
    collapse_whitespace(&deduped)
}

/// Standardize version qualifiers: "(radio edit)" → " (Radio Edit)", "(Original Mix)" → "".
pub fn normalize_version_tags(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in VERSION_TAGS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result.trim().to_string()
}

/// Full pipeline for search/similarity. Lowercased, punctuation stripped.
/// e.g., ("Drake VEVO", artist) → "drake", ("God's Plan (Official Video)", title) → "god's plan"
pub fn normalize_for_comparison(text: &str, is_artist: bool) -> String {
    let mut result = clean_platform_metadata(text, is_artist);
    result = normalize_featuring_markers(&result);
    if !is_artist {
        result = normalize_version_tags(&result);
    }

    let lowered = result.to_lowercase();
    let joined = collapse_whitespace(&AND_SYMBOLS.replace_all(&lowered, " and "));
    collapse_whitespace(&NON_COMPARABLE.replace_all(&joined, " "))
}

/// Display/submission-grade cleanup of a (artist, title, album) triple.
/// Keeps case and punctuation, unlike `normalize_for_comparison`.
pub fn clean_track_metadata(artist: &str, title: &str, album: &str) -> (String, String, String) {
    let artist = normalize_featuring_markers(&clean_platform_metadata(artist, true));
    let title = normalize_version_tags(&normalize_featuring_markers(&clean_platform_metadata(title, false)));
    let album = clean_platform_metadata(album, false);
    (artist, title, album)
}

/// Comparison string for a (artist, title) pair, as used by the candidate matcher.
pub fn comparison_key(artist: &str, title: &str) -> String {
    format!(
        "{} {}",
        normalize_for_comparison(artist, true),
        normalize_for_comparison(title, false)
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_platform_metadata_artist_suffixes() {
        assert_eq!(clean_platform_metadata("Drake VEVO", true), "Drake");
        assert_eq!(clean_platform_metadata("Taylor Swift - Topic", true), "Taylor Swift");
        assert_eq!(clean_platform_metadata("Some Label Records", true), "Some Label");
        assert_eq!(clean_platform_metadata("  Band Official  ", true), "Band");
        // Artists keep bracketed text
        assert_eq!(clean_platform_metadata("Artist (HD)", true), "Artist (HD)");
    }

    #[test]
    fn test_clean_platform_metadata_title_qualifiers() {
        assert_eq!(clean_platform_metadata("God's Plan (Official Video)", false), "God's Plan");
        assert_eq!(clean_platform_metadata("Hey Jude [Official Video]", false), "Hey Jude");
        assert_eq!(clean_platform_metadata("Anti-Hero (Official Music Video)", false), "Anti-Hero");
        assert_eq!(clean_platform_metadata("Song (4K)", false), "Song");
        assert_eq!(clean_platform_metadata("Song [lyrics]", false), "Song");
        assert_eq!(clean_platform_metadata("Song (Lyric Video)", false), "Song");
    }

    #[test]
    fn test_clean_platform_metadata_mid_string_qualifier() {
        assert_eq!(
            clean_platform_metadata("Animals (Official Video) feat. Someone", false),
            "Animals feat. Someone"
        );
        assert_eq!(clean_platform_metadata("Song [HD] Remix", false), "Song Remix");
    }

    #[test]
    fn test_clean_platform_metadata_stacked_noise() {
        assert_eq!(clean_platform_metadata("Song (Lyrics) [HD]", false), "Song");
        assert_eq!(clean_platform_metadata("Artist VEVO Official", true), "Artist");
        assert_eq!(clean_platform_metadata("Song VEVO (Official Audio)", false), "Song");
    }

    #[test]
    fn test_clean_platform_metadata_idempotent() {
        let inputs = [
            "Drake VEVO",
            "Song (Lyrics) (HD) [4K]",
            "Foo Records VEVO Music",
            "Animals (Official Video) feat. Someone",
            "  spaced   out  ",
            "VEVO",
            "",
        ];
        for input in inputs {
            for is_artist in [true, false] {
                let once = clean_platform_metadata(input, is_artist);
                assert_eq!(clean_platform_metadata(&once, is_artist), once, "input: {:?}", input);
            }
        }
    }

    #[test]
    fn test_normalize_featuring_markers() {
        assert_eq!(normalize_featuring_markers("Post Malone feat. 21 Savage"), "Post Malone ft 21 Savage");
        assert_eq!(normalize_featuring_markers("The Weeknd featuring Daft Punk"), "The Weeknd ft Daft Punk");
        assert_eq!(normalize_featuring_markers("Artist x Collaborator"), "Artist ft Collaborator");
        assert_eq!(normalize_featuring_markers("Artist & Other Artist"), "Artist ft Other Artist");
        assert_eq!(normalize_featuring_markers("A vs. B"), "A ft B");
        assert_eq!(normalize_featuring_markers("A Versus B"), "A ft B");
        assert_eq!(normalize_featuring_markers("A FT. B"), "A ft B");
        assert_eq!(normalize_featuring_markers("A with B"), "A ft B");
    }

    #[test]
    fn test_normalize_featuring_markers_whole_words_only() {
        // "x" inside "Xenon", "and" inside "Sandy", "ft" inside "Daft"
        assert_eq!(normalize_featuring_markers("Xenon Sandy"), "Xenon Sandy");
        assert_eq!(normalize_featuring_markers("Daft Punk"), "Daft Punk");
        assert_eq!(normalize_featuring_markers("Withering Heights"), "Withering Heights");
    }

    #[test]
    fn test_normalize_featuring_markers_no_adjacent_ft() {
        let inputs = [
            "A feat. & B",
            "A ft ft B",
            "A ft. feat. featuring B",
            "A & and x B",
            "ft ft",
            "A FT ft Ft B",
        ];
        for input in inputs {
            let result = normalize_featuring_markers(input);
            let tokens: Vec<&str> = result.split_whitespace().collect();
            assert!(
                !tokens.windows(2).any(|w| w[0].eq_ignore_ascii_case("ft") && w[1].eq_ignore_ascii_case("ft")),
                "{:?} → {:?}",
                input,
                result
            );
        }
        assert_eq!(normalize_featuring_markers("A feat. & B"), "A ft B");
    }

    #[test]
    fn test_normalize_version_tags() {
        assert_eq!(normalize_version_tags("Song (radio edit)"), "Song (Radio Edit)");
        assert_eq!(normalize_version_tags("Song(EXTENDED MIX)"), "Song (Extended Mix)");
        assert_eq!(normalize_version_tags("Taki Taki (Original Mix)"), "Taki Taki");
        assert_eq!(normalize_version_tags("Song (Deluxe Version)"), "Song (Deluxe Edition)");
        assert_eq!(normalize_version_tags("Song (live)"), "Song (Live)");
        assert_eq!(normalize_version_tags(""), "");
    }

    #[test]
    fn test_normalize_for_comparison() {
        assert_eq!(normalize_for_comparison("Drake VEVO", true), "drake");
        assert_eq!(normalize_for_comparison("God's Plan (Official Video)", false), "god's plan");
        assert_eq!(normalize_for_comparison("Simon + Garfunkel", true), "simon and garfunkel");
        assert_eq!(normalize_for_comparison("Levels (Extended Mix)", false), "levels extended mix");
        assert_eq!(normalize_for_comparison("Hello, World!", false), "hello world");
        assert_eq!(normalize_for_comparison("Anti-Hero", false), "anti-hero");
        assert_eq!(normalize_for_comparison("", false), "");
    }

    #[test]
    fn test_clean_track_metadata_scenarios() {
        let cases = [
            ("Drake VEVO", "God's Plan (Official Video)", "Drake", "God's Plan"),
            ("Post Malone feat. 21 Savage", "rockstar", "Post Malone ft 21 Savage", "rockstar"),
            ("Taylor Swift - Topic", "Anti-Hero (Official Music Video)", "Taylor Swift", "Anti-Hero"),
            ("The Beatles", "Hey Jude [Official Video]", "The Beatles", "Hey Jude"),
            ("DJ Snake", "Taki Taki (Original Mix)", "DJ Snake", "Taki Taki"),
            ("Calvin Harris", "Feel So Close (Radio Edit)", "Calvin Harris", "Feel So Close (Radio Edit)"),
            ("Avicii", "Levels (Extended Mix)", "Avicii", "Levels (Extended Mix)"),
            ("Artist", "Song (Deluxe Version)", "Artist", "Song (Deluxe Edition)"),
            ("Martin Garrix - Topic", "Animals (Official Video) feat. Someone", "Martin Garrix", "Animals ft Someone"),
            ("Artist VEVO", "Song (Original Mix) [HD]", "Artist", "Song"),
            ("Artist ft. Someone", "Song ft. Other", "Artist ft Someone", "Song ft Other"),
            ("", "Empty Artist Test", "", "Empty Artist Test"),
            ("Artist", "", "Artist", ""),
        ];
        for (artist, title, expected_artist, expected_title) in cases {
            let (a, t, _) = clean_track_metadata(artist, title, "");
            assert_eq!(a, expected_artist, "artist for {:?} / {:?}", artist, title);
            assert_eq!(t, expected_title, "title for {:?} / {:?}", artist, title);
        }
    }

    #[test]
    fn test_clean_track_metadata_album() {
        let (_, _, album) = clean_track_metadata("Drake", "God's Plan", "Scorpion (Official Audio)");
        assert_eq!(album, "Scorpion");
    }

    #[test]
    fn test_comparison_key() {
        assert_eq!(comparison_key("Drake VEVO", "God's Plan (Official Video)"), "drake god's plan");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }
}
