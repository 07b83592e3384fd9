//! Lexical helpers shared by inference, classification and extraction.
//!
//! Everything here is a pure function over text. Matching is
//! case-insensitive and anchored at word boundaries.

/// Lowercase and fold typographic apostrophes.
pub fn normalize(text: &str) -> String {
    text.replace('\u{2019}', "'").to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn starts_word(haystack: &str, at: usize) -> bool {
    haystack[..at].chars().next_back().is_none_or(|c| !is_word_char(c))
}

fn ends_word(haystack: &str, at: usize) -> bool {
    haystack[at..].chars().next().is_none_or(|c| !is_word_char(c))
}

/// Byte offset of the first occurrence of `needle` at or after `from` that
/// starts a word (and, when `whole` is set, also ends one).
fn find_bounded(haystack: &str, needle: &str, mut from: usize, whole: bool) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    while let Some(offset) = haystack[from..].find(needle) {
        let at = from + offset;
        let end = at + needle.len();
        if starts_word(haystack, at) && (!whole || ends_word(haystack, end)) {
            return Some(at);
        }
        from = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Whether `phrase` occurs in `haystack` as whole words. Both arguments are
/// expected to be normalized already.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    find_bounded(haystack, phrase, 0, true).is_some()
}

/// Non-overlapping occurrences of `keyword` that begin at a word boundary.
///
/// The end is not anchored, so "notes" counts for "note" while "latest"
/// does not count for "test".
pub fn count_keyword(haystack: &str, keyword: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(at) = find_bounded(haystack, keyword, from, false) {
        count += 1;
        from = at + keyword.len();
    }
    count
}

// ── Phrase extraction ──────────────────────────────────────────────────────

/// Topic markers, grouped by priority. Within a group the earliest
/// occurrence is tried first.
const TOPIC_MARKERS: &[&[&str]] = &[
    &["about", "regarding", "covering", "on"],
    &["explain"],
    &["of", "for"],
];

const CONCEPT_MARKERS: &[&[&str]] = &[
    &["concept of"],
    &[
        "explain",
        "what is",
        "what are",
        "what's",
        "how does",
        "how do",
        "tell me about",
        "understand",
    ],
];

/// A phrase ends at the first of these.
const STOP_CHARS: &[char] = &['.', ',', ';', ':', '!', '?', '\n', '(', ')', '"'];

const STOP_WORDS: &[&str] = &[
    "for", "please", "so that", "because", "before", "since", "and then", "using", "with",
    "in detail", "i'm", "im", "i am", "but",
];

/// Multi-word entries come first so "what is" wins over "what".
const LEADING_FILLER: &[&str] = &[
    "what is", "what are", "what's", "how does", "how do", "tell me about", "the", "a", "an",
    "some", "my", "me", "to me", "us", "about", "on", "how", "what", "why",
];

/// Words that name a study activity rather than a subject. A topic phrase
/// starting with one ("flashcards about cells") is passed over while a later
/// marker still yields a phrase.
const ACTIVITY_WORDS: &[&str] = &[
    "flashcard", "flashcards", "card", "cards", "note", "notes", "quiz", "quizzes", "test",
    "tests", "question", "questions", "practice", "exercises", "make", "making", "create",
    "creating", "take", "taking", "do", "doing", "study", "studying", "review", "reviewing",
];

const TRAILING_FILLER: &[&str] = &[
    "please", "now", "today", "again", "too", "work", "works", "mean", "means", "is", "are",
];

/// Phrases that name nothing.
const EMPTY_REFERENTS: &[&str] = &[
    "this", "that", "it", "them", "these", "those", "something", "anything", "stuff",
    "everything", "me", "you", "us", "him", "her", "things",
];

const MAX_PHRASE_WORDS: usize = 6;

/// The topic phrase of a message: the words after "about", "on",
/// "regarding", "covering", "explain", "of" or "for". Phrases that name an
/// activity are used only when nothing else is found.
pub fn topic_phrase(message: &str) -> Option<String> {
    let phrases = marker_phrases(message, TOPIC_MARKERS);
    phrases
        .iter()
        .find(|p| !starts_with_activity(p))
        .or_else(|| phrases.first())
        .cloned()
}

/// The concept phrase of a message ("explain X", "what is X", ...),
/// title-cased.
pub fn concept_phrase(message: &str) -> Option<String> {
    marker_phrases(message, CONCEPT_MARKERS)
        .into_iter()
        .next()
        .map(|p| title_case(&p))
}

fn starts_with_activity(phrase: &str) -> bool {
    phrase
        .split_whitespace()
        .next()
        .is_some_and(|w| ACTIVITY_WORDS.iter().any(|a| w.eq_ignore_ascii_case(a)))
}

/// Every cleaned phrase following a marker, in priority order.
fn marker_phrases(message: &str, groups: &[&[&str]]) -> Vec<String> {
    let folded = message.replace('\u{2019}', "'");
    let lower = folded.to_lowercase();
    // Keep the caller's casing when lowercasing did not move byte offsets.
    let source = if lower.len() == folded.len() { folded.as_str() } else { lower.as_str() };

    let mut phrases = Vec::new();
    for group in groups {
        let mut hits: Vec<(usize, usize)> = Vec::new();
        for marker in *group {
            let mut from = 0;
            while let Some(at) = find_bounded(&lower, marker, from, true) {
                hits.push((at, at + marker.len()));
                from = at + marker.len();
            }
        }
        hits.sort_unstable();
        for (_, end) in hits {
            let Some(rest) = source.get(end..) else {
                continue;
            };
            if let Some(phrase) = clean_phrase(rest) {
                phrases.push(phrase);
            }
        }
    }
    phrases
}

fn clean_phrase(rest: &str) -> Option<String> {
    let mut phrase = rest.split(STOP_CHARS).next().unwrap_or("").trim().to_string();

    // Cut at the first stop word past the first word.
    let lower = phrase.to_lowercase();
    if lower.len() == phrase.len() {
        let first_word_end = lower.find(char::is_whitespace).unwrap_or(lower.len());
        let cut = STOP_WORDS
            .iter()
            .filter_map(|w| find_bounded(&lower, w, first_word_end, true))
            .min();
        if let Some(cut) = cut
            && phrase.is_char_boundary(cut)
        {
            phrase.truncate(cut);
        }
    }

    let mut words: Vec<&str> = phrase.split_whitespace().collect();
    loop {
        let before = words.len();
        strip_leading(&mut words, LEADING_FILLER);
        strip_trailing(&mut words, TRAILING_FILLER);
        if words.len() == before {
            break;
        }
    }
    words.truncate(MAX_PHRASE_WORDS);

    let phrase = words
        .join(" ")
        .trim_matches(|c: char| c == '\'' || c == '`' || c == '-')
        .to_string();
    let lower = phrase.to_lowercase();
    if phrase.is_empty() || EMPTY_REFERENTS.contains(&lower.as_str()) {
        return None;
    }
    Some(phrase)
}

fn strip_leading(words: &mut Vec<&str>, fillers: &[&str]) {
    for filler in fillers {
        let parts: Vec<&str> = filler.split(' ').collect();
        if words.len() > parts.len()
            && words
                .iter()
                .zip(&parts)
                .all(|(w, p)| w.eq_ignore_ascii_case(p))
        {
            words.drain(..parts.len());
            return;
        }
    }
}

fn strip_trailing(words: &mut Vec<&str>, fillers: &[&str]) {
    if words.len() < 2 {
        return;
    }
    if let Some(last) = words.last()
        && fillers.iter().any(|f| last.eq_ignore_ascii_case(f))
    {
        words.pop();
    }
}

const MINOR_WORDS: &[&str] = &["of", "and", "the", "in", "on", "a", "an", "to", "for", "or"];

/// Capitalize each word except minor ones after the first. The rest of each
/// word keeps its casing, so acronyms survive.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && MINOR_WORDS.contains(&word) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Subjects ───────────────────────────────────────────────────────────────

/// Known subjects and the words that name them, in lookup order.
const SUBJECTS: &[(&str, &[&str])] = &[
    (
        "mathematics",
        &[
            "mathematics", "maths", "math", "algebra", "calculus", "geometry", "trigonometry",
            "derivatives", "integrals", "equations", "fractions", "statistics", "probability",
        ],
    ),
    (
        "biology",
        &[
            "biology", "photosynthesis", "cell", "cells", "dna", "genetics", "evolution",
            "ecosystem", "ecosystems", "mitosis",
        ],
    ),
    (
        "chemistry",
        &["chemistry", "molecule", "molecules", "atoms", "periodic table", "chemical", "acids"],
    ),
    (
        "physics",
        &["physics", "gravity", "quantum", "velocity", "momentum", "electricity", "magnetism"],
    ),
    (
        "computer science",
        &[
            "computer science", "programming", "algorithm", "algorithms", "operating system",
            "operating systems", "recursion", "data structures", "databases",
        ],
    ),
    (
        "history",
        &["history", "revolution", "ancient", "empire", "civil war", "world war"],
    ),
    (
        "literature",
        &["literature", "poetry", "poem", "novel", "shakespeare", "grammar"],
    ),
    ("geography", &["geography", "continents", "climate", "rivers"]),
    ("economics", &["economics", "inflation", "supply and demand", "markets"]),
];

/// The first known subject named in `text` (normalized).
pub fn known_subject(text: &str) -> Option<&'static str> {
    SUBJECTS
        .iter()
        .find(|(_, words)| words.iter().any(|w| contains_phrase(text, w)))
        .map(|(subject, _)| *subject)
}

// ── Model replies ──────────────────────────────────────────────────────────

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `{...}` span of a reply.
pub fn outermost_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_counts_respect_word_starts() {
        assert_eq!(count_keyword("make notes, more notes", "note"), 2);
        assert_eq!(count_keyword("the latest results", "test"), 0);
        assert_eq!(count_keyword("test me, then test again", "test"), 2);
        assert_eq!(count_keyword("flashcards please", "flashcard"), 1);
        assert_eq!(count_keyword("anything", ""), 0);
    }

    #[test]
    fn phrases_need_both_boundaries() {
        assert!(contains_phrase("this is hard", "hard"));
        assert!(!contains_phrase("buying hardware", "hard"));
        assert!(contains_phrase("i don't understand this", "don't understand"));
        assert!(!contains_phrase("i'm lost-ish", "lostish"));
    }

    #[test]
    fn normalize_folds_curly_apostrophes() {
        assert_eq!(normalize("I DON\u{2019}T get it"), "i don't get it");
    }

    #[test]
    fn topic_after_markers() {
        assert_eq!(
            topic_phrase("I want to practice flashcards on photosynthesis").as_deref(),
            Some("photosynthesis")
        );
        assert_eq!(
            topic_phrase("Make notes about the French Revolution for my exam").as_deref(),
            Some("French Revolution")
        );
        assert_eq!(topic_phrase("explain operating systems").as_deref(), Some("operating systems"));
        assert_eq!(topic_phrase("quiz me please"), None);
    }

    #[test]
    fn topic_passes_over_activity_phrases() {
        assert_eq!(
            topic_phrase("I want to work on flashcards about cells").as_deref(),
            Some("cells")
        );
        assert_eq!(
            topic_phrase("focus on making notes of the French revolution").as_deref(),
            Some("French revolution")
        );
        assert_eq!(
            topic_phrase("I want to work on flashcards").as_deref(),
            Some("flashcards")
        );
    }

    #[test]
    fn topic_skips_empty_referents() {
        assert_eq!(topic_phrase("I'm worried about this"), None);
        assert_eq!(
            topic_phrase("I'm worried about this, notes on cell division").as_deref(),
            Some("cell division")
        );
    }

    #[test]
    fn concept_title_cased() {
        assert_eq!(
            concept_phrase("explain operating systems").as_deref(),
            Some("Operating Systems")
        );
        assert_eq!(
            concept_phrase("Can you explain the concept of natural selection?").as_deref(),
            Some("Natural Selection")
        );
        assert_eq!(concept_phrase("what is DNA replication").as_deref(), Some("DNA Replication"));
        assert_eq!(
            concept_phrase("explain how photosynthesis works").as_deref(),
            Some("Photosynthesis")
        );
        assert_eq!(
            concept_phrase("explain what is photosynthesis").as_deref(),
            Some("Photosynthesis")
        );
        assert_eq!(
            concept_phrase("can you explain how does recursion work").as_deref(),
            Some("Recursion")
        );
        assert_eq!(concept_phrase("explain"), None);
    }

    #[test]
    fn title_case_keeps_minor_words() {
        assert_eq!(title_case("law of demand"), "Law of Demand");
        assert_eq!(title_case("the cell cycle"), "The Cell Cycle");
    }

    #[test]
    fn subjects_from_vocabulary() {
        assert_eq!(known_subject("i'm studying calculus"), Some("mathematics"));
        assert_eq!(known_subject("flashcards on photosynthesis"), Some("biology"));
        assert_eq!(known_subject("biology notes"), Some("biology"));
        assert_eq!(known_subject("help me"), None);
    }

    #[test]
    fn fences_and_objects() {
        let reply = "```json\n{\"topic\": \"cells\"}\n```";
        assert_eq!(strip_code_fences(reply), "{\"topic\": \"cells\"}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(
            outermost_object("Sure! {\"a\": {\"b\": 1}} hope that helps"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(outermost_object("no json here"), None);
    }
}
