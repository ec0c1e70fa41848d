//! Scene segmentation.
//!
//! Raw text is cut by a fixed sequence of structural heuristics, each one
//! further subdividing the fragments produced by the previous one. The
//! surviving fragments are bounded in length and count so they can be used
//! directly as image-generation prompts.

use std::sync::LazyLock;

use regex::Regex;

/// Fragments shorter than this are treated as noise.
pub const MIN_SCENE_CHARS: usize = 20;
/// Longer fragments are truncated to this many characters.
pub const MAX_SCENE_CHARS: usize = 200;
/// Appended to truncated fragments.
pub const TRUNCATION_MARKER: &str = "...";
/// Upper bound on scenes per text.
pub const MAX_SCENES: usize = 20;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n){2,}").unwrap());

static TRANSITION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.\s*(?:meanwhile|later|then|next|after|suddenly|however)\b").unwrap()
});

static STRUCTURE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.\s*(?:scene|chapter|part)\b").unwrap());

static MOTION_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.\s*[A-Z][a-z]+\s+(?i:walked|went|moved|arrived|entered)\b").unwrap()
});

/// One split heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// Two or more consecutive line breaks
    ParagraphBreak,
    /// Sentence end followed by "meanwhile", "later", "then", ...
    TransitionMarker,
    /// Sentence end followed by "scene", "chapter" or "part"
    StructureMarker,
    /// Sentence end followed by a capitalized subject and a motion verb
    MotionSubject,
}

impl Heuristic {
    /// Heuristics in application order.
    pub const ORDER: [Heuristic; 4] = [
        Heuristic::ParagraphBreak,
        Heuristic::TransitionMarker,
        Heuristic::StructureMarker,
        Heuristic::MotionSubject,
    ];

    /// Split one fragment. Pieces are untrimmed and may be empty.
    pub fn split<'a>(&self, fragment: &'a str) -> Vec<&'a str> {
        match self {
            Heuristic::ParagraphBreak => PARAGRAPH_BREAK.split(fragment).collect(),
            Heuristic::TransitionMarker => split_after_period(fragment, &TRANSITION_MARKER),
            Heuristic::StructureMarker => split_after_period(fragment, &STRUCTURE_MARKER),
            Heuristic::MotionSubject => split_after_period(fragment, &MOTION_SUBJECT),
        }
    }
}

/// Cut right after the period that starts each match, so the period closes
/// the previous sentence and the marker opens the next fragment.
fn split_after_period<'a>(fragment: &'a str, pattern: &Regex) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for m in pattern.find_iter(fragment) {
        let cut = m.start() + 1;
        pieces.push(&fragment[start..cut]);
        start = cut;
    }
    pieces.push(&fragment[start..]);

    pieces
}

/// Split text into an ordered sequence of scene prompts.
///
/// Returns an empty vector when nothing qualifies; callers decide whether
/// that is an error.
pub fn segment(text: &str) -> Vec<String> {
    let mut fragments: Vec<&str> = vec![text];

    for heuristic in Heuristic::ORDER {
        fragments = fragments
            .into_iter()
            .flat_map(|fragment| heuristic.split(fragment))
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .collect();
    }

    fragments
        .into_iter()
        .filter(|fragment| fragment.chars().count() >= MIN_SCENE_CHARS)
        .map(truncate_prompt)
        .take(MAX_SCENES)
        .collect()
}

/// Bound a fragment to `MAX_SCENE_CHARS` characters plus the marker.
fn truncate_prompt(fragment: &str) -> String {
    if fragment.chars().count() <= MAX_SCENE_CHARS {
        return fragment.to_string();
    }

    let mut truncated: String = fragment.chars().take(MAX_SCENE_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_breaks() {
        let text = "The lighthouse stood alone on the cliff.\n\nWaves crashed against the rocks below it.";
        let scenes = segment(text);
        assert_eq!(
            scenes,
            vec![
                "The lighthouse stood alone on the cliff.",
                "Waves crashed against the rocks below it.",
            ]
        );
    }

    #[test]
    fn test_crlf_paragraph_breaks() {
        let text = "A fox crept through the silent forest.\r\n\r\nThe moon rose over the distant hills.";
        assert_eq!(segment(text).len(), 2);
    }

    #[test]
    fn test_transition_marker_opens_next_scene() {
        let text = "The knight rode into the burning village. Meanwhile the dragon circled overhead.";
        let scenes = segment(text);
        assert_eq!(
            scenes,
            vec![
                "The knight rode into the burning village.",
                "Meanwhile the dragon circled overhead.",
            ]
        );
    }

    #[test]
    fn test_transition_marker_is_case_insensitive_and_whole_word() {
        let split = segment("The storm raged through the whole night. later the sun broke through the clouds.");
        assert_eq!(split.len(), 2);

        // "Thenceforth" is not the marker "then"
        let joined = segment("The treaty was signed by both kings. Thenceforth the realms lived in peace.");
        assert_eq!(joined.len(), 1);
    }

    #[test]
    fn test_structure_markers() {
        let text = "The prologue sets the stage for everything. Chapter two begins in a crowded market.";
        let scenes = segment(text);
        assert_eq!(scenes.len(), 2);
        assert!(scenes[1].starts_with("Chapter two"));
    }

    #[test]
    fn test_motion_subject() {
        let text = "The hall was quiet and dark for hours. Elena walked slowly toward the glowing door.";
        let scenes = segment(text);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1], "Elena walked slowly toward the glowing door.");
    }

    #[test]
    fn test_heuristics_compose() {
        let text = "Night fell over the old harbor town. Suddenly a bell rang out.\n\n\
                    The sailors gathered on the pier at once. Marco went to fetch the captain.";
        let scenes = segment(text);
        assert_eq!(scenes.len(), 4);
        assert_eq!(scenes[1], "Suddenly a bell rang out.");
        assert_eq!(scenes[3], "Marco went to fetch the captain.");
    }

    #[test]
    fn test_short_fragments_are_dropped() {
        let text = "Too short.\n\nThis fragment is long enough to keep.\n\nNope";
        assert_eq!(segment(text), vec!["This fragment is long enough to keep."]);
    }

    #[test]
    fn test_minimum_length_boundary() {
        let exactly_twenty = "abcdefghij klmnopqrs";
        assert_eq!(exactly_twenty.chars().count(), 20);
        assert_eq!(segment(exactly_twenty), vec![exactly_twenty]);

        let nineteen = "abcdefghij klmnopqr";
        assert!(segment(nineteen).is_empty());
    }

    #[test]
    fn test_long_fragment_is_truncated() {
        let long = "word ".repeat(100);
        let scenes = segment(&long);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].chars().count(), MAX_SCENE_CHARS + TRUNCATION_MARKER.len());
        assert!(scenes[0].ends_with("..."));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let long = "é".repeat(250);
        let scenes = segment(&long);
        assert_eq!(scenes[0].chars().count(), 203);
    }

    #[test]
    fn test_scene_count_is_capped() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {} describes a different place.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let scenes = segment(&text);
        assert_eq!(scenes.len(), MAX_SCENES);
        assert!(scenes[0].contains("number 0 "));
        assert!(scenes[19].contains("number 19 "));
    }

    #[test]
    fn test_bounds_hold_for_mixed_input() {
        let text = format!(
            "Short.\n\n{}\n\nA medium sized paragraph about a journey. Then another one begins here.\n\n{}",
            "x".repeat(500),
            "The end of the story arrives quietly."
        );
        let scenes = segment(&text);
        assert!(!scenes.is_empty());
        for scene in &scenes {
            let len = scene.chars().count();
            assert!((MIN_SCENE_CHARS..=MAX_SCENE_CHARS + 3).contains(&len), "bad length {}", len);
        }
    }

    #[test]
    fn test_no_qualifying_fragments() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\n  \n\n").is_empty());
        assert!(segment("Hi.\n\nBye.").is_empty());
    }

    #[test]
    fn test_segment_is_idempotent() {
        let text = "The city woke slowly under grey skies. Later the markets filled with noise.\n\n\
                    Part two follows a courier across the river.";
        assert_eq!(segment(text), segment(text));
    }
}
