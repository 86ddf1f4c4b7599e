/*
 * Splits oversized file content into translation-safe chunks and joins translated
 * chunks back together.
 *
 * Break points come from line-start markers chosen by the file's language family
 * (markdown headers, function or class declarations, blank lines for plain text).
 * The mapping is data-driven: extension -> family -> ordered marker patterns, and a
 * configured marker list for a family replaces the built-in list for that family.
 */
use crate::core::tokenizer_utils::estimate_tokens;
use regex::Regex;
use std::collections::HashMap;

pub const PLAINTEXT_FAMILY: &str = "plaintext";

const EXTENSION_FAMILIES: &[(&str, &str)] = &[
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("html", "html"),
    ("htm", "html"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("py", "python"),
    ("java", "java"),
    ("go", "go"),
    ("cs", "c#"),
    ("php", "php"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("txt", PLAINTEXT_FAMILY),
];

const DEFAULT_MARKERS: &[(&str, &[&str])] = &[
    ("markdown", &[r"^#\s", r"^##\s", r"^###\s"]),
    ("html", &[r"^<h1[^>]*>", r"^<h2[^>]*>", r"^<h3[^>]*>"]),
    ("javascript", &[r"^function\s+\w+\(", r"^class\s+\w+"]),
    (
        "typescript",
        &[r"^function\s+\w+\(", r"^class\s+\w+", r"^interface\s+\w+"],
    ),
    ("python", &[r"^def\s+\w+\(", r"^class\s+\w+"]),
    (
        "java",
        &[
            r"^public\s+(class|interface|enum)\s+\w+",
            r"^\s*public\s+\w+\s+\w+\(",
        ],
    ),
    ("go", &[r"^func\s+\w+\(", r"^type\s+\w+\s+struct"]),
    (
        "c#",
        &[
            r"^public\s+(class|interface|enum)\s+\w+",
            r"^\s*public\s+\w+\s+\w+\(",
        ],
    ),
    ("php", &[r"^function\s+\w+\(", r"^class\s+\w+"]),
    ("ruby", &[r"^def\s+\w+", r"^class\s+\w+"]),
    ("rust", &[r"^fn\s+\w+", r"^struct\s+\w+", r"^enum\s+\w+"]),
    ("swift", &[r"^func\s+\w+", r"^class\s+\w+", r"^struct\s+\w+"]),
    ("kotlin", &[r"^fun\s+\w+", r"^class\s+\w+"]),
    (PLAINTEXT_FAMILY, &[r"^\s*$"]),
];

/*
 * An ordered, contiguous slice of a file's text plus its estimated token cost.
 * Produced and consumed within a single file's translation.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub estimated_tokens: usize,
}

impl Segment {
    fn from_lines(lines: &[&str]) -> Self {
        let text = lines.join("\n");
        let estimated_tokens = estimate_tokens(&text);
        Segment {
            text,
            estimated_tokens,
        }
    }
}

/*
 * Compiled marker patterns per language family.
 */
#[derive(Debug, Clone)]
pub struct MarkerTable {
    families: HashMap<String, Vec<Regex>>,
}

impl MarkerTable {
    /*
     * Builds the table from the built-in defaults, replacing a family's list
     * wholesale when `overrides` names that family. Fails on the first override
     * pattern that does not compile.
     */
    pub fn with_overrides(overrides: &HashMap<String, Vec<String>>) -> Result<Self, regex::Error> {
        let mut table = MarkerTable::built_in();
        for (family, patterns) in overrides {
            let compiled = patterns
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<Vec<_>, _>>()?;
            log::debug!(
                "MarkerTable: Using {} configured marker(s) for family '{family}'.",
                compiled.len()
            );
            table.families.insert(family.clone(), compiled);
        }
        Ok(table)
    }

    pub fn built_in() -> Self {
        let families = DEFAULT_MARKERS
            .iter()
            .map(|(family, patterns)| {
                let compiled = patterns
                    .iter()
                    .filter_map(|pattern| match Regex::new(pattern) {
                        Ok(regex) => Some(regex),
                        Err(e) => {
                            log::error!(
                                "MarkerTable: Built-in marker '{pattern}' for '{family}' is invalid: {e}"
                            );
                            None
                        }
                    })
                    .collect();
                (family.to_string(), compiled)
            })
            .collect();
        MarkerTable { families }
    }

    /*
     * Maps a file extension (with or without the leading dot, any case) to its
     * language family. Unknown extensions fall back to plain text.
     */
    pub fn family_for_extension(extension: &str) -> &'static str {
        let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_FAMILIES
            .iter()
            .find(|(ext, _)| *ext == normalized)
            .map(|(_, family)| *family)
            .unwrap_or(PLAINTEXT_FAMILY)
    }

    pub fn markers_for_extension(&self, extension: &str) -> &[Regex] {
        let family = MarkerTable::family_for_extension(extension);
        self.families
            .get(family)
            .or_else(|| self.families.get(PLAINTEXT_FAMILY))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        MarkerTable::built_in()
    }
}

/*
 * Splits `text` into segments of at most `max_tokens` estimated tokens where the
 * structure allows it.
 *
 * Text within budget is returned whole as a single segment. Otherwise lines are
 * accumulated; a marker line becomes the latest candidate break point unless the
 * buffer is empty. When the next line would overflow the budget, the buffer is cut
 * at the candidate (the marker and everything after it move to the next segment)
 * or, without a candidate, right before the current line. A single line larger
 * than the budget still becomes a segment of its own; lines are never split.
 */
pub fn segment_text(
    text: &str,
    extension: &str,
    max_tokens: usize,
    markers: &MarkerTable,
) -> Vec<Segment> {
    let total_tokens = estimate_tokens(text);
    if total_tokens <= max_tokens {
        return vec![Segment {
            text: text.to_string(),
            estimated_tokens: total_tokens,
        }];
    }

    let patterns = markers.markers_for_extension(extension);
    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_tokens = 0usize;
    // (index into buffer, buffer tokens before that index)
    let mut break_point: Option<(usize, usize)> = None;

    for line in text.split('\n') {
        let line_tokens = estimate_tokens(line);
        let is_marker = patterns.iter().any(|pattern| pattern.is_match(line));

        if is_marker {
            if buffer.is_empty() {
                buffer.push(line);
                buffer_tokens = line_tokens;
                continue;
            }
            break_point = Some((buffer.len(), buffer_tokens));
        }

        if !buffer.is_empty() && buffer_tokens + line_tokens > max_tokens {
            match break_point.take() {
                Some((index, tokens_before)) if index > 0 => {
                    let tail = buffer.split_off(index);
                    segments.push(Segment::from_lines(&buffer));
                    buffer = tail;
                    buffer.push(line);
                    buffer_tokens = buffer_tokens - tokens_before + line_tokens;
                }
                _ => {
                    segments.push(Segment::from_lines(&buffer));
                    buffer = vec![line];
                    buffer_tokens = line_tokens;
                }
            }
        } else {
            buffer.push(line);
            buffer_tokens += line_tokens;
        }
    }

    if !buffer.is_empty() {
        segments.push(Segment::from_lines(&buffer));
    }

    log::debug!(
        "Segmentation: Split {total_tokens} estimated tokens into {} segment(s) (budget {max_tokens}).",
        segments.len()
    );
    segments
}

/*
 * Joins translated chunks with a newline. This is the inverse of `segment_text`
 * for line-structured text; line endings at cut points are normalized to '\n'.
 */
pub fn combine_segments<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_text_within_budget_is_single_segment() {
        let text = "# Title\nSome short text.\n";
        let segments = segment_text(text, "md", 100, &MarkerTable::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
        assert_eq!(segments[0].estimated_tokens, estimate_tokens(text));
        assert_eq!(combine_segments(&texts(&segments)), text);
    }

    #[test]
    fn test_markdown_cuts_at_last_header() {
        let text = "# A\naaaa aaaa aaaa\n# B\nbbbb bbbb bbbb\ncccc cccc cccc";
        let segments = segment_text(text, ".md", 10, &MarkerTable::default());
        assert_eq!(
            texts(&segments),
            vec!["# A\naaaa aaaa aaaa", "# B\nbbbb bbbb bbbb\ncccc cccc cccc"]
        );
        assert_eq!(segments[0].estimated_tokens, 5);
        assert_eq!(segments[1].estimated_tokens, 8);
    }

    #[test]
    fn test_cut_without_marker_has_no_lookback() {
        let text = "aaaa bbbb\ncccc dddd\neeee ffff";
        let segments = segment_text(text, "txt", 4, &MarkerTable::default());
        assert_eq!(texts(&segments), vec!["aaaa bbbb\ncccc dddd", "eeee ffff"]);
    }

    #[test]
    fn test_plain_text_breaks_on_blank_line() {
        let text = "aaaa bbbb\n\ncccc dddd\neeee ffff";
        let segments = segment_text(text, "txt", 5, &MarkerTable::default());
        assert_eq!(
            texts(&segments),
            vec!["aaaa bbbb", "\ncccc dddd\neeee ffff"]
        );
        assert_eq!(combine_segments(&texts(&segments)), text);
    }

    #[test]
    fn test_oversized_first_line_does_not_emit_empty_segment() {
        let long_line = "word ".repeat(50);
        let text = format!("{long_line}\nshort");
        let segments = segment_text(&text, "txt", 10, &MarkerTable::default());
        assert!(segments.iter().all(|s| !s.text.is_empty()));
        assert_eq!(segments.len(), 2);
        assert_eq!(combine_segments(&texts(&segments)), text);
    }

    #[test]
    fn test_round_trip_preserves_every_line_of_large_markdown() {
        let mut text = String::new();
        for section in 0..40 {
            text.push_str(&format!("## Section {section}\n"));
            for paragraph in 0..3 {
                text.push_str(&format!(
                    "Paragraph {paragraph} of section {section}, with punctuation: (a) [b] {{c}}.\n"
                ));
            }
            text.push('\n');
        }
        let segments = segment_text(&text, "md", 120, &MarkerTable::default());
        assert!(segments.len() > 1);
        assert_eq!(combine_segments(&texts(&segments)), text);

        // Every cut after the first lands on a header line.
        for segment in segments.iter().skip(1) {
            assert!(
                segment.text.starts_with("## Section"),
                "Segment should start at a header: {:?}",
                &segment.text[..segment.text.len().min(40)]
            );
        }
    }

    #[test]
    fn test_round_trip_with_crlf_and_trailing_newline() {
        let text = "line one\r\nline two\r\n".repeat(30);
        let segments = segment_text(&text, "txt", 20, &MarkerTable::default());
        assert!(segments.len() > 1);
        assert_eq!(combine_segments(&texts(&segments)), text);
    }

    #[test]
    fn test_family_for_extension() {
        assert_eq!(MarkerTable::family_for_extension(".MD"), "markdown");
        assert_eq!(MarkerTable::family_for_extension("rs"), "rust");
        assert_eq!(MarkerTable::family_for_extension("cs"), "c#");
        assert_eq!(MarkerTable::family_for_extension("xyz"), PLAINTEXT_FAMILY);
        assert_eq!(MarkerTable::family_for_extension(""), PLAINTEXT_FAMILY);
    }

    #[test]
    fn test_configured_markers_replace_family_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("markdown".to_string(), vec!["^===".to_string()]);
        let table = MarkerTable::with_overrides(&overrides).unwrap();

        let markers = table.markers_for_extension("md");
        assert_eq!(markers.len(), 1);
        assert!(markers[0].is_match("=== part two"));
        assert!(!markers.iter().any(|m| m.is_match("# Title")));

        // Other families keep their defaults.
        assert_eq!(table.markers_for_extension("py").len(), 2);
    }

    #[test]
    fn test_invalid_configured_marker_is_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("python".to_string(), vec!["^def(".to_string()]);
        assert!(MarkerTable::with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_unknown_extension_uses_plaintext_markers() {
        let table = MarkerTable::default();
        let markers = table.markers_for_extension("weird");
        assert_eq!(markers.len(), 1);
        assert!(markers[0].is_match("   "));
    }

    #[test]
    fn test_combine_segments_joins_with_newline() {
        assert_eq!(combine_segments(&["a", "b", "c"]), "a\nb\nc");
        assert_eq!(combine_segments::<&str>(&[]), "");
        assert_eq!(combine_segments(&["only".to_string()]), "only");
    }
}
