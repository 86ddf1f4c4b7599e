/*
 * Glob-style ignore patterns tested against forward-slash relative paths from the
 * source root. Files are matched as-is; directories are matched both bare and with
 * a trailing '/', so a bare "drafts" pattern and a "drafts/" plus star pattern both
 * prune a directory.
 * Blank lines and '#' comments in the pattern list are skipped, like exclude lists
 * elsewhere in the tool.
 */
use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn new(patterns: &[String]) -> Result<Self, PatternError> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let trimmed = pattern.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            compiled.push(Pattern::new(trimmed)?);
        }
        Ok(IgnoreRules { patterns: compiled })
    }

    /*
     * Returns the first pattern matching the file's relative path.
     */
    pub fn matching_file_pattern(&self, relative_path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.matches_with(relative_path, MATCH_OPTIONS))
            .map(Pattern::as_str)
    }

    /*
     * Returns the first pattern matching the directory's relative path, tried both
     * bare and with a trailing separator.
     */
    pub fn matching_dir_pattern(&self, relative_path: &str) -> Option<&str> {
        let with_separator = format!("{relative_path}/");
        self.patterns
            .iter()
            .find(|p| {
                p.matches_with(relative_path, MATCH_OPTIONS)
                    || p.matches_with(&with_separator, MATCH_OPTIONS)
            })
            .map(Pattern::as_str)
    }
}
