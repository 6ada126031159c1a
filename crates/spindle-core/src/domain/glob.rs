//! Target pattern matching.
//!
//! Patterns support `**` (any characters, including `/`), `*` (any
//! characters except `/`) and `?` (any single character). Matching is
//! anchored at the start of the path only: `src` matches `src/main.rs`.

/// Does `path` match `pattern` from its start?
pub fn match_glob(path: &str, pattern: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let path: Vec<char> = path.chars().collect();
    match_from(&pattern, &path)
}

fn match_from(pattern: &[char], path: &[char]) -> bool {
    match pattern.first() {
        // パターンを使い切ったら前方一致成立（残りのパスは問わない）
        None => true,
        Some('*') if pattern.get(1) == Some(&'*') => {
            let rest = &pattern[2..];
            (0..=path.len()).any(|i| match_from(rest, &path[i..]))
        }
        Some('*') => {
            let rest = &pattern[1..];
            (0..=path.len())
                .take_while(|&i| i == 0 || path[i - 1] != '/')
                .any(|i| match_from(rest, &path[i..]))
        }
        Some('?') => !path.is_empty() && match_from(&pattern[1..], &path[1..]),
        Some(&c) => path.first() == Some(&c) && match_from(&pattern[1..], &path[1..]),
    }
}

/// Is `path` selected by at least one of `patterns`?
pub fn is_target_file(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| match_glob(path, p))
}

/// Keep only the paths selected by `patterns`.
pub fn filter_targets(paths: &[String], patterns: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| is_target_file(p, patterns))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::double_star_matches_everything("**", "deep/nested/file.rs", true)]
    #[case::single_star_stops_at_separator("src/*.rs", "src/lib.rs", true)]
    #[case::single_star_no_cross_dir("src/*.rs", "src/sub/lib.rs", false)]
    #[case::double_star_crosses_dirs("src/**/mod.rs", "src/a/b/mod.rs", true)]
    #[case::question_mark("v?", "v1", true)]
    #[case::prefix_match_is_enough("src", "src/main.rs", true)]
    #[case::literal_mismatch("docs/**", "src/main.rs", false)]
    fn glob_cases(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(match_glob(path, pattern), expected, "{pattern} vs {path}");
    }

    #[test]
    fn filter_keeps_only_selected() {
        let paths = vec![
            "src/lib.rs".to_string(),
            "docs/intro.md".to_string(),
            "src/worker.rs".to_string(),
        ];
        let out = filter_targets(&paths, &["src/**".to_string()]);
        assert_eq!(out, vec!["src/lib.rs", "src/worker.rs"]);
    }

    #[test]
    fn any_of_multiple_patterns_selects() {
        assert!(is_target_file(
            "docs/a.md",
            &["src/**".to_string(), "docs/**".to_string()]
        ));
    }
}
