//! Result previews: up to N lines of content with matched query terms
//! wrapped in `«` `»`. Plain markers, no ANSI escapes.

use regex::RegexBuilder;

/// Tokenize a query into highlightable terms.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();
    // Longest-first so alternation prefers whole terms over prefixes.
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    terms.dedup();
    terms
}

/// Build a preview: lines containing a term come first (document order),
/// topped up with leading lines when nothing matches.
pub fn build_preview(content: &str, terms: &[String], max_lines: usize) -> String {
    if max_lines == 0 {
        return String::new();
    }

    let highlighter = compile_highlighter(terms);
    let lines: Vec<&str> = content.lines().collect();

    let selected: Vec<&str> = match &highlighter {
        Some(re) => {
            let matched: Vec<&str> = lines
                .iter()
                .filter(|l| re.is_match(l))
                .take(max_lines)
                .copied()
                .collect();
            if matched.is_empty() {
                lines.iter().take(max_lines).copied().collect()
            } else {
                matched
            }
        }
        None => lines.iter().take(max_lines).copied().collect(),
    };

    let rendered: Vec<String> = selected
        .into_iter()
        .map(|line| match &highlighter {
            Some(re) => re.replace_all(line, "«$0»").into_owned(),
            None => line.to_string(),
        })
        .collect();
    rendered.join("\n")
}

fn compile_highlighter(terms: &[String]) -> Option<regex::Regex> {
    if terms.is_empty() {
        return None;
    }
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .ok()
}
