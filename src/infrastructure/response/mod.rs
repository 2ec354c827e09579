use once_cell::sync::Lazy;
use regex::Regex;

static REASONING_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(think|thinking|reasoning|internal)>.*?</(think|thinking|reasoning|internal)>|<think\s*/>")
        .unwrap()
});

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static CODE_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").unwrap());

/// Removes reasoning blocks some models emit and collapses runs of blank lines.
pub fn clean_llm_response(response: &str) -> String {
    let cleaned = REASONING_BLOCK_PATTERN.replace_all(response, "");
    MULTIPLE_NEWLINES_PATTERN
        .replace_all(cleaned.trim(), "\n\n")
        .to_string()
}

/// The JSON document inside a model answer: the content of the first code
/// fence if there is one, otherwise everything from the first `{` or `[`
/// to the matching last `}` or `]`.
pub fn extract_json_payload(output: &str) -> String {
    let trimmed = output.trim();
    let unfenced = match CODE_FENCE_PATTERN.captures(trimmed) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(trimmed).trim(),
        None => trimmed,
    };

    let start = unfenced.find(|c| c == '{' || c == '[');
    let end = unfenced.rfind(|c| c == '}' || c == ']');
    match (start, end) {
        (Some(start), Some(end)) if start < end => unfenced[start..=end].to_string(),
        _ => unfenced.to_string(),
    }
}

/// A short single-line excerpt for error messages.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut)
}
