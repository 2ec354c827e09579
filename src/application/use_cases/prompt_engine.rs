use crate::domain::error::{AppError, Result};
use std::collections::HashMap;

pub const SYSTEM_MARKER: &str = "|SYSTEM|";
pub const USER_MARKER: &str = "|USER|";

pub type PromptVars = HashMap<&'static str, String>;

/// A text template with `{name}` placeholders. `{{` and `}}` produce
/// literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<&'static str>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: &[&'static str]) -> Self {
        Self {
            template: template.into(),
            input_variables: input_variables.to_vec(),
        }
    }

    pub fn input_variables(&self) -> &[&'static str] {
        &self.input_variables
    }

    pub fn format(&self, vars: &PromptVars) -> Result<String> {
        self.check_vars(vars)?;
        render(&self.template, vars)
    }

    /// Splits the template at `|USER|` into system and user message, each
    /// dedented before substitution so inserted text keeps its own layout.
    pub fn format_messages(&self, vars: &PromptVars) -> Result<(String, String)> {
        self.check_vars(vars)?;
        let (system, user) = match self.template.split_once(USER_MARKER) {
            Some((system, user)) => (system.replace(SYSTEM_MARKER, ""), user.to_string()),
            None => (String::new(), self.template.replace(SYSTEM_MARKER, "")),
        };
        Ok((
            render(dedent(&system).trim(), vars)?,
            render(dedent(&user).trim(), vars)?,
        ))
    }

    fn check_vars(&self, vars: &PromptVars) -> Result<()> {
        let missing: Vec<&str> = self
            .input_variables
            .iter()
            .copied()
            .filter(|name| !vars.contains_key(name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(format!(
                "Missing prompt variables: {}",
                missing.join(", ")
            )))
        }
    }
}

fn render(template: &str, vars: &PromptVars) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &template[i + 1..];
                let end = rest.find('}').filter(|&end| is_identifier(&rest[..end]));
                let Some(end) = end else {
                    out.push('{');
                    continue;
                };
                let name = &rest[..end];
                let value = vars.get(name).ok_or_else(|| {
                    AppError::ValidationError(format!("Unknown prompt variable: {}", name))
                })?;
                out.push_str(value);
                // Skip the name and the closing brace.
                for _ in 0..=name.chars().count() {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Removes the common leading whitespace of all non-blank lines.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> PromptVars {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_format_substitutes_variables() {
        let template = PromptTemplate::new("Fach: {subject}, Alter: {age}", &["subject", "age"]);
        let out = template
            .format(&vars(&[("subject", "Deutsch"), ("age", "7")]))
            .unwrap();
        assert_eq!(out, "Fach: Deutsch, Alter: 7");
    }

    #[test]
    fn test_missing_variable_is_validation_error() {
        let template = PromptTemplate::new("{subject}", &["subject"]);
        assert!(matches!(
            template.format(&PromptVars::new()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let template = PromptTemplate::new("{{\"key\": \"{value}\"}}", &["value"]);
        let out = template.format(&vars(&[("value", "x")])).unwrap();
        assert_eq!(out, "{\"key\": \"x\"}");
    }

    #[test]
    fn test_substituted_values_are_not_rendered_again() {
        let template = PromptTemplate::new("{schema}", &["schema"]);
        let out = template
            .format(&vars(&[("schema", "{\"type\": \"object\"} {subject}")]))
            .unwrap();
        assert_eq!(out, "{\"type\": \"object\"} {subject}");
    }

    #[test]
    fn test_format_messages_splits_and_dedents() {
        let template = PromptTemplate::new(
            r#"
    |SYSTEM|

    # Experte

    Du hilfst bei {subject}.

    |USER|

    ## Inhalt

    {content}
"#,
            &["subject", "content"],
        );
        let (system, user) = template
            .format_messages(&vars(&[("subject", "Mathe"), ("content", "Zeile 1\n  Zeile 2")]))
            .unwrap();
        assert_eq!(system, "# Experte\n\nDu hilfst bei Mathe.");
        assert_eq!(user, "## Inhalt\n\nZeile 1\n  Zeile 2");
    }

    #[test]
    fn test_template_without_markers_has_empty_system() {
        let template = PromptTemplate::new("  Hallo {name}", &["name"]);
        let (system, user) = template.format_messages(&vars(&[("name", "Max")])).unwrap();
        assert_eq!(system, "");
        assert_eq!(user, "Hallo Max");
    }

    #[test]
    fn test_dedent_keeps_relative_indentation() {
        assert_eq!(dedent("    a\n      b\n\n    c"), "a\n  b\n\nc");
    }
}
