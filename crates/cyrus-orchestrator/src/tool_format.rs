// SPDX-License-Identifier: MIT

//! Pure formatting helpers for `EventTranslator`'s tool-call rendering
//! (§4.5 "Tool parameter formatting").

use serde_json::Value;

fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

/// Renders an assistant tool-use's display action and parameter text,
/// given the tool name and its JSON input.
pub fn format_tool_call(tool_name: &str, input: &Value) -> (String, String) {
    if let Some(stripped) = tool_name.strip_prefix("mcp__") {
        let _ = stripped;
        if let Some(obj) = input.as_object() {
            if let Some((key, value)) = obj.iter().next() {
                let value_str = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return (tool_name.to_string(), format!("{key}: {value_str}"));
            }
        }
        return (tool_name.to_string(), String::new());
    }

    match tool_name {
        "Bash" => {
            let command = str_field(input, "command").unwrap_or_default().to_string();
            let action = match str_field(input, "description") {
                Some(desc) if !desc.is_empty() => format!("Bash ({desc})"),
                _ => "Bash".to_string(),
            };
            (action, command)
        }
        "Read" => {
            let path = str_field(input, "file_path").unwrap_or_default().to_string();
            let parameter = match (input.get("offset").and_then(Value::as_i64), input.get("limit").and_then(Value::as_i64)) {
                (Some(offset), Some(limit)) => format!("{path} (lines {offset}-{})", offset + limit),
                _ => path,
            };
            ("Read".to_string(), parameter)
        }
        "Grep" => {
            let pattern = str_field(input, "pattern").unwrap_or_default();
            let path = str_field(input, "path");
            let glob = str_field(input, "glob");
            let mut parameter = format!("Pattern: `{pattern}`");
            if let Some(p) = path {
                parameter.push_str(&format!(" in {p}"));
            }
            if let Some(g) = glob {
                parameter.push_str(&format!(" ({g})"));
            }
            ("Grep".to_string(), parameter)
        }
        "Glob" => {
            let pattern = str_field(input, "pattern").unwrap_or_default();
            let path = str_field(input, "path");
            let mut parameter = format!("Pattern: `{pattern}`");
            if let Some(p) = path {
                parameter.push_str(&format!(" in {p}"));
            }
            ("Glob".to_string(), parameter)
        }
        "WebSearch" => {
            let query = str_field(input, "query").unwrap_or_default();
            ("WebSearch".to_string(), format!("Query: {query}"))
        }
        "Edit" => {
            let path = str_field(input, "file_path").unwrap_or_default();
            let old = str_field(input, "old_string").unwrap_or_default();
            let new = str_field(input, "new_string").unwrap_or_default();
            ("Edit".to_string(), unified_diff(path, old, new))
        }
        other => (other.to_string(), input.to_string()),
    }
}

fn unified_diff(path: &str, old: &str, new: &str) -> String {
    let mut out = format!("--- {path}\n+++ {path}\n");
    for line in old.lines() {
        out.push_str("-");
        out.push_str(line);
        out.push('\n');
    }
    for line in new.lines() {
        out.push_str("+");
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn language_for_extension(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "json" => "json",
        "toml" => "toml",
        "md" => "markdown",
        "sh" | "bash" => "bash",
        _ => "",
    }
}

/// Strips Read's leading `N→` line-number markers and any
/// `<system-reminder>...</system-reminder>` blocks from tool output.
pub fn strip_read_artifacts(content: &str) -> String {
    let mut without_reminders = String::with_capacity(content.len());
    let mut rest = content;
    loop {
        match rest.find("<system-reminder>") {
            Some(start) => {
                without_reminders.push_str(&rest[..start]);
                match rest[start..].find("</system-reminder>") {
                    Some(end_rel) => rest = &rest[start + end_rel + "</system-reminder>".len()..],
                    None => {
                        rest = "";
                        break;
                    }
                }
            }
            None => {
                without_reminders.push_str(rest);
                break;
            }
        }
    }

    without_reminders
        .lines()
        .map(|line| match line.find('\u{2192}') {
            Some(idx) if line[..idx].trim().chars().all(|c| c.is_ascii_digit()) => &line[idx + '\u{2192}'.len_utf8()..],
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps a tool result in a fenced code block, language-tagged by a
/// source file extension when one is known; bash output renders as
/// `*No output*` when empty.
pub fn format_tool_result(tool_name: &str, file_path: Option<&str>, content: &str) -> String {
    let cleaned = if tool_name == "Read" { strip_read_artifacts(content) } else { content.to_string() };

    if tool_name == "Bash" && cleaned.trim().is_empty() {
        return "*No output*".to_string();
    }

    let lang = file_path.map(language_for_extension).unwrap_or("");
    format!("```{lang}\n{cleaned}\n```")
}
