//! Helpers for handler documentation text.
//!
//! Documentation attached to handlers mixes three things: prose, query
//! parameter lines written as `name -- description`, and an optional
//! override block introduced by a `---` line. These helpers pull them apart.

/// Line that introduces an override block
pub const BLOCK_MARKER: &str = "---";

/// Separator of `name -- description` parameter lines
pub const PARAM_SEPARATOR: &str = " -- ";

/// Normalize indentation the way docstrings are normalized: tabs expanded,
/// the common indentation of every line after the first removed, leading
/// and trailing blank lines dropped.
pub fn trim_doc(doc: &str) -> String {
    let expanded = doc.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let indent = common_indent(&lines[1..]);
    let mut trimmed = vec![lines[0].trim().to_string()];
    for line in &lines[1..] {
        trimmed.push(strip_indent(line, indent).trim_end().to_string());
    }

    while trimmed.last().map_or(false, |line| line.is_empty()) {
        trimmed.pop();
    }
    while trimmed.first().map_or(false, |line| line.is_empty()) {
        trimmed.remove(0);
    }

    trimmed.join("\n")
}

/// Remove the common indentation of every line after the first, then trim
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let indent = common_indent(&lines[1..]);
    let mut out = vec![lines[0].to_string()];
    out.extend(lines[1..].iter().map(|line| strip_indent(line, indent).to_string()));
    out.join("\n").trim().to_string()
}

fn common_indent(lines: &[&str]) -> usize {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| leading_indent(line))
        .min()
        .unwrap_or(0)
}

/// Byte length of the ASCII space and tab run a line starts with
fn leading_indent(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    &line[leading_indent(line).min(indent)..]
}

/// Documentation with its override block removed
pub fn strip_block(doc: &str) -> String {
    let trimmed = trim_doc(doc);
    let lines: Vec<&str> = trimmed.lines().collect();
    match lines.iter().rposition(|line| line.trim() == BLOCK_MARKER) {
        Some(cut) => lines[..cut].join("\n"),
        None => trimmed,
    }
}

/// Documentation cut before its first `name -- description` line
pub fn strip_params(doc: &str) -> String {
    let trimmed = trim_doc(doc);
    let lines: Vec<&str> = trimmed.lines().collect();
    match lines.iter().position(|line| line.trim().contains(PARAM_SEPARATOR)) {
        Some(cut) => lines[..cut].join("\n"),
        None => trimmed,
    }
}

/// The override block of a documentation text, dedented, marker line included
pub fn extract_block(doc: &str) -> Option<String> {
    let trimmed = trim_doc(doc);
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.trim().starts_with(BLOCK_MARKER))?;
    Some(dedent(&lines[start..].join("\n")))
}

/// `(name, description)` pairs declared as `name -- description` lines
pub fn param_lines(doc: &str) -> Vec<(String, String)> {
    doc.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(PARAM_SEPARATOR).collect();
            match parts.as_slice() {
                [name, description] => Some((name.trim().to_string(), description.trim().to_string())),
                _ => None,
            }
        })
        .collect()
}

/// First sentence of the first line, without block or parameter lines
pub fn summary(doc: &str) -> String {
    let first_line = trim_doc(doc).lines().next().unwrap_or_default().to_string();
    let sentence = first_line.split('.').next().unwrap_or_default();
    strip_params(&strip_block(sentence)).trim().to_string()
}

/// Prose of the handler documentation followed by the method documentation,
/// flattened onto one line
pub fn description(handler_doc: Option<&str>, method_doc: Option<&str>) -> String {
    let mut text = String::new();

    if let Some(doc) = handler_doc {
        text.push_str(&strip_params(&strip_block(doc)));
    }
    text.push_str("  \n");
    if let Some(doc) = method_doc {
        text.push('\n');
        text.push_str(&strip_params(&strip_block(&dedent(doc))));
    }

    text.trim().replace('\n', " ")
}
