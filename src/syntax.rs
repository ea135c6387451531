//! Syntax checks run on edited files before they are written.
//!
//! Every check returns a human readable string. `"Valid syntax"` means the
//! edit may proceed; anything else is shown to the model so it can fix its
//! tool call.

use std::sync::OnceLock;

use regex::Regex;

pub const VALID_SYNTAX: &str = "Valid syntax";

/// Elements never closed in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr", "!doctype",
];

/// Elements whose end tag may be omitted.
const OPTIONAL_CLOSE: &[&str] = &[
    "p", "li", "dt", "dd", "tr", "td", "th", "option", "optgroup", "thead", "tbody", "tfoot",
    "colgroup", "rt", "rp", "html", "head", "body",
];

/// Check `content` according to the extension of `filename`. The extension
/// is matched as written, so `Main.PY` falls back to bracket balance.
pub fn check_syntax(content: &str, filename: &str) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();

    match extension {
        "py" => parse_python(content),
        "html" | "htm" => parse_html(content),
        "js" => check_bracket_balance(content),
        "css" | "scss" => parse_scss(content),
        "vue" => parse_vue(content),
        "tsx" => parse_tsx(content),
        "yml" | "yaml" => parse_yaml(content),
        _ => check_bracket_balance(content),
    }
}

fn parse_tree(code: &str, language: tree_sitter::Language) -> Result<tree_sitter::Tree, String> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| format!("Error: {}", e))?;
    parser
        .parse(code, None)
        .ok_or_else(|| "Error: parser returned no tree".to_string())
}

fn parse_python(code: &str) -> String {
    let tree = match parse_tree(code, tree_sitter_python::LANGUAGE.into()) {
        Ok(tree) => tree,
        Err(e) => return e,
    };

    let root = tree.root_node();
    if !root.has_error() {
        return VALID_SYNTAX.to_string();
    }

    match first_error_node(root) {
        Some(node) if node.is_missing() => format!(
            "Syntax Error: expected '{}' (line {})",
            node.kind(),
            node.start_position().row + 1
        ),
        Some(node) => format!(
            "Syntax Error: invalid syntax (line {})",
            node.start_position().row + 1
        ),
        None => "Syntax Error: invalid syntax (line 1)".to_string(),
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error_node(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error_node(child) {
                return Some(found);
            }
        }
    }
    None
}

fn parse_html(html: &str) -> String {
    let tree = match parse_tree(html, tree_sitter_html::LANGUAGE.into()) {
        Ok(tree) => tree,
        Err(e) => return e,
    };
    html_problem(tree.root_node(), html.as_bytes()).unwrap_or_else(|| VALID_SYNTAX.to_string())
}

fn node_text(node: tree_sitter::Node<'_>, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_lowercase()
}

fn child_of_kind<'t>(node: tree_sitter::Node<'t>, kind: &str) -> Option<tree_sitter::Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Name of an element that has a start tag but no end tag, unless HTML
/// allows leaving it open.
fn unclosed_element(node: tree_sitter::Node<'_>, source: &[u8]) -> Option<String> {
    let start_tag = child_of_kind(node, "start_tag")?;
    let name = child_of_kind(start_tag, "tag_name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    if VOID_ELEMENTS.contains(&name.as_str()) || OPTIONAL_CLOSE.contains(&name.as_str()) {
        return None;
    }
    match child_of_kind(node, "end_tag") {
        Some(_) => None,
        None => Some(name),
    }
}

/// First problem in document order.
fn html_problem(node: tree_sitter::Node<'_>, source: &[u8]) -> Option<String> {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        return Some(format!("HTML line {}: expected '{}'", line, node.kind()));
    }
    if node.is_error() {
        let snippet: String = node_text(node, source).chars().take(40).collect();
        return Some(format!("HTML line {}: invalid markup near '{}'", line, snippet));
    }
    match node.kind() {
        "erroneous_end_tag" => {
            let name = child_of_kind(node, "erroneous_end_tag_name")
                .map(|n| node_text(n, source))
                .unwrap_or_default();
            return Some(format!("HTML line {}: Unexpected end tag : {}", line, name));
        }
        "element" | "script_element" | "style_element" => {
            if let Some(name) = unclosed_element(node, source) {
                return Some(format!(
                    "HTML line {}: Premature end of data in tag {}",
                    line, name
                ));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| html_problem(child, source))
}

/// Template check used for vue and tsx files.
fn parse_template(code: &str) -> String {
    for tag in ["div", "p", "span", "main"] {
        let response =
            check_template_tag_balance(code, &format!("<{}", tag), &format!("</{}>", tag));
        if response != VALID_SYNTAX {
            return response;
        }
    }
    VALID_SYNTAX.to_string()
}

/// Count `open_tag` occurrences followed by space, `>` or newline against
/// `close_tag` occurrences.
pub fn check_template_tag_balance(code: &str, open_tag: &str, close_tag: &str) -> String {
    let bytes = code.as_bytes();
    let open = open_tag.as_bytes();
    let close = close_tag.as_bytes();
    let mismatch = format!("Invalid syntax, mismatch of {} and {}", open_tag, close_tag);

    let mut opened: i64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(open)
            && matches!(bytes.get(i + open.len()), Some(b' ') | Some(b'>') | Some(b'\n'))
        {
            opened += 1;
            i += open.len();
        } else if bytes[i..].starts_with(close) {
            opened -= 1;
            i += close.len();
            if opened < 0 {
                return mismatch;
            }
        } else {
            i += 1;
        }
    }

    if opened == 0 {
        VALID_SYNTAX.to_string()
    } else {
        mismatch
    }
}

fn bracket_balance(code: &str, open: char, close: char) -> String {
    let mut opened: i64 = 0;
    for c in code.chars() {
        if c == open {
            opened += 1;
        } else if c == close {
            opened -= 1;
            if opened < 0 {
                return format!("Invalid syntax, mismatch of {} and {}", open, close);
            }
        }
    }
    if opened == 0 {
        VALID_SYNTAX.to_string()
    } else {
        format!("Invalid syntax, mismatch of {} and {}", open, close)
    }
}

/// `()`, then `[]`, then `{}`.
pub fn check_bracket_balance(code: &str) -> String {
    for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
        let response = bracket_balance(code, open, close);
        if response != VALID_SYNTAX {
            return response;
        }
    }
    VALID_SYNTAX.to_string()
}

fn import_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"@import\s+['"].*?['"];"#).ok())
        .as_ref()
}

fn stylesheet_location_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+):\d+\s+root stylesheet").ok())
        .as_ref()
}

/// Compile with `grass`. Imports are dropped first since nothing on disk
/// is resolved from an in-memory edit.
fn parse_scss(code: &str) -> String {
    let code = match import_re() {
        Some(re) => re.replace_all(code, "").into_owned(),
        None => code.to_string(),
    };
    let options = grass::Options::default().quiet(true);
    let error = match grass::from_string(code, &options) {
        Ok(_) => return VALID_SYNTAX.to_string(),
        Err(e) => e.to_string(),
    };

    let message = error
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("Error: ");
    let line = stylesheet_location_re()
        .and_then(|re| re.captures(&error))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    match line {
        Some(line) => format!("CSS/SCSS syntax error: {} (line {})", message, line),
        None => format!("CSS/SCSS syntax error: {}", message),
    }
}

fn script_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>").ok())
        .as_ref()
}

fn style_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<style[^>]*>(.*?)</style>").ok())
        .as_ref()
}

/// Checks the template, script and style parts separately. Catches the
/// common mistakes, not every syntax error.
fn parse_vue(content: &str) -> String {
    if let (Some(start), Some(end)) = (content.find("<template>"), content.rfind("</template>")) {
        let start = start + "<template>".len();
        if start <= end {
            let response = parse_template(&content[start..end]);
            if response != VALID_SYNTAX {
                return response;
            }
        }
    }

    let script = script_re()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1));
    let Some(script) = script else {
        return "Script part has no valid open/closing tags.".to_string();
    };
    let response = check_bracket_balance(script.as_str());
    if response != VALID_SYNTAX {
        return response;
    }

    if let Some(style) = style_re()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
    {
        if !style.as_str().is_empty() {
            let response = parse_scss(style.as_str());
            if response != VALID_SYNTAX {
                return response;
            }
        }
    }

    VALID_SYNTAX.to_string()
}

fn parse_tsx(code: &str) -> String {
    let response = parse_template(code);
    if response != VALID_SYNTAX {
        return response;
    }
    check_bracket_balance(code)
}

fn parse_yaml(content: &str) -> String {
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(_) => VALID_SYNTAX.to_string(),
        Err(e) => format!("YAML error: {}", e),
    }
}
