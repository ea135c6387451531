//! Code chunking for per-chunk descriptions.
//!
//! A file is cut into top-level blocks: a block starts at every
//! non-indented line that opens a new construct. Blocks are then packed
//! into chunks of at most `MAX_CHUNK_SIZE` characters.

/// Maximum chunk size in characters.
const MAX_CHUNK_SIZE: usize = 2000;

/// Chunks shorter than this are merged into their predecessor.
const MIN_CHUNK_SIZE: usize = 100;

/// Starts a new top-level block for the given language.
fn starts_block(line: &str, extension: &str) -> bool {
    if line.is_empty() || line.starts_with(char::is_whitespace) {
        return false;
    }
    let closing = ['}', ')', ']'];
    if line.starts_with(closing) {
        return false;
    }
    match extension {
        "py" => !line.starts_with('#'),
        "html" | "htm" | "vue" => line.starts_with('<') && !line.starts_with("</"),
        _ => !line.starts_with("//") && !line.starts_with("/*") && !line.starts_with('*'),
    }
}

fn top_level_blocks(content: &str, extension: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_decorator = false;

    for line in content.lines() {
        let is_start = starts_block(line, extension) && !prev_decorator;
        if is_start && !current.trim().is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
        if !line.trim().is_empty() {
            prev_decorator = extension == "py" && line.starts_with('@');
        }
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Cut an oversized block by lines, splitting single huge lines by chars.
fn split_long_block(block: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in block.lines() {
        if current.len() + line.len() + 1 > MAX_CHUNK_SIZE && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if line.len() > MAX_CHUNK_SIZE {
            let chars: Vec<char> = line.chars().collect();
            for part in chars.chunks(MAX_CHUNK_SIZE) {
                pieces.push(part.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Split `content` of a file with `extension` into description-sized chunks.
pub fn split_code(content: &str, extension: &str) -> Vec<String> {
    let extension = extension.to_ascii_lowercase();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for block in top_level_blocks(content, &extension) {
        if block.len() > MAX_CHUNK_SIZE {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_long_block(&block));
            continue;
        }
        if current.len() + block.len() > MAX_CHUNK_SIZE {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&block);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    // Fold tiny trailing pieces back into the chunk before them.
    let mut merged: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(last)
                if chunk.trim().len() < MIN_CHUNK_SIZE
                    && last.len() + chunk.len() <= MAX_CHUNK_SIZE =>
            {
                last.push_str(&chunk)
            }
            _ => merged.push(chunk),
        }
    }
    merged
        .into_iter()
        .map(|c| c.trim_end().to_string())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_function(name: &str, body_lines: usize) -> String {
        let mut out = format!("def {}():\n", name);
        for i in 0..body_lines {
            out.push_str(&format!("    value_{} = compute_something_long({})\n", i, i));
        }
        out
    }

    #[test]
    fn test_small_file_is_one_chunk() {
        let code = "import os\n\ndef main():\n    print(os.getcwd())\n";
        assert_eq!(split_code(code, "py").len(), 1);
    }

    #[test]
    fn test_large_file_splits_on_top_level_blocks() {
        let code = format!(
            "{}\n{}\n{}",
            python_function("first", 30),
            python_function("second", 30),
            python_function("third", 30)
        );
        let chunks = split_code(&code, "py");
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_CHUNK_SIZE);
            assert!(chunk.starts_with("def "));
        }
        assert_eq!(chunks.concat().matches("def ").count(), 3);
    }

    #[test]
    fn test_decorator_stays_with_function() {
        let code = format!(
            "{}\n@app.route('/x')\n{}",
            python_function("first", 40),
            python_function("second", 40)
        );
        let chunks = split_code(&code, "py");
        assert!(chunks.iter().any(|c| c.starts_with("@app.route('/x')\ndef second")));
    }

    #[test]
    fn test_oversized_block_is_cut() {
        let code = python_function("huge", 200);
        let chunks = split_code(&code, "py");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CHUNK_SIZE));
    }

    #[test]
    fn test_closing_braces_do_not_start_blocks() {
        let code = "function a() {\n  return 1;\n}\nfunction b() {\n  return 2;\n}\n";
        let blocks = top_level_blocks(code, "js");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].ends_with("}\n"));
    }
}
