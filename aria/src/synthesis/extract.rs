//! Code extraction from raw model responses
//!
//! Models sometimes fence their code, sometimes not, and sometimes wrap it in
//! prose despite instructions. The extractor keeps the content of fenced
//! regions verbatim; when no fence markers exist anywhere, every non-empty
//! line is treated as code. Line order and content are preserved untouched -
//! structural repair is the normalizer's job.

/// Isolate the code payload from a raw model response
pub fn extract_code(raw_response: &str) -> String {
    let has_fence = raw_response
        .lines()
        .any(|line| line.trim_start().starts_with("```"));

    let mut code_lines: Vec<&str> = Vec::new();

    if has_fence {
        let mut in_fence = false;
        for line in raw_response.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                code_lines.push(line);
            }
        }
    } else {
        for line in raw_response.lines() {
            if !line.trim().is_empty() {
                code_lines.push(line);
            }
        }
    }

    code_lines.join("\n")
}
