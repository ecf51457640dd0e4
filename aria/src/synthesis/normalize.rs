//! Structural normalization of generated code
//!
//! Model output frequently arrives with flattened or inconsistent block
//! nesting: bodies not indented under `try`/`if`/`for`, exception handlers
//! pushed one level too deep, missing colons, several statements jammed onto
//! one line. This module re-derives a consistent nesting structure with a
//! single-pass, line-oriented state machine, then runs a second defensive
//! pass that pulls mis-nested exception handlers back toward their `try`.
//!
//! The repairs target the failure patterns actually observed (mis-nested
//! handlers, missing colons, jammed statements). Mismatched multi-level
//! dedents across nested blocks are not re-derived; the result is best-effort
//! and aims to be executable, not canonical.

use regex::Regex;

const INDENT_UNIT: &str = "    ";

/// Why a line was rejected by the statement check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRejection {
    /// Parentheses, brackets or braces do not balance
    UnbalancedDelimiters,
    /// A string literal is opened but never closed
    UnterminatedString,
    /// Reads as prose rather than code
    Prose,
}

/// Normalize block nesting of extracted code.
///
/// Input lines are considered structure-free: original indentation is
/// discarded and re-derived. Unparseable lines are kept commented out so no
/// information is silently lost. Re-normalizing well-formed output is a
/// no-op.
pub fn normalize(code: &str) -> String {
    let splitter = StatementSplitter::new();
    let lines = first_pass(code, &splitter);
    let repaired = realign_handlers(lines);
    repaired.join("\n")
}

fn first_pass(code: &str, splitter: &StatementSplitter) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut indent_level: usize = 0;

    for raw_line in code.lines() {
        let line = raw_line.trim();

        if line.is_empty() {
            out.push(String::new());
            continue;
        }
        if is_noise(line) {
            continue;
        }

        if is_handler(line) {
            // Generated text regularly nests `except`/`finally` one level too
            // deep; pull it back to align with its `try`, then indent the body.
            indent_level = indent_level.saturating_sub(1);
            let (mut header, rest) = split_inline_body(line);
            if !header.ends_with(':') {
                header.push(':');
            }
            out.push(format!("{}{}", INDENT_UNIT.repeat(indent_level), header));
            indent_level += 1;
            emit_statements(&rest, indent_level, splitter, &mut out);
        } else if is_bare_else_or_elif(line) {
            // Missing colon: align with the matching `if`/`for`, repair, open.
            indent_level = indent_level.saturating_sub(1);
            out.push(format!("{}{}:", INDENT_UNIT.repeat(indent_level), line));
            indent_level += 1;
        } else if is_block_opener(line) {
            let (mut header, rest) = split_inline_body(line);
            if !header.ends_with(':') {
                header.push(':');
            }
            out.push(format!("{}{}", INDENT_UNIT.repeat(indent_level), header));
            indent_level += 1;
            emit_statements(&rest, indent_level, splitter, &mut out);
        } else if is_terminal(line) {
            // Block exit is driven by the next opener, not by the terminal
            // statement itself.
            out.push(format!("{}{}", INDENT_UNIT.repeat(indent_level), line));
        } else {
            emit_statements(line, indent_level, splitter, &mut out);
        }
    }

    out
}

/// Emit one or more statements found on a single physical line, gating each
/// through the statement check.
fn emit_statements(text: &str, indent_level: usize, splitter: &StatementSplitter, out: &mut Vec<String>) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let indent = INDENT_UNIT.repeat(indent_level);
    for part in splitter.split(text) {
        match check_statement(&part) {
            Ok(()) => out.push(format!("{}{}", indent, part)),
            Err(_) => out.push(format!("{}# {}", indent, part)),
        }
    }
}

/// Second pass: pull back exception handlers the first pass under-corrected.
///
/// A handler indented two or more units past its nearest enclosing `try`
/// loses one unit. Applied to the emitted text, so it is independently
/// testable against arbitrary input.
pub fn realign_handlers(lines: Vec<String>) -> Vec<String> {
    let mut result = lines;
    for i in 0..result.len() {
        let trimmed = result[i].trim_start().to_string();
        if !is_handler(&trimmed) {
            continue;
        }
        let handler_indent = indent_of(&result[i]);
        let try_indent = result[..i]
            .iter()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .find(|l| {
                let t = l.trim_start();
                (t == "try:" || t.starts_with("try:")) && indent_of(l) < handler_indent
            })
            .map(|l| indent_of(l));
        if let Some(try_indent) = try_indent {
            if handler_indent >= try_indent + 2 {
                result[i] = format!("{}{}", INDENT_UNIT.repeat(handler_indent - 1), trimmed);
            }
        }
    }
    result
}

fn indent_of(line: &str) -> usize {
    let spaces = line.len() - line.trim_start().len();
    spaces / INDENT_UNIT.len()
}

/// Comment, markdown fence or bullet marker
fn is_noise(line: &str) -> bool {
    line.starts_with("```")
        || line.starts_with('#')
        || line.starts_with("- ")
        || line.starts_with("* ")
        || line.starts_with("> ")
}

fn is_handler(line: &str) -> bool {
    starts_with_word(line, "except") || starts_with_word(line, "finally")
}

fn is_bare_else_or_elif(line: &str) -> bool {
    if line.ends_with(':') {
        return false;
    }
    line == "else" || starts_with_word(line, "elif")
}

const BLOCK_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "with", "try", "async",
];

fn is_block_opener(line: &str) -> bool {
    if BLOCK_KEYWORDS.iter().any(|kw| starts_with_word(line, kw)) {
        // A keyword alone is not enough: the colon is the header evidence.
        // Missing-colon repair applies only to else/elif/except.
        return line.contains(':');
    }
    // Anything else ending in a block colon (e.g. `match x:`)
    line.ends_with(':')
}

fn is_terminal(line: &str) -> bool {
    ["return", "pass", "break", "continue"]
        .iter()
        .any(|kw| starts_with_word(line, kw))
}

fn starts_with_word(line: &str, word: &str) -> bool {
    match line.strip_prefix(word) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

/// Split a block header into the header proper and any inline body after the
/// colon (`if x: do()` -> `("if x", "do()")`). The header colon is the first
/// colon outside any string or bracket.
fn split_inline_body(line: &str) -> (String, String) {
    let mut scanner = DelimiterScanner::new();
    for (i, c) in line.char_indices() {
        scanner.feed(c);
        if c == ':' && scanner.at_top_level() {
            let header = line[..i].trim_end().to_string();
            let rest = line[i + 1..].trim().to_string();
            return (header, rest);
        }
    }
    (line.to_string(), String::new())
}

/// Best-effort single-statement check: explicit accept/reject, no exceptions.
pub fn check_statement(line: &str) -> Result<(), ParseRejection> {
    let mut scanner = DelimiterScanner::new();
    for c in line.chars() {
        if !scanner.feed(c) {
            return Err(ParseRejection::UnbalancedDelimiters);
        }
    }
    if scanner.in_string() {
        return Err(ParseRejection::UnterminatedString);
    }
    if !scanner.balanced() {
        return Err(ParseRejection::UnbalancedDelimiters);
    }

    // Prose heuristic: several words, no code-like characters at all.
    let word_count = line.split_whitespace().count();
    let has_code_chars = line
        .chars()
        .any(|c| c.is_ascii_digit() || "=()[]{}.:'\"+-*/%<>,_".contains(c));
    if word_count >= 3 && !has_code_chars {
        return Err(ParseRejection::Prose);
    }
    Ok(())
}

/// Tracks string state and bracket nesting across a line
struct DelimiterScanner {
    stack: Vec<char>,
    quote: Option<char>,
    escaped: bool,
}

impl DelimiterScanner {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            quote: None,
            escaped: false,
        }
    }

    /// Feed one character; returns false on a bracket mismatch
    fn feed(&mut self, c: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return true;
        }
        if let Some(q) = self.quote {
            match c {
                '\\' => self.escaped = true,
                _ if c == q => self.quote = None,
                _ => {}
            }
            return true;
        }
        match c {
            '\'' | '"' => self.quote = Some(c),
            '(' | '[' | '{' => self.stack.push(c),
            ')' => return self.stack.pop() == Some('('),
            ']' => return self.stack.pop() == Some('['),
            '}' => return self.stack.pop() == Some('{'),
            _ => {}
        }
        true
    }

    fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    fn balanced(&self) -> bool {
        self.stack.is_empty()
    }

    fn at_top_level(&self) -> bool {
        self.stack.is_empty() && self.quote.is_none()
    }
}

/// Splits physical lines that carry several independent statements.
///
/// A split point is a whitespace run that follows a closing parenthesis,
/// quote or word character and is followed by something that starts a new
/// statement (an assignment target or a known call prefix), outside any
/// string or bracket.
struct StatementSplitter {
    whitespace_re: Regex,
    statement_start_re: Regex,
}

impl StatementSplitter {
    fn new() -> Self {
        Self {
            whitespace_re: Regex::new(r"\s+").unwrap(),
            statement_start_re: Regex::new(
                r"^(?:[A-Za-z_][A-Za-z0-9_]*\s*=(?:[^=]|$)|print\(|return\b|import\b|from\b|plt\.|np\.)",
            )
            .unwrap(),
        }
    }

    fn split(&self, line: &str) -> Vec<String> {
        let mut cut_points: Vec<(usize, usize)> = Vec::new();

        for m in self.whitespace_re.find_iter(line) {
            if m.start() == 0 || m.end() >= line.len() {
                continue;
            }
            let before = match line[..m.start()].chars().last() {
                Some(c) => c,
                None => continue,
            };
            let boundary = before == ')' || before == '"' || before == '\'' || before.is_alphanumeric() || before == '_';
            if !boundary {
                continue;
            }
            if !self.statement_start_re.is_match(&line[m.end()..]) {
                continue;
            }
            if !top_level_at(line, m.start()) {
                continue;
            }
            cut_points.push((m.start(), m.end()));
        }

        if cut_points.is_empty() {
            return vec![line.to_string()];
        }

        let mut parts = Vec::with_capacity(cut_points.len() + 1);
        let mut start = 0;
        for (cut_start, cut_end) in cut_points {
            let piece = line[start..cut_start].trim();
            if !piece.is_empty() {
                parts.push(piece.to_string());
            }
            start = cut_end;
        }
        let tail = line[start..].trim();
        if !tail.is_empty() {
            parts.push(tail.to_string());
        }
        parts
    }
}

/// True when position `pos` of `line` is outside every string and bracket
fn top_level_at(line: &str, pos: usize) -> bool {
    let mut scanner = DelimiterScanner::new();
    for (i, c) in line.char_indices() {
        if i >= pos {
            break;
        }
        scanner.feed(c);
    }
    scanner.at_top_level()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flattened_try_except_realigned() {
        // Model emitted everything flush-left, handler mis-nested
        let input = "try:\nresult = compute()\n        except Exception as e:\nprint(e)";
        let expected = "try:\n    result = compute()\nexcept Exception as e:\n    print(e)";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_idempotent_on_well_formed_code() {
        let code = "import math\n\ntry:\n    value = math.factorial(5)\n    print(value)\nexcept Exception as e:\n    print(e)";
        let once = normalize(code);
        assert_eq!(once, code);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_missing_colon_on_except_repaired() {
        let input = "try:\nx = 1\nexcept ValueError";
        let out = normalize(input);
        assert!(out.contains("except ValueError:"));
    }

    #[test]
    fn test_bare_else_gets_colon_and_dedent() {
        let input = "if ready:\nstart()\nelse\nwait()";
        let expected = "if ready:\n    start()\nelse:\n    wait()";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_jammed_statements_split_into_siblings() {
        let input = "x = 5 y = 10 print(x + y)";
        let expected = "x = 5\ny = 10\nprint(x + y)";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_no_split_inside_string_or_call() {
        let splitter = StatementSplitter::new();
        assert_eq!(
            splitter.split(r#"print("a b = 5 in a string")"#),
            vec![r#"print("a b = 5 in a string")"#.to_string()]
        );
        assert_eq!(
            splitter.split("f(a, b = 2)"),
            vec!["f(a, b = 2)".to_string()]
        );
    }

    #[test]
    fn test_inline_block_body_split() {
        let input = "if x > 0: print(x)";
        let expected = "if x > 0:\n    print(x)";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_dict_colon_not_a_header_colon() {
        let input = "for k, v in {1: 2}.items(): print(k)";
        let expected = "for k, v in {1: 2}.items():\n    print(k)";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_noise_lines_dropped() {
        let input = "```python\n# setup\n- first step\nx = 1\n```";
        assert_eq!(normalize(input), "x = 1");
    }

    #[test]
    fn test_prose_commented_out_not_dropped() {
        let input = "Here is the generated code\nx = 1";
        let expected = "# Here is the generated code\nx = 1";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_unbalanced_line_commented_out() {
        let input = "print((1, 2)\nx = 1";
        let expected = "# print((1, 2)\nx = 1";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_terminal_keeps_level() {
        let input = "def f():\nreturn 1";
        let expected = "def f():\n    return 1";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_blank_lines_preserved() {
        let input = "x = 1\n\ny = 2";
        assert_eq!(normalize(input), "x = 1\n\ny = 2");
    }

    #[test]
    fn test_realign_handlers_pass() {
        let lines = vec![
            "try:".to_string(),
            "    x = 1".to_string(),
            "        except ValueError:".to_string(),
        ];
        let out = realign_handlers(lines);
        assert_eq!(out[2], "    except ValueError:");
    }

    #[test]
    fn test_realign_leaves_aligned_handler_alone() {
        let lines = vec![
            "try:".to_string(),
            "    x = 1".to_string(),
            "except ValueError:".to_string(),
        ];
        let out = realign_handlers(lines.clone());
        assert_eq!(out, lines);
    }

    #[test]
    fn test_check_statement_rejections() {
        assert_eq!(check_statement("x = [1, 2"), Err(ParseRejection::UnbalancedDelimiters));
        assert_eq!(check_statement("s = 'oops"), Err(ParseRejection::UnterminatedString));
        assert_eq!(
            check_statement("and that is how it works"),
            Err(ParseRejection::Prose)
        );
        assert_eq!(check_statement("x = f(1, 2)"), Ok(()));
        assert_eq!(check_statement("import numpy"), Ok(()));
    }
}
