//! A small, table driven vendor prefixer for compiled stylesheets.
//!
//! Prefixed declarations are inserted right before the standard one, each on
//! its own, without aligning the values. A block which already declares a
//! prefixed twin keeps it and gets no duplicate.

use std::collections::HashSet;

const PREFIXES: &[(&str, &[&str])] = &[
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("text-size-adjust", &["-webkit-", "-moz-", "-ms-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("tab-size", &["-moz-"]),
    ("mask-image", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
    ("print-color-adjust", &["-webkit-"]),
];

/// A run of text ended by a top-level `{`, `}` or `;`.
struct Segment<'a> {
    text: &'a str,
    delim: Option<char>,
    block: usize,
}

fn split(css: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut stack = vec![0];
    let mut next_block = 1;
    let mut start = 0;
    let mut quote = None;
    let mut depth = 0usize;

    let mut chars = css.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = ' ';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '{' | '}' | ';' if depth == 0 => {
                let block = stack.last().copied().unwrap_or(0);
                segments.push(Segment {
                    text: &css[start..i],
                    delim: Some(c),
                    block,
                });
                start = i + 1;

                if c == '{' {
                    stack.push(next_block);
                    next_block += 1;
                } else if c == '}' && stack.len() > 1 {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    segments.push(Segment {
        text: &css[start..],
        delim: None,
        block: 0,
    });

    segments
}

/// Splits a declaration into its leading whitespace, the declaration itself
/// and the property name.
fn declaration(text: &str) -> Option<(&str, &str, &str)> {
    let body = text.trim_start();
    let lead = &text[..text.len() - body.len()];

    let (name, _) = body.split_once(':')?;
    let name = name.trim_end();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c == '-') {
        return None;
    }

    Some((lead, body, name))
}

fn prefixes(property: &str) -> &'static [&'static str] {
    PREFIXES
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, prefixes)| *prefixes)
        .unwrap_or(&[])
}

pub(crate) fn prefix(css: &str) -> String {
    let segments = split(css);
    let is_declaration = |s: &Segment| matches!(s.delim, Some(';' | '}'));

    let declared: HashSet<(usize, &str)> = segments
        .iter()
        .filter(|s| is_declaration(s))
        .filter_map(|s| declaration(s.text).map(|(_, _, name)| (s.block, name)))
        .collect();

    let mut out = String::with_capacity(css.len() + css.len() / 8);
    for segment in &segments {
        if is_declaration(segment)
            && let Some((lead, body, name)) = declaration(segment.text)
        {
            for prefix in prefixes(name) {
                let twin = format!("{prefix}{name}");
                if declared.contains(&(segment.block, twin.as_str())) {
                    continue;
                }
                out.push_str(lead);
                out.push_str(prefix);
                out.push_str(body);
                out.push(';');
            }
        }

        out.push_str(segment.text);
        if let Some(delim) = segment.delim {
            out.push(delim);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_output() {
        let css = "a {\n  color: red;\n  user-select: none;\n}\n";
        let expected = "a {\n  color: red;\n  -webkit-user-select: none;\n  -moz-user-select: none;\n  -ms-user-select: none;\n  user-select: none;\n}\n";
        assert_eq!(prefix(css), expected);
    }

    #[test]
    fn test_compressed_last_declaration() {
        let css = "a{color:red;appearance:none}b{color:blue}";
        let expected = "a{color:red;-webkit-appearance:none;-moz-appearance:none;appearance:none}b{color:blue}";
        assert_eq!(prefix(css), expected);
    }

    #[test]
    fn test_existing_twin_is_kept() {
        let css = "a{-webkit-user-select:none;user-select:none}";
        let expected = "a{-webkit-user-select:none;-moz-user-select:none;-ms-user-select:none;user-select:none}";
        assert_eq!(prefix(css), expected);
    }

    #[test]
    fn test_selectors_and_strings_are_untouched() {
        let css = "hyphens{color:red}a{background:url(data:image/png;base64,AAAA);content:\"tab-size: 4;\"}";
        assert_eq!(prefix(css), css);
    }

    #[test]
    fn test_nested_blocks() {
        let css = "@media print{a{print-color-adjust:exact}}";
        let expected = "@media print{a{-webkit-print-color-adjust:exact;print-color-adjust:exact}}";
        assert_eq!(prefix(css), expected);
    }
}
