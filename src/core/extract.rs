//! Extraction of JSON payloads from free-form model output.
//!
//! Models wrap JSON in prose or code fences; the first balanced top-level
//! `{...}` block is taken as the payload. Braces inside string literals are
//! ignored.

/// Return the first balanced top-level JSON object in `text`, if any
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        match balanced_end(&text[start..]) {
            Some(len) => return Some(&text[start..start + len]),
            None => search_from = start + 1,
        }
    }

    None
}

/// Byte length of the balanced object starting at `text[0] == '{'`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
