//! Line-level markdown scanning shared by the link and hashtag extractors

use std::borrow::Cow;

/// Yields `(line_number, text)` for every line outside fenced code blocks,
/// with inline code spans blanked out. `first_line` is the 1-based number of
/// the first line of `body` within the whole document.
pub fn prose_lines(body: &str, first_line: u32) -> impl Iterator<Item = (u32, Cow<'_, str>)> {
    let mut fence: Option<(char, usize)> = None;
    body.lines().enumerate().filter_map(move |(idx, line)| {
        let line_no = first_line + idx as u32;
        if let Some(marker) = fence_marker(line) {
            match fence {
                None => {
                    fence = Some(marker);
                    return None;
                }
                Some((ch, len)) if marker.0 == ch && marker.1 >= len => {
                    fence = None;
                    return None;
                }
                Some(_) => return None,
            }
        }
        if fence.is_some() {
            return None;
        }
        Some((line_no, mask_inline_code(line)))
    })
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

/// Replace the contents of backtick code spans with spaces. An opening run
/// closes only at a run of the same length.
pub fn mask_inline_code(line: &str) -> Cow<'_, str> {
    if !line.contains('`') {
        return Cow::Borrowed(line);
    }

    let chars: Vec<char> = line.chars().collect();
    let run_at = |i: usize| chars[i..].iter().take_while(|c| **c == '`').count();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '`' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let run = run_at(i);
        let mut j = i + run;
        let mut close = None;
        while j < chars.len() {
            if chars[j] == '`' {
                let r = run_at(j);
                if r == run {
                    close = Some(j);
                    break;
                }
                j += r;
            } else {
                j += 1;
            }
        }

        match close {
            Some(j) => {
                out.extend(std::iter::repeat_n(' ', j + run - i));
                i = j + run;
            }
            None => {
                out.extend(std::iter::repeat_n('`', run));
                i += run;
            }
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_fenced_blocks() {
        let body = "a\n```rust\n[[inside]]\n```\nb\n~~~~\nc\n~~~\nstill code\n~~~~\nd";
        let lines: Vec<_> = prose_lines(body, 1).map(|(n, l)| (n, l.into_owned())).collect();
        assert_eq!(
            lines,
            vec![
                (1, "a".to_string()),
                (5, "b".to_string()),
                (11, "d".to_string())
            ]
        );
    }

    #[test]
    fn masks_inline_spans() {
        assert_eq!(mask_inline_code("x `[[a]]` y"), "x         y");
        assert_eq!(mask_inline_code("``a ` b`` [[c]]"), "          [[c]]");
        assert_eq!(mask_inline_code("unclosed ` [[c]]"), "unclosed ` [[c]]");
        assert!(matches!(mask_inline_code("plain"), Cow::Borrowed(_)));
    }
}
