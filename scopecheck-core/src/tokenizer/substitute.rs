//! Capture substitution in scope names and end/while patterns.

use std::borrow::Cow;

use memchr::memchr;

/// Capture group spans of a match, by group number.
pub(crate) type CapturePositions = [Option<(usize, usize)>];

enum Transform {
    Keep,
    Downcase,
    Upcase,
}

fn captured<'t>(text: &'t str, captures: &CapturePositions, group: usize) -> &'t str {
    captures
        .get(group)
        .copied()
        .flatten()
        .and_then(|(start, end)| text.get(start..end))
        .unwrap_or("")
}

/// Expand `$1`, `${1}`, `${1:/downcase}` and `${1:/upcase}` in a rule name.
/// Leading dots are stripped from captured text so it cannot produce empty
/// scope segments.
pub(crate) fn substitute_captures<'a>(template: &'a str, text: &str, captures: &CapturePositions) -> Cow<'a, str> {
    let bytes = template.as_bytes();
    if memchr(b'$', bytes).is_none() {
        return Cow::Borrowed(template);
    }

    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while let Some(offset) = memchr(b'$', &bytes[i..]) {
        let dollar = i + offset;
        out.push_str(&template[i..dollar]);
        match parse_reference(&template[dollar + 1..]) {
            Some((group, transform, consumed)) => {
                let value = captured(text, captures, group).trim_start_matches('.');
                match transform {
                    Transform::Keep => out.push_str(value),
                    Transform::Downcase => out.push_str(&value.to_lowercase()),
                    Transform::Upcase => out.push_str(&value.to_uppercase()),
                }
                i = dollar + 1 + consumed;
            }
            None => {
                out.push('$');
                i = dollar + 1;
            }
        }
    }
    out.push_str(&template[i..]);
    Cow::Owned(out)
}

/// Parse the reference after a `$`. Returns the group, the transform and
/// how many bytes the reference used.
fn parse_reference(rest: &str) -> Option<(usize, Transform, usize)> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        return Some((rest[..digits].parse().ok()?, Transform::Keep, digits));
    }

    let inner = rest.strip_prefix('{')?;
    let close = memchr(b'}', inner.as_bytes())?;
    let body = &inner[..close];
    let (group, transform) = match body.split_once(':') {
        Some((group, "/downcase")) => (group, Transform::Downcase),
        Some((group, "/upcase")) => (group, Transform::Upcase),
        Some(_) => return None,
        None => (body, Transform::Keep),
    };
    Some((group.parse().ok()?, transform, close + 2))
}

/// Replace `\N` in an end/while pattern with the regex-escaped text of begin
/// capture `N`. Other escapes are copied through untouched.
pub(crate) fn resolve_backreferences(pattern: &str, text: &str, captures: &CapturePositions) -> String {
    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while let Some(offset) = memchr(b'\\', &bytes[i..]) {
        let slash = i + offset;
        out.push_str(&pattern[i..slash]);
        let rest = &pattern[slash + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            let escaped = rest.chars().next().map_or(0, char::len_utf8);
            out.push_str(&pattern[slash..slash + 1 + escaped]);
            i = slash + 1 + escaped;
            continue;
        }
        let group = rest[..digits].parse().unwrap_or(usize::MAX);
        escape_regex(captured(text, captures, group), &mut out);
        i = slash + 1 + digits;
    }
    out.push_str(&pattern[i..]);
    out
}

fn escape_regex(value: &str, out: &mut String) {
    for c in value.chars() {
        if c.is_whitespace() || "-\\{}*+?|^$.,[]()#".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
}
