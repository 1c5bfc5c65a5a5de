//! Markup handling for note text
//!
//! Note text may carry a small subset of HTML produced by the editor. Anything outside of that
//! subset is removed before the text is stored, so stored text is always safe to render.

/// Tags that survive sanitizing, without any attributes
const ALLOWED_TAGS: [&str; 9] = [
    "p",
    "br",
    "strong",
    "em",
    "ul",
    "ol",
    "li",
    "blockquote",
    "code",
];

/// Tags that are dropped together with everything inside them
const DROPPED_WITH_CONTENT: [&str; 2] = ["script", "style"];

/// A single tag found in the text
struct Tag<'a> {
    /// Lowercased tag name
    name: String,

    /// Closing tag, like `</p>`
    is_closing: bool,

    /// The remainder of the input after the tag
    rest: &'a str,
}

/// Try to read a tag at the start of `input`, which starts with `<`
fn read_tag(input: &str) -> Option<Tag<'_>> {
    let end = input.find('>')?;
    let inner = &input[1..end];

    let (is_closing, inner) = match inner.strip_prefix('/') {
        Some(inner) => (true, inner),
        None => (false, inner),
    };

    let name: String = inner
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();

    if name.is_empty() || !name.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return None;
    }

    // anything after the name has to be attributes or a self-closing slash
    let after_name = &inner[name.len()..];
    if !after_name.is_empty() && !after_name.starts_with(|ch: char| ch.is_whitespace() || ch == '/')
    {
        return None;
    }

    Some(Tag {
        name,
        is_closing,
        rest: &input[end + 1..],
    })
}

/// Skip everything up to and including the closing tag of `name`
fn skip_element<'a>(input: &'a str, name: &str) -> &'a str {
    let lowercase = input.to_ascii_lowercase();
    let closing = format!("</{name}");

    match lowercase.find(&closing) {
        Some(start) => match input[start..].find('>') {
            Some(end) => &input[start + end + 1..],
            None => "",
        },
        None => "",
    }
}

/// Sanitize note text to the allowed markup subset
///
/// - Allowed tags are kept, without attributes
/// - Other tags are removed, their text is kept
/// - `script` and `style` elements are removed with their content
/// - A `<` that does not open a tag is escaped
pub fn sanitize(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(position) = rest.find('<') {
        output.push_str(&rest[..position]);
        rest = &rest[position..];

        let Some(tag) = read_tag(rest) else {
            output.push_str("&lt;");
            rest = &rest[1..];
            continue;
        };

        if DROPPED_WITH_CONTENT.contains(&tag.name.as_str()) {
            rest = if tag.is_closing {
                tag.rest
            } else {
                skip_element(tag.rest, &tag.name)
            };
            continue;
        }

        if ALLOWED_TAGS.contains(&tag.name.as_str()) {
            if tag.is_closing {
                if tag.name != "br" {
                    output.push_str("</");
                    output.push_str(&tag.name);
                    output.push('>');
                }
            } else {
                output.push('<');
                output.push_str(&tag.name);
                output.push('>');
            }
        }

        rest = tag.rest;
    }

    output.push_str(rest);
    output
}

/// Strip all markup from the text, leaving the readable content
pub fn plain_text(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(position) = rest.find('<') {
        output.push_str(&rest[..position]);
        rest = &rest[position..];

        match read_tag(rest) {
            Some(tag) => {
                // keep words of adjacent blocks apart
                if tag.name == "br" || tag.name == "p" || tag.name == "li" {
                    output.push(' ');
                }
                rest = tag.rest;
            }
            None => {
                output.push('<');
                rest = &rest[1..];
            }
        }
    }

    output.push_str(rest);

    output
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Does the text contain anything readable?
pub fn has_content(text: &str) -> bool {
    !plain_text(text).trim().is_empty()
}
