// Markdown image extraction
// Splits user text into text and image parts for vision-capable models

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::ContentPart;

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+?`").expect("Invalid inline code regex"));

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^```[^\n]*\n(.*?\n)^```\s*$").expect("Invalid fenced code regex")
});

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\((\S+?)\)").expect("Invalid image regex"));

/// Byte ranges covered by inline or fenced code
pub fn code_regions(text: &str) -> Vec<Range<usize>> {
    INLINE_CODE
        .find_iter(text)
        .chain(FENCED_CODE.find_iter(text))
        .map(|m| m.range())
        .collect()
}

pub fn contains_image(text: &str) -> bool {
    text.contains("![")
}

/// Split markdown into text parts and image parts.
///
/// Every extracted image leaves an `![image](...)` marker in the surrounding
/// text so the model still sees where it was placed. Data URLs are replaced
/// by their alt text in the marker. Images inside code and non-http(s) URLs
/// stay as plain text.
pub fn split_image_parts(text: &str) -> Vec<ContentPart> {
    let code = code_regions(text);
    let in_code = |pos: usize| code.iter().any(|region| region.contains(&pos));

    let mut parts: Vec<ContentPart> = Vec::new();
    let mut index = 0;

    for captures in MARKDOWN_IMAGE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };

        let alt = captures.get(1).map_or("", |m| m.as_str());
        let url = captures.get(2).map_or("", |m| m.as_str());

        let is_data = url.starts_with("data:");
        let is_http = url.starts_with("https://") || url.starts_with("http://");

        if in_code(whole.start()) || (!is_data && !is_http) {
            push_text(&mut parts, &text[index..whole.end()]);
            index = whole.end();
            continue;
        }

        let marker = format!("![image]({})", if is_data { alt } else { url });

        push_text(&mut parts, &format!("{}{}", &text[index..whole.start()], marker));
        parts.push(ContentPart::image(url));

        index = whole.end();
    }

    push_text(&mut parts, &text[index..]);

    parts
}

fn push_text(parts: &mut Vec<ContentPart>, rest: &str) {
    if let Some(ContentPart::Text { text }) = parts.last_mut() {
        text.push_str(rest);
        return;
    }

    let rest = rest.trim();
    if rest.is_empty() {
        return;
    }

    parts.push(ContentPart::text(rest));
}
