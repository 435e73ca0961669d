//! HTML → plain text
//!
//! Good enough for support message bodies: block elements become line
//! breaks, links keep their target, everything else is stripped.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));

static BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|tr|blockquote|pre)\s*>").expect("block end pattern is valid")
});

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("list item pattern is valid"));

static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("link pattern is valid")
});

static DROPPED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)\s*>")
        .expect("dropped block pattern is valid")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank lines pattern is valid"));

/// Convert an HTML fragment to readable text
pub fn to_text(html: &str) -> String {
    let text = DROPPED_BLOCK.replace_all(html, "");
    let text = LINK.replace_all(&text, |caps: &regex::Captures| {
        let label = TAG.replace_all(&caps[2], "");
        let href = &caps[1];
        if label.trim().is_empty() || label.trim() == href {
            href.to_string()
        } else {
            format!("[{}]({})", label.trim(), href)
        }
    });
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = LIST_ITEM.replace_all(&text, "- ");
    let text = BLOCK_END.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = BLANK_LINES.replace_all(&text, "\n\n");

    text.trim().to_string()
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
