//! Markdown subset used by assistant replies, rendered to HTML that is safe
//! to insert into the webview.
//!
//! All input is HTML-escaped before any markup is produced, so the only tags
//! in the output are the ones this module emits. Links are kept only for
//! `http`, `https` and `mailto` targets.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static UNORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.+)$").expect("valid regex"));
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").expect("valid regex"));
static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}[ \t]+\S").expect("valid regex"));
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\n?(.*?)```").expect("valid regex")
});
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid regex"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*#*[ \t]*$").expect("valid regex")
});
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n](?:.*?[^*\n])?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid regex"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x00([BI])(\d+)\x00").expect("valid regex"));

/// Fragments pulled out of the text so later substitutions cannot touch them.
#[derive(Default)]
struct Stash {
    fragments: Vec<String>,
}

impl Stash {
    fn block(&mut self, html: String) -> String {
        self.fragments.push(html);
        format!("\n\n\x00B{}\x00\n\n", self.fragments.len() - 1)
    }

    fn inline(&mut self, html: String) -> String {
        self.fragments.push(html);
        format!("\x00I{}\x00", self.fragments.len() - 1)
    }

    fn restore(&self, html: &str) -> String {
        PLACEHOLDER
            .replace_all(html, |caps: &Captures| {
                caps[2]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.fragments.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Renders chat markdown to sanitized HTML.
pub fn render_markdown(input: &str) -> String {
    let cleaned = input.replace("\r\n", "\n").replace('\0', "");
    let escaped = html_escape::encode_text(&cleaned).into_owned();

    let mut stash = Stash::default();
    let text = protect_code(&escaped, &mut stash);
    let text = wrap_lists(&text);
    let text = apply_inline(&text, &mut stash);
    let html = paragraphs(&text);
    stash.restore(&html)
}

fn protect_code(text: &str, stash: &mut Stash) -> String {
    let text = CODE_FENCE.replace_all(text, |caps: &Captures| {
        let lang = &caps[1];
        let body = caps[2].trim_end_matches('\n');
        let class = if lang.is_empty() {
            String::new()
        } else {
            format!(" class=\"language-{lang}\"")
        };
        stash.block(format!("<pre><code{class}>{body}</code></pre>"))
    });
    INLINE_CODE
        .replace_all(&text, |caps: &Captures| {
            stash.inline(format!("<code>{}</code>", &caps[1]))
        })
        .into_owned()
}

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

/// Pass 1: folds consecutive list lines into a single `<ul>`/`<ol>` and
/// isolates lists and headings as their own blocks.
fn wrap_lists(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<(ListKind, Vec<String>)> = None;

    let flush = |out: &mut Vec<String>, current: &mut Option<(ListKind, Vec<String>)>| {
        if let Some((kind, items)) = current.take() {
            let tag = kind.tag();
            let body: String = items.iter().map(|i| format!("<li>{i}</li>")).collect();
            out.push(String::new());
            out.push(format!("<{tag}>{body}</{tag}>"));
            out.push(String::new());
        }
    };

    for line in text.lines() {
        let item = if let Some(caps) = UNORDERED_ITEM.captures(line) {
            Some((ListKind::Unordered, caps[1].trim().to_string()))
        } else {
            ORDERED_ITEM
                .captures(line)
                .map(|caps| (ListKind::Ordered, caps[1].trim().to_string()))
        };

        match item {
            Some((kind, content)) => {
                match current.as_mut() {
                    Some((open, items)) if *open == kind => items.push(content),
                    _ => {
                        flush(&mut out, &mut current);
                        current = Some((kind, vec![content]));
                    }
                }
            }
            None => {
                flush(&mut out, &mut current);
                if HEADING_LINE.is_match(line) {
                    out.push(String::new());
                    out.push(line.to_string());
                    out.push(String::new());
                } else {
                    out.push(line.to_string());
                }
            }
        }
    }
    flush(&mut out, &mut current);
    out.join("\n")
}

/// Pass 2: links, headings, bold, italic.
fn apply_inline(text: &str, stash: &mut Stash) -> String {
    let text = LINK.replace_all(text, |caps: &Captures| match safe_href(&caps[2]) {
        Some(href) => {
            // The label may already hold stashed code spans.
            let label = stash.restore(&caps[1]);
            stash.inline(format!(
                "<a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">{label}</a>"
            ))
        }
        None => caps[1].to_string(),
    });
    let text = HEADING.replace_all(&text, |caps: &Captures| {
        let level = caps[1].len();
        format!("<h{level}>{}</h{level}>", &caps[2])
    });
    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    ITALIC.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Returns the attribute-escaped href if the target uses an allowed scheme.
fn safe_href(escaped: &str) -> Option<String> {
    let raw = html_escape::decode_html_entities(escaped);
    let url = url::Url::parse(&raw).ok()?;
    match url.scheme() {
        "http" | "https" | "mailto" => {
            Some(html_escape::encode_double_quoted_attribute(url.as_str()).into_owned())
        }
        _ => None,
    }
}

fn is_block(chunk: &str) -> bool {
    chunk.starts_with("<h")
        || chunk.starts_with("<ul>")
        || chunk.starts_with("<ol>")
        || chunk.starts_with("\x00B")
}

/// Blank-line separated chunks become paragraphs; single newlines inside a
/// paragraph become `<br>`.
fn paragraphs(text: &str) -> String {
    BLANK_LINES
        .split(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            if is_block(chunk) {
                chunk.to_string()
            } else {
                let inner = chunk
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join("<br>");
                format!("<p>{inner}</p>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
