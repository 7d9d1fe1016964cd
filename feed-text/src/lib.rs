use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use feed_model::ActivityTime;
use feed_ref::{BuildRef, HandleRef, HashtagRef};
use lazy_static::lazy_static;
use pulldown_cmark::escape::{escape_href, escape_html};
use regex::Regex;

/// One run of activity text: plain text or an inline reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Text(String),
    Mention(HandleRef),
    Hashtag(HashtagRef),
    Build(BuildRef),
}

fn inline_regex() -> &'static Regex {
    lazy_static! {
        static ref RE: Regex = {
            let combined = format!(
                "({}|{}|{})",
                HandleRef::multi_regex().as_str(),
                HashtagRef::multi_regex().as_str(),
                BuildRef::multi_regex().as_str()
            );
            Regex::new(&combined).unwrap()
        };
    }
    &*RE
}

/// Splits activity text into plain runs and inline references.
///
/// References only count at a word start, so `a@b.com` stays text.
/// Overlaps resolve left-to-right.
pub fn tokenize(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0usize;

    for found in inline_regex().find_iter(text) {
        let matched = found.as_str();
        let leading = matched.len() - matched.trim_start().len();
        let start = found.start() + leading;
        let matched = matched.trim_start();

        if start < cursor {
            continue;
        }
        let at_word_start = start == 0
            || text[..start]
                .chars()
                .last()
                .map(char::is_whitespace)
                .unwrap_or(true);
        if !at_word_start {
            continue;
        }

        let segment = match matched.chars().next() {
            Some('@') => HandleRef::from_string(matched.to_string())
                .ok()
                .map(Segment::Mention),
            Some('#') => HashtagRef::from_string(matched.to_string())
                .ok()
                .map(Segment::Hashtag),
            Some('+') => BuildRef::from_string(matched.to_string())
                .ok()
                .map(Segment::Build),
            _ => None,
        };
        let segment = match segment {
            Some(segment) => segment,
            None => continue,
        };

        if start > cursor {
            segments.push(Segment::Text(text[cursor..start].to_string()));
        }
        segments.push(segment);
        cursor = found.end();
    }

    if cursor < text.len() {
        segments.push(Segment::Text(text[cursor..].to_string()));
    }

    segments
}

/// Renders activity text to HTML: plain runs escaped, references turned
/// into links under `parent_class` modifier classes.
pub fn render_html(text: &str, parent_class: &str) -> String {
    let mut html = String::new();
    for segment in tokenize(text) {
        match segment {
            Segment::Text(text) => escape_into(&mut html, &text),
            Segment::Mention(handle) => push_link(
                &mut html,
                parent_class,
                "mention",
                &handle.to_page_url(),
                &handle.to_string(),
            ),
            Segment::Hashtag(hashtag) => push_link(
                &mut html,
                parent_class,
                "hashtag",
                &hashtag.to_page_url(),
                &hashtag.to_string(),
            ),
            Segment::Build(build) => push_link(
                &mut html,
                parent_class,
                "build",
                &build.to_page_url(),
                &build.to_string(),
            ),
        }
    }
    html
}

fn push_link(html: &mut String, parent_class: &str, kind: &str, href: &str, label: &str) {
    html.push_str("<a class=\"");
    escape_into(html, parent_class);
    html.push_str("__");
    html.push_str(kind);
    html.push_str("\" href=\"");
    // writing into a String cannot fail
    let _ = escape_href(&mut *html, href);
    html.push_str("\">");
    escape_into(html, label);
    html.push_str("</a>");
}

fn escape_into(html: &mut String, text: &str) {
    // writing into a String cannot fail
    let _ = escape_html(&mut *html, text);
}

/// Scheme allowlist for caller-supplied link targets; anything else renders
/// as a dead `#` link.
pub fn sanitize_url(url: &str) -> &str {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return "#";
    }
    match trimmed.find(':') {
        None => trimmed,
        Some(index) => {
            let scheme = &trimmed[..index];
            if scheme.contains('/') {
                // path segment before any colon: relative url
                trimmed
            } else if scheme.eq_ignore_ascii_case("http")
                || scheme.eq_ignore_ascii_case("https")
                || scheme.eq_ignore_ascii_case("mailto")
            {
                trimmed
            } else {
                "#"
            }
        }
    }
}

/// "5 minutes ago" display text for an activity timestamp. `now` is passed
/// in so output is deterministic.
pub fn humanize_timestamp(time: &ActivityTime, now: DateTime<Utc>) -> String {
    match time.to_datetime() {
        Some(datetime) => HumanTime::from(datetime - now).to_string(),
        None => String::new(),
    }
}
