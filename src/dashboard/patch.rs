//! Text transforms over the dashboard document.
//! Each transform touches only the span it owns and leaves every other byte
//! alone. Running a transform twice with the same input gives the same output
//! as running it once.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::PatchOutcome;

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<select\b[^>]*\bid\s*=\s*["']dateSelect["'][^>]*>)(.*?)(</select>)"#).unwrap()
});
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<option\b([^>]*)>(.*?)</option>").unwrap());
static VALUE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bvalue\s*=\s*["']([^"']*)["']"#).unwrap());
static SELECTED_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+selected\b(?:\s*=\s*(?:"[^"]*"|'[^']*'))?"#).unwrap());
static AVAILABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"const\s+availableDates\s*=\s*\[([^\]]*)\]").unwrap());
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(["'])([^"']*)["']"#).unwrap());
static DEFAULT_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"showDateContent\(\s*(["'])(\d{8})["']\s*\)"#).unwrap());
static CONTENT_AREA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<div\b[^>]*\bclass\s*=\s*["']content-area["'][^>]*>)(\s*)"#).unwrap());

/// One `<option>` inside the date selector, offsets relative to the select body.
struct OptionTag {
    start: usize,
    end: usize,
    value: String,
}

fn parse_options(body: &str) -> Vec<OptionTag> {
    OPTION_RE
        .captures_iter(body)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let value = VALUE_ATTR_RE.captures(&c[1])?[1].to_string();
            Some(OptionTag { start: whole.start(), end: whole.end(), value })
        })
        .collect()
}

/// Dates listed in the selector, in document order.
pub fn option_values(html: &str) -> Vec<String> {
    SELECT_RE
        .captures(html)
        .map(|c| parse_options(&c[2]).into_iter().map(|o| o.value).collect())
        .unwrap_or_default()
}

/// Whitespace to put between two options, copied from the document.
fn option_separator(body: &str, options: &[OptionTag]) -> String {
    match options {
        [first, second, ..] => body[first.end..second.start].to_string(),
        [first] => {
            let lead = &body[..first.start];
            if lead.contains('\n') { lead.to_string() } else { "\n".to_string() }
        }
        [] => "\n".to_string(),
    }
}

fn mark_selected(body: &str, date: &str) -> String {
    OPTION_RE
        .replace_all(body, |c: &Captures| {
            let attrs = SELECTED_ATTR_RE.replace_all(&c[1], "");
            let is_date = VALUE_ATTR_RE.captures(&attrs).is_some_and(|v| &v[1] == date);
            let selected = if is_date { " selected" } else { "" };
            format!("<option{}{}>{}</option>", attrs, selected, &c[2])
        })
        .into_owned()
}

/// Adds `<option value="{date}">{label}</option>` to the date selector, keeping
/// the options most-recent-first, and makes it the selected option.
pub fn insert_date_option(html: &str, date: &str, label: &str) -> (String, PatchOutcome) {
    let Some(caps) = SELECT_RE.captures(html) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let Some(body_match) = caps.get(2) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let body = body_match.as_str();
    let options = parse_options(body);

    let mut new_body = body.to_string();
    if !options.iter().any(|o| o.value == date) {
        let tag = format!(r#"<option value="{}">{}</option>"#, date, label);
        let sep = option_separator(body, &options);
        match options.iter().find(|o| o.value.as_str() < date) {
            Some(older) => new_body.insert_str(older.start, &format!("{}{}", tag, sep)),
            None => match options.last() {
                Some(last) => new_body.insert_str(last.end, &format!("{}{}", sep, tag)),
                None => {
                    let at = body.trim_end().len();
                    new_body.insert_str(at, &tag);
                }
            },
        }
    }
    let new_body = mark_selected(&new_body, date);

    if new_body == body {
        return (html.to_string(), PatchOutcome::AlreadyPresent);
    }
    let mut out = String::with_capacity(html.len() + 64);
    out.push_str(&html[..body_match.start()]);
    out.push_str(&new_body);
    out.push_str(&html[body_match.end()..]);
    (out, PatchOutcome::Applied)
}

/// Dates in the `availableDates` array literal, in document order.
pub fn available_dates(html: &str) -> Option<Vec<String>> {
    let caps = AVAILABLE_RE.captures(html)?;
    Some(QUOTED_RE.captures_iter(&caps[1]).map(|c| c[2].to_string()).collect())
}

/// Adds `date` to `const availableDates = [...]`, most-recent-first.
pub fn update_available_dates(html: &str, date: &str) -> (String, PatchOutcome) {
    let Some(caps) = AVAILABLE_RE.captures(html) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let Some(inner) = caps.get(1) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };

    let entries: Vec<(String, String)> = QUOTED_RE
        .captures_iter(inner.as_str())
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    if entries.iter().any(|(_, d)| d == date) {
        return (html.to_string(), PatchOutcome::AlreadyPresent);
    }

    let quote = entries.first().map(|(q, _)| q.as_str()).unwrap_or("'");
    let mut dates: Vec<&str> = entries.iter().map(|(_, d)| d.as_str()).collect();
    let at = dates.iter().position(|d| *d < date).unwrap_or(dates.len());
    dates.insert(at, date);
    let rendered = dates
        .iter()
        .map(|d| format!("{q}{d}{q}", q = quote, d = d))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::with_capacity(html.len() + 16);
    out.push_str(&html[..inner.start()]);
    out.push_str(&rendered);
    out.push_str(&html[inner.end()..]);
    (out, PatchOutcome::Applied)
}

/// Dates passed to literal `showDateContent('YYYYMMDD')` calls.
pub fn default_dates(html: &str) -> Vec<String> {
    DEFAULT_CALL_RE.captures_iter(html).map(|c| c[2].to_string()).collect()
}

/// Points every `showDateContent('YYYYMMDD')` call at `date`.
/// `showDateContent(this.value)` and other non-literal calls are left alone.
pub fn update_default_date(html: &str, date: &str) -> (String, PatchOutcome) {
    let mut found = false;
    let mut stale = false;
    for c in DEFAULT_CALL_RE.captures_iter(html) {
        found = true;
        stale |= &c[2] != date;
    }
    if !found {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    }
    if !stale {
        return (html.to_string(), PatchOutcome::AlreadyPresent);
    }
    let out = DEFAULT_CALL_RE.replace_all(html, |c: &Captures| {
        format!("showDateContent({q}{d}{q})", q = &c[1], d = date)
    });
    (out.into_owned(), PatchOutcome::Applied)
}

/// Sets the `stat-number` paired with the `stat-label` reading `label`.
pub fn update_stat(html: &str, label: &str, value: &str) -> (String, PatchOutcome) {
    let pattern = format!(
        r#"(<div\b[^>]*\bclass\s*=\s*["']stat-number["'][^>]*>)([^<]*)(</div>\s*<div\b[^>]*\bclass\s*=\s*["']stat-label["'][^>]*>\s*{}\s*</div>)"#,
        regex::escape(label)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let Some(caps) = re.captures(html) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let Some(number) = caps.get(2) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    if number.as_str().trim() == value {
        return (html.to_string(), PatchOutcome::AlreadyPresent);
    }
    let mut out = String::with_capacity(html.len() + 8);
    out.push_str(&html[..number.start()]);
    out.push_str(value);
    out.push_str(&html[number.end()..]);
    (out, PatchOutcome::Applied)
}

pub fn has_section(html: &str, date: &str) -> bool {
    html.contains(&format!(r#"id="content-{}""#, date))
}

/// Inserts a rendered section as the first child of `<div class="content-area">`.
/// `render` receives the indentation of the content area's children.
pub fn insert_comparison_section(
    html: &str,
    date: &str,
    render: impl FnOnce(&str) -> String,
) -> (String, PatchOutcome) {
    if has_section(html, date) {
        return (html.to_string(), PatchOutcome::AlreadyPresent);
    }
    let Some(caps) = CONTENT_AREA_RE.captures(html) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let Some(gap) = caps.get(2) else {
        return (html.to_string(), PatchOutcome::AnchorMissing);
    };
    let indent = gap.as_str().rsplit('\n').next().unwrap_or("");
    let section = render(indent);

    let mut out = String::with_capacity(html.len() + section.len() + 8);
    if gap.as_str().contains('\n') {
        out.push_str(&html[..gap.end()]);
        out.push_str(&section);
        out.push_str("\n\n");
        out.push_str(indent);
    } else {
        out.push_str(&html[..gap.start()]);
        out.push('\n');
        out.push_str(&section);
        out.push('\n');
        out.push_str(gap.as_str());
    }
    out.push_str(&html[gap.end()..]);
    (out, PatchOutcome::Applied)
}
