//! Markup for one date's comparison section: a header with both dates, then
//! one group per business unit holding a card per captured target. Each card
//! shows the previous run's image next to the current one.

use std::fmt::Write;

use crate::archive::CaptureDate;
use crate::catalog::{group_by_unit, BusinessUnit, Target};
use crate::config::DateStyle;

const STEP: &str = "    ";

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Appends lines at a fixed depth below `base`.
struct Lines<'a> {
    out: String,
    base: &'a str,
}

impl Lines<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
            self.out.push_str(self.base);
            for _ in 0..depth {
                self.out.push_str(STEP);
            }
        }
        self.out.push_str(text);
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

/// Renders the section for `date`, writing dates in `style`. The first line
/// carries no indentation; the rest are indented relative to `indent`.
pub fn render_section(
    date: &CaptureDate,
    previous: &CaptureDate,
    captured: &[&Target],
    units: &[BusinessUnit],
    style: DateStyle,
    indent: &str,
) -> String {
    let current_label = date.label(style);
    let previous_label = previous.label(style);
    let mut l = Lines { out: String::new(), base: indent };

    l.line(0, &format!(r#"<div class="date-content" id="content-{}" style="display: none;">"#, date));
    l.line(1, r#"<div class="comparison-info">"#);
    l.line(2, &format!("<h3>📊 {} 리포트 (전주 대비)</h3>", current_label));
    l.line(2, r#"<div class="comparison-dates">"#);
    l.line(3, &format!(r#"<span class="prev-week-info">📅 전주: {}</span>"#, previous_label));
    l.line(3, &format!(r#"<span class="current-week-info">📅 금주: {}</span>"#, current_label));
    l.line(2, "</div>");
    l.line(1, "</div>");

    for (unit, members) in group_by_unit(units, captured) {
        let key = unit.map_or("other", |u| u.key.as_str());
        let heading = match unit {
            Some(u) if !u.emoji.is_empty() => format!("{} {}", u.emoji, u.title),
            Some(u) => u.title.clone(),
            None => "기타".to_string(),
        };

        l.blank();
        l.line(1, &format!(r#"<div class="business-group {}">"#, key));
        l.line(2, &format!(r#"<div class="business-header {}">"#, key));
        l.line(3, &escape_html(&heading));
        l.line(2, "</div>");
        l.line(2, r#"<div class="app-grid">"#);
        for target in members {
            l.blank();
            render_card(&mut l, target, key, [previous, date], style);
        }
        l.line(2, "</div>");
        l.line(1, "</div>");
    }

    l.line(0, "</div>");
    l.out
}

fn render_card(l: &mut Lines<'_>, target: &Target, key: &str, days: [&CaptureDate; 2], style: DateStyle) {
    let [previous, date] = days;
    let label = escape_html(target.display_label());
    l.line(3, &format!(r#"<div class="app-card {}">"#, key));
    l.line(4, r#"<div class="app-header">"#);
    let mut heading = String::from("<h4>");
    if let Some(icon) = &target.icon {
        let _ = write!(heading, r#"<img src="{}" alt="{} 아이콘" class="app-icon"> "#, escape_html(icon), label);
    }
    let _ = write!(heading, "{}</h4>", label);
    l.line(5, &heading);
    l.line(4, "</div>");
    l.line(4, r#"<div class="image-comparison">"#);
    for (day, class, word) in [(previous, "prev-week", "전주"), (date, "current-week", "금주")] {
        l.line(5, r#"<div class="image-section">"#);
        l.line(6, &format!(r#"<h5 class="{}">📅 {} ({})</h5>"#, class, word, day.label(style)));
        l.line(
            6,
            &format!(
                r#"<img src="{}" alt="{} {} 리뷰" class="capture-image" onclick="openModal(this.src)">"#,
                escape_html(&day.image_href(&target.name)),
                label,
                word
            ),
        );
        l.line(6, r#"<div class="image-info">"#);
        l.line(7, &format!("📸 {}<br>", escape_html(&day.image_name(&target.name))));
        l.line(7, "클릭하면 원본 크기로 확대됩니다");
        l.line(6, "</div>");
        l.line(5, "</div>");
    }
    l.line(4, "</div>");
    l.line(3, "</div>");
}
