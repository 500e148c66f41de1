//! Target catalog.
//! The games whose store pages are captured, and the business units they are
//! grouped under on the dashboard. Lives in configuration and is passed into
//! the pipeline explicitly.

use serde::{Deserialize, Serialize};

/// One game whose store page is captured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Store identifier, e.g. `com.neowiz.games.newmatgo`.
    pub app_id: String,
    /// File-name stem, e.g. `NewMatgo` -> `NewMatgo_20250115.png`.
    pub name: String,
    /// Label shown on the dashboard card.
    #[serde(default)]
    pub label: String,
    /// Icon path relative to the dashboard, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Target {
    /// Icons are named after the label, so an unlabeled target has none.
    pub fn new(app_id: &str, name: &str, label: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            icon: (!label.is_empty()).then(|| format!("앱아이콘/{}.webp", label)),
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.name } else { &self.label }
    }
}

/// Display-only grouping of targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessUnit {
    /// CSS class suffix, e.g. `red`.
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub emoji: String,
    /// Target names (not app ids).
    pub members: Vec<String>,
}

pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("com.neowiz.games.newmatgo", "NewMatgo", "뉴맞고"),
        Target::new("com.neowiz.games.newmatgoKakao", "NewMatgoKakao", "뉴맞고카카오"),
        Target::new("com.neowiz.games.gostop2018", "Original", "오리지널"),
        Target::new("com.neowiz.games.poker", "Poker", "포커"),
        Target::new("com.neowiz.games.pokerKakao", "PokerKakao", "포커카카오"),
        Target::new("com.neowiz.games.sudda", "Sudda", "섯다"),
        Target::new("com.neowiz.games.suddaKakao", "SuddaKakao", "섯다카카오"),
        Target::new("com.neowiz.games.pmang.holdem.poker", "ShowdownHoldem", "쇼다운홀덤"),
        Target::new("com.neowiz.playstudio.slot.casino", "NewVegas", "뉴베가스"),
    ]
}

pub fn default_business_units() -> Vec<BusinessUnit> {
    let unit = |key: &str, title: &str, emoji: &str, members: &[&str]| BusinessUnit {
        key: key.to_string(),
        title: title.to_string(),
        emoji: emoji.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
    };
    vec![
        unit("red", "레드사업실", "🎴", &["NewMatgo", "NewMatgoKakao", "Sudda", "SuddaKakao", "Original"]),
        unit("blue", "블루사업실", "♠️", &["Poker", "PokerKakao", "ShowdownHoldem"]),
        unit("brown", "브라운사업실", "🎰", &["NewVegas"]),
    ]
}

/// Groups `targets` by business unit, in unit order, keeping only targets
/// present in `targets`. Targets no unit claims end up in a trailing group
/// keyed `other`. Empty groups are dropped.
pub fn group_by_unit<'a>(
    units: &'a [BusinessUnit],
    targets: &[&'a Target],
) -> Vec<(Option<&'a BusinessUnit>, Vec<&'a Target>)> {
    let mut groups = Vec::new();
    for unit in units {
        let members: Vec<&Target> = unit
            .members
            .iter()
            .filter_map(|m| targets.iter().copied().find(|t| &t.name == m))
            .collect();
        if !members.is_empty() {
            groups.push((Some(unit), members));
        }
    }

    let ungrouped: Vec<&Target> = targets
        .iter()
        .copied()
        .filter(|t| !units.iter().any(|u| u.members.contains(&t.name)))
        .collect();
    if !ungrouped.is_empty() {
        groups.push((None, ungrouped));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_fully_grouped() {
        let targets = default_targets();
        let units = default_business_units();
        for t in &targets {
            assert!(
                units.iter().any(|u| u.members.contains(&t.name)),
                "{} is not in any business unit",
                t.name
            );
        }
    }

    #[test]
    fn test_group_by_unit_keeps_unit_order_and_collects_strays() {
        let units = default_business_units();
        let poker = Target::new("a", "Poker", "포커");
        let matgo = Target::new("b", "NewMatgo", "뉴맞고");
        let stray = Target::new("c", "Stray", "");
        let groups = group_by_unit(&units, &[&poker, &stray, &matgo]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0.map(|u| u.key.as_str()), Some("red"));
        assert_eq!(groups[0].1[0].name, "NewMatgo");
        assert_eq!(groups[1].0.map(|u| u.key.as_str()), Some("blue"));
        assert!(groups[2].0.is_none());
        assert_eq!(groups[2].1[0].name, "Stray");
    }

    #[test]
    fn test_display_label_falls_back_to_name() {
        let t = Target::new("x", "Stray", "");
        assert_eq!(t.display_label(), "Stray");
    }

    #[test]
    fn test_unlabeled_target_has_no_icon() {
        assert_eq!(Target::new("x", "Stray", "").icon, None);
        assert_eq!(Target::new("a", "Poker", "포커").icon.as_deref(), Some("앱아이콘/포커.webp"));
    }
}
