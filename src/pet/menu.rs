use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::animation::{AnimationName, Registry};

/// Animations offered from the right-click menu, in display order.
const MENU_ANIMATIONS: [(AnimationName, &str); 5] = [
    (AnimationName::Happy, "😊 Happy"),
    (AnimationName::Walk, "🏃 Walk"),
    (AnimationName::Jump, "🦘 Jump"),
    (AnimationName::Eat, "🍔 Eat"),
    (AnimationName::Sleep, "😴 Sleep"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuItem {
    Animation(AnimationName),
    ResetPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEntry {
    Item { item: MenuItem, label: &'static str },
    Separator,
}

/// Right-click menu anchored at the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    pub pos: Vec2,
    pub entries: Vec<MenuEntry>,
}

impl ContextMenu {
    /// Only animations the registry can actually play are listed.
    pub fn build(pos: Vec2, registry: &Registry) -> Self {
        let mut entries: Vec<MenuEntry> = MENU_ANIMATIONS
            .iter()
            .filter(|(name, _)| registry.contains(*name))
            .map(|&(name, label)| MenuEntry::Item {
                item: MenuItem::Animation(name),
                label,
            })
            .collect();
        entries.push(MenuEntry::Separator);
        entries.push(MenuEntry::Item {
            item: MenuItem::ResetPosition,
            label: "🔄 Reset Position",
        });
        Self { pos, entries }
    }

    pub fn items(&self) -> impl Iterator<Item = MenuItem> + '_ {
        self.entries.iter().filter_map(|e| match e {
            MenuEntry::Item { item, .. } => Some(*item),
            MenuEntry::Separator => None,
        })
    }

    pub fn contains(&self, item: MenuItem) -> bool {
        self.items().any(|i| i == item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::animation::AnimationDef;

    #[test]
    fn full_pack_lists_five_animations_and_reset() {
        let menu = ContextMenu::build(Vec2::new(10.0, 20.0), &Registry::builtin());
        let items: Vec<MenuItem> = menu.items().collect();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0], MenuItem::Animation(AnimationName::Happy));
        assert_eq!(items[5], MenuItem::ResetPosition);
        assert_eq!(menu.entries[5], MenuEntry::Separator);
    }

    #[test]
    fn unregistered_animations_are_hidden() {
        let registry = Registry::from_defs([
            AnimationDef::new(AnimationName::Idle, 4, 0.8),
            AnimationDef::new(AnimationName::Eat, 5, 0.7),
        ])
        .unwrap();
        let menu = ContextMenu::build(Vec2::ZERO, &registry);
        assert!(menu.contains(MenuItem::Animation(AnimationName::Eat)));
        assert!(!menu.contains(MenuItem::Animation(AnimationName::Happy)));
        assert!(menu.contains(MenuItem::ResetPosition));
    }

    #[test]
    fn wire_names() {
        let item: MenuItem = serde_json::from_str(r#"{"animation":"eat"}"#).unwrap();
        assert_eq!(item, MenuItem::Animation(AnimationName::Eat));
        let reset: MenuItem = serde_json::from_str(r#""resetPosition""#).unwrap();
        assert_eq!(reset, MenuItem::ResetPosition);
    }
}
