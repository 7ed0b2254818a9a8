//! Display-name selection for a preferred language.
//!
//! Names live under each achievement's `display.name` subtree, keyed by the
//! lowercase English language name used by the peer ("english", "french",
//! "schinese", ...). A few locales use peer-specific keys and are remapped
//! before region qualifiers are stripped.
use crate::model::AchievementDefinition;
use crate::schema::kv::Node;

pub const FALLBACK_LANGUAGE: &str = "english";

const LANGUAGE_REMAP: [(&str, &str); 4] = [
    ("portuguese (brazil)", "brazilian"),
    ("korean", "koreana"),
    ("chinese (traditional)", "tchinese"),
    ("chinese (simplified)", "schinese"),
];

/// Canonical subtree key for a locale's English name.
///
/// `"Portuguese (Brazil)"` → `"brazilian"`, `"German (Austria)"` → `"german"`.
pub fn language_key(locale: &str) -> String {
    let lowered = locale.trim().to_lowercase();
    if let Some((_, key)) = LANGUAGE_REMAP.iter().find(|(from, _)| *from == lowered) {
        return (*key).to_string();
    }
    match lowered.find('(') {
        Some(pos) if pos > 0 => lowered[..pos].trim_end().to_string(),
        _ => lowered,
    }
}

/// Pick the name leaf for `locale`, falling back to English when the preferred
/// language has no entry. Returns `None` when neither exists.
pub fn resolve_display_name(names: &Node, locale: &str) -> Option<String> {
    let key = language_key(locale);
    let leaf = names
        .child(&key)
        .or_else(|| names.child(FALLBACK_LANGUAGE))?;
    leaf.text().map(|t| t.into_owned())
}

/// Fill `display_name` on every definition from its stored name subtree.
pub fn apply_display_names(definitions: &mut [AchievementDefinition], locale: &str) {
    for def in definitions.iter_mut() {
        def.display_name = def
            .display_names
            .as_ref()
            .and_then(|names| resolve_display_name(names, locale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[(&str, &str)]) -> Node {
        Node::table(
            "name",
            entries.iter().map(|(k, v)| Node::string(*k, *v)).collect(),
        )
    }

    #[test]
    fn exact_language_match() {
        let tree = names(&[("english", "First Blood"), ("french", "Premier sang")]);
        assert_eq!(resolve_display_name(&tree, "french").as_deref(), Some("Premier sang"));
        assert_eq!(resolve_display_name(&tree, "French").as_deref(), Some("Premier sang"));
    }

    #[test]
    fn remapped_languages() {
        let tree = names(&[("brazilian", "Primeiro sangue")]);
        assert_eq!(
            resolve_display_name(&tree, "Portuguese (Brazil)").as_deref(),
            Some("Primeiro sangue")
        );
        assert_eq!(language_key("Korean"), "koreana");
        assert_eq!(language_key("Chinese (Simplified)"), "schinese");
        assert_eq!(language_key("chinese (traditional)"), "tchinese");
    }

    #[test]
    fn region_is_stripped() {
        assert_eq!(language_key("German (Austria)"), "german");
        assert_eq!(language_key("english"), "english");
        assert_eq!(language_key("(odd)"), "(odd)");
    }

    #[test]
    fn falls_back_to_english() {
        let tree = names(&[("english", "First Blood"), ("french", "Premier sang")]);
        assert_eq!(resolve_display_name(&tree, "klingon").as_deref(), Some("First Blood"));
        let tree = names(&[("french", "Premier sang")]);
        assert_eq!(resolve_display_name(&tree, "klingon"), None);
    }
}
