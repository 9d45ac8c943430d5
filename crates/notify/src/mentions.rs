//! Mention tags: rule tags that ask a chat channel to notify people.
//!
//! Tags are scanned in declaration order and the first tag with a given key
//! wins. A truthy broadcast tag takes precedence over a targeted tag and
//! suppresses the recipient list.

use herald_core::Tag;

/// Tag key whose truthy value means "mention everyone".
pub const BROADCAST_TAG: &str = "isAtAll";

/// Tag key holding comma-separated recipient identifiers.
pub const TARGETED_TAG: &str = "atMobiles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mentions {
    Everyone,
    /// Non-empty, trimmed, in tag order.
    Recipients(Vec<String>),
}

impl Mentions {
    /// Mentions requested by `tags`, or `None` when the payload should
    /// carry no mention fields at all.
    pub fn scan(tags: &[Tag]) -> Option<Self> {
        let first = |key: &str| tags.iter().find(|t| t.key == key).map(|t| t.value.as_str());

        if first(BROADCAST_TAG).is_some_and(is_truthy) {
            return Some(Mentions::Everyone);
        }

        let recipients: Vec<String> = first(TARGETED_TAG)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if recipients.is_empty() {
            None
        } else {
            Some(Mentions::Recipients(recipients))
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
    }

    #[test]
    fn no_tags_no_mentions() {
        assert_eq!(Mentions::scan(&[]), None);
        assert_eq!(Mentions::scan(&tags(&[("team", "ops")])), None);
    }

    #[test]
    fn broadcast_truthy_values() {
        for v in ["true", "TRUE", " 1 ", "yes", "on"] {
            assert_eq!(
                Mentions::scan(&tags(&[(BROADCAST_TAG, v)])),
                Some(Mentions::Everyone),
                "value {v:?}"
            );
        }
    }

    #[test]
    fn broadcast_falsy_falls_through_to_targeted() {
        let t = tags(&[(BROADCAST_TAG, "false"), (TARGETED_TAG, "123")]);
        assert_eq!(
            Mentions::scan(&t),
            Some(Mentions::Recipients(vec!["123".into()]))
        );
        assert_eq!(Mentions::scan(&tags(&[(BROADCAST_TAG, "")])), None);
    }

    #[test]
    fn broadcast_wins_over_targeted() {
        let t = tags(&[(TARGETED_TAG, "123"), (BROADCAST_TAG, "true")]);
        assert_eq!(Mentions::scan(&t), Some(Mentions::Everyone));
    }

    #[test]
    fn targeted_split_trim_order() {
        let t = tags(&[(TARGETED_TAG, " 12222222, ,22232112 ,")]);
        assert_eq!(
            Mentions::scan(&t),
            Some(Mentions::Recipients(vec![
                "12222222".into(),
                "22232112".into()
            ]))
        );
    }

    #[test]
    fn targeted_blank_list_is_omitted() {
        assert_eq!(Mentions::scan(&tags(&[(TARGETED_TAG, " , ")])), None);
    }

    #[test]
    fn first_match_wins_for_duplicates() {
        let t = tags(&[(TARGETED_TAG, "111"), (TARGETED_TAG, "222")]);
        assert_eq!(
            Mentions::scan(&t),
            Some(Mentions::Recipients(vec!["111".into()]))
        );

        let t = tags(&[(BROADCAST_TAG, "false"), (BROADCAST_TAG, "true")]);
        assert_eq!(Mentions::scan(&t), None);
    }
}
