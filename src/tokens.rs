//! Push token cleanup and cross-recipient deduplication. No I/O.

use crate::models::UserProfile;
use std::collections::HashSet;

/// Trims every token, drops blanks and repeats, keeps first-seen order.
pub fn clean_tokens(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

/// Tokens registered to the sender's own account. A device signed into both
/// the sender's and a recipient's account must not be pushed its own message.
#[derive(Debug, Default, Clone)]
pub struct SenderExclusion {
    fcm: HashSet<String>,
    expo: HashSet<String>,
}

impl SenderExclusion {
    pub fn from_profile(sender: Option<&UserProfile>) -> Self {
        match sender {
            Some(profile) => Self {
                fcm: clean_tokens(&profile.fcm_tokens).into_iter().collect(),
                expo: clean_tokens(&profile.expo_push_tokens).into_iter().collect(),
            },
            None => Self::default(),
        }
    }
}

/// Tokens one recipient should be pushed to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipientTokens {
    pub fcm: Vec<String>,
    pub expo: Vec<String>,
}

impl RecipientTokens {
    pub fn is_empty(&self) -> bool {
        self.fcm.is_empty() && self.expo.is_empty()
    }
}

/// Hands out each token at most once per provider across a message's
/// recipients. The first recipient to claim a token keeps it.
#[derive(Debug, Default)]
pub struct TokenDeduplicator {
    exclusion: SenderExclusion,
    seen_fcm: HashSet<String>,
    seen_expo: HashSet<String>,
}

impl TokenDeduplicator {
    pub fn new(exclusion: SenderExclusion) -> Self {
        Self {
            exclusion,
            seen_fcm: HashSet::new(),
            seen_expo: HashSet::new(),
        }
    }

    pub fn claim(&mut self, profile: &UserProfile) -> RecipientTokens {
        RecipientTokens {
            fcm: claim_from(
                &profile.fcm_tokens,
                &self.exclusion.fcm,
                &mut self.seen_fcm,
            ),
            expo: claim_from(
                &profile.expo_push_tokens,
                &self.exclusion.expo,
                &mut self.seen_expo,
            ),
        }
    }
}

fn claim_from(
    raw: &[String],
    excluded: &HashSet<String>,
    seen: &mut HashSet<String>,
) -> Vec<String> {
    clean_tokens(raw)
        .into_iter()
        .filter(|t| !excluded.contains(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn profile(fcm: &[&str], expo: &[&str]) -> UserProfile {
        UserProfile {
            fcm_tokens: strings(fcm),
            expo_push_tokens: strings(expo),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_tokens_trims_and_drops_blanks() {
        let cleaned = clean_tokens(&strings(&["  a ", "", "   ", "b", "a", "\tb\n"]));
        assert_eq!(cleaned, strings(&["a", "b"]));
    }

    #[test]
    fn test_sender_tokens_are_excluded() {
        let sender = profile(&["shared", "sender-only"], &["ExponentPushToken[s]"]);
        let mut dedup = TokenDeduplicator::new(SenderExclusion::from_profile(Some(&sender)));

        let tokens = dedup.claim(&profile(
            &[" shared ", "mine"],
            &["ExponentPushToken[s]", "ExponentPushToken[r]"],
        ));
        assert_eq!(tokens.fcm, strings(&["mine"]));
        assert_eq!(tokens.expo, strings(&["ExponentPushToken[r]"]));
    }

    #[test]
    fn test_shared_token_goes_to_first_recipient_only() {
        let mut dedup = TokenDeduplicator::new(SenderExclusion::default());

        let first = dedup.claim(&profile(&["dup", "one"], &["e-dup"]));
        let second = dedup.claim(&profile(&["dup", "two"], &["e-dup"]));

        assert_eq!(first.fcm, strings(&["dup", "one"]));
        assert_eq!(second.fcm, strings(&["two"]));
        assert_eq!(first.expo, strings(&["e-dup"]));
        assert!(second.expo.is_empty());
    }

    #[test]
    fn test_providers_deduplicate_independently() {
        let mut dedup = TokenDeduplicator::new(SenderExclusion::default());
        let first = dedup.claim(&profile(&["same"], &[]));
        let second = dedup.claim(&profile(&[], &["same"]));
        assert_eq!(first.fcm, strings(&["same"]));
        assert_eq!(second.expo, strings(&["same"]));
    }

    #[test]
    fn test_missing_sender_profile_excludes_nothing() {
        let mut dedup = TokenDeduplicator::new(SenderExclusion::from_profile(None));
        let tokens = dedup.claim(&profile(&["a"], &["b"]));
        assert!(!tokens.is_empty());
        assert_eq!(tokens.fcm, strings(&["a"]));
        assert_eq!(tokens.expo, strings(&["b"]));
    }
}
