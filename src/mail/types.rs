//! Mail types.

use chrono::{DateTime, Utc};

use super::reward::{Reward, RewardFormatError};

/// Maximum length for mail title.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum length for mail content.
pub const MAX_CONTENT_LENGTH: usize = 1000;

/// Who a mail is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailScope {
    /// Every player; inbox rows are created lazily by sync.
    Global,
    /// An explicit recipient set; inbox rows are created at publish time.
    Personal,
}

impl MailScope {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MailScope::Global => "global",
            MailScope::Personal => "personal",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(MailScope::Global),
            "personal" => Some(MailScope::Personal),
            _ => None,
        }
    }
}

/// Per-user mail status.
///
/// Status only moves forward: `Unclaimed -> Read -> Claimed`, with
/// `Deleted` reachable from anywhere. `Claimed` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MailStatus {
    /// Delivered, not yet opened.
    Unclaimed = 0,
    /// Opened, reward not yet claimed.
    Read = 1,
    /// Reward claimed.
    Claimed = 2,
    /// Soft-deleted by the player.
    Deleted = 3,
}

impl MailStatus {
    /// Stored integer code.
    pub fn code(&self) -> i64 {
        *self as i64
    }

    /// Parse a stored integer code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MailStatus::Unclaimed),
            1 => Some(MailStatus::Read),
            2 => Some(MailStatus::Claimed),
            3 => Some(MailStatus::Deleted),
            _ => None,
        }
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: MailStatus) -> bool {
        match (self, next) {
            (_, MailStatus::Deleted) => *self != MailStatus::Deleted,
            (MailStatus::Unclaimed, MailStatus::Read) => true,
            (MailStatus::Unclaimed | MailStatus::Read, MailStatus::Claimed) => true,
            _ => false,
        }
    }

    /// Whether no further transition is possible except deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MailStatus::Claimed | MailStatus::Deleted)
    }
}

/// A mail template. Immutable once published.
#[derive(Debug, Clone)]
pub struct Mail {
    /// Mail ID.
    pub id: i64,
    /// Delivery scope.
    pub scope: MailScope,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Stored reward payload.
    pub reward_payload: String,
    /// When the mail was published.
    pub created_at: DateTime<Utc>,
}

impl Mail {
    /// Decode the attached reward.
    pub fn reward(&self) -> Result<Reward, RewardFormatError> {
        Reward::parse(&self.reward_payload)
    }
}

/// Delivery window of a mail: visible while `start_time <= now < end_time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDistribution {
    /// Mail ID.
    pub mail_id: i64,
    /// Window start (inclusive).
    pub start_time: DateTime<Utc>,
    /// Window end (exclusive).
    pub end_time: DateTime<Utc>,
}

impl MailDistribution {
    /// Whether `now` falls inside the window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// A player's inbox row for one mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailUser {
    /// Mail ID.
    pub mail_id: i64,
    /// Player ID.
    pub user_id: i64,
    /// Current status.
    pub status: MailStatus,
    /// Window start copied from the distribution.
    pub start_time: DateTime<Utc>,
    /// Window end copied from the distribution.
    pub end_time: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// A mail as seen from one player's inbox.
#[derive(Debug, Clone)]
pub struct InboxMail {
    /// The mail template.
    pub mail: Mail,
    /// The player's status (Unclaimed if not yet synced).
    pub status: MailStatus,
    /// Effective window start.
    pub start_time: DateTime<Utc>,
    /// Effective window end.
    pub end_time: DateTime<Utc>,
    /// Whether a MailUser row exists for this player.
    pub synced: bool,
}

/// New mail for publishing.
#[derive(Debug, Clone)]
pub struct NewMail {
    /// Delivery scope.
    pub scope: MailScope,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Attached reward.
    pub reward: Reward,
    /// Window start (inclusive).
    pub start_time: DateTime<Utc>,
    /// Window end (exclusive).
    pub end_time: DateTime<Utc>,
    /// Recipients (personal scope only).
    pub recipients: Vec<i64>,
}

impl NewMail {
    /// A broadcast to every player.
    pub fn global(
        title: impl Into<String>,
        content: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            scope: MailScope::Global,
            title: title.into(),
            content: content.into(),
            reward: Reward::empty(),
            start_time,
            end_time,
            recipients: Vec::new(),
        }
    }

    /// A mail for an explicit recipient set.
    pub fn personal(
        title: impl Into<String>,
        content: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        recipients: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            scope: MailScope::Personal,
            title: title.into(),
            content: content.into(),
            reward: Reward::empty(),
            start_time,
            end_time,
            recipients: recipients.into_iter().collect(),
        }
    }

    /// Attach a reward.
    pub fn with_reward(mut self, reward: Reward) -> Self {
        self.reward = reward;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::RewardItem;
    use chrono::Duration;

    #[test]
    fn test_scope_round_trip() {
        assert_eq!(MailScope::parse("global"), Some(MailScope::Global));
        assert_eq!(MailScope::parse("personal"), Some(MailScope::Personal));
        assert_eq!(MailScope::parse("team"), None);
        assert_eq!(MailScope::Personal.as_str(), "personal");
    }

    #[test]
    fn test_status_codes() {
        for status in [
            MailStatus::Unclaimed,
            MailStatus::Read,
            MailStatus::Claimed,
            MailStatus::Deleted,
        ] {
            assert_eq!(MailStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(MailStatus::from_code(4), None);
        assert_eq!(MailStatus::from_code(-1), None);
    }

    #[test]
    fn test_status_transitions() {
        use MailStatus::*;

        assert!(Unclaimed.can_transition_to(Read));
        assert!(Unclaimed.can_transition_to(Claimed));
        assert!(Read.can_transition_to(Claimed));
        assert!(Unclaimed.can_transition_to(Deleted));
        assert!(Read.can_transition_to(Deleted));
        assert!(Claimed.can_transition_to(Deleted));

        assert!(!Read.can_transition_to(Unclaimed));
        assert!(!Claimed.can_transition_to(Read));
        assert!(!Claimed.can_transition_to(Claimed));
        assert!(!Deleted.can_transition_to(Deleted));
        assert!(!Deleted.can_transition_to(Unclaimed));
    }

    #[test]
    fn test_transitions_never_decrease() {
        use MailStatus::*;
        let all = [Unclaimed, Read, Claimed, Deleted];
        for from in all {
            for to in all {
                if from.can_transition_to(to) {
                    assert!(to > from, "{from:?} -> {to:?}");
                }
            }
        }
    }

    #[test]
    fn test_terminal() {
        assert!(!MailStatus::Unclaimed.is_terminal());
        assert!(!MailStatus::Read.is_terminal());
        assert!(MailStatus::Claimed.is_terminal());
        assert!(MailStatus::Deleted.is_terminal());
    }

    #[test]
    fn test_distribution_window_half_open() {
        let start = Utc::now();
        let dist = MailDistribution {
            mail_id: 1,
            start_time: start,
            end_time: start + Duration::hours(1),
        };
        assert!(dist.is_active_at(start));
        assert!(dist.is_active_at(start + Duration::minutes(59)));
        assert!(!dist.is_active_at(start + Duration::hours(1)));
        assert!(!dist.is_active_at(start - Duration::seconds(1)));
    }

    #[test]
    fn test_new_mail_builders() {
        let start = Utc::now();
        let end = start + Duration::days(7);
        let reward = Reward::new([RewardItem::new(1, 10)]).unwrap();

        let mail = NewMail::global("Event", "Thanks for playing", start, end)
            .with_reward(reward.clone());
        assert_eq!(mail.scope, MailScope::Global);
        assert!(mail.recipients.is_empty());
        assert_eq!(mail.reward, reward);

        let mail = NewMail::personal("Compensation", "Sorry", start, end, [7, 8]);
        assert_eq!(mail.scope, MailScope::Personal);
        assert_eq!(mail.recipients, vec![7, 8]);
        assert!(mail.reward.is_empty());
    }
}
