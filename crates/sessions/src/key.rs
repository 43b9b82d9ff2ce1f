use std::fmt;

use partyline_common::{CommunityId, MemberId, ResourceId};

/// Session key: `wizard:<community>:<member>`, `room:<community>:<resource>`
/// or `party:<community>:<resource>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// One wizard per member per community.
    pub fn wizard(community: CommunityId, member: MemberId) -> Self {
        Self(format!("wizard:{community}:{member}"))
    }

    /// Console for a personal room.
    pub fn room(community: CommunityId, resource: ResourceId) -> Self {
        Self(format!("room:{community}:{resource}"))
    }

    /// Console for a published party.
    pub fn party(community: CommunityId, resource: ResourceId) -> Self {
        Self(format!("party:{community}:{resource}"))
    }

    pub fn kind(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Community and subject: the member for wizards, the resource for
    /// consoles.
    pub fn parts(&self) -> Option<(CommunityId, u64)> {
        let mut it = self.0.splitn(3, ':').skip(1);
        let community = it.next()?.parse().ok()?;
        let subject = it.next()?.parse().ok()?;
        Some((community, subject))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let w = SessionKey::wizard(CommunityId(1), MemberId(2));
        let p = SessionKey::party(CommunityId(1), ResourceId(2));
        assert_eq!(w.to_string(), "wizard:1:2");
        assert_ne!(w, p);
        assert_eq!(p.kind(), "party");
        assert_eq!(w.parts(), Some((CommunityId(1), 2)));
        assert_eq!(SessionKey("wizard:x".into()).parts(), None);
    }
}
