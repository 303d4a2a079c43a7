use std::collections::HashMap;

use crate::model::board::Member;

/// Source members that have a target login. Members without a mapping
/// are left out entirely; they drop from assignees and mentions.
#[derive(Debug, Default)]
pub struct MemberIndex {
    by_id: HashMap<String, String>,
    by_username: HashMap<String, String>,
}

impl MemberIndex {
    /// `logins` maps source usernames to target logins.
    pub fn new(members: &[Member], logins: &HashMap<String, String>) -> Self {
        let mut index = Self::default();
        for member in members {
            if let Some(login) = logins.get(&member.username) {
                index.by_id.insert(member.id.clone(), login.clone());
                index.by_username.insert(member.username.clone(), login.clone());
            }
        }
        index
    }

    pub fn login_for(&self, member_id: &str) -> Option<&str> {
        self.by_id.get(member_id).map(String::as_str)
    }

    pub fn login_for_username(&self, username: &str) -> Option<&str> {
        self.by_username.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, username: &str) -> Member {
        Member {
            id: id.into(),
            username: username.into(),
            full_name: None,
        }
    }

    #[test]
    fn unmapped_members_are_excluded() {
        let logins = HashMap::from([("alice".to_string(), "alicedev".to_string())]);
        let members = MemberIndex::new(&[member("m1", "alice"), member("m2", "bob")], &logins);

        assert_eq!(members.len(), 1);
        assert_eq!(members.login_for("m1"), Some("alicedev"));
        assert_eq!(members.login_for_username("alice"), Some("alicedev"));
        assert_eq!(members.login_for("m2"), None);
        assert_eq!(members.login_for_username("bob"), None);
    }
}
