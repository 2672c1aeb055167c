/// Result of a viewer asking to join the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Added at this 1-based position.
    Joined(usize),
    AlreadyQueued,
}

/// Ordered waitlist of viewers. A viewer appears at most once.
#[derive(Debug, Default, Clone)]
pub struct Waitlist {
    entries: Vec<String>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, user: &str) -> JoinOutcome {
        if self.contains(user) {
            return JoinOutcome::AlreadyQueued;
        }
        self.entries.push(user.to_string());
        JoinOutcome::Joined(self.entries.len())
    }

    /// Removes `user` wherever they are. Returns false if they weren't queued.
    pub fn remove(&mut self, user: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.eq_ignore_ascii_case(user));
        self.entries.len() != before
    }

    /// A viewer taking themselves out of the queue.
    pub fn leave(&mut self, user: &str) -> bool {
        self.remove(user)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, user: &str) -> bool {
        self.entries.iter().any(|entry| entry.eq_ignore_ascii_case(user))
    }

    pub fn head(&self, n: usize) -> &[String] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_never_queued_twice() {
        let mut queue = Waitlist::new();
        assert_eq!(queue.join("alice"), JoinOutcome::Joined(1));
        assert_eq!(queue.join("bob"), JoinOutcome::Joined(2));
        assert_eq!(queue.join("alice"), JoinOutcome::AlreadyQueued);
        assert_eq!(queue.join("ALICE"), JoinOutcome::AlreadyQueued);
        assert_eq!(queue.entries(), ["alice", "bob"]);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut queue = Waitlist::new();
        for user in ["a", "b", "c"] {
            queue.join(user);
        }
        assert!(queue.remove("b"));
        assert!(!queue.remove("b"));
        assert_eq!(queue.entries(), ["a", "c"]);

        // Rejoining after removal goes to the back
        assert_eq!(queue.join("b"), JoinOutcome::Joined(3));
    }

    #[test]
    fn head_is_bounded() {
        let mut queue = Waitlist::new();
        assert!(queue.head(5).is_empty());
        for user in ["a", "b", "c", "d", "e", "f"] {
            queue.join(user);
        }
        assert_eq!(queue.head(5), ["a", "b", "c", "d", "e"]);
        queue.clear();
        assert!(queue.is_empty());
    }
}
