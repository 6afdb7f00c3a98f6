//! Emergency contact helpers
//!
//! E-mail eligibility checks, contact partitioning and the shared contact
//! list. The list is mutated only by contact management; the pipeline reads
//! snapshots.

use crate::types::EmergencyContact;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How strictly an e-mail address is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailPolicy {
    /// Address contains "@"
    ContainsAt,
    /// Address contains "@" and "."
    ContainsAtAndDot,
}

impl EmailPolicy {
    pub fn accepts(&self, email: &str) -> bool {
        let email = email.trim();
        match self {
            EmailPolicy::ContainsAt => email.contains('@'),
            EmailPolicy::ContainsAtAndDot => email.contains('@') && email.contains('.'),
        }
    }

    pub fn accepts_contact(&self, contact: &EmergencyContact) -> bool {
        contact.email.as_deref().is_some_and(|e| self.accepts(e))
    }
}

/// Contacts split by e-mail eligibility
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPartition {
    pub with_email: Vec<EmergencyContact>,
    pub without_email: Vec<EmergencyContact>,
}

impl ContactPartition {
    pub fn email_count(&self) -> usize {
        self.with_email.len()
    }

    pub fn total(&self) -> usize {
        self.with_email.len() + self.without_email.len()
    }

    /// True when contacts exist but none can be e-mailed
    pub fn none_emailable(&self) -> bool {
        self.with_email.is_empty() && !self.without_email.is_empty()
    }
}

pub fn partition_contacts(contacts: &[EmergencyContact], policy: EmailPolicy) -> ContactPartition {
    let (with_email, without_email) = contacts
        .iter()
        .cloned()
        .partition(|c| policy.accepts_contact(c));
    ContactPartition {
        with_email,
        without_email,
    }
}

/// Result of the foreground e-mail coverage check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailCoverage {
    pub total: usize,
    pub valid: usize,
    pub addresses: Vec<String>,
}

impl EmailCoverage {
    /// Whether the user should be warned that nobody will get an e-mail
    pub fn needs_warning(&self) -> bool {
        self.total > 0 && self.valid == 0
    }
}

pub fn verify_contact_emails(contacts: &[EmergencyContact], policy: EmailPolicy) -> EmailCoverage {
    let addresses: Vec<String> = contacts
        .iter()
        .filter(|c| policy.accepts_contact(c))
        .filter_map(|c| c.email.clone())
        .collect();

    tracing::debug!(
        valid = addresses.len(),
        total = contacts.len(),
        "verified emergency contact e-mails"
    );

    EmailCoverage {
        total: contacts.len(),
        valid: addresses.len(),
        addresses,
    }
}

/// Process-wide emergency contact list
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    inner: Arc<RwLock<Vec<EmergencyContact>>>,
}

impl ContactBook {
    pub fn new(contacts: Vec<EmergencyContact>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(contacts)),
        }
    }

    /// Owned copy; later edits to the book do not affect it
    pub fn snapshot(&self) -> Vec<EmergencyContact> {
        self.inner.read().clone()
    }

    pub fn replace(&self, contacts: Vec<EmergencyContact>) {
        *self.inner.write() = contacts;
    }

    /// Add a contact, replacing any existing one with the same id
    pub fn upsert(&self, contact: EmergencyContact) {
        let mut contacts = self.inner.write();
        match contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(existing) => *existing = contact,
            None => contacts.push(contact),
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut contacts = self.inner.write();
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        contacts.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contacts() -> Vec<EmergencyContact> {
        vec![
            EmergencyContact::new("1", "Ana", "555-0101").with_email("ana@example.com"),
            EmergencyContact::new("2", "Ben", "555-0102").with_email("ben@localhost"),
            EmergencyContact::new("3", "Cy", "555-0103"),
            EmergencyContact::new("4", "Di", "555-0104").with_email(""),
        ]
    }

    #[test]
    fn test_policies_differ_on_dotless_address() {
        assert!(EmailPolicy::ContainsAt.accepts("ben@localhost"));
        assert!(!EmailPolicy::ContainsAtAndDot.accepts("ben@localhost"));
        assert!(EmailPolicy::ContainsAtAndDot.accepts("ana@example.com"));
        assert!(!EmailPolicy::ContainsAt.accepts("no-at-sign.com"));
    }

    #[test]
    fn test_partition_with_loose_policy() {
        let part = partition_contacts(&contacts(), EmailPolicy::ContainsAt);
        let names: Vec<_> = part.with_email.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Ben"]);
        assert_eq!(part.without_email.len(), 2);
        assert_eq!(part.total(), 4);
        assert!(!part.none_emailable());
    }

    #[test]
    fn test_none_emailable() {
        let only_phone = vec![EmergencyContact::new("1", "Cy", "555")];
        assert!(partition_contacts(&only_phone, EmailPolicy::ContainsAt).none_emailable());
        assert!(!partition_contacts(&[], EmailPolicy::ContainsAt).none_emailable());
    }

    #[test]
    fn test_verify_uses_strict_policy() {
        let coverage = verify_contact_emails(&contacts(), EmailPolicy::ContainsAtAndDot);
        assert_eq!(coverage.valid, 1);
        assert_eq!(coverage.addresses, vec!["ana@example.com".to_string()]);
        assert!(!coverage.needs_warning());

        let dotless = vec![EmergencyContact::new("2", "Ben", "555").with_email("ben@localhost")];
        assert!(verify_contact_emails(&dotless, EmailPolicy::ContainsAtAndDot).needs_warning());
        assert!(!verify_contact_emails(&[], EmailPolicy::ContainsAtAndDot).needs_warning());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_edits() {
        let book = ContactBook::new(contacts());
        let snapshot = book.snapshot();
        book.remove("1");
        book.upsert(EmergencyContact::new("9", "Zed", "555-0199"));
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].name, "Ana");
        assert_eq!(book.len(), 4);
        assert!(!book.remove("missing"));
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let book = ContactBook::default();
        book.upsert(EmergencyContact::new("1", "Ana", "555"));
        book.upsert(EmergencyContact::new("1", "Ana B.", "555").with_email("ana@x.org"));
        let snapshot = book.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Ana B.");
    }
}
