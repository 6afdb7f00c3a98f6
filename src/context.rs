//! Session state shared by the pipeline
//!
//! The signed-in user, the last known location and the emergency contact
//! list are process-wide. A dispatch never reads them live: it takes a
//! [`SessionSnapshot`] when it begins and works from that copy only.

use crate::adapters::LocationProvider;
use crate::contacts::ContactBook;
use crate::error::SosError;
use crate::types::{EmergencyContact, Location, UserProfile};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// A location fix and when it was taken
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub location: Location,
    pub fixed_at: DateTime<Utc>,
}

/// Live, shared session state
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    user: Arc<RwLock<Option<UserProfile>>>,
    location: Arc<RwLock<Option<LocationFix>>>,
    contacts: ContactBook,
}

impl SessionContext {
    pub fn new(user: Option<UserProfile>, contacts: ContactBook) -> Self {
        Self {
            user: Arc::new(RwLock::new(user)),
            location: Arc::new(RwLock::new(None)),
            contacts,
        }
    }

    pub fn set_user(&self, user: Option<UserProfile>) {
        *self.user.write() = user;
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.user.read().clone()
    }

    pub fn set_location(&self, location: Location) {
        *self.location.write() = Some(LocationFix {
            location,
            fixed_at: Utc::now(),
        });
    }

    pub fn clear_location(&self) {
        *self.location.write() = None;
    }

    pub fn location(&self) -> Option<LocationFix> {
        *self.location.read()
    }

    pub fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    /// Ask the location service for a fresh position and store it.
    ///
    /// On failure the previous fix is kept.
    pub async fn refresh_location(
        &self,
        provider: &dyn LocationProvider,
    ) -> Result<Location, SosError> {
        match provider.current_position().await {
            Ok(location) => {
                self.set_location(location);
                tracing::debug!(
                    latitude = location.latitude,
                    longitude = location.longitude,
                    "location refreshed"
                );
                Ok(location)
            }
            Err(e) => {
                tracing::warn!(error = %e, "location refresh failed");
                Err(e)
            }
        }
    }

    /// Copy everything a dispatch needs at this instant
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user(),
            location: self.location().map(|fix| fix.location),
            contacts: self.contacts.snapshot(),
            taken_at: Utc::now(),
        }
    }
}

/// Immutable view of the session taken when a dispatch begins
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub location: Option<Location>,
    pub contacts: Vec<EmergencyContact>,
    pub taken_at: DateTime<Utc>,
}

/// A snapshot that passed every dispatch precondition
#[derive(Debug, Clone, PartialEq)]
pub struct ReadySession {
    pub user: UserProfile,
    pub location: Location,
    pub contacts: Vec<EmergencyContact>,
}

impl SessionSnapshot {
    /// Check dispatch preconditions in order; the first missing input wins
    pub fn require_ready(self) -> Result<ReadySession, SosError> {
        let user = self.user.ok_or(SosError::MissingUser)?;
        let location = self.location.ok_or(SosError::MissingLocation)?;
        if self.contacts.is_empty() {
            return Err(SosError::NoContacts);
        }
        Ok(ReadySession {
            user,
            location,
            contacts: self.contacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FixedLocation;

    fn user() -> UserProfile {
        UserProfile {
            id: 1,
            name: Some("Ana".to_string()),
            email: Some("ana@example.com".to_string()),
            phone: None,
        }
    }

    #[test]
    fn test_preconditions_checked_in_order() {
        let ctx = SessionContext::default();
        assert!(matches!(ctx.snapshot().require_ready(), Err(SosError::MissingUser)));

        ctx.set_user(Some(user()));
        assert!(matches!(ctx.snapshot().require_ready(), Err(SosError::MissingLocation)));

        ctx.set_location(Location::new(10.0, 20.0));
        assert!(matches!(ctx.snapshot().require_ready(), Err(SosError::NoContacts)));

        ctx.contacts().upsert(EmergencyContact::new("1", "Ben", "555"));
        let ready = ctx.snapshot().require_ready().unwrap();
        assert_eq!(ready.contacts.len(), 1);
        assert_eq!(ready.location, Location::new(10.0, 20.0));
    }

    #[test]
    fn test_missing_user_wins_over_missing_contacts() {
        let ctx = SessionContext::default();
        ctx.set_location(Location::new(0.0, 0.0));
        assert!(matches!(ctx.snapshot().require_ready(), Err(SosError::MissingUser)));
    }

    #[test]
    fn test_snapshot_unaffected_by_later_changes() {
        let ctx = SessionContext::new(Some(user()), ContactBook::default());
        ctx.contacts().upsert(EmergencyContact::new("1", "Ben", "555"));
        ctx.set_location(Location::new(1.0, 1.0));

        let snapshot = ctx.snapshot();
        ctx.contacts().replace(Vec::new());
        ctx.clear_location();
        ctx.set_user(None);

        let ready = snapshot.require_ready().unwrap();
        assert_eq!(ready.user.id, 1);
        assert_eq!(ready.contacts[0].name, "Ben");
    }

    #[tokio::test]
    async fn test_refresh_location_keeps_previous_fix_on_error() {
        let ctx = SessionContext::default();
        let ok = FixedLocation::new(Location::new(5.0, 6.0));
        ctx.refresh_location(&ok).await.unwrap();
        assert_eq!(ctx.location().unwrap().location, Location::new(5.0, 6.0));

        let failing = FixedLocation::unavailable();
        assert!(ctx.refresh_location(&failing).await.is_err());
        assert_eq!(ctx.location().unwrap().location, Location::new(5.0, 6.0));
    }
}
