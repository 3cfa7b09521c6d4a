// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Owner contact directory.
//!
//! Maps owners to their contact details and contact addresses back to
//! owners. The engine consults it to resolve transfer recipients given an
//! email instead of an account id, and to address notifications.

use crate::base::OwnerId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Contact details registered for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub email: String,
    pub phone: Option<String>,
}

/// Thread-safe owner-to-contact registry with a reverse contact index.
#[derive(Debug, Default)]
pub struct OwnerDirectory {
    profiles: DashMap<OwnerId, ContactProfile>,
    /// Exact-match index: contact email to owner.
    by_contact: DashMap<String, OwnerId>,
}

impl OwnerDirectory {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
            by_contact: DashMap::new(),
        }
    }

    /// Registers (or replaces) an owner's contact details.
    ///
    /// Re-registration updates the profile and re-points the contact
    /// index; the previous email no longer resolves to this owner.
    pub fn register(&self, owner: OwnerId, email: impl Into<String>, phone: Option<String>) {
        let email = email.into();
        if let Some(previous) = self.profiles.insert(
            owner.clone(),
            ContactProfile {
                email: email.clone(),
                phone,
            },
        ) && previous.email != email
        {
            self.by_contact.remove(&previous.email);
        }
        self.by_contact.insert(email, owner);
    }

    /// Resolves a contact email to its owner.
    pub fn owner_for_contact(&self, contact: &str) -> Option<OwnerId> {
        self.by_contact.get(contact).map(|entry| entry.clone())
    }

    /// Returns the contact profile registered for `owner`, if any.
    pub fn contact_for(&self, owner: &OwnerId) -> Option<ContactProfile> {
        self.profiles.get(owner).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_resolve_by_contact() {
        let directory = OwnerDirectory::new();
        let owner = OwnerId::new("user-1");
        directory.register(owner.clone(), "alice@example.com", None);

        assert_eq!(
            directory.owner_for_contact("alice@example.com"),
            Some(owner.clone())
        );
        assert_eq!(
            directory.contact_for(&owner).map(|p| p.email),
            Some("alice@example.com".to_owned())
        );
    }

    #[test]
    fn unknown_contact_resolves_to_none() {
        let directory = OwnerDirectory::new();
        assert_eq!(directory.owner_for_contact("nobody@example.com"), None);
    }

    #[test]
    fn reregistration_replaces_contact_index() {
        let directory = OwnerDirectory::new();
        let owner = OwnerId::new("user-1");
        directory.register(owner.clone(), "old@example.com", None);
        directory.register(owner.clone(), "new@example.com", Some("+15550100".into()));

        assert_eq!(directory.owner_for_contact("old@example.com"), None);
        assert_eq!(directory.owner_for_contact("new@example.com"), Some(owner.clone()));
        assert_eq!(
            directory.contact_for(&owner).and_then(|p| p.phone),
            Some("+15550100".to_owned())
        );
    }
}
