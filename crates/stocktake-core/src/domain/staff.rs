//! Staff identity lookups
//!
//! [`StaffDirectory`] resolves a PIN to the person using it and
//! [`SupervisorRoster`] is the closed set of people allowed to verify
//! audits. Both are built from configuration so callers can inject
//! fake rosters in tests.

use std::collections::{BTreeSet, HashMap};

use super::newtypes::StaffName;

/// PIN to staff-name mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffDirectory {
    by_pin: HashMap<String, StaffName>,
}

impl StaffDirectory {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the person behind `pin`
    pub fn with_entry(mut self, pin: impl Into<String>, name: StaffName) -> Self {
        self.by_pin.insert(pin.into(), name);
        self
    }

    /// Resolves a PIN to the staff member it belongs to
    pub fn resolve(&self, pin: &str) -> Option<&StaffName> {
        self.by_pin.get(pin.trim())
    }

    /// Number of registered PINs
    pub fn len(&self) -> usize {
        self.by_pin.len()
    }

    /// Returns true if no PINs are registered
    pub fn is_empty(&self) -> bool {
        self.by_pin.is_empty()
    }
}

impl FromIterator<(String, StaffName)> for StaffDirectory {
    fn from_iter<I: IntoIterator<Item = (String, StaffName)>>(iter: I) -> Self {
        Self {
            by_pin: iter.into_iter().collect(),
        }
    }
}

/// Closed set of people recognized as audit supervisors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorRoster {
    members: BTreeSet<StaffName>,
}

impl SupervisorRoster {
    /// Creates a roster from the given names
    pub fn new(members: impl IntoIterator<Item = StaffName>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Returns true if `name` may verify audits
    pub fn contains(&self, name: &StaffName) -> bool {
        self.members.contains(name)
    }

    /// Iterates the roster in name order
    pub fn iter(&self) -> impl Iterator<Item = &StaffName> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
