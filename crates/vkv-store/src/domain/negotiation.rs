//! # Version/Schema Negotiation
//!
//! Pure decision logic behind `Coordinator::open`. Given what a caller asked
//! for and what the resolved connection actually is, pick one of:
//!
//! ```text
//!                      observed.version vs desired
//!            ┌──────────────┬───────────────┬──────────────────┐
//!            │   greater    │     lower     │  equal / no ask  │
//!            ▼              ▼               ▼                  │
//!     ConflictVersion  ReopenForVersion   collections missing? │
//!                      (once, then         ├─ no  → Reuse      │
//!                       Unconverged)       ├─ yes, version set → ConflictSchema
//!                                          └─ yes, no version  → ReopenForCollections
//!                                                                (once, then ConflictSchema)
//! ```
//!
//! The driver loop in `service::coordinator` executes the decision. Each
//! reopen kind is allowed once per call, so a call issues at most three
//! engine opens.

use super::types::{CollectionName, OpenRequest, SchemaVersion};
use std::collections::BTreeSet;

/// Upper bound on reopens in one `open` call.
pub const MAX_REOPENS: usize = 2;

/// What the resolved connection looks like.
#[derive(Debug, Clone, Copy)]
pub struct Observed<'a> {
    pub version: SchemaVersion,
    pub collections: &'a BTreeSet<CollectionName>,
}

/// Reopens already spent in the current call chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rounds {
    pub version_reopened: bool,
    pub collections_reopened: bool,
}

impl Rounds {
    /// Record a reopen decision. Other decisions leave the counters alone.
    pub fn record(&mut self, decision: &Decision) {
        match decision {
            Decision::ReopenForVersion => self.version_reopened = true,
            Decision::ReopenForCollections { .. } => self.collections_reopened = true,
            _ => {}
        }
    }

    pub fn reopens(&self) -> usize {
        usize::from(self.version_reopened) + usize::from(self.collections_reopened)
    }
}

/// Outcome of comparing a request with an opened connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Hand the connection to the caller.
    Reuse,
    /// Connection is older than requested: invalidate and open again.
    ReopenForVersion,
    /// Collections missing and no version pinned: upgrade to `next_version`.
    ReopenForCollections { next_version: SchemaVersion },
    /// Connection is newer than requested.
    ConflictVersion {
        requested: SchemaVersion,
        existing: SchemaVersion,
    },
    /// Still below the requested version after a reopen.
    Unconverged {
        requested: SchemaVersion,
        reached: SchemaVersion,
    },
    /// Pinned version lacks required collections.
    ConflictSchema {
        version: SchemaVersion,
        missing: Vec<CollectionName>,
    },
}

impl Decision {
    pub fn is_reopen(&self) -> bool {
        matches!(
            self,
            Decision::ReopenForVersion | Decision::ReopenForCollections { .. }
        )
    }
}

/// Classify `observed` against `request`.
pub fn decide(request: &OpenRequest, observed: Observed<'_>, rounds: Rounds) -> Decision {
    if let Some(desired) = request.version {
        if observed.version > desired {
            return Decision::ConflictVersion {
                requested: desired,
                existing: observed.version,
            };
        }
        if observed.version < desired {
            if rounds.version_reopened {
                return Decision::Unconverged {
                    requested: desired,
                    reached: observed.version,
                };
            }
            return Decision::ReopenForVersion;
        }
    }

    let missing = request.missing_from(observed.collections);
    if missing.is_empty() {
        return Decision::Reuse;
    }

    if request.version.is_some() || rounds.collections_reopened {
        return Decision::ConflictSchema {
            version: observed.version,
            missing,
        };
    }

    Decision::ReopenForCollections {
        next_version: observed.version.next(),
    }
}
