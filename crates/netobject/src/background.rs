//! The background update state machine.
//!
//! An armed background update holds one outstanding interest for "any
//! version after the last known name". Each result batch the dispatcher
//! delivers is classified by [`handle_batch`], a pure function of the state
//! and the batch:
//!
//! - a candidate with a later version confirms a new version; the latest
//!   such candidate in the batch is the one ingested
//! - anything else is excluded: the component that follows the query prefix
//!   joins the exclusion set and the grown interest is re-issued
//!
//! ```text
//! Idle --arm--> Armed --batch--> Excluded --reissue--> Armed
//!                 |
//!                 +--batch--> Confirmed --continuous--> Armed
//!                                 |
//!                                 +--one-shot--> Idle
//! ```

use std::collections::BTreeSet;

use netobject_core::{profile, ContentName, Fragment, Interest, NameComponent, PublisherDigest, VersionTag};
use netobject_net::InterestId;

/// The query an armed background update is waiting on.
#[derive(Debug, Clone)]
pub struct ActiveQuery {
    /// Arm generation this query belongs to.
    pub generation: u64,
    /// The name whose later versions are wanted.
    pub known: ContentName,
    pub interest: Interest,
    /// Dispatcher registration, once expressed.
    pub id: Option<InterestId>,
}

/// State of the background update loop.
#[derive(Debug, Default)]
pub struct BackgroundQueryState {
    pub active: Option<ActiveQuery>,
    /// Tokens rejected since the last confirmed version.
    pub exclusions: BTreeSet<NameComponent>,
    pub continuous: bool,
    generation: u64,
}

/// What a confirmed candidate still needs before it can be ingested.
#[derive(Debug, Clone)]
pub enum ConfirmedVersion {
    /// The first fragment itself arrived.
    FirstSegment(Fragment),
    /// Some other fragment of the version; its first segment must be fetched.
    Version {
        versioned: ContentName,
        publisher: PublisherDigest,
    },
}

impl ConfirmedVersion {
    pub fn version(&self) -> Option<VersionTag> {
        match self {
            ConfirmedVersion::FirstSegment(fragment) => profile::version_of(&fragment.name),
            ConfirmedVersion::Version { versioned, .. } => profile::version_of(versioned),
        }
    }
}

/// Result of classifying one batch.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// The batch belongs to a query that is no longer armed; retire it.
    Stale,
    /// Nothing new; re-issue this interest.
    Reissue(Interest),
    /// A later version exists.
    Confirmed(ConfirmedVersion),
}

impl BackgroundQueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the currently armed query, if any.
    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Arm a query for versions after `known`, replacing any armed one.
    ///
    /// Returns the new generation and the interest to express, plus the
    /// registration of the replaced query, which the caller must withdraw.
    pub fn arm(&mut self, known: ContentName, continuous: bool) -> (u64, Interest, Option<InterestId>) {
        let withdrawn = self.cancel();
        self.generation += 1;
        self.continuous = continuous;
        let interest = profile::first_fragment_query_for_next_version(&known, None);
        self.active = Some(ActiveQuery {
            generation: self.generation,
            known,
            interest: interest.clone(),
            id: None,
        });
        (self.generation, interest, withdrawn)
    }

    /// Record the dispatcher id for `generation`.
    ///
    /// Returns `false` if that generation is no longer armed; the caller
    /// must then withdraw `id` itself.
    pub fn registered(&mut self, generation: u64, id: InterestId) -> bool {
        match &mut self.active {
            Some(active) if active.generation == generation => {
                active.id = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Disarm. Returns the registration to withdraw. Idempotent.
    pub fn cancel(&mut self) -> Option<InterestId> {
        self.continuous = false;
        self.exclusions.clear();
        self.active.take().and_then(|a| a.id)
    }

    /// After a confirmed version: re-arm against `known` in place if
    /// continuous, otherwise go idle.
    ///
    /// Returns the interest to re-issue under the same registration.
    pub fn confirmed(&mut self, generation: u64, known: ContentName) -> Option<Interest> {
        if self.generation() != Some(generation) {
            return None;
        }
        self.exclusions.clear();
        if !self.continuous {
            self.active = None;
            return None;
        }
        let interest = profile::first_fragment_query_for_next_version(&known, None);
        if let Some(active) = &mut self.active {
            active.known = known;
            active.interest = interest.clone();
        }
        Some(interest)
    }

    /// Exclude a confirmed version whose content is unreadable and keep
    /// waiting for later ones.
    pub fn reject(&mut self, generation: u64, token: NameComponent) -> Option<Interest> {
        let active = self.active.as_mut().filter(|a| a.generation == generation)?;
        if active.interest.exclude.add(token.clone()) {
            self.exclusions.insert(token);
        }
        Some(active.interest.clone())
    }

    /// The interest to keep waiting on after a confirmed version could not
    /// be ingested.
    pub fn retry(&self, generation: u64) -> Option<Interest> {
        self.active
            .as_ref()
            .filter(|a| a.generation == generation)
            .map(|a| a.interest.clone())
    }
}

/// Classify a batch delivered for arm `generation`.
pub fn handle_batch(state: &mut BackgroundQueryState, generation: u64, batch: &[Fragment]) -> BatchOutcome {
    let Some(active) = state.active.as_mut().filter(|a| a.generation == generation) else {
        return BatchOutcome::Stale;
    };

    let mut best: Option<ConfirmedVersion> = None;
    for fragment in batch {
        if profile::starts_with_later_version_of(&fragment.name, &active.known) {
            let candidate = if profile::is_versioned_first_segment(&fragment.name) {
                ConfirmedVersion::FirstSegment(fragment.clone())
            } else {
                let versioned = profile::versioned_name_for(&fragment.name, &active.interest)
                    .or_else(|| profile::versioned_prefix(&fragment.name));
                match versioned {
                    Some(versioned) => ConfirmedVersion::Version {
                        versioned,
                        publisher: fragment.signed_info.publisher,
                    },
                    None => continue,
                }
            };
            tracing::debug!(name = %fragment.name, "later version");
            if best.as_ref().map_or(true, |b| candidate.version() > b.version()) {
                best = Some(candidate);
            }
        } else if let Some(token) = fragment.name.component(active.interest.name.len()) {
            if active.interest.exclude.add(token.clone()) {
                tracing::debug!(name = %fragment.name, "excluding");
                state.exclusions.insert(token.clone());
            }
        }
    }

    match best {
        Some(confirmed) => {
            state.exclusions.clear();
            BatchOutcome::Confirmed(confirmed)
        }
        None => BatchOutcome::Reissue(active.interest.clone()),
    }
}
