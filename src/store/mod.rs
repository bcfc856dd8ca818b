//! Persistence for positions, parties, candidates, voters and votes.
//!
//! Everything the application stores goes through the [`Store`] trait, which
//! has a MongoDB implementation for deployments and an in-process one for
//! development and tests.

use std::{collections::HashMap, ops::Deref, sync::Arc};

use mongodb::error::{Error as DbError, ErrorKind};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use thiserror::Error;

use crate::model::{
    api::results::Turnout,
    common::profile::VoterProfile,
    db::{
        admin::{Admin, NewAdmin},
        candidate::{Candidate, NewCandidate},
        party::{NewParty, Party},
        position::{NewPosition, Position},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter},
    },
    mongodb::{is_duplicate_key_error, is_transaction_conflict, Id},
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(DbError),
    /// A uniqueness constraint was violated.
    #[error("Already exists: {0}")]
    Duplicate(String),
    /// The transaction raced another one touching the same rows and was
    /// rolled back.
    #[error("Transaction conflict")]
    Conflict,
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// A document could not be converted to or from its stored form.
    #[error("Malformed document: {0}")]
    Malformed(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if is_duplicate_key_error(&err) {
            return Self::Duplicate(err.to_string());
        }
        if is_transaction_conflict(&err) {
            return Self::Conflict;
        }
        match *err.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => Self::Unavailable(err.to_string()),
            _ => Self::Db(err),
        }
    }
}

/// Outcome of [`Store::record_ballot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotRecord {
    /// The votes were written and the voter is now marked as having voted.
    Recorded,
    /// The voter had already voted; nothing was written.
    AlreadyVoted,
    /// This candidate no longer exists, or no longer runs for the position
    /// the vote was for; nothing was written.
    UnknownCandidate(Id),
}

/// The persistence operations the application needs.
///
/// Listing operations return rows in creation order.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Voters.
    async fn voters(&self) -> StoreResult<Vec<Voter>>;
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter>;
    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>>;
    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>>;
    async fn voter_by_id_number(&self, id_number: &str) -> StoreResult<Option<Voter>>;
    /// Replace a voter's profile. Returns false if there is no such voter.
    async fn update_voter_profile(&self, id: Id, profile: VoterProfile) -> StoreResult<bool>;
    async fn voter_turnout(&self) -> StoreResult<Turnout>;

    // Administrators.
    async fn admin(&self, id: Id) -> StoreResult<Option<Admin>>;
    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>>;
    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;
    async fn count_admins(&self) -> StoreResult<u64>;

    // Positions.
    async fn positions(&self) -> StoreResult<Vec<Position>>;
    async fn insert_position(&self, position: NewPosition) -> StoreResult<Position>;
    /// Delete a position together with its candidates and their votes.
    async fn delete_position(&self, id: Id) -> StoreResult<bool>;

    // Parties.
    async fn parties(&self) -> StoreResult<Vec<Party>>;
    async fn party(&self, id: Id) -> StoreResult<Option<Party>>;
    async fn insert_party(&self, party: NewParty) -> StoreResult<Party>;
    /// Delete a party together with its candidates and their votes.
    async fn delete_party(&self, id: Id) -> StoreResult<bool>;

    // Candidates.
    async fn candidates(&self) -> StoreResult<Vec<Candidate>>;
    async fn candidates_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Candidate>>;
    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate>;
    /// Delete a candidate together with the votes cast for them.
    async fn delete_candidate(&self, id: Id) -> StoreResult<bool>;

    // Votes.

    /// Atomically mark the voter as having voted and replace their votes with
    /// the given ones.
    ///
    /// The claim on the voter is conditional on `has_voted` still being
    /// false, so of two concurrent calls for the same voter exactly one
    /// returns [`BallotRecord::Recorded`]. Every candidate is looked up in
    /// the same transaction; if one has gone, nothing is written. On any
    /// error nothing is written either.
    async fn record_ballot(&self, voter_id: Id, votes: Vec<NewVote>) -> StoreResult<BallotRecord>;
    async fn votes_for_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>>;
    /// Number of votes per candidate. Candidates without votes are absent.
    async fn vote_counts(&self) -> StoreResult<HashMap<Id, u64>>;

    // Settings.

    /// Whether voting is open. Defaults to true if never set.
    async fn voting_enabled(&self) -> StoreResult<bool>;
    async fn set_voting_enabled(&self, enabled: bool) -> StoreResult<()>;
}

/// Shared handle on the configured store, kept in managed state.
#[derive(Clone)]
pub struct Db(Arc<dyn Store>);

impl Db {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self(Arc::new(store))
    }
}

impl<S: Store + 'static> From<Arc<S>> for Db {
    fn from(store: Arc<S>) -> Self {
        Self(store)
    }
}

impl Deref for Db {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Db {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.guard::<&State<Db>>().await {
            Outcome::Success(db) => Outcome::Success(db.inner().clone()),
            _ => Outcome::Failure((Status::InternalServerError, ())),
        }
    }
}
