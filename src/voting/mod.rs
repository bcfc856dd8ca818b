//! The vote-submission workflow: presenting a voter's ballot, checking their
//! selections and recording them exactly once.
//!
//! Every operation takes plain identifiers and a [`Store`](crate::store::Store);
//! nothing here knows about HTTP.

use log::{error, warn};
use thiserror::Error;

use crate::model::mongodb::Id;
use crate::store::StoreError;

mod ballot;
mod commit;
mod tally;
mod validate;

pub use ballot::load_ballot;
pub use commit::{ballot_receipt, commit_ballot};
pub use tally::tally_results;
pub use validate::{validate_selections, ValidatedBallot};

/// Reasons a ballot can't be shown or recorded.
#[derive(Debug, Error)]
pub enum VotingError {
    #[error("Voting is currently closed")]
    VotingClosed,
    #[error("No such voter")]
    VoterNotFound,
    #[error("Voter has already voted")]
    AlreadyVoted,
    #[error("There is nothing to vote for")]
    EmptyBallot,
    #[error("No candidate selected for: {}", .0.join(", "))]
    IncompleteBallot(Vec<String>),
    #[error("Position {0} is not on the ballot")]
    UnknownPosition(Id),
    #[error("Candidate {0} does not exist")]
    UnknownCandidate(Id),
    #[error("Candidate {candidate} is not running for position {position}")]
    MismatchedCandidate { candidate: Id, position: Id },
    #[error("Another submission for this voter was recorded first")]
    ConcurrentCommitConflict,
    #[error("Votes could not be saved, please try again: {0}")]
    StoreUnavailable(StoreError),
}

impl From<StoreError> for VotingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => warn!("Voting transaction rolled back on a conflict"),
            ref err => error!("Store failure during voting: {err}"),
        }
        Self::StoreUnavailable(err)
    }
}

/// A small election in a fresh in-memory store, for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

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
        mongodb::Id,
    };
    use crate::store::{BallotRecord, MemoryStore, Store, StoreError, StoreResult};

    pub struct Election {
        pub store: Arc<MemoryStore>,
        pub party: Party,
        pub president: Position,
        pub secretary: Position,
        pub p1: Candidate,
        pub p2: Candidate,
        pub s1: Candidate,
        pub voter: Voter,
    }

    impl Election {
        pub fn db(&self) -> &dyn Store {
            &*self.store
        }
    }

    /// Positions President and Secretary; candidates P1 and P2 for
    /// President (P1 for the party), S1 for Secretary; one voter.
    pub async fn election() -> Election {
        let store = Arc::new(MemoryStore::new());
        // Created out of display order on purpose.
        let secretary = store
            .insert_position(NewPosition::example("Secretary"))
            .await
            .unwrap();
        let president = store
            .insert_position(NewPosition::example("President"))
            .await
            .unwrap();
        let party = store.insert_party(NewParty::example("Sigla")).await.unwrap();
        let p1 = store
            .insert_candidate(NewCandidate::example("P1", president.id, Some(party.id)))
            .await
            .unwrap();
        let p2 = store
            .insert_candidate(NewCandidate::example("P2", president.id, None))
            .await
            .unwrap();
        let s1 = store
            .insert_candidate(NewCandidate::example("S1", secretary.id, None))
            .await
            .unwrap();
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        Election {
            store,
            party,
            president,
            secretary,
            p1,
            p2,
            s1,
            voter,
        }
    }

    /// Something that happens between a commit's checks and its write.
    pub enum Interference {
        /// Another submission for the voter is recorded first.
        CastFirst(Vec<NewVote>),
        /// The candidate is deleted.
        Withdraw(Id),
        /// The write is rolled back on a conflict, after another submission
        /// for the voter is recorded (if any).
        Conflict(Option<Vec<NewVote>>),
    }

    /// A [`MemoryStore`] that interferes once with the next `record_ballot`.
    pub struct Interfering {
        pub inner: Arc<MemoryStore>,
        interference: Mutex<Option<Interference>>,
    }

    impl Interfering {
        pub fn new(inner: Arc<MemoryStore>, interference: Interference) -> Self {
            Self {
                inner,
                interference: Mutex::new(Some(interference)),
            }
        }
    }

    #[rocket::async_trait]
    impl Store for Interfering {
        async fn record_ballot(
            &self,
            voter_id: Id,
            votes: Vec<NewVote>,
        ) -> StoreResult<BallotRecord> {
            let interference = self.interference.lock().unwrap().take();
            match interference {
                Some(Interference::CastFirst(first)) => {
                    self.inner.record_ballot(voter_id, first).await?;
                }
                Some(Interference::Withdraw(candidate)) => {
                    self.inner.delete_candidate(candidate).await?;
                }
                Some(Interference::Conflict(first)) => {
                    if let Some(first) = first {
                        self.inner.record_ballot(voter_id, first).await?;
                    }
                    return Err(StoreError::Conflict);
                }
                None => {}
            }
            self.inner.record_ballot(voter_id, votes).await
        }

        async fn voters(&self) -> StoreResult<Vec<Voter>> {
            self.inner.voters().await
        }
        async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
            self.inner.insert_voter(voter).await
        }
        async fn voter(&self, id: Id) -> StoreResult<Option<Voter>> {
            self.inner.voter(id).await
        }
        async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>> {
            self.inner.voter_by_username(username).await
        }
        async fn voter_by_id_number(&self, id_number: &str) -> StoreResult<Option<Voter>> {
            self.inner.voter_by_id_number(id_number).await
        }
        async fn update_voter_profile(&self, id: Id, profile: VoterProfile) -> StoreResult<bool> {
            self.inner.update_voter_profile(id, profile).await
        }
        async fn voter_turnout(&self) -> StoreResult<Turnout> {
            self.inner.voter_turnout().await
        }
        async fn admin(&self, id: Id) -> StoreResult<Option<Admin>> {
            self.inner.admin(id).await
        }
        async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
            self.inner.admin_by_username(username).await
        }
        async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
            self.inner.insert_admin(admin).await
        }
        async fn count_admins(&self) -> StoreResult<u64> {
            self.inner.count_admins().await
        }
        async fn positions(&self) -> StoreResult<Vec<Position>> {
            self.inner.positions().await
        }
        async fn insert_position(&self, position: NewPosition) -> StoreResult<Position> {
            self.inner.insert_position(position).await
        }
        async fn delete_position(&self, id: Id) -> StoreResult<bool> {
            self.inner.delete_position(id).await
        }
        async fn parties(&self) -> StoreResult<Vec<Party>> {
            self.inner.parties().await
        }
        async fn party(&self, id: Id) -> StoreResult<Option<Party>> {
            self.inner.party(id).await
        }
        async fn insert_party(&self, party: NewParty) -> StoreResult<Party> {
            self.inner.insert_party(party).await
        }
        async fn delete_party(&self, id: Id) -> StoreResult<bool> {
            self.inner.delete_party(id).await
        }
        async fn candidates(&self) -> StoreResult<Vec<Candidate>> {
            self.inner.candidates().await
        }
        async fn candidates_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Candidate>> {
            self.inner.candidates_by_ids(ids).await
        }
        async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
            self.inner.insert_candidate(candidate).await
        }
        async fn delete_candidate(&self, id: Id) -> StoreResult<bool> {
            self.inner.delete_candidate(id).await
        }
        async fn votes_for_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
            self.inner.votes_for_voter(voter_id).await
        }
        async fn vote_counts(&self) -> StoreResult<HashMap<Id, u64>> {
            self.inner.vote_counts().await
        }
        async fn voting_enabled(&self) -> StoreResult<bool> {
            self.inner.voting_enabled().await
        }
        async fn set_voting_enabled(&self, enabled: bool) -> StoreResult<()> {
            self.inner.set_voting_enabled(enabled).await
        }
    }
}
