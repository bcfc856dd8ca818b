use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
};

use log::debug;
use rocket::tokio::sync::Mutex;

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

use super::{BallotRecord, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    admins: Vec<Admin>,
    voters: Vec<Voter>,
    positions: Vec<Position>,
    parties: Vec<Party>,
    candidates: Vec<Candidate>,
    votes: Vec<Vote>,
    voting_enabled: Option<bool>,
}

impl Tables {
    /// Remove the given candidates and every vote cast for them.
    fn remove_candidates(&mut self, doomed: &HashSet<Id>) {
        self.candidates.retain(|c| !doomed.contains(&c.id));
        self.votes.retain(|v| !doomed.contains(&v.candidate_id));
    }
}

/// A store that keeps everything in process memory.
///
/// All operations take the same lock, so each one runs in isolation from
/// every other. Data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`]
    /// (or succeed again), as if the backing database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    async fn lock(&self) -> StoreResult<rocket::tokio::sync::MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(self.tables.lock().await)
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn voters(&self) -> StoreResult<Vec<Voter>> {
        Ok(self.lock().await?.voters.clone())
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let mut tables = self.lock().await?;
        if tables.voters.iter().any(|v| v.username == voter.username) {
            return Err(StoreError::Duplicate(format!("username {}", voter.username)));
        }
        if tables
            .voters
            .iter()
            .any(|v| v.profile.id_number == voter.profile.id_number)
        {
            return Err(StoreError::Duplicate(format!(
                "id number {}",
                voter.profile.id_number
            )));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        tables.voters.push(voter.clone());
        Ok(voter)
    }

    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>> {
        let tables = self.lock().await?;
        Ok(tables.voters.iter().find(|v| v.id == id).cloned())
    }

    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>> {
        let tables = self.lock().await?;
        Ok(tables.voters.iter().find(|v| v.username == username).cloned())
    }

    async fn voter_by_id_number(&self, id_number: &str) -> StoreResult<Option<Voter>> {
        let tables = self.lock().await?;
        Ok(tables
            .voters
            .iter()
            .find(|v| v.profile.id_number == id_number)
            .cloned())
    }

    async fn update_voter_profile(&self, id: Id, profile: VoterProfile) -> StoreResult<bool> {
        let mut tables = self.lock().await?;
        if tables
            .voters
            .iter()
            .any(|v| v.id != id && v.profile.id_number == profile.id_number)
        {
            return Err(StoreError::Duplicate(format!(
                "id number {}",
                profile.id_number
            )));
        }
        match tables.voters.iter_mut().find(|v| v.id == id) {
            Some(voter) => {
                voter.profile = profile;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn voter_turnout(&self) -> StoreResult<Turnout> {
        let tables = self.lock().await?;
        Ok(Turnout {
            registered: tables.voters.len() as u64,
            voted: tables.voters.iter().filter(|v| v.has_voted).count() as u64,
        })
    }

    async fn admin(&self, id: Id) -> StoreResult<Option<Admin>> {
        let tables = self.lock().await?;
        Ok(tables.admins.iter().find(|a| a.id == id).cloned())
    }

    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        let tables = self.lock().await?;
        Ok(tables.admins.iter().find(|a| a.username == username).cloned())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let mut tables = self.lock().await?;
        if tables.admins.iter().any(|a| a.username == admin.username) {
            return Err(StoreError::Duplicate(format!("admin {}", admin.username)));
        }
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        tables.admins.push(admin.clone());
        Ok(admin)
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        Ok(self.lock().await?.admins.len() as u64)
    }

    async fn positions(&self) -> StoreResult<Vec<Position>> {
        Ok(self.lock().await?.positions.clone())
    }

    async fn insert_position(&self, position: NewPosition) -> StoreResult<Position> {
        let mut tables = self.lock().await?;
        if tables.positions.iter().any(|p| p.name == position.name) {
            return Err(StoreError::Duplicate(format!("position {}", position.name)));
        }
        let position = Position {
            id: Id::new(),
            position,
        };
        tables.positions.push(position.clone());
        Ok(position)
    }

    async fn delete_position(&self, id: Id) -> StoreResult<bool> {
        let mut tables = self.lock().await?;
        let before = tables.positions.len();
        tables.positions.retain(|p| p.id != id);
        if tables.positions.len() == before {
            return Ok(false);
        }
        let doomed: HashSet<Id> = tables
            .candidates
            .iter()
            .filter(|c| c.position_id == id)
            .map(|c| c.id)
            .collect();
        tables.remove_candidates(&doomed);
        debug!("Deleted position {id} and {} candidate(s)", doomed.len());
        Ok(true)
    }

    async fn parties(&self) -> StoreResult<Vec<Party>> {
        Ok(self.lock().await?.parties.clone())
    }

    async fn party(&self, id: Id) -> StoreResult<Option<Party>> {
        let tables = self.lock().await?;
        Ok(tables.parties.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_party(&self, party: NewParty) -> StoreResult<Party> {
        let mut tables = self.lock().await?;
        if tables.parties.iter().any(|p| p.name == party.name) {
            return Err(StoreError::Duplicate(format!("party {}", party.name)));
        }
        let party = Party {
            id: Id::new(),
            party,
        };
        tables.parties.push(party.clone());
        Ok(party)
    }

    async fn delete_party(&self, id: Id) -> StoreResult<bool> {
        let mut tables = self.lock().await?;
        let before = tables.parties.len();
        tables.parties.retain(|p| p.id != id);
        if tables.parties.len() == before {
            return Ok(false);
        }
        let doomed: HashSet<Id> = tables
            .candidates
            .iter()
            .filter(|c| c.party_id == Some(id))
            .map(|c| c.id)
            .collect();
        tables.remove_candidates(&doomed);
        debug!("Deleted party {id} and {} candidate(s)", doomed.len());
        Ok(true)
    }

    async fn candidates(&self) -> StoreResult<Vec<Candidate>> {
        Ok(self.lock().await?.candidates.clone())
    }

    async fn candidates_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Candidate>> {
        let tables = self.lock().await?;
        Ok(tables
            .candidates
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let mut tables = self.lock().await?;
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        tables.candidates.push(candidate.clone());
        Ok(candidate)
    }

    async fn delete_candidate(&self, id: Id) -> StoreResult<bool> {
        let mut tables = self.lock().await?;
        if !tables.candidates.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        tables.remove_candidates(&HashSet::from([id]));
        Ok(true)
    }

    async fn record_ballot(&self, voter_id: Id, votes: Vec<NewVote>) -> StoreResult<BallotRecord> {
        let mut tables = self.lock().await?;

        // One vote per position, as the unique index enforces in MongoDB.
        let mut positions = HashSet::new();
        if let Some(dup) = votes.iter().find(|v| !positions.insert(v.position_id)) {
            return Err(StoreError::Duplicate(format!(
                "vote for position {}",
                dup.position_id
            )));
        }

        let Some(index) = tables.voters.iter().position(|v| v.id == voter_id) else {
            return Ok(BallotRecord::AlreadyVoted);
        };
        if tables.voters[index].has_voted {
            return Ok(BallotRecord::AlreadyVoted);
        }
        let withdrawn = votes.iter().find(|vote| {
            !tables
                .candidates
                .iter()
                .any(|c| c.id == vote.candidate_id && c.position_id == vote.position_id)
        });
        if let Some(vote) = withdrawn {
            return Ok(BallotRecord::UnknownCandidate(vote.candidate_id));
        }
        tables.voters[index].has_voted = true;

        tables.votes.retain(|v| v.voter_id != voter_id);
        tables
            .votes
            .extend(votes.into_iter().map(|vote| Vote { id: Id::new(), vote }));
        Ok(BallotRecord::Recorded)
    }

    async fn votes_for_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        let tables = self.lock().await?;
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.voter_id == voter_id)
            .cloned()
            .collect())
    }

    async fn vote_counts(&self) -> StoreResult<HashMap<Id, u64>> {
        let tables = self.lock().await?;
        let mut counts = HashMap::new();
        for vote in &tables.votes {
            *counts.entry(vote.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn voting_enabled(&self) -> StoreResult<bool> {
        Ok(self.lock().await?.voting_enabled.unwrap_or(true))
    }

    async fn set_voting_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.lock().await?.voting_enabled = Some(enabled);
        Ok(())
    }
}
