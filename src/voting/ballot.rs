use std::collections::{HashMap, HashSet};

use crate::model::{
    api::ballot::{BallotCandidate, BallotPosition, BallotView},
    common::officer::{display_rank, normalize_position_name, OfficerRole},
    db::{candidate::Candidate, party::Party, position::Position, voter::Voter},
    mongodb::Id,
};
use crate::store::Store;

use super::VotingError;

/// Build the ballot for a voter who may still vote.
///
/// Fails if voting is closed, the voter does not exist, or they have
/// already voted. Reads only.
pub async fn load_ballot(store: &dyn Store, voter_id: Id) -> Result<BallotView, VotingError> {
    eligible_voter(store, voter_id).await?;

    let positions = store.positions().await?;
    let candidates = store.candidates().await?;
    let parties = store.parties().await?;

    let positions = ballot_positions(positions, &candidates)
        .into_iter()
        .map(|position| {
            let candidates = candidates
                .iter()
                .filter(|c| c.position_id == position.id)
                .map(|c| ballot_candidate(c, &parties))
                .collect();
            BallotPosition {
                id: position.id,
                officer_role: position.officer_role(),
                name: position.position.name,
                description: position.position.description,
                max_votes: position.position.max_votes,
                candidates,
            }
        })
        .collect();
    Ok(BallotView { positions })
}

/// Fetch the voter, checking that voting is open and they have not voted.
pub(super) async fn eligible_voter(store: &dyn Store, voter_id: Id) -> Result<Voter, VotingError> {
    if !store.voting_enabled().await? {
        return Err(VotingError::VotingClosed);
    }
    let voter = store
        .voter(voter_id)
        .await?
        .ok_or(VotingError::VoterNotFound)?;
    if voter.has_voted {
        return Err(VotingError::AlreadyVoted);
    }
    Ok(voter)
}

/// Positions to show on the ballot, in display order.
///
/// Positions nobody is running for are left out. Where several positions
/// share a name (ignoring case and spacing), only the first created one
/// with candidates is kept.
fn ballot_positions(positions: Vec<Position>, candidates: &[Candidate]) -> Vec<Position> {
    let contested: HashSet<Id> = candidates.iter().map(|c| c.position_id).collect();
    let mut seen = HashSet::new();
    let mut shown: Vec<Position> = positions
        .into_iter()
        .filter(|p| contested.contains(&p.id))
        .filter(|p| seen.insert(dedup_key(&p.name)))
        .collect();
    sort_for_display(&mut shown, |p| p.name.as_str());
    shown
}

fn dedup_key(name: &str) -> String {
    // Every spelling of vice president is the same position.
    match OfficerRole::from_position_name(name) {
        Some(OfficerRole::VicePresident) => "vice president".to_string(),
        _ => normalize_position_name(name),
    }
}

/// Stable sort putting president, vice president and secretary first, so
/// other positions keep their relative (creation) order.
pub(super) fn sort_for_display<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| display_rank(name(item)));
}

pub(super) fn party_names(parties: &[Party]) -> HashMap<Id, String> {
    parties.iter().map(|p| (p.id, p.name.clone())).collect()
}

fn ballot_candidate(candidate: &Candidate, parties: &[Party]) -> BallotCandidate {
    let party = candidate
        .party_id
        .and_then(|id| parties.iter().find(|p| p.id == id))
        .map(|p| p.name.clone());
    BallotCandidate {
        id: candidate.id,
        name: candidate.name.clone(),
        party,
        bio: candidate.bio.clone(),
        photo: candidate.photo.clone(),
    }
}
