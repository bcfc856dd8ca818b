use log::{info, warn};

use crate::model::{
    api::ballot::{Confirmation, ConfirmedSelection},
    db::vote::NewVote,
    mongodb::Id,
};
use crate::store::{BallotRecord, Store, StoreError};

use super::{
    ballot::{eligible_voter, party_names, sort_for_display},
    ValidatedBallot, VotingError,
};

/// Record a validated ballot: one vote per position, and the voter marked as
/// having voted, all at once or not at all.
///
/// Eligibility is checked again here, since the ballot may have been
/// validated some time ago. If another submission for the same voter wins a
/// race with this one, this fails with
/// [`VotingError::ConcurrentCommitConflict`] and writes nothing. Any other
/// transient failure is [`VotingError::StoreUnavailable`], and the voter may
/// try again.
pub async fn commit_ballot(
    store: &dyn Store,
    voter_id: Id,
    ballot: ValidatedBallot,
) -> Result<Confirmation, VotingError> {
    eligible_voter(store, voter_id).await?;

    // Every candidate must still exist, and still be running for the same
    // position, before anything is written.
    let ids: Vec<Id> = ballot.selections().iter().map(|s| s.candidate_id).collect();
    let candidates = store.candidates_by_ids(&ids).await?;
    let mut votes = Vec::with_capacity(ids.len());
    for selection in ballot.selections() {
        let candidate = candidates
            .iter()
            .find(|c| c.id == selection.candidate_id)
            .ok_or_else(|| {
                warn!(
                    "Rejected ballot for voter {voter_id}: unknown candidate {}",
                    selection.candidate_id
                );
                VotingError::UnknownCandidate(selection.candidate_id)
            })?;
        if candidate.position_id != selection.position_id {
            warn!(
                "Rejected ballot for voter {voter_id}: candidate {} moved position",
                candidate.id
            );
            return Err(VotingError::MismatchedCandidate {
                candidate: candidate.id,
                position: selection.position_id,
            });
        }
        votes.push(NewVote::new(voter_id, candidate.id, candidate.position_id));
    }

    match store.record_ballot(voter_id, votes).await {
        Ok(BallotRecord::Recorded) => {
            info!(
                "Recorded ballot of voter {voter_id} ({} position(s))",
                ballot.selections().len()
            );
            Ok(ballot.confirmation())
        }
        Ok(BallotRecord::AlreadyVoted) => {
            warn!("Concurrent ballot submission for voter {voter_id} lost");
            Err(VotingError::ConcurrentCommitConflict)
        }
        Ok(BallotRecord::UnknownCandidate(candidate)) => {
            warn!("Rejected ballot for voter {voter_id}: candidate {candidate} withdrew");
            Err(VotingError::UnknownCandidate(candidate))
        }
        Err(StoreError::Conflict) => Err(settle_conflict(store, voter_id).await),
        Err(err) => Err(err.into()),
    }
}

/// Explain a transaction that was rolled back on a conflict. It only lost to
/// another submission if the voter is now marked as having voted; otherwise
/// nothing was recorded and the voter should retry.
async fn settle_conflict(store: &dyn Store, voter_id: Id) -> VotingError {
    match store.voter(voter_id).await {
        Ok(Some(voter)) if voter.has_voted => {
            warn!("Concurrent ballot submission for voter {voter_id} lost");
            VotingError::ConcurrentCommitConflict
        }
        Ok(_) => StoreError::Conflict.into(),
        Err(err) => err.into(),
    }
}

/// The ballot a voter has recorded, in display order, or `None` if they have
/// not voted.
///
/// Votes for candidates deleted since are gone, so a voter can have voted
/// and still get an empty receipt.
pub async fn ballot_receipt(
    store: &dyn Store,
    voter_id: Id,
) -> Result<Option<Confirmation>, VotingError> {
    let votes = store.votes_for_voter(voter_id).await?;
    if votes.is_empty() {
        let voted = store.voter(voter_id).await?.map_or(false, |v| v.has_voted);
        return Ok(voted.then(|| Confirmation { selections: vec![] }));
    }

    let positions = store.positions().await?;
    let ids: Vec<Id> = votes.iter().map(|v| v.candidate_id).collect();
    let candidates = store.candidates_by_ids(&ids).await?;
    let parties = party_names(&store.parties().await?);

    // Positions are in creation order, so this is a stable base for sorting.
    let mut selections: Vec<ConfirmedSelection> = positions
        .iter()
        .filter_map(|position| {
            let vote = votes.iter().find(|v| v.position_id == position.id)?;
            let candidate = candidates.iter().find(|c| c.id == vote.candidate_id)?;
            Some(ConfirmedSelection {
                position_id: position.id,
                position: position.name.clone(),
                candidate_id: candidate.id,
                candidate: candidate.name.clone(),
                party: candidate
                    .party_id
                    .and_then(|id| parties.get(&id))
                    .cloned(),
            })
        })
        .collect();
    sort_for_display(&mut selections, |s| s.position.as_str());
    Ok(Some(Confirmation { selections }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::model::{api::ballot::Selections, db::voter::NewVoter};
    use crate::store::{MemoryStore, StoreError};

    use super::super::{
        fixtures::{election, Election, Interference, Interfering},
        load_ballot, validate_selections,
    };
    use super::*;

    async fn p1_and_s1(election: &Election) -> ValidatedBallot {
        let ballot = load_ballot(election.db(), election.voter.id).await.unwrap();
        validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p1.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap()
    }

    fn p2_and_s1(election: &Election) -> Vec<NewVote> {
        let voter = election.voter.id;
        vec![
            NewVote::new(voter, election.p2.id, election.president.id),
            NewVote::new(voter, election.s1.id, election.secretary.id),
        ]
    }

    #[rocket::async_test]
    async fn committing_records_one_vote_per_position() {
        let election = election().await;
        let voter = election.voter.id;
        let ballot = load_ballot(election.db(), voter).await.unwrap();
        let selections = Selections::from_iter([
            (election.president.id, election.p1.id),
            (election.secretary.id, election.s1.id),
        ]);
        let validated = validate_selections(&ballot, &selections).unwrap();

        let confirmation = commit_ballot(election.db(), voter, validated).await.unwrap();
        assert_eq!(Some(&"P1"), confirmation.by_position().get("President"));
        assert_eq!(Some(&"S1"), confirmation.by_position().get("Secretary"));

        let mut voted_for: Vec<Id> = election
            .db()
            .votes_for_voter(voter)
            .await
            .unwrap()
            .iter()
            .map(|v| v.candidate_id)
            .collect();
        voted_for.sort();
        let mut expected = vec![election.p1.id, election.s1.id];
        expected.sort();
        assert_eq!(expected, voted_for);
        assert!(election.db().voter(voter).await.unwrap().unwrap().has_voted);

        let receipt = ballot_receipt(election.db(), voter).await.unwrap();
        assert_eq!(Some(confirmation), receipt);
    }

    #[rocket::async_test]
    async fn second_commit_changes_nothing() {
        let election = election().await;
        let voter = election.voter.id;
        let ballot = load_ballot(election.db(), voter).await.unwrap();
        let first = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p1.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();
        let second = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p2.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();

        commit_ballot(election.db(), voter, first).await.unwrap();
        let before = election.db().votes_for_voter(voter).await.unwrap();

        let result = commit_ballot(election.db(), voter, second).await;
        assert!(matches!(result, Err(VotingError::AlreadyVoted)));
        assert_eq!(before, election.db().votes_for_voter(voter).await.unwrap());
    }

    #[rocket::async_test]
    async fn unknown_candidate_writes_nothing() {
        let election = election().await;
        let voter = election.voter.id;
        let ballot = load_ballot(election.db(), voter).await.unwrap();
        let validated = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p1.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();

        // The secretary candidate withdraws after the ballot was validated.
        assert!(election.db().delete_candidate(election.s1.id).await.unwrap());

        let result = commit_ballot(election.db(), voter, validated).await;
        assert!(matches!(result, Err(VotingError::UnknownCandidate(id)) if id == election.s1.id));
        assert!(election.db().votes_for_voter(voter).await.unwrap().is_empty());
        assert!(!election.db().voter(voter).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn racing_commits_record_exactly_one_ballot() {
        let election = election().await;
        let voter = election.voter.id;
        let ballot = load_ballot(election.db(), voter).await.unwrap();
        let for_p1 = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p1.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();
        let for_p2 = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p2.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();

        let (a, b) = rocket::tokio::join!(
            commit_ballot(election.db(), voter, for_p1),
            commit_ballot(election.db(), voter, for_p2),
        );
        let (winner, loser) = match (a, b) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert!(matches!(
            loser,
            VotingError::AlreadyVoted | VotingError::ConcurrentCommitConflict
        ));

        // The stored votes are exactly the winner's.
        let votes = election.db().votes_for_voter(voter).await.unwrap();
        assert_eq!(2, votes.len());
        let president_vote = votes
            .iter()
            .find(|v| v.position_id == election.president.id)
            .unwrap();
        let president_choice = winner.selections[0].candidate_id;
        assert_eq!(president_choice, president_vote.candidate_id);
    }

    #[rocket::async_test]
    async fn store_outage_writes_nothing() {
        let election = election().await;
        let voter = election.voter.id;
        let ballot = load_ballot(election.db(), voter).await.unwrap();
        let validated = validate_selections(
            &ballot,
            &Selections::from_iter([
                (election.president.id, election.p1.id),
                (election.secretary.id, election.s1.id),
            ]),
        )
        .unwrap();

        election.store.set_unavailable(true);
        let result = commit_ballot(election.db(), voter, validated.clone()).await;
        assert!(matches!(
            result,
            Err(VotingError::StoreUnavailable(StoreError::Unavailable(_)))
        ));
        election.store.set_unavailable(false);

        assert!(election.db().votes_for_voter(voter).await.unwrap().is_empty());
        assert!(!election.db().voter(voter).await.unwrap().unwrap().has_voted);

        // The voter can simply try again.
        commit_ballot(election.db(), voter, validated).await.unwrap();
    }

    #[rocket::async_test]
    async fn receipts_only_exist_after_voting() {
        let store = Arc::new(MemoryStore::new());
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        assert_eq!(None, ballot_receipt(&*store, voter.id).await.unwrap());
    }

    #[rocket::async_test]
    async fn losing_a_race_after_the_checks_keeps_the_winners_votes() {
        let election = election().await;
        let voter = election.voter.id;
        let validated = p1_and_s1(&election).await;
        let store = Interfering::new(
            election.store.clone(),
            Interference::CastFirst(p2_and_s1(&election)),
        );

        let result = commit_ballot(&store, voter, validated).await;
        assert!(matches!(result, Err(VotingError::ConcurrentCommitConflict)));

        let votes = store.votes_for_voter(voter).await.unwrap();
        assert_eq!(2, votes.len());
        let president_vote = votes
            .iter()
            .find(|v| v.position_id == election.president.id)
            .unwrap();
        assert_eq!(election.p2.id, president_vote.candidate_id);
    }

    #[rocket::async_test]
    async fn candidate_withdrawn_during_commit_writes_nothing() {
        let election = election().await;
        let voter = election.voter.id;
        let validated = p1_and_s1(&election).await;
        let store = Interfering::new(
            election.store.clone(),
            Interference::Withdraw(election.s1.id),
        );

        let result = commit_ballot(&store, voter, validated).await;
        assert!(matches!(result, Err(VotingError::UnknownCandidate(id)) if id == election.s1.id));
        assert!(store.votes_for_voter(voter).await.unwrap().is_empty());
        assert!(!store.voter(voter).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn rolled_back_write_can_be_retried() {
        let election = election().await;
        let voter = election.voter.id;
        let validated = p1_and_s1(&election).await;
        let store = Interfering::new(election.store.clone(), Interference::Conflict(None));

        let result = commit_ballot(&store, voter, validated.clone()).await;
        assert!(matches!(
            result,
            Err(VotingError::StoreUnavailable(StoreError::Conflict))
        ));
        assert!(!store.voter(voter).await.unwrap().unwrap().has_voted);

        let confirmation = commit_ballot(&store, voter, validated).await.unwrap();
        assert_eq!(Some(&"P1"), confirmation.by_position().get("President"));
    }

    #[rocket::async_test]
    async fn rolled_back_write_after_another_submission_is_a_lost_race() {
        let election = election().await;
        let voter = election.voter.id;
        let validated = p1_and_s1(&election).await;
        let store = Interfering::new(
            election.store.clone(),
            Interference::Conflict(Some(p2_and_s1(&election))),
        );

        let result = commit_ballot(&store, voter, validated).await;
        assert!(matches!(result, Err(VotingError::ConcurrentCommitConflict)));
    }

    #[rocket::async_test]
    async fn receipt_is_empty_when_every_choice_was_deleted() {
        let election = election().await;
        let voter = election.voter.id;
        let validated = p1_and_s1(&election).await;
        commit_ballot(election.db(), voter, validated).await.unwrap();

        assert!(election.db().delete_candidate(election.p1.id).await.unwrap());
        assert!(election.db().delete_candidate(election.s1.id).await.unwrap());

        let receipt = ballot_receipt(election.db(), voter).await.unwrap();
        assert_eq!(Some(Confirmation { selections: vec![] }), receipt);
    }
}
