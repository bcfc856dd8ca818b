use crate::model::{
    api::results::{CandidateTally, PositionTally, Results},
    db::candidate::Candidate,
};
use crate::store::{Store, StoreError};

use super::ballot::{party_names, sort_for_display};

/// Count the votes of every position, most votes first.
///
/// A position's leaders are its top `max_votes` candidates by votes; a tie
/// at the cut-off leads together. Candidates with no votes never lead.
pub async fn tally_results(store: &dyn Store) -> Result<Results, StoreError> {
    let mut positions = store.positions().await?;
    let candidates = store.candidates().await?;
    let parties = party_names(&store.parties().await?);
    let counts = store.vote_counts().await?;
    let turnout = store.voter_turnout().await?;

    sort_for_display(&mut positions, |p| p.name.as_str());
    let positions = positions
        .into_iter()
        .map(|position| {
            let running: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| c.position_id == position.id)
                .collect();
            let mut tallies: Vec<CandidateTally> = running
                .into_iter()
                .map(|c| CandidateTally {
                    candidate_id: c.id,
                    candidate: c.name.clone(),
                    party: c.party_id.and_then(|id| parties.get(&id)).cloned(),
                    votes: counts.get(&c.id).copied().unwrap_or(0),
                    leading: false,
                })
                .collect();
            // Stable, so ties stay in creation order.
            tallies.sort_by(|a, b| b.votes.cmp(&a.votes));

            let seats = position.max_votes.max(1) as usize;
            let cutoff = tallies
                .get(seats - 1)
                .or_else(|| tallies.last())
                .map_or(0, |t| t.votes);
            for tally in &mut tallies {
                tally.leading = tally.votes > 0 && tally.votes >= cutoff;
            }

            PositionTally {
                position_id: position.id,
                position: position.position.name,
                max_votes: position.position.max_votes,
                candidates: tallies,
            }
        })
        .collect();

    Ok(Results { positions, turnout })
}

#[cfg(test)]
mod tests {
    use crate::model::{
        api::ballot::Selections,
        db::{candidate::NewCandidate, position::NewPosition, voter::NewVoter},
    };

    use super::super::{commit_ballot, fixtures::election, load_ballot, validate_selections};
    use super::*;

    #[rocket::async_test]
    async fn results_count_and_rank_votes() {
        let election = election().await;
        let db = election.db();
        let council = db
            .insert_position(NewPosition {
                max_votes: 2,
                ..NewPosition::example("Councillor")
            })
            .await
            .unwrap();
        let mut councillors = Vec::new();
        for name in ["C1", "C2", "C3"] {
            let candidate = db
                .insert_candidate(NewCandidate::example(name, council.id, None))
                .await
                .unwrap();
            councillors.push(candidate);
        }
        let second = db.insert_voter(NewVoter::example2()).await.unwrap();

        for (voter, president, councillor) in [
            (election.voter.id, election.p1.id, councillors[0].id),
            (second.id, election.p1.id, councillors[1].id),
        ] {
            let ballot = load_ballot(db, voter).await.unwrap();
            let selections = Selections::from_iter([
                (election.president.id, president),
                (election.secretary.id, election.s1.id),
                (council.id, councillor),
            ]);
            let validated = validate_selections(&ballot, &selections).unwrap();
            commit_ballot(db, voter, validated).await.unwrap();
        }

        let results = tally_results(db).await.unwrap();
        assert_eq!(2, results.turnout.registered);
        assert_eq!(2, results.turnout.voted);

        let names: Vec<&str> = results.positions.iter().map(|p| p.position.as_str()).collect();
        assert_eq!(vec!["President", "Secretary", "Councillor"], names);

        let president = &results.positions[0];
        assert_eq!("P1", president.candidates[0].candidate);
        assert_eq!(2, president.candidates[0].votes);
        assert!(president.candidates[0].leading);
        assert_eq!(0, president.candidates[1].votes);
        assert!(!president.candidates[1].leading);

        // Two seats, two candidates with one vote each, one with none.
        let council = &results.positions[2];
        let leading: Vec<&str> = council
            .candidates
            .iter()
            .filter(|c| c.leading)
            .map(|c| c.candidate.as_str())
            .collect();
        assert_eq!(vec!["C1", "C2"], leading);
    }
}
