use log::warn;

use crate::model::{
    api::ballot::{BallotView, Confirmation, ConfirmedSelection, Selections},
    mongodb::Id,
};

use super::VotingError;

/// Selections that have been checked against a ballot: exactly one
/// candidate per position shown, each running for that position.
///
/// Only [`validate_selections`] can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBallot {
    selections: Vec<ConfirmedSelection>,
}

impl ValidatedBallot {
    /// The choices in ballot order, for the voter to confirm.
    pub fn confirmation(&self) -> Confirmation {
        Confirmation {
            selections: self.selections.clone(),
        }
    }

    pub(super) fn selections(&self) -> &[ConfirmedSelection] {
        &self.selections
    }
}

/// Check a voter's selections against the ballot they were shown. Reads
/// nothing and writes nothing.
pub fn validate_selections(
    ballot: &BallotView,
    selections: &Selections,
) -> Result<ValidatedBallot, VotingError> {
    if ballot.positions.is_empty() {
        return Err(VotingError::EmptyBallot);
    }

    // Selections for positions the ballot never offered mean the request was
    // not produced from this ballot.
    let mut keys: Vec<&Id> = selections.keys().collect();
    keys.sort();
    if let Some(&unknown) = keys.into_iter().find(|id| ballot.position(**id).is_none()) {
        warn!("Rejected ballot with unknown position {unknown}");
        return Err(VotingError::UnknownPosition(unknown));
    }

    let missing: Vec<String> = ballot
        .positions
        .iter()
        .filter(|p| !selections.contains_key(&p.id))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(VotingError::IncompleteBallot(missing));
    }

    let selections = ballot
        .positions
        .iter()
        .map(|position| -> Result<ConfirmedSelection, VotingError> {
            // Present, checked above.
            let candidate_id = selections[&position.id];
            let candidate = position.candidate(candidate_id).ok_or_else(|| {
                warn!(
                    "Rejected ballot: candidate {candidate_id} is not running for {}",
                    position.id
                );
                VotingError::MismatchedCandidate {
                    candidate: candidate_id,
                    position: position.id,
                }
            })?;
            Ok(ConfirmedSelection {
                position_id: position.id,
                position: position.name.clone(),
                candidate_id,
                candidate: candidate.name.clone(),
                party: candidate.party.clone(),
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(ValidatedBallot { selections })
}
