use log::info;
use rocket::{http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            election::{
                CandidateDescription, CandidateSpec, PartyDescription, PartySpec,
                PositionDescription, PositionSpec,
            },
            results::{Results, VotingStatus, VotingToggle},
            voter::{VoterFilter, VoterInfo, VoterRegistration},
        },
        auth::AuthToken,
        db::{
            admin::Admin, candidate::NewCandidate, party::NewParty, position::NewPosition,
            voter::NewVoter,
        },
        mongodb::Id,
    },
    store::Db,
    voting::tally_results,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_positions,
        create_position,
        delete_position,
        get_parties,
        create_party,
        delete_party,
        get_candidates,
        create_candidate,
        delete_candidate,
        get_voters,
        create_voter,
        set_voting,
        results,
    ]
}

#[get("/admin/positions")]
async fn get_positions(_token: AuthToken<Admin>, db: Db) -> Result<Json<Vec<PositionDescription>>> {
    let positions = db.positions().await?;
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[post("/admin/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Admin>,
    spec: Json<PositionSpec>,
    db: Db,
) -> Result<Json<PositionDescription>> {
    let position: NewPosition = spec
        .0
        .try_into()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;
    let position = db.insert_position(position).await?;
    info!("Created position {} ({})", position.id, position.name);
    Ok(Json(position.into()))
}

/// Delete a position, its candidates, and any votes for them.
#[delete("/admin/positions/<position_id>")]
async fn delete_position(_token: AuthToken<Admin>, position_id: Id, db: Db) -> Result<()> {
    if !db.delete_position(position_id).await? {
        return Err(Error::not_found(format!("Position with ID '{position_id}'")));
    }
    info!("Deleted position {position_id}");
    Ok(())
}

#[get("/admin/parties")]
async fn get_parties(_token: AuthToken<Admin>, db: Db) -> Result<Json<Vec<PartyDescription>>> {
    let parties = db.parties().await?;
    let positions = db.positions().await?;
    let candidates = db.candidates().await?;
    Ok(Json(
        parties
            .into_iter()
            .map(|party| PartyDescription::new(party, &positions, &candidates))
            .collect(),
    ))
}

#[post("/admin/parties", data = "<spec>", format = "json")]
async fn create_party(
    _token: AuthToken<Admin>,
    spec: Json<PartySpec>,
    db: Db,
) -> Result<Json<PartyDescription>> {
    let party: NewParty = spec
        .0
        .try_into()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;
    let party = db.insert_party(party).await?;
    info!("Created party {} ({})", party.id, party.name);
    // A new party has no candidates, hence no officers.
    Ok(Json(PartyDescription::new(party, &[], &[])))
}

/// Delete a party along with its candidates and their votes.
#[delete("/admin/parties/<party_id>")]
async fn delete_party(_token: AuthToken<Admin>, party_id: Id, db: Db) -> Result<()> {
    if !db.delete_party(party_id).await? {
        return Err(Error::not_found(format!("Party with ID '{party_id}'")));
    }
    info!("Deleted party {party_id}");
    Ok(())
}

#[get("/admin/candidates")]
async fn get_candidates(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = db.candidates().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    db: Db,
) -> Result<Json<CandidateDescription>> {
    let candidate: NewCandidate = spec
        .0
        .try_into()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;

    // The position and party must exist.
    let positions = db.positions().await?;
    if !positions.iter().any(|p| p.id == candidate.position_id) {
        return Err(Error::not_found(format!(
            "Position with ID '{}'",
            candidate.position_id
        )));
    }
    if let Some(party_id) = candidate.party_id {
        if db.party(party_id).await?.is_none() {
            return Err(Error::not_found(format!("Party with ID '{party_id}'")));
        }
    }

    let candidate = db.insert_candidate(candidate).await?;
    info!("Created candidate {} ({})", candidate.id, candidate.name);
    Ok(Json(candidate.into()))
}

/// Delete a candidate and the votes cast for them.
#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(_token: AuthToken<Admin>, candidate_id: Id, db: Db) -> Result<()> {
    if !db.delete_candidate(candidate_id).await? {
        return Err(Error::not_found(format!("Candidate with ID '{candidate_id}'")));
    }
    info!("Deleted candidate {candidate_id}");
    Ok(())
}

/// The voter roster, newest first.
#[get("/admin/voters?<filter..>")]
async fn get_voters(
    _token: AuthToken<Admin>,
    filter: VoterFilter,
    db: Db,
) -> Result<Json<Vec<VoterInfo>>> {
    let voters = db.voters().await?;
    Ok(Json(
        voters
            .into_iter()
            .rev()
            .filter(|voter| filter.matches(voter))
            .map(Into::into)
            .collect(),
    ))
}

/// Register a voter on their behalf. Unlike self-registration, this does
/// not log anyone in.
#[post("/admin/voters", data = "<registration>", format = "json")]
async fn create_voter(
    _token: AuthToken<Admin>,
    registration: Json<VoterRegistration>,
    db: Db,
) -> Result<Json<VoterInfo>> {
    let voter: NewVoter = registration
        .0
        .try_into()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;
    let voter = db.insert_voter(voter).await?;
    info!("Added voter {} ({})", voter.id, voter.username);
    Ok(Json(voter.into()))
}

/// Open or close voting. Takes effect on the next request.
#[put("/admin/voting", data = "<toggle>", format = "json")]
async fn set_voting(
    _token: AuthToken<Admin>,
    toggle: Json<VotingToggle>,
    db: Db,
) -> Result<Json<VotingStatus>> {
    db.set_voting_enabled(toggle.enabled).await?;
    info!(
        "Voting {}",
        if toggle.enabled { "opened" } else { "closed" }
    );
    Ok(Json(VotingStatus {
        enabled: toggle.enabled,
        turnout: db.voter_turnout().await?,
    }))
}

#[get("/admin/results")]
pub async fn results(_token: AuthToken<Admin>, db: Db) -> Result<Json<Results>> {
    Ok(Json(tally_results(&*db).await?))
}
