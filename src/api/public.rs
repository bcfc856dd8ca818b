use rocket::{serde::json::Json, Route};

use crate::{error::Result, model::api::results::VotingStatus, store::Db};

pub fn routes() -> Vec<Route> {
    routes![voting_status]
}

/// Whether voting is open, and how many have voted so far.
#[get("/voting/status")]
async fn voting_status(db: Db) -> Result<Json<VotingStatus>> {
    Ok(Json(VotingStatus {
        enabled: db.voting_enabled().await?,
        turnout: db.voter_turnout().await?,
    }))
}
