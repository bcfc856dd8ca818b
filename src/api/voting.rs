//! The voter's ballot: viewing it, checking selections, submitting them, and
//! seeing what was recorded.

use rocket::{response::Redirect, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::ballot::{BallotView, Confirmation, Selections},
        auth::AuthToken,
        db::{admin::Admin, voter::Voter},
    },
    store::Db,
    voting::{ballot_receipt, commit_ballot, load_ballot, validate_selections},
};

pub fn routes() -> Vec<Route> {
    routes![
        get_ballot,
        get_ballot_as_admin,
        check_ballot,
        submit_ballot,
        get_receipt,
    ]
}

#[get("/voter/ballot")]
async fn get_ballot(token: AuthToken<Voter>, db: Db) -> Result<Json<BallotView>> {
    Ok(Json(load_ballot(&*db, token.id).await?))
}

#[get("/voter/ballot", rank = 2)]
fn get_ballot_as_admin(_token: AuthToken<Admin>) -> Redirect {
    Redirect::to(uri!(super::admin::results))
}

/// Preview what submitting these selections would record.
#[post("/voter/ballot/validate", data = "<selections>", format = "json")]
async fn check_ballot(
    token: AuthToken<Voter>,
    selections: Json<Selections>,
    db: Db,
) -> Result<Json<Confirmation>> {
    let ballot = load_ballot(&*db, token.id).await?;
    let validated = validate_selections(&ballot, &selections)?;
    Ok(Json(validated.confirmation()))
}

#[post("/voter/ballot", data = "<selections>", format = "json")]
async fn submit_ballot(
    token: AuthToken<Voter>,
    selections: Json<Selections>,
    db: Db,
) -> Result<Json<Confirmation>> {
    let ballot = load_ballot(&*db, token.id).await?;
    let validated = validate_selections(&ballot, &selections)?;
    Ok(Json(commit_ballot(&*db, token.id, validated).await?))
}

#[get("/voter/ballot/receipt")]
async fn get_receipt(token: AuthToken<Voter>, db: Db) -> Result<Json<Confirmation>> {
    ballot_receipt(&*db, token.id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Recorded ballot".to_string()))
}
