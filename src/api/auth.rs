use log::info;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            voter::{VoterCredentials, VoterInfo, VoterRegistration},
        },
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        db::voter::NewVoter,
    },
    store::Db,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate_admin, register_voter, login_voter, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    db: Db,
    config: &State<Config>,
) -> Result<()> {
    let admin = db
        .admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    Ok(())
}

#[post("/auth/voter/register", data = "<registration>", format = "json")]
pub async fn register_voter(
    cookies: &CookieJar<'_>,
    registration: Json<VoterRegistration>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<VoterInfo>> {
    let voter: NewVoter = registration
        .0
        .try_into()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;
    let voter = db.insert_voter(voter).await?;
    info!("Registered voter {} ({})", voter.id, voter.username);

    // Registering logs the voter in.
    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(voter.into()))
}

/// Log a voter in by username, or by school ID number if `login` is one.
#[post("/auth/voter", data = "<credentials>", format = "json")]
pub async fn login_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<VoterInfo>> {
    let login = credentials.login.trim();
    let mut voter = db.voter_by_username(login).await?;
    if voter.is_none() && !login.is_empty() && login.chars().all(|c| c.is_ascii_digit()) {
        voter = db.voter_by_id_number(login).await?;
    }

    let voter = voter
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No voter found with the provided login and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(voter.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
