use log::info;
use rocket::{http::Status, response::Redirect, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::voter::VoterInfo,
        auth::AuthToken,
        common::profile::VoterProfile,
        db::{admin::Admin, voter::Voter},
    },
    store::Db,
};

pub fn routes() -> Vec<Route> {
    routes![get_voter, get_voter_as_admin, update_voter]
}

#[get("/voter")]
async fn get_voter(token: AuthToken<Voter>, db: Db) -> Result<Json<VoterInfo>> {
    let voter = db
        .voter(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter with ID '{}'", token.id)))?;
    Ok(Json(voter.into()))
}

/// Administrators have no voter page.
#[get("/voter", rank = 2)]
fn get_voter_as_admin(_token: AuthToken<Admin>) -> Redirect {
    Redirect::to(uri!(super::admin::results))
}

/// Replace the voter's profile. Allowed before and after voting.
#[put("/voter", data = "<profile>", format = "json")]
async fn update_voter(
    token: AuthToken<Voter>,
    profile: Json<VoterProfile>,
    db: Db,
) -> Result<Json<VoterInfo>> {
    let profile = profile
        .0
        .validated()
        .map_err(|e| Error::Status(Status::BadRequest, e))?;
    if !db.update_voter_profile(token.id, profile).await? {
        return Err(Error::not_found(format!("Voter with ID '{}'", token.id)));
    }
    info!("Voter {} updated their profile", token.id);

    let voter = db
        .voter(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter with ID '{}'", token.id)))?;
    Ok(Json(voter.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::common::profile::Strand;

    use super::*;

    #[backend_test(voter)]
    async fn get_own_details(client: Client) {
        let response = client.get(uri!(get_voter)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let info: VoterInfo = response.into_json().await.unwrap();
        assert_eq!(info.username, "juan");
        assert_eq!(info.profile, VoterProfile::example());
        assert!(!info.has_voted);
    }

    #[backend_test(admin)]
    async fn admin_redirected_to_results(client: Client) {
        let response = client.get(uri!(get_voter)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/admin/results"), response.headers().get_one("Location"));
    }

    #[backend_test]
    async fn anonymous_not_found(client: Client) {
        let response = client.get(uri!(get_voter)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(voter)]
    async fn edit_profile(client: Client, db: Db) {
        let profile = VoterProfile {
            grade_level: 12,
            strand: Some(Strand::Humss),
            ..VoterProfile::example()
        };
        let response = client
            .put(uri!(update_voter))
            .header(ContentType::JSON)
            .body(json!(profile).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = db.voter_by_username("juan").await.unwrap().unwrap();
        assert_eq!(stored.profile, profile);
    }

    #[backend_test(voter)]
    async fn invalid_profile_rejected(client: Client, db: Db) {
        let profile = VoterProfile {
            last_name: "".to_string(),
            ..VoterProfile::example()
        };
        let response = client
            .put(uri!(update_voter))
            .header(ContentType::JSON)
            .body(json!(profile).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let stored = db.voter_by_username("juan").await.unwrap().unwrap();
        assert_eq!(stored.profile, VoterProfile::example());
    }
}
