use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use rocket::{
    http::Status,
    response::{Redirect, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::voting::VotingError;

pub type Result<T> = std::result::Result<T, Error>;

/// Where voters are sent once their ballot is recorded.
pub const RECEIPT_PATH: &str = "/voter/ballot/receipt";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Voting(#[from] VotingError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Store(err) => store_status(err),
            Self::Voting(err) => match err {
                VotingError::AlreadyVoted | VotingError::ConcurrentCommitConflict => {
                    Status::SeeOther
                }
                VotingError::EmptyBallot | VotingError::IncompleteBallot(_) => {
                    Status::UnprocessableEntity
                }
                VotingError::UnknownPosition(_)
                | VotingError::UnknownCandidate(_)
                | VotingError::MismatchedCandidate { .. } => Status::BadRequest,
                VotingError::VotingClosed => Status::Forbidden,
                VotingError::VoterNotFound => Status::Unauthorized,
                VotingError::StoreUnavailable(err) => store_status(err),
            },
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::InternalServerError,
            Self::Status(status, _) => *status,
        }
    }
}

fn store_status(err: &StoreError) -> Status {
    match err {
        StoreError::Duplicate(_) => Status::Conflict,
        StoreError::Conflict | StoreError::Unavailable(_) => Status::ServiceUnavailable,
        StoreError::Db(_) | StoreError::Malformed(_) => Status::InternalServerError,
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_positions: Vec<String>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::SeeOther {
            // Already voted: show them what they voted for instead.
            return Redirect::to(RECEIPT_PATH).respond_to(req);
        }

        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        let body = match self {
            Self::Voting(VotingError::IncompleteBallot(missing)) => ErrorBody {
                error: "Please select a candidate for every position".to_string(),
                missing_positions: missing,
            },
            // Tampered or stale submissions get a generic message.
            Self::Voting(
                VotingError::UnknownPosition(_)
                | VotingError::UnknownCandidate(_)
                | VotingError::MismatchedCandidate { .. },
            ) => ErrorBody {
                error: "Your ballot could not be submitted, please reload it and try again"
                    .to_string(),
                missing_positions: vec![],
            },
            _ if status == Status::ServiceUnavailable => ErrorBody {
                error: "The service is temporarily unavailable, please try again".to_string(),
                missing_positions: vec![],
            },
            // Don't leak internals.
            _ if status.code >= 500 => ErrorBody {
                error: status.reason_lossy().to_string(),
                missing_positions: vec![],
            },
            err => ErrorBody {
                error: err.to_string(),
                missing_positions: vec![],
            },
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voting_errors_map_to_statuses() {
        let cases = [
            (VotingError::AlreadyVoted, Status::SeeOther),
            (VotingError::ConcurrentCommitConflict, Status::SeeOther),
            (VotingError::EmptyBallot, Status::UnprocessableEntity),
            (
                VotingError::IncompleteBallot(vec!["Secretary".into()]),
                Status::UnprocessableEntity,
            ),
            (
                VotingError::UnknownCandidate(crate::model::mongodb::Id::new()),
                Status::BadRequest,
            ),
            (VotingError::VotingClosed, Status::Forbidden),
            (VotingError::VoterNotFound, Status::Unauthorized),
            (
                VotingError::StoreUnavailable(StoreError::Unavailable("down".into())),
                Status::ServiceUnavailable,
            ),
            (
                VotingError::StoreUnavailable(StoreError::Conflict),
                Status::ServiceUnavailable,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status, Error::from(err).status());
        }
    }

    #[test]
    fn duplicates_conflict() {
        let err = Error::from(StoreError::Duplicate("username juan".into()));
        assert_eq!(Status::Conflict, err.status());
    }
}
