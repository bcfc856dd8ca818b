use std::collections::HashMap;

use log::{debug, info, warn};
use mongodb::{
    bson::{doc, Document},
    options::{
        Acknowledgment, FindOptions, ReadConcern, TransactionOptions, UpdateOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::model::{
    api::results::Turnout,
    common::profile::VoterProfile,
    db::{
        admin::{Admin, NewAdmin},
        candidate::{Candidate, NewCandidate},
        party::{NewParty, Party},
        position::{NewPosition, Position},
        settings::{VotingSetting, VOTING_SETTING_KEY},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter},
    },
    mongodb::{ensure_indexes_exist, Coll, Id, MongoCollection},
};

use super::{BallotRecord, Store, StoreError, StoreResult};

/// A store backed by MongoDB.
///
/// Multi-document writes run in transactions, so the deployment must be a
/// replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the database and make sure the required indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        info!("Connected to MongoDB database '{db_name}'");
        Ok(Self { client, db })
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    async fn start_transaction(&self) -> StoreResult<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        session.start_transaction(options).await?;
        Ok(session)
    }

    /// Run the writes of `record_ballot` inside the session's transaction.
    async fn record_ballot_in(
        &self,
        session: &mut ClientSession,
        voter_id: Id,
        votes: &[NewVote],
    ) -> StoreResult<BallotRecord> {
        // Claim the voter. The filter on `has_voted` makes this the
        // serialisation point between concurrent commits for one voter.
        let claim = self
            .coll::<Voter>()
            .update_one_with_session(
                doc! { "_id": voter_id, "has_voted": false },
                doc! { "$set": { "has_voted": true } },
                None,
                session,
            )
            .await?;
        if claim.matched_count == 0 {
            return Ok(BallotRecord::AlreadyVoted);
        }

        // Every candidate must still be running for the position voted for.
        let ids: Vec<Id> = votes.iter().map(|v| v.candidate_id).collect();
        let mut cursor = self
            .coll::<Candidate>()
            .find_with_session(doc! { "_id": { "$in": ids.clone() } }, None, session)
            .await?;
        let mut running = Vec::new();
        while let Some(candidate) = cursor.next(session).await.transpose()? {
            running.push(candidate);
        }
        let withdrawn = votes.iter().find(|vote| {
            !running
                .iter()
                .any(|c| c.id == vote.candidate_id && c.position_id == vote.position_id)
        });
        if let Some(vote) = withdrawn {
            return Ok(BallotRecord::UnknownCandidate(vote.candidate_id));
        }
        // Writing to the candidates makes a concurrent delete of any of them
        // a write conflict with this transaction.
        if !ids.is_empty() {
            self.coll::<Candidate>()
                .update_many_with_session(
                    doc! { "_id": { "$in": ids } },
                    doc! { "$currentDate": { "last_voted_at": true } },
                    None,
                    session,
                )
                .await?;
        }

        // Clear anything left over from an earlier attempt.
        let stale = self
            .coll::<Vote>()
            .delete_many_with_session(doc! { "voter_id": voter_id }, None, session)
            .await?;
        if stale.deleted_count > 0 {
            warn!(
                "Removed {} stale vote(s) for voter {voter_id}",
                stale.deleted_count
            );
        }

        if !votes.is_empty() {
            self.coll::<NewVote>()
                .insert_many_with_session(votes, None, session)
                .await?;
        }
        Ok(BallotRecord::Recorded)
    }

    /// Delete the candidates matching `filter` and the votes cast for them.
    async fn delete_candidates_in(
        &self,
        session: &mut ClientSession,
        filter: Document,
    ) -> StoreResult<u64> {
        let mut cursor = self
            .coll::<Candidate>()
            .find_with_session(filter.clone(), None, session)
            .await?;
        let mut ids = Vec::new();
        while let Some(candidate) = cursor.next(session).await.transpose()? {
            ids.push(candidate.id);
        }
        if ids.is_empty() {
            return Ok(0);
        }
        self.coll::<Vote>()
            .delete_many_with_session(doc! { "candidate_id": { "$in": ids } }, None, session)
            .await?;
        let deleted = self
            .coll::<Candidate>()
            .delete_many_with_session(filter, None, session)
            .await?;
        Ok(deleted.deleted_count)
    }

    /// Delete one document of `T` by ID, then the candidates matching
    /// `candidates`, all in one transaction.
    async fn delete_cascading<T>(&self, id: Id, candidates: Document) -> StoreResult<bool>
    where
        T: MongoCollection + Send + Sync,
    {
        let mut session = self.start_transaction().await?;
        let result = self
            .delete_cascading_in::<T>(&mut session, id, candidates)
            .await;
        finish(session, result).await
    }

    async fn delete_cascading_in<T>(
        &self,
        session: &mut ClientSession,
        id: Id,
        candidates: Document,
    ) -> StoreResult<bool>
    where
        T: MongoCollection + Send + Sync,
    {
        let deleted = self
            .coll::<T>()
            .delete_one_with_session(id.as_doc(), None, session)
            .await?;
        if deleted.deleted_count == 0 {
            return Ok(false);
        }
        let removed = self.delete_candidates_in(session, candidates).await?;
        debug!("Deleted {} {id} and {removed} candidate(s)", T::NAME);
        Ok(true)
    }

    async fn all<T>(&self) -> StoreResult<Vec<T>>
    where
        T: MongoCollection + for<'de> Deserialize<'de> + Unpin + Send + Sync,
    {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        Ok(self
            .coll::<T>()
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }
}

/// Commit the session's transaction if `result` is a success, abort it
/// otherwise.
async fn finish<T>(mut session: ClientSession, result: StoreResult<T>) -> StoreResult<T> {
    match result {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!("Failed to abort transaction: {abort_err}");
            }
            Err(err)
        }
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn voters(&self) -> StoreResult<Vec<Voter>> {
        self.all().await
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let id = self
            .coll::<NewVoter>()
            .insert_one(&voter, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| StoreError::Malformed("no ID returned for voter".to_string()))?;
        Ok(Voter { id, voter })
    }

    async fn voter(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.coll::<Voter>().find_one(id.as_doc(), None).await?)
    }

    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>> {
        Ok(self
            .coll::<Voter>()
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn voter_by_id_number(&self, id_number: &str) -> StoreResult<Option<Voter>> {
        Ok(self
            .coll::<Voter>()
            .find_one(doc! { "id_number": id_number }, None)
            .await?)
    }

    async fn update_voter_profile(&self, id: Id, profile: VoterProfile) -> StoreResult<bool> {
        let fields = mongodb::bson::to_document(&profile)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        // Optional fields are skipped when absent; unset them explicitly.
        let mut unset = Document::new();
        for key in ["middle_name", "strand"] {
            if !fields.contains_key(key) {
                unset.insert(key, "");
            }
        }
        let mut update = doc! { "$set": fields };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        let result = self
            .coll::<Voter>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn voter_turnout(&self) -> StoreResult<Turnout> {
        let voters = self.coll::<Voter>();
        let registered = voters.count_documents(None, None).await?;
        let voted = voters
            .count_documents(doc! { "has_voted": true }, None)
            .await?;
        Ok(Turnout { registered, voted })
    }

    async fn admin(&self, id: Id) -> StoreResult<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        Ok(self
            .coll::<Admin>()
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let id = self
            .coll::<NewAdmin>()
            .insert_one(&admin, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| StoreError::Malformed("no ID returned for admin".to_string()))?;
        Ok(Admin { id, admin })
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        Ok(self.coll::<Admin>().count_documents(None, None).await?)
    }

    async fn positions(&self) -> StoreResult<Vec<Position>> {
        self.all().await
    }

    async fn insert_position(&self, position: NewPosition) -> StoreResult<Position> {
        let id = self
            .coll::<NewPosition>()
            .insert_one(&position, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| StoreError::Malformed("no ID returned for position".to_string()))?;
        Ok(Position { id, position })
    }

    async fn delete_position(&self, id: Id) -> StoreResult<bool> {
        self.delete_cascading::<Position>(id, doc! { "position_id": id })
            .await
    }

    async fn parties(&self) -> StoreResult<Vec<Party>> {
        self.all().await
    }

    async fn party(&self, id: Id) -> StoreResult<Option<Party>> {
        Ok(self.coll::<Party>().find_one(id.as_doc(), None).await?)
    }

    async fn insert_party(&self, party: NewParty) -> StoreResult<Party> {
        let id = self
            .coll::<NewParty>()
            .insert_one(&party, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| StoreError::Malformed("no ID returned for party".to_string()))?;
        Ok(Party { id, party })
    }

    async fn delete_party(&self, id: Id) -> StoreResult<bool> {
        self.delete_cascading::<Party>(id, doc! { "party_id": id })
            .await
    }

    async fn candidates(&self) -> StoreResult<Vec<Candidate>> {
        self.all().await
    }

    async fn candidates_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        Ok(self
            .coll::<Candidate>()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let id = self
            .coll::<NewCandidate>()
            .insert_one(&candidate, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| StoreError::Malformed("no ID returned for candidate".to_string()))?;
        Ok(Candidate { id, candidate })
    }

    async fn delete_candidate(&self, id: Id) -> StoreResult<bool> {
        let mut session = self.start_transaction().await?;
        let result = self.delete_candidates_in(&mut session, id.as_doc()).await;
        finish(session, result.map(|deleted| deleted > 0)).await
    }

    async fn record_ballot(&self, voter_id: Id, votes: Vec<NewVote>) -> StoreResult<BallotRecord> {
        let mut session = self.start_transaction().await?;
        let result = self
            .record_ballot_in(&mut session, voter_id, &votes)
            .await;
        match result {
            Ok(BallotRecord::Recorded) | Err(_) => finish(session, result).await,
            // Refused; release the transaction without writing.
            Ok(refused) => {
                session.abort_transaction().await?;
                Ok(refused)
            }
        }
    }

    async fn votes_for_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        Ok(self
            .coll::<Vote>()
            .find(doc! { "voter_id": voter_id }, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn vote_counts(&self) -> StoreResult<HashMap<Id, u64>> {
        #[derive(Deserialize)]
        struct Count {
            #[serde(rename = "_id")]
            candidate_id: Id,
            count: i64,
        }

        let pipeline = [doc! {
            "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } }
        }];
        let mut cursor = self.coll::<Vote>().aggregate(pipeline, None).await?;
        let mut counts = HashMap::new();
        while let Some(document) = cursor.try_next().await? {
            let count: Count = mongodb::bson::from_document(document)
                .map_err(|e| StoreError::Malformed(e.to_string()))?;
            counts.insert(count.candidate_id, count.count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn voting_enabled(&self) -> StoreResult<bool> {
        let setting = self
            .coll::<VotingSetting>()
            .find_one(doc! { "_id": VOTING_SETTING_KEY }, None)
            .await?;
        Ok(setting.map_or(true, |s| s.enabled))
    }

    async fn set_voting_enabled(&self, enabled: bool) -> StoreResult<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.coll::<VotingSetting>()
            .update_one(
                doc! { "_id": VOTING_SETTING_KEY },
                doc! { "$set": { "enabled": enabled } },
                options,
            )
            .await?;
        Ok(())
    }
}
