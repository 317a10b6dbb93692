//! The `votes` table: one row per distinct voter, latest vote wins.

use crate::framework::DatabaseProcessor;
use ballot_sdk::objects::{BallotChoice, Scores};
use compact_str::CompactString;
use kanau::processor::Processor;
use tracing::warn;

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVote {
    pub id: i32,
    pub vote: BallotChoice,
    pub voter_id: String,
    /// When the current choice was applied. Advances on every resubmission.
    pub cast_at: time::PrimitiveDateTime,
    /// When the voter was first seen. Never changes.
    pub recorded_at: time::PrimitiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredVoteRow {
    id: i32,
    vote: String,
    voter_id: String,
    cast_at: time::PrimitiveDateTime,
    recorded_at: time::PrimitiveDateTime,
}

impl TryFrom<StoredVoteRow> for StoredVote {
    type Error = sqlx::Error;

    fn try_from(row: StoredVoteRow) -> Result<Self, Self::Error> {
        let vote = row
            .vote
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(StoredVote {
            id: row.id,
            vote,
            voter_id: row.voter_id,
            cast_at: row.cast_at,
            recorded_at: row.recorded_at,
        })
    }
}

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First vote from this voter.
    Inserted,
    /// Existing row overwritten with the new choice.
    Updated,
    /// The stored row already carries a later `cast_at`; nothing changed.
    Superseded,
}

#[derive(Debug, Clone)]
/// Insert a vote, or overwrite the choice of an existing voter.
///
/// Single statement keyed on the unique `voter_id` index. A concurrent
/// upsert for the same voter serializes on that index, and the row keeps
/// whichever write carries the later `cast_at`.
pub struct UpsertVote {
    pub voter_id: CompactString,
    pub vote: BallotChoice,
    pub cast_at: time::PrimitiveDateTime,
}

impl Processor<UpsertVote> for DatabaseProcessor {
    type Output = UpsertOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertVote")]
    async fn process(&self, upsert: UpsertVote) -> Result<UpsertOutcome, sqlx::Error> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO votes (voter_id, vote, "timestamp", created_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (voter_id) DO UPDATE
                SET vote = EXCLUDED.vote,
                    "timestamp" = EXCLUDED."timestamp"
                WHERE votes."timestamp" <= EXCLUDED."timestamp"
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(upsert.voter_id.as_str())
        .bind(upsert.vote.as_str())
        .bind(upsert.cast_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Superseded,
        })
    }
}

#[derive(Debug, Clone)]
/// Count stored votes per choice.
pub struct GetVoteCounts;

impl Processor<GetVoteCounts> for DatabaseProcessor {
    type Output = Scores;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetVoteCounts")]
    async fn process(&self, _query: GetVoteCounts) -> Result<Scores, sqlx::Error> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT vote, COUNT(*) AS count FROM votes GROUP BY vote")
                .fetch_all(&self.pool)
                .await?;

        let mut scores = Scores::new();
        for (vote, count) in rows {
            match vote.parse::<BallotChoice>() {
                Ok(choice) => scores.set(choice, count),
                Err(e) => warn!(error = %e, count, "Ignoring votes with unknown choice"),
            }
        }
        Ok(scores)
    }
}

#[derive(Debug, Clone)]
/// Count votes cast at or after `since`.
pub struct CountRecentVotes {
    pub since: time::PrimitiveDateTime,
}

impl Processor<CountRecentVotes> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountRecentVotes")]
    async fn process(&self, query: CountRecentVotes) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM votes WHERE "timestamp" >= $1"#)
            .bind(query.since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone)]
pub struct GetStoredVote {
    pub voter_id: CompactString,
}

impl Processor<GetStoredVote> for DatabaseProcessor {
    type Output = Option<StoredVote>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetStoredVote")]
    async fn process(&self, query: GetStoredVote) -> Result<Option<StoredVote>, sqlx::Error> {
        let row: Option<StoredVoteRow> = sqlx::query_as(
            r#"
            SELECT
                id,
                vote,
                voter_id,
                "timestamp" AS cast_at,
                created_at AS recorded_at
            FROM votes
            WHERE voter_id = $1
            "#,
        )
        .bind(query.voter_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredVote::try_from).transpose()
    }
}

#[derive(Debug, Clone)]
pub struct PingDatabase;

impl Processor<PingDatabase> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, _query: PingDatabase) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
