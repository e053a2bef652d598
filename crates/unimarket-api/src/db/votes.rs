//! Post, vote and comment persistence.
//!
//! [`PgVoteStore`] implements the ledger's storage seam over the `posts`,
//! `post_votes` and `post_comments` tables. A transaction locks the post row with
//! `SELECT ... FOR UPDATE`, so concurrent casts on the same post queue up
//! behind each other. Counter updates are relative (`col = col + $1`) and
//! the column name comes only from the [`CounterField`] allow-list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgExecutor, PgPool, Postgres};
use sqlx::Transaction;
use unimarket_core::{
    CommentBody, CommentId, CounterDelta, CounterField, Polarity, PostId, PostTitle, VoteId,
    VoterId,
};
use unimarket_votes::{Comment, Post, StoreError, Vote, VoteStore, VoteTally, VoteTxn};
use uuid::Uuid;

const POST_COLUMNS: &str =
    "id, author_id, title, upvotes, downvotes, comment_count, created_at";
const VOTE_COLUMNS: &str = "id, post_id, voter_id, vote_type, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, content, created_at";

/// Map a driver error onto the storage taxonomy.
fn storage(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
        if db.is_check_violation() || db.is_foreign_key_violation() {
            return StoreError::Integrity(db.message().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn to_count(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Integrity(format!("{column} holds a negative value: {value}")))
}

fn to_column(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Integrity(format!("{column} out of range: {value}")))
}

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    upvotes: i64,
    downvotes: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
}

impl PostRow {
    fn into_record(self) -> Result<Post, StoreError> {
        let id = PostId::from_uuid(self.id);
        let title = PostTitle::new(self.title)
            .map_err(|e| StoreError::Integrity(format!("post {id}: {e}")))?;
        Ok(Post {
            id,
            author_id: VoterId::from_uuid(self.author_id),
            title,
            upvotes: to_count("upvotes", self.upvotes)?,
            downvotes: to_count("downvotes", self.downvotes)?,
            comment_count: to_count("comment_count", self.comment_count)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VoteRow {
    id: Uuid,
    post_id: Uuid,
    voter_id: Uuid,
    vote_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VoteRow {
    fn into_record(self) -> Result<Vote, StoreError> {
        let polarity = self
            .vote_type
            .parse::<Polarity>()
            .map_err(|e| StoreError::Integrity(format!("vote {}: {e}", self.id)))?;
        Ok(Vote {
            id: VoteId::from_uuid(self.id),
            post_id: PostId::from_uuid(self.post_id),
            voter_id: VoterId::from_uuid(self.voter_id),
            polarity,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_record(self) -> Result<Comment, StoreError> {
        let body = CommentBody::new(self.content)
            .map_err(|e| StoreError::Integrity(format!("comment {}: {e}", self.id)))?;
        Ok(Comment {
            id: CommentId::from_uuid(self.id),
            post_id: PostId::from_uuid(self.post_id),
            author_id: VoterId::from_uuid(self.author_id),
            body,
            created_at: self.created_at,
        })
    }
}

async fn select_post<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &PostId,
    for_update: bool,
) -> Result<Option<Post>, StoreError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1{lock}");
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(*id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(storage)?
        .map(PostRow::into_record)
        .transpose()
}

async fn select_vote<'e, E: PgExecutor<'e>>(
    executor: E,
    post: &PostId,
    voter: &VoterId,
) -> Result<Option<Vote>, StoreError> {
    let sql = format!("SELECT {VOTE_COLUMNS} FROM post_votes WHERE post_id = $1 AND voter_id = $2");
    sqlx::query_as::<_, VoteRow>(&sql)
        .bind(*post.as_uuid())
        .bind(*voter.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(storage)?
        .map(VoteRow::into_record)
        .transpose()
}

/// Postgres-backed [`VoteStore`].
#[derive(Debug, Clone)]
pub struct PgVoteStore {
    pool: PgPool,
}

impl PgVoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn begin(&self) -> Result<Box<dyn VoteTxn>, StoreError> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(Box::new(PgVoteTxn { tx: Some(tx) }))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let sql =
            format!("INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)");
        sqlx::query(&sql)
            .bind(*post.id.as_uuid())
            .bind(*post.author_id.as_uuid())
            .bind(post.title.as_str())
            .bind(to_column("upvotes", post.upvotes)?)
            .bind(to_column("downvotes", post.downvotes)?)
            .bind(to_column("comment_count", post.comment_count)?)
            .bind(post.created_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        select_post(&self.pool, id, false).await
    }

    async fn find_vote(&self, post: &PostId, voter: &VoterId) -> Result<Option<Vote>, StoreError> {
        select_vote(&self.pool, post, voter).await
    }

    async fn find_comment(&self, id: &CommentId) -> Result<Option<Comment>, StoreError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM post_comments WHERE id = $1");
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .map(CommentRow::into_record)
            .transpose()
    }

    async fn list_comments(&self, post: &PostId) -> Result<Vec<Comment>, StoreError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM post_comments WHERE post_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(*post.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?
            .into_iter()
            .map(CommentRow::into_record)
            .collect()
    }
}

/// One Postgres transaction. Dropping it before commit rolls back.
struct PgVoteTxn {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgVoteTxn {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StoreError::Integrity("transaction already committed".into()))
    }
}

#[async_trait]
impl VoteTxn for PgVoteTxn {
    async fn lock_post(&mut self, id: &PostId) -> Result<Option<Post>, StoreError> {
        select_post(self.conn()?, id, true).await
    }

    async fn find_vote(
        &mut self,
        post: &PostId,
        voter: &VoterId,
    ) -> Result<Option<Vote>, StoreError> {
        select_vote(self.conn()?, post, voter).await
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO post_votes ({VOTE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        sqlx::query(&sql)
            .bind(*vote.id.as_uuid())
            .bind(*vote.post_id.as_uuid())
            .bind(*vote.voter_id.as_uuid())
            .bind(vote.polarity.as_str())
            .bind(vote.created_at)
            .bind(vote.updated_at)
            .execute(self.conn()?)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn update_vote(&mut self, id: &VoteId, polarity: Polarity) -> Result<Vote, StoreError> {
        let sql = format!(
            "UPDATE post_votes SET vote_type = $1, updated_at = $2 WHERE id = $3 RETURNING {VOTE_COLUMNS}"
        );
        sqlx::query_as::<_, VoteRow>(&sql)
            .bind(polarity.as_str())
            .bind(Utc::now())
            .bind(*id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(storage)?
            .ok_or_else(|| StoreError::MissingRecord(format!("vote {id}")))?
            .into_record()
    }

    async fn delete_vote(&mut self, id: &VoteId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM post_votes WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(format!("vote {id}")));
        }
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO post_comments ({COMMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5)");
        sqlx::query(&sql)
            .bind(*comment.id.as_uuid())
            .bind(*comment.post_id.as_uuid())
            .bind(*comment.author_id.as_uuid())
            .bind(comment.body.as_str())
            .bind(comment.created_at)
            .execute(self.conn()?)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete_comment(&mut self, id: &CommentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM post_comments WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&mut self, id: &PostId) -> Result<(), StoreError> {
        // post_votes and post_comments go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(format!("post {id}")));
        }
        Ok(())
    }

    async fn adjust_counter(
        &mut self,
        post: &PostId,
        field: CounterField,
        delta: CounterDelta,
    ) -> Result<u64, StoreError> {
        if !field.is_post_counter() {
            return Err(StoreError::Integrity(format!(
                "counter {field} is not a post column"
            )));
        }
        let column = field.column();
        let sql =
            format!("UPDATE posts SET {column} = {column} + $1 WHERE id = $2 RETURNING {column}");
        let value: i64 = sqlx::query_scalar(&sql)
            .bind(delta.as_i64())
            .bind(*post.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(storage)?
            .ok_or_else(|| StoreError::MissingRecord(format!("post {post}")))?;
        to_count(column, value)
    }

    async fn count_votes(&mut self, post: &PostId) -> Result<VoteTally, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT vote_type, COUNT(*) FROM post_votes WHERE post_id = $1 GROUP BY vote_type",
        )
        .bind(*post.as_uuid())
        .fetch_all(self.conn()?)
        .await
        .map_err(storage)?;

        let mut tally = VoteTally::default();
        for (vote_type, count) in rows {
            let count = to_count("vote count", count)?;
            match vote_type.parse::<Polarity>() {
                Ok(Polarity::Upvote) => tally.upvotes = count,
                Ok(Polarity::Downvote) => tally.downvotes = count,
                Err(e) => return Err(StoreError::Integrity(e.to_string())),
            }
        }
        Ok(tally)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Integrity("transaction already committed".into()))?;
        tx.commit().await.map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_row() -> PostRow {
        PostRow {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Mini fridge, barely used".into(),
            upvotes: 3,
            downvotes: 1,
            comment_count: 7,
            created_at: Utc::now(),
        }
    }

    fn vote_row(vote_type: &str) -> VoteRow {
        VoteRow {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            voter_id: Uuid::new_v4(),
            vote_type: vote_type.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn post_row_converts() {
        let row = post_row();
        let id = row.id;
        let post = row.into_record().unwrap();
        assert_eq!(post.id.as_uuid(), &id);
        assert_eq!((post.upvotes, post.downvotes, post.comment_count), (3, 1, 7));
        assert_eq!(post.title.as_str(), "Mini fridge, barely used");
    }

    #[test]
    fn negative_counter_is_integrity_error() {
        let row = PostRow {
            downvotes: -1,
            ..post_row()
        };
        let err = row.into_record().unwrap_err();
        assert!(matches!(err, StoreError::Integrity(ref m) if m.contains("downvotes")));
    }

    #[test]
    fn blank_title_is_integrity_error() {
        let row = PostRow {
            title: "   ".into(),
            ..post_row()
        };
        assert!(matches!(row.into_record(), Err(StoreError::Integrity(_))));
    }

    #[test]
    fn post_row_keeps_author() {
        let row = post_row();
        let author = row.author_id;
        assert_eq!(row.into_record().unwrap().author_id.as_uuid(), &author);
    }

    #[test]
    fn comment_row_converts_and_validates() {
        let row = CommentRow {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: "Can you hold it until Friday?".into(),
            created_at: Utc::now(),
        };
        let comment = row.into_record().unwrap();
        assert_eq!(comment.body.as_str(), "Can you hold it until Friday?");

        let blank = CommentRow {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: "".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(blank.into_record(), Err(StoreError::Integrity(_))));
    }

    #[test]
    fn vote_row_converts() {
        let vote = vote_row("downvote").into_record().unwrap();
        assert_eq!(vote.polarity, Polarity::Downvote);
    }

    #[test]
    fn unknown_vote_type_is_integrity_error() {
        let err = vote_row("sideways").into_record().unwrap_err();
        assert!(matches!(err, StoreError::Integrity(ref m) if m.contains("sideways")));
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = storage(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn counter_columns_convert_within_range() {
        assert_eq!(to_column("upvotes", 5).unwrap(), 5);
        assert!(to_column("upvotes", u64::MAX).is_err());
        assert_eq!(to_count("upvotes", 0).unwrap(), 0);
    }
}
