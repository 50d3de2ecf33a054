use async_trait::async_trait;
use sea_query::{Expr, Iden, OnConflict, Order, PostgresQueryBuilder, Query};
use sea_query_postgres::{PostgresBinder, PostgresValues};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, GenericClient, NoTls, Row};

use super::{BlockRow, BlockStore, NewBlockRow, ProfileRow, ProfileStore, QuestionStore};
use crate::error::{SaveError, StoreError};
use crate::question::{Question, QuestionChange};
use crate::revision::Revision;

/// DDL for the `profiles`, `blocks` and `questions` tables
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Iden, Clone, Copy)]
enum Profiles {
    Table,
    Id,
    Slug,
    FullName,
    Bio,
    AvatarUrl,
    StatusMessage,
    ThemeSettings,
    TotalKudos,
}

#[derive(Iden, Clone, Copy)]
enum Blocks {
    Table,
    Id,
    ProfileId,
    Type,
    Content,
    DisplayOrder,
}

#[derive(Iden, Clone, Copy)]
enum Questions {
    Table,
    Id,
    ProfileId,
    QuestionText,
    AnswerText,
    IsPublished,
    CreatedAt,
}

const PROFILE_COLUMNS: [Profiles; 8] = [
    Profiles::Id,
    Profiles::Slug,
    Profiles::FullName,
    Profiles::Bio,
    Profiles::AvatarUrl,
    Profiles::StatusMessage,
    Profiles::ThemeSettings,
    Profiles::TotalKudos,
];

const BLOCK_COLUMNS: [Blocks; 5] = [
    Blocks::Id,
    Blocks::ProfileId,
    Blocks::Type,
    Blocks::Content,
    Blocks::DisplayOrder,
];

const QUESTION_COLUMNS: [Questions; 6] = [
    Questions::Id,
    Questions::ProfileId,
    Questions::QuestionText,
    Questions::AnswerText,
    Questions::IsPublished,
    Questions::CreatedAt,
];

// Read-modify-write in one statement so concurrent visitors don't lose counts
const INCREMENT_BLOCK_KUDOS_SQL: &str = "\
UPDATE blocks
SET content = jsonb_set(
    CASE WHEN jsonb_typeof(content) = 'object' THEN content ELSE '{}'::jsonb END,
    '{kudos}',
    to_jsonb(COALESCE((content->>'kudos')::bigint, 0) + 1))
WHERE id = $1 AND profile_id = $2
RETURNING (content->>'kudos')::bigint AS kudos";

const LOCK_PROFILE_SQL: &str = "SELECT id FROM profiles WHERE id = $1 FOR UPDATE";

/// PostgreSQL store over a single connection.
///
/// The connection is shared behind a mutex so block replacement can run in
/// one transaction.
pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    /// Connect and spawn the connection driver in the background
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(map_pg_error)?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(error = %err, "database connection error");
            }
        });

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    /// Create the tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.client.lock().await;
        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(map_pg_error)?;
        tracing::info!("schema is up to date");
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<(), StoreError> {
        let client = self.client.lock().await;
        client.execute("SELECT 1", &[]).await.map_err(map_pg_error)?;
        Ok(())
    }
}

/// Turn constraint failures into typed errors and closed connections into `Unavailable`
fn map_pg_error(err: tokio_postgres::Error) -> StoreError {
    if let Some(db_error) = err.as_db_error() {
        let constraint = db_error.constraint().unwrap_or_default().to_string();
        if db_error.code() == &SqlState::UNIQUE_VIOLATION {
            return StoreError::UniqueViolation { constraint };
        }
        if db_error.code() == &SqlState::CHECK_VIOLATION {
            return StoreError::CheckViolation { constraint };
        }
    }
    if err.is_closed() {
        return StoreError::Unavailable(err.to_string());
    }
    StoreError::Postgres(err)
}

fn block_row(row: &Row) -> Result<BlockRow, StoreError> {
    Ok(BlockRow {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        block_type: row.try_get("type")?,
        content: row.try_get("content")?,
        display_order: row.try_get("display_order")?,
    })
}

fn profile_row(row: &Row) -> Result<ProfileRow, StoreError> {
    Ok(ProfileRow {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        full_name: row.try_get("full_name")?,
        bio: row.try_get("bio")?,
        avatar_url: row.try_get("avatar_url")?,
        status_message: row.try_get("status_message")?,
        theme_settings: row.try_get("theme_settings")?,
        total_kudos: row.try_get("total_kudos")?,
    })
}

fn question_row(row: &Row) -> Result<Question, StoreError> {
    Ok(Question {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        question_text: row.try_get("question_text")?,
        answer_text: row.try_get("answer_text")?,
        is_published: row.try_get("is_published")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn select_block_rows<C>(client: &C, profile_id: &str) -> Result<Vec<BlockRow>, StoreError>
where
    C: GenericClient + Sync,
{
    let (sql, values) = Query::select()
        .columns(BLOCK_COLUMNS)
        .from(Blocks::Table)
        .and_where(Expr::col(Blocks::ProfileId).eq(profile_id))
        .order_by(Blocks::DisplayOrder, Order::Asc)
        .order_by(Blocks::Id, Order::Asc)
        .build_postgres(PostgresQueryBuilder);

    let rows = client
        .query(sql.as_str(), &values.as_params())
        .await
        .map_err(map_pg_error)?;
    rows.iter().map(block_row).collect()
}

async fn delete_block_rows<C>(client: &C, profile_id: &str) -> Result<u64, StoreError>
where
    C: GenericClient + Sync,
{
    let (sql, values) = Query::delete()
        .from_table(Blocks::Table)
        .and_where(Expr::col(Blocks::ProfileId).eq(profile_id))
        .build_postgres(PostgresQueryBuilder);

    client
        .execute(sql.as_str(), &values.as_params())
        .await
        .map_err(map_pg_error)
}

// Statements are built in plain functions: sea-query statements are not
// `Send`, so they must be gone before the first `.await`.

fn insert_blocks_query(rows: &[NewBlockRow]) -> Result<(String, PostgresValues), StoreError> {
    let mut insert = Query::insert();
    insert.into_table(Blocks::Table).columns([
        Blocks::ProfileId,
        Blocks::Type,
        Blocks::Content,
        Blocks::DisplayOrder,
    ]);
    for row in rows {
        insert.values([
            row.profile_id.clone().into(),
            row.block_type.as_str().into(),
            row.content.clone().into(),
            row.display_order.into(),
        ])?;
    }
    insert.returning(Query::returning().columns(BLOCK_COLUMNS));
    Ok(insert.build_postgres(PostgresQueryBuilder))
}

fn select_questions_query(profile_id: &str, published_only: bool) -> (String, PostgresValues) {
    let mut select = Query::select();
    select
        .columns(QUESTION_COLUMNS)
        .from(Questions::Table)
        .and_where(Expr::col(Questions::ProfileId).eq(profile_id));
    if published_only {
        select.and_where(Expr::col(Questions::IsPublished).eq(true));
    }
    select
        .order_by(Questions::CreatedAt, Order::Desc)
        .order_by(Questions::Id, Order::Desc);
    select.build_postgres(PostgresQueryBuilder)
}

fn update_question_query(owner: &str, id: i64, change: &QuestionChange) -> (String, PostgresValues) {
    let mut update = Query::update();
    update.table(Questions::Table);
    if let Some(answer) = &change.answer_text {
        update.value(Questions::AnswerText, answer.clone());
    }
    if let Some(published) = change.is_published {
        update.value(Questions::IsPublished, published);
    }
    update
        .and_where(Expr::col(Questions::Id).eq(id))
        .and_where(Expr::col(Questions::ProfileId).eq(owner))
        .returning(Query::returning().columns(QUESTION_COLUMNS));
    update.build_postgres(PostgresQueryBuilder)
}

async fn insert_block_rows<C>(client: &C, rows: &[NewBlockRow]) -> Result<Vec<BlockRow>, StoreError>
where
    C: GenericClient + Sync,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let (sql, values) = insert_blocks_query(rows)?;
    let returned = client
        .query(sql.as_str(), &values.as_params())
        .await
        .map_err(map_pg_error)?;
    let mut inserted = returned
        .iter()
        .map(block_row)
        .collect::<Result<Vec<_>, _>>()?;
    inserted.sort_by_key(|row| (row.display_order, row.id));
    Ok(inserted)
}

impl PgStore {
    /// Run delete and insert inside one transaction.
    ///
    /// With `expected` set, the profile row is locked and the stored rows are
    /// compared against the revision before anything is deleted.
    async fn replace_in_transaction(
        &self,
        profile_id: &str,
        expected: Option<&Revision>,
        rows: &[NewBlockRow],
    ) -> Result<Vec<BlockRow>, SaveError> {
        let mut client = self.client.lock().await;
        let tx = client
            .transaction()
            .await
            .map_err(|err| SaveError::NothingWritten(map_pg_error(err)))?;

        if let Some(expected) = expected {
            tx.query(LOCK_PROFILE_SQL, &[&profile_id])
                .await
                .map_err(|err| SaveError::NothingWritten(map_pg_error(err)))?;
            let current = select_block_rows(&tx, profile_id)
                .await
                .map_err(SaveError::NothingWritten)?;
            let found = Revision::of_rows(&current);
            if &found != expected {
                return Err(SaveError::Conflict {
                    expected: expected.clone(),
                    found,
                });
            }
        }

        let deleted = delete_block_rows(&tx, profile_id)
            .await
            .map_err(SaveError::NothingWritten)?;
        // Dropping the transaction on error rolls the delete back
        let inserted = insert_block_rows(&tx, rows)
            .await
            .map_err(SaveError::NothingWritten)?;

        tx.commit()
            .await
            .map_err(|err| SaveError::NothingWritten(map_pg_error(err)))?;

        tracing::debug!(deleted, inserted = inserted.len(), "blocks replaced");
        Ok(inserted)
    }
}

#[async_trait]
impl BlockStore for PgStore {
    #[tracing::instrument(skip(self))]
    async fn select_blocks(&self, profile_id: &str) -> Result<Vec<BlockRow>, StoreError> {
        let client = self.client.lock().await;
        select_block_rows(&*client, profile_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_blocks(&self, profile_id: &str) -> Result<u64, StoreError> {
        let client = self.client.lock().await;
        delete_block_rows(&*client, profile_id).await
    }

    #[tracing::instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_blocks(&self, rows: &[NewBlockRow]) -> Result<Vec<BlockRow>, StoreError> {
        let client = self.client.lock().await;
        insert_block_rows(&*client, rows).await
    }

    #[tracing::instrument(skip(self))]
    async fn increment_block_kudos(
        &self,
        profile_id: &str,
        block_id: i64,
    ) -> Result<u64, StoreError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(INCREMENT_BLOCK_KUDOS_SQL, &[&block_id, &profile_id])
            .await
            .map_err(map_pg_error)?
            .ok_or_else(|| StoreError::NotFound(format!("block {}", block_id)))?;

        let kudos: i64 = row.try_get("kudos")?;
        Ok(kudos.max(0) as u64)
    }

    #[tracing::instrument(skip(self, rows), fields(count = rows.len()))]
    async fn replace_blocks(
        &self,
        profile_id: &str,
        rows: &[NewBlockRow],
    ) -> Result<Vec<BlockRow>, SaveError> {
        self.replace_in_transaction(profile_id, None, rows).await
    }

    #[tracing::instrument(skip(self, expected, rows), fields(count = rows.len(), expected = %expected))]
    async fn replace_blocks_if(
        &self,
        profile_id: &str,
        expected: &Revision,
        rows: &[NewBlockRow],
    ) -> Result<Vec<BlockRow>, SaveError> {
        self.replace_in_transaction(profile_id, Some(expected), rows)
            .await
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn select_profile(&self, id: &str) -> Result<Option<ProfileRow>, StoreError> {
        let (sql, values) = Query::select()
            .columns(PROFILE_COLUMNS)
            .from(Profiles::Table)
            .and_where(Expr::col(Profiles::Id).eq(id))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let row = client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        row.as_ref().map(profile_row).transpose()
    }

    async fn select_profile_by_slug(&self, slug: &str) -> Result<Option<ProfileRow>, StoreError> {
        let (sql, values) = Query::select()
            .columns(PROFILE_COLUMNS)
            .from(Profiles::Table)
            .and_where(Expr::col(Profiles::Slug).eq(slug))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let row = client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        row.as_ref().map(profile_row).transpose()
    }

    #[tracing::instrument(skip(self, row), fields(id = %row.id))]
    async fn upsert_profile(&self, row: &ProfileRow) -> Result<ProfileRow, StoreError> {
        let (sql, values) = Query::insert()
            .into_table(Profiles::Table)
            .columns([
                Profiles::Id,
                Profiles::Slug,
                Profiles::FullName,
                Profiles::Bio,
                Profiles::AvatarUrl,
                Profiles::StatusMessage,
                Profiles::ThemeSettings,
            ])
            .values([
                row.id.clone().into(),
                row.slug.clone().into(),
                row.full_name.clone().into(),
                row.bio.clone().into(),
                row.avatar_url.clone().into(),
                row.status_message.clone().into(),
                row.theme_settings.clone().into(),
            ])?
            .on_conflict(
                OnConflict::column(Profiles::Id)
                    .update_columns([
                        Profiles::Slug,
                        Profiles::FullName,
                        Profiles::Bio,
                        Profiles::AvatarUrl,
                        Profiles::StatusMessage,
                        Profiles::ThemeSettings,
                    ])
                    .to_owned(),
            )
            .returning(Query::returning().columns(PROFILE_COLUMNS))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let stored = client
            .query_one(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        profile_row(&stored)
    }

    #[tracing::instrument(skip(self))]
    async fn increment_total_kudos(&self, id: &str) -> Result<i64, StoreError> {
        let (sql, values) = Query::update()
            .table(Profiles::Table)
            .value(Profiles::TotalKudos, Expr::col(Profiles::TotalKudos).add(1))
            .and_where(Expr::col(Profiles::Id).eq(id))
            .returning(Query::returning().column(Profiles::TotalKudos))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let row = client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        Ok(row.try_get("total_kudos")?)
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    #[tracing::instrument(skip(self, text))]
    async fn insert_question(&self, profile_id: &str, text: &str) -> Result<Question, StoreError> {
        let (sql, values) = Query::insert()
            .into_table(Questions::Table)
            .columns([Questions::ProfileId, Questions::QuestionText])
            .values([profile_id.into(), text.into()])?
            .returning(Query::returning().columns(QUESTION_COLUMNS))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let row = client
            .query_one(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        question_row(&row)
    }

    async fn select_questions(
        &self,
        profile_id: &str,
        published_only: bool,
    ) -> Result<Vec<Question>, StoreError> {
        let (sql, values) = select_questions_query(profile_id, published_only);

        let client = self.client.lock().await;
        let rows = client
            .query(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        rows.iter().map(question_row).collect()
    }

    async fn select_question(&self, owner: &str, id: i64) -> Result<Option<Question>, StoreError> {
        let (sql, values) = Query::select()
            .columns(QUESTION_COLUMNS)
            .from(Questions::Table)
            .and_where(Expr::col(Questions::Id).eq(id))
            .and_where(Expr::col(Questions::ProfileId).eq(owner))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let row = client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        row.as_ref().map(question_row).transpose()
    }

    #[tracing::instrument(skip(self, change))]
    async fn update_question(
        &self,
        owner: &str,
        id: i64,
        change: &QuestionChange,
    ) -> Result<Question, StoreError> {
        if change.is_empty() {
            return self
                .select_question(owner, id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("question {}", id)));
        }

        let (sql, values) = update_question_query(owner, id, change);

        let client = self.client.lock().await;
        let row = client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?
            .ok_or_else(|| StoreError::NotFound(format!("question {}", id)))?;
        question_row(&row)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_question(&self, owner: &str, id: i64) -> Result<(), StoreError> {
        let (sql, values) = Query::delete()
            .from_table(Questions::Table)
            .and_where(Expr::col(Questions::Id).eq(id))
            .and_where(Expr::col(Questions::ProfileId).eq(owner))
            .build_postgres(PostgresQueryBuilder);

        let client = self.client.lock().await;
        let deleted = client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(map_pg_error)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("question {}", id)));
        }
        Ok(())
    }
}
