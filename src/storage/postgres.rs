//! Postgres storage
//!
//! Every mutation is a point statement scoped to its owner. Changes are announced with
//! `pg_notify`, a listener task turns the notifications back into changes on the feed, so every
//! instance sharing the database sees them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgListener;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::categories::Category;
use crate::categories::UNCATEGORIZED;
use crate::folders::Folder;
use crate::notes::Note;
use crate::notes::NoteChanges;
use crate::notes::NoteFields;
use crate::todos::Todo;
use crate::users::User;

use super::Change;
use super::ChangePasswordValues;
use super::Collection;
use super::CreateCategoryValues;
use super::CreateFolderValues;
use super::CreateTodoValues;
use super::CreateUserValues;
use super::Error;
use super::Feed;
use super::Result;
use super::Storage;
use super::UpdateTodoValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Notification channel for changes
const CHANGES_CHANNEL: &str = "notely_changes";

/// Pause between attempts to listen again after losing the connection
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Postgres storage
#[derive(Clone, Debug)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,

    /// Changes for the subscriptions, filled by the listener
    feed: Feed,
}

impl Postgres {
    /// Create Postgres storage from a connection string
    ///
    /// Migrations will be run
    pub async fn connect(database_connection_string: &str) -> Result<Self> {
        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_connection_string)
            .await
            .map_err(connection_error)?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run and the change listener is started
    pub async fn new_with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(|err| Error::Connection(format!("Migrations could not run: {err}")))?;

        let feed = Feed::new();

        let listener = listen(&connection_pool).await?;

        tokio::spawn(forward_notifications(
            connection_pool.clone(),
            listener,
            feed.clone(),
        ));

        Ok(Self {
            connection_pool,
            feed,
        })
    }
}

/// Open a dedicated connection listening for changes
async fn listen(connection_pool: &PgPool) -> Result<PgListener> {
    let mut listener = PgListener::connect_with(connection_pool)
        .await
        .map_err(connection_error)?;

    listener
        .listen(CHANGES_CHANNEL)
        .await
        .map_err(connection_error)?;

    Ok(listener)
}

/// Forward change notifications onto the feed
///
/// A lost connection is replaced, notifications sent in between are gone so every subscription
/// is asked to fetch again. Ends when the pool is closed.
async fn forward_notifications(connection_pool: PgPool, mut listener: PgListener, feed: Feed) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match notification.payload().parse::<Change>() {
                    Ok(change) => feed.publish(change),
                    Err(err) => tracing::warn!("Ignoring notification: {err}"),
                }
                continue;
            }
            Ok(None) => tracing::warn!("Change listener lost its connection"),
            Err(err) => tracing::warn!("Change listener failed: {err}"),
        }

        let Some(fresh) = reconnect(&connection_pool).await else {
            tracing::info!("Connection pool closed, change listener stopped");
            return;
        };

        listener = fresh;
        feed.resync();
    }
}

/// Keep trying to listen again until it works or the pool is closed
async fn reconnect(connection_pool: &PgPool) -> Option<PgListener> {
    loop {
        if connection_pool.is_closed() {
            return None;
        }

        match listen(connection_pool).await {
            Ok(listener) => {
                tracing::info!("Change listener reconnected");
                return Some(listener);
            }
            Err(err) => {
                tracing::warn!("Change listener could not reconnect: {err}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Announce changes, delivered when the surrounding transaction commits
async fn notify(connection: &mut PgConnection, changes: &[Change]) -> Result<()> {
    for change in changes {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGES_CHANNEL)
            .bind(change.to_string())
            .execute(&mut *connection)
            .await
            .map_err(connection_error)?;
    }

    Ok(())
}

#[async_trait]
impl Storage for Postgres {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, session_id, username, hashed_password, created_at, updated_at
            FROM users
            WHERE username = $1
            LIMIT 1
            ",
        )
        .bind(username)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, session_id, username, hashed_password, created_at, updated_at
            FROM users
            WHERE id = $1
            LIMIT 1
            ",
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (id, session_id, username, hashed_password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, session_id, username, hashed_password, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.session_id)
        .bind(values.username)
        .bind(values.hashed_password)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(insert_error)
    }

    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User> {
        sqlx::query_as::<_, User>(
            r"
            UPDATE users
            SET session_id = $1, hashed_password = $2, updated_at = $3
            WHERE id = $4
            RETURNING id, session_id, username, hashed_password, created_at, updated_at
            ",
        )
        .bind(values.session_id)
        .bind(values.hashed_password)
        .bind(Utc::now().naive_utc())
        .bind(user.id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?
        .ok_or(Error::NotFound)
    }

    async fn find_all_notes(&self, owner: &Uuid) -> Result<Vec<Note>> {
        sqlx::query_as::<_, Note>(
            r"
            SELECT
                id, user_id, folder_id, title, text, color, category, tags,
                is_pinned, is_archived, created_at, updated_at
            FROM notes
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(owner)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn find_single_note_by_id(&self, owner: &Uuid, note_id: &Uuid) -> Result<Option<Note>> {
        sqlx::query_as::<_, Note>(
            r"
            SELECT
                id, user_id, folder_id, title, text, color, category, tags,
                is_pinned, is_archived, created_at, updated_at
            FROM notes
            WHERE user_id = $1 AND id = $2
            LIMIT 1
            ",
        )
        .bind(owner)
        .bind(note_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn create_note(&self, user: &User, fields: &NoteFields) -> Result<Note> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let note = sqlx::query_as::<_, Note>(
            r"
            INSERT INTO notes (
                id, user_id, folder_id, title, text, color, category, tags,
                is_pinned, is_archived, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING
                id, user_id, folder_id, title, text, color, category, tags,
                is_pinned, is_archived, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(fields.folder_id)
        .bind(&fields.title)
        .bind(&fields.text)
        .bind(&fields.color)
        .bind(&fields.category)
        .bind(&fields.tags)
        .bind(fields.is_pinned)
        .bind(fields.is_archived)
        .bind(Utc::now().naive_utc())
        .fetch_one(&mut *transaction)
        .await
        .map_err(connection_error)?;

        notify(&mut transaction, &[Change::new(Collection::Notes, user.id)]).await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(note)
    }

    async fn update_note(&self, note: &Note, changes: &NoteChanges) -> Result<Note> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        // nullable columns use a flag to tell "leave alone" apart from "clear"
        let note = sqlx::query_as::<_, Note>(
            r"
            UPDATE notes
            SET
                folder_id = CASE WHEN $3 THEN $4 ELSE folder_id END,
                title = COALESCE($5, title),
                text = COALESCE($6, text),
                color = COALESCE($7, color),
                category = CASE WHEN $8 THEN $9 ELSE category END,
                tags = COALESCE($10, tags),
                is_pinned = COALESCE($11, is_pinned),
                is_archived = COALESCE($12, is_archived),
                updated_at = $13
            WHERE user_id = $1 AND id = $2
            RETURNING
                id, user_id, folder_id, title, text, color, category, tags,
                is_pinned, is_archived, created_at, updated_at
            ",
        )
        .bind(note.user_id)
        .bind(note.id)
        .bind(changes.folder_id.is_some())
        .bind(changes.folder_id.flatten())
        .bind(changes.title.as_deref())
        .bind(changes.text.as_deref())
        .bind(changes.color.as_deref())
        .bind(changes.category.is_some())
        .bind(changes.category.clone().flatten())
        .bind(changes.tags.as_deref())
        .bind(changes.is_pinned)
        .bind(changes.is_archived)
        .bind(Utc::now().naive_utc())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(connection_error)?
        .ok_or(Error::NotFound)?;

        notify(&mut transaction, &[Change::new(Collection::Notes, note.user_id)]).await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(note)
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        sqlx::query("DELETE FROM notes WHERE user_id = $1 AND id = $2")
            .bind(note.user_id)
            .bind(note.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        notify(&mut transaction, &[Change::new(Collection::Notes, note.user_id)]).await?;

        transaction.commit().await.map_err(connection_error)
    }

    async fn find_all_categories(&self, owner: &Uuid) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r"
            SELECT id, user_id, name, created_at
            FROM categories
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(owner)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn find_single_category_by_name(
        &self,
        owner: &Uuid,
        name: &str,
    ) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r"
            SELECT id, user_id, name, created_at
            FROM categories
            WHERE user_id = $1 AND name = $2
            LIMIT 1
            ",
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn create_category(&self, values: &CreateCategoryValues) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            r"
            INSERT INTO categories (id, user_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.user.id)
        .bind(values.name)
        .bind(Utc::now().naive_utc())
        .fetch_one(&self.connection_pool)
        .await
        .map_err(insert_error)
    }

    async fn delete_category(&self, category: &Category) -> Result<usize> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let reassigned = sqlx::query(
            r"
            UPDATE notes
            SET category = $3, updated_at = $4
            WHERE user_id = $1 AND category = $2
            ",
        )
        .bind(category.user_id)
        .bind(&category.name)
        .bind(UNCATEGORIZED)
        .bind(Utc::now().naive_utc())
        .execute(&mut *transaction)
        .await
        .map_err(connection_error)?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE user_id = $1 AND id = $2")
            .bind(category.user_id)
            .bind(category.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        notify(
            &mut transaction,
            &[Change::new(Collection::Notes, category.user_id)],
        )
        .await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(usize::try_from(reassigned).unwrap_or(usize::MAX))
    }

    async fn find_all_todos(&self, owner: &Uuid) -> Result<Vec<Todo>> {
        sqlx::query_as::<_, Todo>(
            r"
            SELECT id, user_id, text, completed, created_at
            FROM todos
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(owner)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn find_single_todo_by_id(&self, owner: &Uuid, todo_id: &Uuid) -> Result<Option<Todo>> {
        sqlx::query_as::<_, Todo>(
            r"
            SELECT id, user_id, text, completed, created_at
            FROM todos
            WHERE user_id = $1 AND id = $2
            LIMIT 1
            ",
        )
        .bind(owner)
        .bind(todo_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn create_todo(&self, values: &CreateTodoValues) -> Result<Todo> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let todo = sqlx::query_as::<_, Todo>(
            r"
            INSERT INTO todos (id, user_id, text, completed, created_at)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING id, user_id, text, completed, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.user.id)
        .bind(values.text)
        .bind(Utc::now().naive_utc())
        .fetch_one(&mut *transaction)
        .await
        .map_err(connection_error)?;

        notify(
            &mut transaction,
            &[Change::new(Collection::Todos, values.user.id)],
        )
        .await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(todo)
    }

    async fn update_todo(&self, todo: &Todo, values: &UpdateTodoValues) -> Result<Todo> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let todo = sqlx::query_as::<_, Todo>(
            r"
            UPDATE todos
            SET text = COALESCE($3, text), completed = COALESCE($4, completed)
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, text, completed, created_at
            ",
        )
        .bind(todo.user_id)
        .bind(todo.id)
        .bind(values.text)
        .bind(values.completed)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(connection_error)?
        .ok_or(Error::NotFound)?;

        notify(&mut transaction, &[Change::new(Collection::Todos, todo.user_id)]).await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(todo)
    }

    async fn delete_todo(&self, todo: &Todo) -> Result<()> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        sqlx::query("DELETE FROM todos WHERE user_id = $1 AND id = $2")
            .bind(todo.user_id)
            .bind(todo.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        notify(&mut transaction, &[Change::new(Collection::Todos, todo.user_id)]).await?;

        transaction.commit().await.map_err(connection_error)
    }

    async fn find_all_folders(&self, owner: &Uuid) -> Result<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            r"
            SELECT id, user_id, name, created_at, updated_at
            FROM folders
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(owner)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn find_single_folder_by_id(
        &self,
        owner: &Uuid,
        folder_id: &Uuid,
    ) -> Result<Option<Folder>> {
        sqlx::query_as::<_, Folder>(
            r"
            SELECT id, user_id, name, created_at, updated_at
            FROM folders
            WHERE user_id = $1 AND id = $2
            LIMIT 1
            ",
        )
        .bind(owner)
        .bind(folder_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)
    }

    async fn create_folder(&self, values: &CreateFolderValues) -> Result<Folder> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let folder = sqlx::query_as::<_, Folder>(
            r"
            INSERT INTO folders (id, user_id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, user_id, name, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.user.id)
        .bind(values.name)
        .bind(Utc::now().naive_utc())
        .fetch_one(&mut *transaction)
        .await
        .map_err(connection_error)?;

        notify(
            &mut transaction,
            &[Change::new(Collection::Folders, values.user.id)],
        )
        .await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(folder)
    }

    async fn rename_folder(&self, folder: &Folder, name: &str) -> Result<Folder> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        let folder = sqlx::query_as::<_, Folder>(
            r"
            UPDATE folders
            SET name = $3, updated_at = $4
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, name, created_at, updated_at
            ",
        )
        .bind(folder.user_id)
        .bind(folder.id)
        .bind(name)
        .bind(Utc::now().naive_utc())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(connection_error)?
        .ok_or(Error::NotFound)?;

        notify(
            &mut transaction,
            &[Change::new(Collection::Folders, folder.user_id)],
        )
        .await?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(folder)
    }

    async fn delete_folder(&self, folder: &Folder) -> Result<()> {
        let mut transaction = self.connection_pool.begin().await.map_err(connection_error)?;

        sqlx::query(
            r"
            UPDATE notes
            SET folder_id = NULL, updated_at = $3
            WHERE user_id = $1 AND folder_id = $2
            ",
        )
        .bind(folder.user_id)
        .bind(folder.id)
        .bind(Utc::now().naive_utc())
        .execute(&mut *transaction)
        .await
        .map_err(connection_error)?;

        sqlx::query("DELETE FROM folders WHERE user_id = $1 AND id = $2")
            .bind(folder.user_id)
            .bind(folder.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        notify(
            &mut transaction,
            &[
                Change::new(Collection::Folders, folder.user_id),
                Change::new(Collection::Notes, folder.user_id),
            ],
        )
        .await?;

        transaction.commit().await.map_err(connection_error)
    }
}

/// Map an insert error, a unique violation means the name is taken
fn insert_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(database_error) = &err
        && database_error.is_unique_violation()
    {
        return Error::Duplicate;
    }

    connection_error(err)
}

/// Utility function for mapping any error into a storage connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}
