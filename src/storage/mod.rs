//! All things related to the storage of notes, categories, todos and folders
//!
//! Every record belongs to a single user, every lookup is scoped to that owner: a record of
//! another user is reported as missing.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::categories::Category;
use crate::config::StorageConfig;
use crate::folders::Folder;
use crate::notes::Note;
use crate::notes::NoteChanges;
use crate::notes::NoteFields;
use crate::todos::Todo;
use crate::users::User;

pub use feed::Change;
pub use feed::Collection;
pub use feed::Feed;
pub use feed::Signal;
pub use local::Local;
pub use postgres::Postgres;
pub use subscription::Subscription;

mod feed;
mod local;
mod postgres;
mod subscription;

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// The stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The record to change no longer exists
    #[error("Record not found")]
    NotFound,

    /// A record with the same unique name already exists
    #[error("Record already exists")]
    Duplicate,
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// The storage backends
///
/// The router is generic over the storage, so the choice is made once at start-up
pub enum Backend {
    Local(Local),
    Postgres(Postgres),
}

/// Setup the storage from the configuration
///
/// # Errors
///
/// Will return `Err` when the local file can not be read or the database is unreachable
pub async fn setup(config: StorageConfig) -> Result<Backend> {
    match config {
        StorageConfig::Memory => Ok(Backend::Local(Local::new())),
        StorageConfig::File(path) => Local::open(path).await.map(Backend::Local),
        StorageConfig::Postgres(url) => Postgres::connect(&url).await.map(Backend::Postgres),
    }
}

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The initial session ID for the user
    pub session_id: &'a Uuid,

    /// The username
    pub username: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,
}

/// Values to change a password of a user
pub struct ChangePasswordValues<'a> {
    /// New session ID to invalidate current tokens
    pub session_id: &'a Uuid,

    /// The new hashed password
    pub hashed_password: &'a str,
}

/// Values to create a Category
pub struct CreateCategoryValues<'a> {
    /// The user creating the category
    pub user: &'a User,

    /// Validated name of the category
    pub name: &'a str,
}

/// Values to create a Todo
pub struct CreateTodoValues<'a> {
    /// The user creating the todo
    pub user: &'a User,

    /// Trimmed, non-empty text
    pub text: &'a str,
}

/// Values to update a Todo
pub struct UpdateTodoValues<'a> {
    /// New text of the todo
    pub text: Option<&'a str>,

    /// New completion state
    pub completed: Option<bool>,
}

/// Values to create a Folder
pub struct CreateFolderValues<'a> {
    /// The user creating the folder
    pub user: &'a User,

    /// Trimmed, non-empty name
    pub name: &'a str,
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// The feed every mutation is published on
    fn feed(&self) -> &Feed;

    /// Finds a single user by its username
    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Create a single user
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Change the password of a user
    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User>;

    /// Find all notes of a user, in creation order
    async fn find_all_notes(&self, owner: &Uuid) -> Result<Vec<Note>>;

    /// Find a single note of a user
    async fn find_single_note_by_id(&self, owner: &Uuid, note_id: &Uuid) -> Result<Option<Note>>;

    /// Create a note
    async fn create_note(&self, user: &User, fields: &NoteFields) -> Result<Note>;

    /// Update a note, only the provided changes are applied
    async fn update_note(&self, note: &Note, changes: &NoteChanges) -> Result<Note>;

    /// Delete a note
    async fn delete_note(&self, note: &Note) -> Result<()>;

    /// Find all categories a user created, in creation order
    async fn find_all_categories(&self, owner: &Uuid) -> Result<Vec<Category>>;

    /// Find a single category of a user by its name
    async fn find_single_category_by_name(
        &self,
        owner: &Uuid,
        name: &str,
    ) -> Result<Option<Category>>;

    /// Create a category
    async fn create_category(&self, values: &CreateCategoryValues) -> Result<Category>;

    /// Delete a category, moving its notes to `Uncategorized`
    ///
    /// Returns the number of reassigned notes
    async fn delete_category(&self, category: &Category) -> Result<usize>;

    /// Find all todos of a user, in creation order
    async fn find_all_todos(&self, owner: &Uuid) -> Result<Vec<Todo>>;

    /// Find a single todo of a user
    async fn find_single_todo_by_id(&self, owner: &Uuid, todo_id: &Uuid) -> Result<Option<Todo>>;

    /// Create a todo
    async fn create_todo(&self, values: &CreateTodoValues) -> Result<Todo>;

    /// Update a todo
    async fn update_todo(&self, todo: &Todo, values: &UpdateTodoValues) -> Result<Todo>;

    /// Delete a todo
    async fn delete_todo(&self, todo: &Todo) -> Result<()>;

    /// Find all folders of a user, in creation order
    async fn find_all_folders(&self, owner: &Uuid) -> Result<Vec<Folder>>;

    /// Find a single folder of a user
    async fn find_single_folder_by_id(
        &self,
        owner: &Uuid,
        folder_id: &Uuid,
    ) -> Result<Option<Folder>>;

    /// Create a folder
    async fn create_folder(&self, values: &CreateFolderValues) -> Result<Folder>;

    /// Rename a folder
    async fn rename_folder(&self, folder: &Folder, name: &str) -> Result<Folder>;

    /// Delete a folder, the notes in it are kept without folder
    async fn delete_folder(&self, folder: &Folder) -> Result<()>;

    /// Subscribe to the notes of a user
    fn subscribe_notes(&self, owner: &Uuid) -> Subscription<Note> {
        let storage = self.clone();
        let owner = *owner;

        Subscription::spawn(self.feed(), Collection::Notes, owner, move || {
            let storage = storage.clone();
            async move { storage.find_all_notes(&owner).await }
        })
    }

    /// Subscribe to the todos of a user
    fn subscribe_todos(&self, owner: &Uuid) -> Subscription<Todo> {
        let storage = self.clone();
        let owner = *owner;

        Subscription::spawn(self.feed(), Collection::Todos, owner, move || {
            let storage = storage.clone();
            async move { storage.find_all_todos(&owner).await }
        })
    }

    /// Subscribe to the folders of a user
    fn subscribe_folders(&self, owner: &Uuid) -> Subscription<Folder> {
        let storage = self.clone();
        let owner = *owner;

        Subscription::spawn(self.feed(), Collection::Folders, owner, move || {
            let storage = storage.clone();
            async move { storage.find_all_folders(&owner).await }
        })
    }
}
