//! Local storage
//!
//! All collections live in a single blob. With a file configured, the blob is read on start-up
//! and the whole blob is rewritten after every change; without a file it is destroyed on
//! shutdown. A change only becomes visible once it is on disk.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::categories::Category;
use crate::categories::reassign_notes;
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

/// Everything in storage, as written to disk
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Blob {
    users: Vec<User>,
    notes: Vec<Note>,
    categories: Vec<Category>,
    todos: Vec<Todo>,
    folders: Vec<Folder>,
}

/// A local storage, optionally backed by a single file
#[derive(Clone, Debug)]
pub struct Local {
    /// All records
    blob: Arc<Mutex<Blob>>,

    /// File the blob is written to
    path: Option<Arc<PathBuf>>,

    /// Changes for the subscriptions
    feed: Feed,
}

impl Local {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        Self {
            blob: Arc::new(Mutex::new(Blob::default())),
            path: None,
            feed: Feed::new(),
        }
    }

    /// Open a file backed storage
    ///
    /// A missing file is an empty storage, it is created on the first change
    pub async fn open(path: PathBuf) -> Result<Self> {
        let blob = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Blob>(&bytes)
                .map_err(|err| Error::Serialization(err.to_string()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("No notes file at {}, starting empty", path.display());
                Blob::default()
            }
            Err(err) => return Err(Error::Connection(err.to_string())),
        };

        tracing::info!(
            "Loaded {} notes, {} todos and {} folders from {}",
            blob.notes.len(),
            blob.todos.len(),
            blob.folders.len(),
            path.display()
        );

        Ok(Self {
            blob: Arc::new(Mutex::new(blob)),
            path: Some(Arc::new(path)),
            feed: Feed::new(),
        })
    }

    /// Read from the blob
    async fn read<T>(&self, reader: impl FnOnce(&Blob) -> T) -> T {
        reader(&*self.blob.lock().await)
    }

    /// Change the blob, write it out and publish the changes
    ///
    /// The mutator works on a copy that replaces the blob once it is written, a failing mutator
    /// or write leaves the blob untouched. The lock is held while writing, so writes never
    /// interleave.
    async fn mutate<T>(
        &self,
        changes: &[Change],
        mutator: impl FnOnce(&mut Blob) -> Result<T>,
    ) -> Result<T> {
        let mut blob = self.blob.lock().await;

        let mut next = blob.clone();
        let value = mutator(&mut next)?;

        if let Some(path) = &self.path {
            write_blob(path, &next).await?;
        }

        *blob = next;
        drop(blob);

        for change in changes {
            self.feed.publish(*change);
        }

        Ok(value)
    }
}

/// Replace the file with the blob
///
/// The blob goes to a sibling file first which is then renamed over the target, so the target
/// always holds a complete blob.
async fn write_blob(path: &Path, blob: &Blob) -> Result<()> {
    let bytes = serde_json::to_vec(blob).map_err(|err| Error::Serialization(err.to_string()))?;

    let mut temporary = OsString::from(path.as_os_str());
    temporary.push(".tmp");
    let temporary = PathBuf::from(temporary);

    tokio::fs::write(&temporary, bytes)
        .await
        .map_err(|err| Error::Connection(err.to_string()))?;

    tokio::fs::rename(&temporary, path)
        .await
        .map_err(|err| Error::Connection(err.to_string()))
}

impl Default for Local {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for Local {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .read(|blob| {
                blob.users
                    .iter()
                    .find(|user| user.username == username)
                    .cloned()
            })
            .await)
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self
            .read(|blob| blob.users.iter().find(|user| &user.id == id).cloned())
            .await)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            session_id: *values.session_id,
            username: values.username.to_string(),
            hashed_password: values.hashed_password.to_string(),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        self.mutate(&[], |blob| {
            if blob.users.iter().any(|stored| stored.username == user.username) {
                return Err(Error::Duplicate);
            }

            blob.users.push(user.clone());
            Ok(user)
        })
        .await
    }

    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User> {
        self.mutate(&[], |blob| {
            let user = blob
                .users
                .iter_mut()
                .find(|stored| stored.id == user.id)
                .ok_or(Error::NotFound)?;

            user.session_id = *values.session_id;
            user.hashed_password = values.hashed_password.to_string();
            user.updated_at = Utc::now().naive_utc();

            Ok(user.clone())
        })
        .await
    }

    async fn find_all_notes(&self, owner: &Uuid) -> Result<Vec<Note>> {
        Ok(self
            .read(|blob| {
                blob.notes
                    .iter()
                    .filter(|note| &note.user_id == owner)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn find_single_note_by_id(&self, owner: &Uuid, note_id: &Uuid) -> Result<Option<Note>> {
        Ok(self
            .read(|blob| {
                blob.notes
                    .iter()
                    .find(|note| &note.id == note_id && &note.user_id == owner)
                    .cloned()
            })
            .await)
    }

    async fn create_note(&self, user: &User, fields: &NoteFields) -> Result<Note> {
        let now = Utc::now().naive_utc();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: user.id,
            folder_id: fields.folder_id,
            title: fields.title.clone(),
            text: fields.text.clone(),
            color: fields.color.clone(),
            category: fields.category.clone(),
            tags: fields.tags.clone(),
            is_pinned: fields.is_pinned,
            is_archived: fields.is_archived,
            created_at: now,
            updated_at: now,
        };

        self.mutate(&[Change::new(Collection::Notes, user.id)], |blob| {
            blob.notes.push(note.clone());
            Ok(note)
        })
        .await
    }

    async fn update_note(&self, note: &Note, changes: &NoteChanges) -> Result<Note> {
        self.mutate(&[Change::new(Collection::Notes, note.user_id)], |blob| {
            let stored = blob
                .notes
                .iter_mut()
                .find(|stored| stored.id == note.id && stored.user_id == note.user_id)
                .ok_or(Error::NotFound)?;

            changes.apply(stored, Utc::now().naive_utc());

            Ok(stored.clone())
        })
        .await
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        self.mutate(&[Change::new(Collection::Notes, note.user_id)], |blob| {
            blob.notes
                .retain(|stored| !(stored.id == note.id && stored.user_id == note.user_id));
            Ok(())
        })
        .await
    }

    async fn find_all_categories(&self, owner: &Uuid) -> Result<Vec<Category>> {
        Ok(self
            .read(|blob| {
                blob.categories
                    .iter()
                    .filter(|category| &category.user_id == owner)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn find_single_category_by_name(
        &self,
        owner: &Uuid,
        name: &str,
    ) -> Result<Option<Category>> {
        Ok(self
            .read(|blob| {
                blob.categories
                    .iter()
                    .find(|category| &category.user_id == owner && category.name == name)
                    .cloned()
            })
            .await)
    }

    async fn create_category(&self, values: &CreateCategoryValues) -> Result<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            user_id: values.user.id,
            name: values.name.to_string(),
            created_at: Utc::now().naive_utc(),
        };

        self.mutate(&[], |blob| {
            let taken = blob.categories.iter().any(|stored| {
                stored.user_id == category.user_id && stored.name == category.name
            });
            if taken {
                return Err(Error::Duplicate);
            }

            blob.categories.push(category.clone());
            Ok(category)
        })
        .await
    }

    async fn delete_category(&self, category: &Category) -> Result<usize> {
        let owner = category.user_id;

        self.mutate(&[Change::new(Collection::Notes, owner)], |blob| {
            blob.categories.retain(|stored| stored.id != category.id);

            let notes = blob.notes.iter_mut().filter(|note| note.user_id == owner);

            Ok(reassign_notes(notes, &category.name, Utc::now().naive_utc()))
        })
        .await
    }

    async fn find_all_todos(&self, owner: &Uuid) -> Result<Vec<Todo>> {
        Ok(self
            .read(|blob| {
                blob.todos
                    .iter()
                    .filter(|todo| &todo.user_id == owner)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn find_single_todo_by_id(&self, owner: &Uuid, todo_id: &Uuid) -> Result<Option<Todo>> {
        Ok(self
            .read(|blob| {
                blob.todos
                    .iter()
                    .find(|todo| &todo.id == todo_id && &todo.user_id == owner)
                    .cloned()
            })
            .await)
    }

    async fn create_todo(&self, values: &CreateTodoValues) -> Result<Todo> {
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id: values.user.id,
            text: values.text.to_string(),
            completed: false,
            created_at: Utc::now().naive_utc(),
        };

        self.mutate(&[Change::new(Collection::Todos, values.user.id)], |blob| {
            blob.todos.push(todo.clone());
            Ok(todo)
        })
        .await
    }

    async fn update_todo(&self, todo: &Todo, values: &UpdateTodoValues) -> Result<Todo> {
        self.mutate(&[Change::new(Collection::Todos, todo.user_id)], |blob| {
            let stored = blob
                .todos
                .iter_mut()
                .find(|stored| stored.id == todo.id && stored.user_id == todo.user_id)
                .ok_or(Error::NotFound)?;

            if let Some(text) = values.text {
                stored.text = text.to_string();
            }

            if let Some(completed) = values.completed {
                stored.completed = completed;
            }

            Ok(stored.clone())
        })
        .await
    }

    async fn delete_todo(&self, todo: &Todo) -> Result<()> {
        self.mutate(&[Change::new(Collection::Todos, todo.user_id)], |blob| {
            blob.todos
                .retain(|stored| !(stored.id == todo.id && stored.user_id == todo.user_id));
            Ok(())
        })
        .await
    }

    async fn find_all_folders(&self, owner: &Uuid) -> Result<Vec<Folder>> {
        Ok(self
            .read(|blob| {
                blob.folders
                    .iter()
                    .filter(|folder| &folder.user_id == owner)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn find_single_folder_by_id(
        &self,
        owner: &Uuid,
        folder_id: &Uuid,
    ) -> Result<Option<Folder>> {
        Ok(self
            .read(|blob| {
                blob.folders
                    .iter()
                    .find(|folder| &folder.id == folder_id && &folder.user_id == owner)
                    .cloned()
            })
            .await)
    }

    async fn create_folder(&self, values: &CreateFolderValues) -> Result<Folder> {
        let now = Utc::now().naive_utc();
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id: values.user.id,
            name: values.name.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.mutate(&[Change::new(Collection::Folders, values.user.id)], |blob| {
            blob.folders.push(folder.clone());
            Ok(folder)
        })
        .await
    }

    async fn rename_folder(&self, folder: &Folder, name: &str) -> Result<Folder> {
        self.mutate(&[Change::new(Collection::Folders, folder.user_id)], |blob| {
            let stored = blob
                .folders
                .iter_mut()
                .find(|stored| stored.id == folder.id && stored.user_id == folder.user_id)
                .ok_or(Error::NotFound)?;

            stored.name = name.to_string();
            stored.updated_at = Utc::now().naive_utc();

            Ok(stored.clone())
        })
        .await
    }

    async fn delete_folder(&self, folder: &Folder) -> Result<()> {
        let owner = folder.user_id;
        let changes = [
            Change::new(Collection::Folders, owner),
            Change::new(Collection::Notes, owner),
        ];

        self.mutate(&changes, |blob| {
            blob.folders
                .retain(|stored| !(stored.id == folder.id && stored.user_id == owner));

            let now = Utc::now().naive_utc();
            for note in &mut blob.notes {
                if note.user_id == owner && note.folder_id == Some(folder.id) {
                    note.folder_id = None;
                    note.updated_at = now;
                }
            }

            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::categories::UNCATEGORIZED;
    use crate::notes::NoteDraft;
    use crate::notes::NotePatch;

    async fn user(storage: &Local, username: &str) -> User {
        storage
            .create_user(&CreateUserValues {
                session_id: &Uuid::new_v4(),
                username,
                hashed_password: "hashed",
            })
            .await
            .unwrap()
    }

    fn draft(title: &str, category: Option<&str>) -> NoteFields {
        NoteDraft {
            title: Some(title.to_string()),
            text: Some(format!("text of {title}")),
            category: category.map(ToString::to_string),
            ..NoteDraft::default()
        }
        .resolve()
    }

    #[tokio::test]
    async fn test_notes_are_scoped_to_owner() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;
        let bob = user(&storage, "bob").await;

        let note = storage.create_note(&alice, &draft("A", None)).await.unwrap();
        storage.create_note(&bob, &draft("B", None)).await.unwrap();

        let notes = storage.find_all_notes(&alice.id).await.unwrap();
        assert_eq!(notes, vec![note.clone()]);

        let foreign = storage
            .find_single_note_by_id(&bob.id, &note.id)
            .await
            .unwrap();
        assert_eq!(foreign, None);
    }

    #[tokio::test]
    async fn test_notes_keep_creation_order() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;

        for title in ["one", "two", "three"] {
            storage.create_note(&alice, &draft(title, None)).await.unwrap();
        }

        let titles: Vec<String> = storage
            .find_all_notes(&alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|note| note.title)
            .collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_delete_category_reassigns_only_own_notes() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;
        let bob = user(&storage, "bob").await;

        let category = storage
            .create_category(&CreateCategoryValues {
                user: &alice,
                name: "Recipes",
            })
            .await
            .unwrap();

        let recipe = storage
            .create_note(&alice, &draft("Soup", Some("Recipes")))
            .await
            .unwrap();
        let work = storage
            .create_note(&alice, &draft("Report", Some("Work")))
            .await
            .unwrap();
        let foreign = storage
            .create_note(&bob, &draft("Cake", Some("Recipes")))
            .await
            .unwrap();

        assert_eq!(storage.delete_category(&category).await.unwrap(), 1);

        let recipe = storage
            .find_single_note_by_id(&alice.id, &recipe.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recipe.category.as_deref(), Some(UNCATEGORIZED));

        let work = storage
            .find_single_note_by_id(&alice.id, &work.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(work.category.as_deref(), Some("Work"));

        let foreign = storage
            .find_single_note_by_id(&bob.id, &foreign.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(foreign.category.as_deref(), Some("Recipes"));

        assert!(
            storage
                .find_all_categories(&alice.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_folder_keeps_notes() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;

        let folder = storage
            .create_folder(&CreateFolderValues {
                user: &alice,
                name: "Travel",
            })
            .await
            .unwrap();

        let mut fields = draft("Packing", None);
        fields.folder_id = Some(folder.id);
        let note = storage.create_note(&alice, &fields).await.unwrap();

        storage.delete_folder(&folder).await.unwrap();

        let note = storage
            .find_single_note_by_id(&alice.id, &note.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note.folder_id, None);
        assert!(storage.find_all_folders(&alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_is_written_and_read_back() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("notes.json");

        let storage = Local::open(path.clone()).await.unwrap();
        let alice = user(&storage, "alice").await;
        let note = storage.create_note(&alice, &draft("Kept", None)).await.unwrap();
        let note = storage
            .update_note(
                &note,
                &NotePatch {
                    is_pinned: Some(true),
                    ..NotePatch::default()
                }
                .resolve(),
            )
            .await
            .unwrap();

        // the file holds the whole blob after every change
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["notes"].as_array().unwrap().len(), 1);
        assert_eq!(written["users"].as_array().unwrap().len(), 1);

        let reopened = Local::open(path).await.unwrap();
        let notes = reopened.find_all_notes(&alice.id).await.unwrap();
        assert_eq!(notes, vec![note]);
    }

    #[tokio::test]
    async fn test_failed_write_changes_nothing() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("missing").join("notes.json");

        let storage = Local::open(path.clone()).await.unwrap();
        let owner = User {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            username: "alice".to_string(),
            hashed_password: "hashed".to_string(),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        let mut subscription = storage.subscribe_notes(&owner.id);
        assert_eq!(subscription.next().await, Some(Vec::new()));

        let created = storage.create_note(&owner, &draft("Lost", None)).await;
        assert!(matches!(created, Err(Error::Connection(_))));

        assert!(storage.find_all_notes(&owner.id).await.unwrap().is_empty());
        assert!(!path.exists());

        let nothing_published =
            tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(nothing_published.is_err());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temporary_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("notes.json");

        let storage = Local::open(path.clone()).await.unwrap();
        user(&storage, "alice").await;

        let files: Vec<_> = std::fs::read_dir(directory.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![OsString::from("notes.json")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sign_ups_keep_usernames_unique() {
        let storage = Local::new();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let existing = storage.find_single_user_by_username("ada").await.unwrap();
                    if existing.is_some() {
                        return Err(Error::Duplicate);
                    }

                    storage
                        .create_user(&CreateUserValues {
                            session_id: &Uuid::new_v4(),
                            username: "ada",
                            hashed_password: "hashed",
                        })
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, Error::Duplicate)),
            }
        }

        assert_eq!(created, 1);
        let users = storage.read(|blob| blob.users.len()).await;
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_category_names_are_unique_per_owner() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;
        let bob = user(&storage, "bob").await;

        let values = CreateCategoryValues {
            user: &alice,
            name: "Recipes",
        };
        storage.create_category(&values).await.unwrap();

        let again = storage.create_category(&values).await;
        assert!(matches!(again, Err(Error::Duplicate)));

        storage
            .create_category(&CreateCategoryValues {
                user: &bob,
                name: "Recipes",
            })
            .await
            .unwrap();

        assert_eq!(storage.find_all_categories(&alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_after_delete_is_not_found() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;

        let note = storage.create_note(&alice, &draft("Gone", None)).await.unwrap();
        storage.delete_note(&note).await.unwrap();

        let changes = NotePatch {
            is_pinned: Some(true),
            ..NotePatch::default()
        }
        .resolve();
        assert!(matches!(
            storage.update_note(&note, &changes).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_storage() {
        let directory = tempfile::tempdir().unwrap();

        let storage = Local::open(directory.path().join("absent.json"))
            .await
            .unwrap();

        assert!(
            storage
                .find_all_notes(&Uuid::new_v4())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_subscription_follows_mutations() {
        let storage = Local::new();
        let alice = user(&storage, "alice").await;

        let mut subscription = storage.subscribe_notes(&alice.id);
        assert_eq!(subscription.next().await, Some(Vec::new()));

        let note = storage.create_note(&alice, &draft("Live", None)).await.unwrap();
        assert_eq!(subscription.next().await, Some(vec![note.clone()]));

        storage.delete_note(&note).await.unwrap();
        assert_eq!(subscription.next().await, Some(Vec::new()));

        subscription.unsubscribe();
        storage.create_note(&alice, &draft("Unseen", None)).await.unwrap();
        assert_eq!(subscription.next().await, None);
    }
}
