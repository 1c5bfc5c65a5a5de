//! Live note list of a user, re-filtered whenever a snapshot or the selection changes

use uuid::Uuid;

use crate::notes::Note;
use crate::query::CategoryFilter;
use crate::query::DisplayPolicy;
use crate::query::View;
use crate::query::ViewParameters;
use crate::query::compute_visible_notes;

/// The notes of a single user as currently selected
///
/// Holds the latest snapshot and the selection, the visible notes are derived on demand.
#[derive(Clone, Debug, Default)]
pub struct NoteBoard {
    /// Latest full snapshot, in creation order
    notes: Vec<Note>,

    /// Current selection
    parameters: ViewParameters,

    /// How notes without text are listed
    policy: DisplayPolicy,
}

impl NoteBoard {
    /// Create an empty board
    pub fn new(parameters: ViewParameters, policy: DisplayPolicy) -> Self {
        Self {
            notes: Vec::new(),
            parameters,
            policy,
        }
    }

    /// Replace the notes with a newer snapshot
    pub fn apply_snapshot(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    pub fn set_view(&mut self, view: View) {
        self.parameters.view = view;
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.parameters.category = category;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.parameters.search = search.into();
    }

    pub fn set_folder(&mut self, folder: Option<Uuid>) {
        self.parameters.folder = folder;
    }

    /// The current selection
    pub fn parameters(&self) -> &ViewParameters {
        &self.parameters
    }

    /// The notes to show, in display order
    pub fn visible(&self) -> Vec<Note> {
        compute_visible_notes(&self.notes, &self.parameters, self.policy)
    }
}
