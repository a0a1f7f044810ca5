use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libram_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use libram_events::Event;

use crate::filename::{is_allowed_audio, is_allowed_ebook};

/// Cover shown for e-books that never received one.
pub const PLACEHOLDER_COVER_URL: &str =
    "https://via.placeholder.com/150x200.png?text=No+Cover";

/// E-book identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EbookId(pub AggregateId);

impl EbookId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EbookId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Ebook metadata. File bytes live in the asset store; this
/// aggregate tracks the stored filenames and descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ebook {
    id: EbookId,
    title: String,
    author: String,
    description: Option<String>,
    pdf_filename: String,
    audio_filename: Option<String>,
    cover_url: Option<String>,
    uploaded_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Ebook {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EbookId) -> Self {
        Self {
            id,
            title: String::new(),
            author: String::new(),
            description: None,
            pdf_filename: String::new(),
            audio_filename: None,
            cover_url: None,
            uploaded_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> EbookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pdf_filename(&self) -> &str {
        &self.pdf_filename
    }

    pub fn audio_filename(&self) -> Option<&str> {
        self.audio_filename.as_deref()
    }

    /// The cover to display: the uploaded one, or the placeholder.
    pub fn cover_url(&self) -> &str {
        self.cover_url.as_deref().unwrap_or(PLACEHOLDER_COVER_URL)
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        self.uploaded_at
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }
}

impl AggregateRoot for Ebook {
    type Id = EbookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: UploadEbook. Filenames here are the already-stored (sanitized)
/// names from the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEbook {
    pub ebook_id: EbookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_filename: String,
    pub audio_filename: Option<String>,
    pub cover_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditEbook. `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEbook {
    pub ebook_id: EbookId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub pdf_filename: Option<String>,
    pub audio_filename: Option<String>,
    pub cover_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteEbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEbook {
    pub ebook_id: EbookId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EbookCommand {
    UploadEbook(UploadEbook),
    EditEbook(EditEbook),
    DeleteEbook(DeleteEbook),
}

/// Event: EbookUploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbookUploaded {
    pub ebook_id: EbookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_filename: String,
    pub audio_filename: Option<String>,
    pub cover_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EbookEdited. Carries the full post-edit state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbookEdited {
    pub ebook_id: EbookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_filename: String,
    pub audio_filename: Option<String>,
    pub cover_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EbookDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbookDeleted {
    pub ebook_id: EbookId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EbookEvent {
    EbookUploaded(EbookUploaded),
    EbookEdited(EbookEdited),
    EbookDeleted(EbookDeleted),
}

impl Event for EbookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EbookEvent::EbookUploaded(_) => "assets.ebook.uploaded",
            EbookEvent::EbookEdited(_) => "assets.ebook.edited",
            EbookEvent::EbookDeleted(_) => "assets.ebook.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EbookEvent::EbookUploaded(e) => e.occurred_at,
            EbookEvent::EbookEdited(e) => e.occurred_at,
            EbookEvent::EbookDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ebook {
    type Command = EbookCommand;
    type Event = EbookEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EbookEvent::EbookUploaded(e) => {
                self.id = e.ebook_id;
                self.title = e.title.clone();
                self.author = e.author.clone();
                self.description = e.description.clone();
                self.pdf_filename = e.pdf_filename.clone();
                self.audio_filename = e.audio_filename.clone();
                self.cover_url = e.cover_url.clone();
                self.uploaded_at = Some(e.occurred_at);
                self.created = true;
                self.deleted = false;
            }
            EbookEvent::EbookEdited(e) => {
                self.title = e.title.clone();
                self.author = e.author.clone();
                self.description = e.description.clone();
                self.pdf_filename = e.pdf_filename.clone();
                self.audio_filename = e.audio_filename.clone();
                self.cover_url = e.cover_url.clone();
            }
            EbookEvent::EbookDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EbookCommand::UploadEbook(cmd) => self.handle_upload(cmd),
            EbookCommand::EditEbook(cmd) => self.handle_edit(cmd),
            EbookCommand::DeleteEbook(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Ebook {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn validate_filenames(
        pdf_filename: &str,
        audio_filename: Option<&str>,
    ) -> Result<(), DomainError> {
        if !is_allowed_ebook(pdf_filename) {
            return Err(DomainError::validation("e-book file must be a .pdf"));
        }
        if let Some(audio) = audio_filename {
            if !is_allowed_audio(audio) {
                return Err(DomainError::validation("audio file must be .mp3 or .wav"));
            }
        }
        Ok(())
    }

    fn handle_upload(&self, cmd: &UploadEbook) -> Result<Vec<EbookEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ebook already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.author.trim().is_empty() {
            return Err(DomainError::validation("author cannot be empty"));
        }
        Self::validate_filenames(&cmd.pdf_filename, cmd.audio_filename.as_deref())?;

        Ok(vec![EbookEvent::EbookUploaded(EbookUploaded {
            ebook_id: cmd.ebook_id,
            title: cmd.title.clone(),
            author: cmd.author.clone(),
            description: cmd.description.clone(),
            pdf_filename: cmd.pdf_filename.clone(),
            audio_filename: cmd.audio_filename.clone(),
            cover_url: cmd.cover_url.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditEbook) -> Result<Vec<EbookEvent>, DomainError> {
        self.ensure_live()?;
        if self.id != cmd.ebook_id {
            return Err(DomainError::invariant("ebook_id mismatch"));
        }

        let title = cmd.title.clone().unwrap_or_else(|| self.title.clone());
        if title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        let author = cmd.author.clone().unwrap_or_else(|| self.author.clone());
        if author.trim().is_empty() {
            return Err(DomainError::validation("author cannot be empty"));
        }

        let pdf_filename = cmd
            .pdf_filename
            .clone()
            .unwrap_or_else(|| self.pdf_filename.clone());
        let audio_filename = cmd.audio_filename.clone().or_else(|| self.audio_filename.clone());
        Self::validate_filenames(&pdf_filename, audio_filename.as_deref())?;

        Ok(vec![EbookEvent::EbookEdited(EbookEdited {
            ebook_id: cmd.ebook_id,
            title,
            author,
            description: cmd.description.clone().or_else(|| self.description.clone()),
            pdf_filename,
            audio_filename,
            cover_url: cmd.cover_url.clone().or_else(|| self.cover_url.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteEbook) -> Result<Vec<EbookEvent>, DomainError> {
        self.ensure_live()?;
        if self.id != cmd.ebook_id {
            return Err(DomainError::invariant("ebook_id mismatch"));
        }

        Ok(vec![EbookEvent::EbookDeleted(EbookDeleted {
            ebook_id: cmd.ebook_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
