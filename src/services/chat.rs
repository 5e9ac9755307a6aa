/// Guided chat
///
/// The session walks a fixed sequence of steps:
///
/// ```text
/// initial -> media_type -> genre_selection -> theme_selection
///         -> industry_selection (not for books) -> generating -> results
/// ```
///
/// [`ChatSession`] is the pure state machine. Steps that need the language
/// model hand back a [`PendingWork`] which [`ChatService`] runs outside the
/// session lock and then feeds back in. Each piece of work carries the
/// session epoch; a reset bumps the epoch so late results are dropped.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::LocalStorage,
    error::{AppError, AppResult, ErrorKind, GenerationError},
    models::{
        ChatAction, ChatStep, EnrichedRecommendation, Industry, MediaType, RecommendationRequest,
        Theme, TranscriptEntry,
    },
    services::recommendations::RecommendationService,
};

/// Genres offered during genre selection
pub const GENRES: [&str; 10] = [
    "Action",
    "Comedy",
    "Drama",
    "Horror",
    "Sci-Fi",
    "Thriller",
    "Romance",
    "Mystery",
    "Animation",
    "Documentary",
];

const MEDIA_OPTIONS: [MediaType; 3] = [MediaType::Movie, MediaType::Tv, MediaType::Book];
const INDUSTRY_OPTIONS: [Industry; 3] = [Industry::Hollywood, Industry::Bollywood, Industry::Both];

const DRAFTS_KEY: &str = "chat_sessions";

/// Offered when theme generation fails
pub fn fallback_themes() -> Vec<Theme> {
    [
        ("Coming of Age", "Growing up and finding yourself", &["youth", "identity"][..]),
        ("Found Family", "Strangers who become each other's people", &["belonging", "friendship"][..]),
        ("Redemption", "Second chances and making amends", &["forgiveness", "change"][..]),
        ("Survival", "Holding on against the odds", &["resilience", "danger"][..]),
    ]
    .into_iter()
    .map(|(name, description, keywords)| Theme {
        name: name.to_string(),
        description: description.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    })
    .collect()
}

/// Work the session needs done before it can move on
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWork {
    Themes {
        epoch: u64,
        media_type: MediaType,
        genres: Vec<String>,
    },
    Recommendations {
        epoch: u64,
        request: RecommendationRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub step: ChatStep,
    pub media_type: Option<MediaType>,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub industry: Option<Industry>,
    pub transcript: Vec<TranscriptEntry>,
    pub suggested_themes: Vec<Theme>,
    pub results: Vec<EnrichedRecommendation>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Last step whose entry message was already produced
    #[serde(default)]
    last_entered: Option<ChatStep>,
    #[serde(default)]
    epoch: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string(), 0)
    }

    fn with_id(id: String, epoch: u64) -> Self {
        Self {
            id,
            step: ChatStep::Initial,
            media_type: None,
            genres: Vec::new(),
            themes: Vec::new(),
            industry: None,
            transcript: Vec::new(),
            suggested_themes: Vec::new(),
            results: Vec::new(),
            error: None,
            updated_at: Utc::now(),
            last_entered: None,
            epoch,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Back to `initial` with every selection cleared
    ///
    /// Work started before the reset is ignored when it completes.
    pub fn reset(&mut self) {
        *self = Self::with_id(std::mem::take(&mut self.id), self.epoch + 1);
    }

    /// Applies one user action
    pub fn apply(&mut self, action: ChatAction) -> AppResult<Option<PendingWork>> {
        let pending = match action {
            ChatAction::Start => {
                self.expect_step(ChatStep::Initial)?;
                self.enter(ChatStep::MediaType);
                None
            }
            ChatAction::SelectMediaType(media_type) => {
                self.expect_step(ChatStep::MediaType)?;
                self.media_type = Some(media_type);
                self.transcript.push(TranscriptEntry::user(media_type.label()));
                self.enter(ChatStep::GenreSelection);
                None
            }
            ChatAction::ToggleGenre(genre) => {
                self.expect_step(ChatStep::GenreSelection)?;
                let genre = GENRES
                    .iter()
                    .find(|g| g.eq_ignore_ascii_case(genre.trim()))
                    .ok_or_else(|| AppError::InvalidInput(format!("Unknown genre: {}", genre)))?;
                toggle(&mut self.genres, genre);
                None
            }
            ChatAction::ConfirmGenres => {
                self.expect_step(ChatStep::GenreSelection)?;
                let media_type = self.require_media_type()?;
                self.transcript.push(TranscriptEntry::user(summarize(&self.genres, "Any genre")));
                self.step = ChatStep::ThemeSelection;
                Some(PendingWork::Themes {
                    epoch: self.epoch,
                    media_type,
                    genres: self.genres.clone(),
                })
            }
            ChatAction::ToggleTheme(name) => {
                self.expect_step(ChatStep::ThemeSelection)?;
                let theme = self
                    .suggested_themes
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
                    .map(|t| t.name.clone())
                    .ok_or_else(|| AppError::InvalidInput(format!("Unknown theme: {}", name)))?;
                toggle(&mut self.themes, &theme);
                None
            }
            ChatAction::ConfirmThemes => {
                self.expect_step(ChatStep::ThemeSelection)?;
                self.transcript.push(TranscriptEntry::user(summarize(&self.themes, "Any theme")));

                if self.require_media_type()? == MediaType::Book {
                    self.industry = Some(Industry::Both);
                    Some(self.begin_generation()?)
                } else {
                    self.enter(ChatStep::IndustrySelection);
                    None
                }
            }
            ChatAction::SelectIndustry(industry) => {
                self.expect_step(ChatStep::IndustrySelection)?;
                self.industry = Some(industry);
                self.transcript.push(TranscriptEntry::user(industry.label()));
                Some(self.begin_generation()?)
            }
        };

        self.updated_at = Utc::now();
        Ok(pending)
    }

    /// Shows theme suggestions; returns false when the work is stale
    pub fn present_themes(&mut self, epoch: u64, themes: Vec<Theme>) -> bool {
        if epoch != self.epoch || self.step != ChatStep::ThemeSelection {
            return false;
        }

        self.suggested_themes = themes;
        self.enter(ChatStep::ThemeSelection);
        self.updated_at = Utc::now();
        true
    }

    /// Moves to `results`; returns false when the work is stale
    pub fn complete_generation(
        &mut self,
        epoch: u64,
        outcome: Result<Vec<EnrichedRecommendation>, GenerationError>,
    ) -> bool {
        if epoch != self.epoch || self.step != ChatStep::Generating {
            return false;
        }

        match outcome {
            Ok(results) => {
                self.results = results;
                self.error = None;
            }
            Err(e) => {
                self.results = Vec::new();
                self.error = Some(e.kind.user_message().to_string());
            }
        }

        self.enter(ChatStep::Results);
        self.updated_at = Utc::now();
        true
    }

    /// Composite prompt built from everything selected so far
    pub fn composite_request(&self) -> AppResult<RecommendationRequest> {
        let media_type = self.require_media_type()?;

        let mut prompt = format!("{} ", capitalize(media_type.plural()));
        if self.genres.is_empty() {
            prompt.push_str("of any genre");
        } else {
            prompt.push_str(&format!("in the {} genres", self.genres.join(", ")));
        }
        if !self.themes.is_empty() {
            prompt.push_str(&format!(" exploring themes of {}", self.themes.join(", ")));
        }
        if media_type.is_screen() {
            if let Some(industry) = self.industry {
                prompt.push_str(&format!(", {}", industry.prompt_phrase()));
            }
        }

        Ok(RecommendationRequest {
            prompt,
            media_type,
            genres: self.genres.clone(),
        })
    }

    fn begin_generation(&mut self) -> AppResult<PendingWork> {
        let request = self.composite_request()?;
        self.enter(ChatStep::Generating);
        Ok(PendingWork::Recommendations {
            epoch: self.epoch,
            request,
        })
    }

    /// Moves to `step` and produces its entry message at most once
    fn enter(&mut self, step: ChatStep) {
        if step < self.step {
            tracing::warn!(from = ?self.step, to = ?step, "Ignoring backward chat transition");
            return;
        }
        self.step = step;

        if self.last_entered == Some(step) {
            return;
        }
        self.last_entered = Some(step);

        let entry = match step {
            ChatStep::Initial => return,
            ChatStep::MediaType => TranscriptEntry::agent(
                "What are you in the mood for today?",
                MEDIA_OPTIONS.iter().map(|m| m.label().to_string()).collect(),
            ),
            ChatStep::GenreSelection => TranscriptEntry::agent(
                "Pick any genres you like, then tap Done.",
                GENRES.iter().map(|g| g.to_string()).collect(),
            ),
            ChatStep::ThemeSelection => TranscriptEntry::agent(
                "Any of these themes catch your eye? Choose some, then tap Done.",
                self.suggested_themes.iter().map(|t| t.name.clone()).collect(),
            ),
            ChatStep::IndustrySelection => TranscriptEntry::agent(
                "Which film industry should I look at?",
                INDUSTRY_OPTIONS.iter().map(|i| i.label().to_string()).collect(),
            ),
            ChatStep::Generating => {
                TranscriptEntry::agent("Give me a moment while I put together your picks...", vec![])
            }
            ChatStep::Results => match &self.error {
                Some(message) => TranscriptEntry::agent(message.clone(), vec![]),
                None => TranscriptEntry::agent(
                    format!("Here are {} picks for you.", self.results.len()),
                    vec![],
                ),
            },
        };

        self.transcript.push(entry);
    }

    fn expect_step(&self, expected: ChatStep) -> AppResult<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(AppError::InvalidInput(format!(
                "Action not allowed in step {:?}",
                self.step
            )))
        }
    }

    fn require_media_type(&self) -> AppResult<MediaType> {
        self.media_type
            .ok_or_else(|| AppError::Internal("Chat session has no media type".to_string()))
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

fn toggle(selection: &mut Vec<String>, value: &str) {
    match selection.iter().position(|s| s == value) {
        Some(index) => {
            selection.remove(index);
        }
        None => selection.push(value.to_string()),
    }
}

fn summarize(selection: &[String], empty: &str) -> String {
    if selection.is_empty() {
        empty.to_string()
    } else {
        selection.join(", ")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Most chat drafts kept; the least recently updated are dropped first
pub const MAX_DRAFTS: usize = 20;

/// Owns every chat session and runs their model calls
pub struct ChatService {
    sessions: RwLock<HashMap<String, ChatSession>>,
    recommendations: Arc<RecommendationService>,
    storage: LocalStorage,
}

impl ChatService {
    /// Restores saved drafts from storage
    pub fn load(storage: LocalStorage, recommendations: Arc<RecommendationService>) -> Self {
        let mut sessions: HashMap<String, ChatSession> = match storage.load(DRAFTS_KEY) {
            Ok(sessions) => sessions.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable chat drafts");
                HashMap::new()
            }
        };
        evict_stale(&mut sessions, None);

        Self {
            sessions: RwLock::new(sessions),
            recommendations,
            storage,
        }
    }

    pub async fn create(&self) -> ChatSession {
        let session = ChatSession::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        evict_stale(&mut sessions, Some(&session.id));
        self.persist(&sessions);

        tracing::info!(session_id = %session.id, "Chat session created");
        session
    }

    pub async fn get(&self, id: &str) -> AppResult<ChatSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Chat session {}", id)))
    }

    pub async fn reset(&self, id: &str) -> AppResult<ChatSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Chat session {}", id)))?;
        session.reset();
        let snapshot = session.clone();
        self.persist(&sessions);

        tracing::info!(session_id = %id, "Chat session reset");
        Ok(snapshot)
    }

    /// Applies an action and runs any model work it triggers
    ///
    /// The work runs on its own task, so the session still settles if the
    /// caller goes away. The session lock is not held while the model is called.
    pub async fn act(self: &Arc<Self>, id: &str, action: ChatAction) -> AppResult<ChatSession> {
        let pending = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Chat session {}", id)))?;
            let pending = session.apply(action)?;
            self.persist(&sessions);
            pending
        };

        if let Some(work) = pending {
            let service = Arc::clone(self);
            let session_id = id.to_string();
            let handle = tokio::spawn(async move { service.run_pending(&session_id, work).await });

            if let Err(e) = handle.await {
                tracing::error!(session_id = %id, error = %e, "Chat work task failed");
            }
        }

        self.get(id).await
    }

    async fn run_pending(&self, id: &str, work: PendingWork) {
        match work {
            PendingWork::Themes {
                epoch,
                media_type,
                genres,
            } => {
                let themes = match self
                    .recommendations
                    .generator()
                    .generate_themes(media_type, &genres)
                    .await
                {
                    Ok(themes) => themes,
                    Err(e) => {
                        tracing::warn!(kind = ?e.kind, error = %e.message, "Theme generation failed, using defaults");
                        fallback_themes()
                    }
                };

                self.update(id, |session| session.present_themes(epoch, themes))
                    .await;
            }
            PendingWork::Recommendations { epoch, request } => {
                let outcome = match self.recommendations.recommend_composed(request).await {
                    Ok(entry) => Ok(entry.results),
                    Err(AppError::Generation(e)) => Err(e),
                    Err(e) => Err(GenerationError::new(ErrorKind::Unknown, e.to_string())),
                };

                self.update(id, |session| session.complete_generation(epoch, outcome))
                    .await;
            }
        }
    }

    /// Applies async results if the session still wants them
    async fn update<F>(&self, id: &str, apply: F)
    where
        F: FnOnce(&mut ChatSession) -> bool,
    {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            tracing::debug!(session_id = %id, "Session gone before work finished");
            return;
        };

        if apply(session) {
            self.persist(&sessions);
        } else {
            tracing::info!(session_id = %id, "Discarding stale chat result");
        }
    }

    fn persist(&self, sessions: &HashMap<String, ChatSession>) {
        if let Err(e) = self.storage.save(DRAFTS_KEY, sessions) {
            tracing::error!(error = %e, "Failed to persist chat drafts");
        }
    }
}

/// Drops the least recently updated drafts beyond [`MAX_DRAFTS`], never `keep`
fn evict_stale(sessions: &mut HashMap<String, ChatSession>, keep: Option<&str>) {
    while sessions.len() > MAX_DRAFTS {
        let oldest = sessions
            .values()
            .filter(|session| Some(session.id.as_str()) != keep)
            .min_by_key(|session| session.updated_at)
            .map(|session| session.id.clone());

        let Some(oldest) = oldest else {
            return;
        };
        sessions.remove(&oldest);
        tracing::debug!(session_id = %oldest, "Evicted stale chat draft");
    }
}
