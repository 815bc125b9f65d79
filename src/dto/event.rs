use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::validation::validate_session_code;

/// Closed set of session mutations. Adjacently tagged so the wire shape is
/// `{"kind": ..., "payload": ...}`, and each variant carries exactly the
/// fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum EventKind {
    /// Move the session to an absolute round number. Expressed as a target
    /// rather than a delta so client retries stay idempotent.
    #[serde(rename_all = "camelCase")]
    AdvanceRound {
        /// Absolute round to advance to.
        round: u32,
    },
    /// End the game and freeze the session.
    EndGame,
    /// Open the shared video room at the given URL.
    #[serde(rename_all = "camelCase")]
    OpenVideoRoom {
        /// Join URL of the room being opened.
        url: String,
    },
    /// Close the shared video room.
    CloseVideoRoom,
    /// Join the session roster.
    #[serde(rename_all = "camelCase")]
    Join {
        /// Name shown to other participants.
        display_name: String,
    },
    /// Submit an answer for a round.
    #[serde(rename_all = "camelCase")]
    Answer {
        /// Round the answer applies to.
        round: u32,
        /// Index of the chosen option.
        choice: u8,
    },
}

impl EventKind {
    /// Role table: which mutations only the session host may perform.
    /// Exhaustive by construction, so adding a kind forces a decision here.
    pub fn requires_host(&self) -> bool {
        match self {
            EventKind::AdvanceRound { .. }
            | EventKind::EndGame
            | EventKind::OpenVideoRoom { .. }
            | EventKind::CloseVideoRoom => true,
            EventKind::Join { .. } | EventKind::Answer { .. } => false,
        }
    }

    /// Wire name of the kind, for log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::AdvanceRound { .. } => "advanceRound",
            EventKind::EndGame => "endGame",
            EventKind::OpenVideoRoom { .. } => "openVideoRoom",
            EventKind::CloseVideoRoom => "closeVideoRoom",
            EventKind::Join { .. } => "join",
            EventKind::Answer { .. } => "answer",
        }
    }
}

/// Inbound game-event request: `{sessionId, kind, payload}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameEventRequest {
    /// Code of the session the event targets.
    pub session_id: String,
    /// The requested mutation.
    #[serde(flatten)]
    pub event: EventKind,
}

impl Validate for GameEventRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_session_code(&self.session_id) {
            errors.add("sessionId", e);
        }

        match &self.event {
            EventKind::OpenVideoRoom { url } => {
                if url.trim().is_empty() || !url.starts_with("https://") {
                    let mut err = ValidationError::new("video_room_url");
                    err.message = Some("video room url must be a non-empty https URL".into());
                    errors.add("payload", err);
                }
            }
            EventKind::Join { display_name } => {
                let trimmed = display_name.trim();
                if trimmed.is_empty() || trimmed.len() > 32 {
                    let mut err = ValidationError::new("display_name");
                    err.message =
                        Some("display name must be between 1 and 32 characters".into());
                    errors.add("payload", err);
                }
            }
            _ => {}
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Fixed body returned by the deprecated game-event channel.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeprecationNotice {
    /// Machine-readable deprecation code.
    pub code: &'static str,
    /// Human-readable explanation.
    pub message: &'static str,
    /// Pointer to the replacement endpoint.
    pub migration_guide: &'static str,
}

impl DeprecationNotice {
    /// Notice for the retired game-event channel.
    pub fn game_event() -> Self {
        Self {
            code: "endpoint_gone",
            message: "this endpoint has been retired and performs no processing",
            migration_guide: "POST /game-events",
        }
    }
}
