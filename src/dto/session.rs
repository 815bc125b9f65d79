use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, SessionEntity, SessionStatus},
    dto::format_system_time,
};

/// Public projection of a session row returned by the REST endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Join code identifying the session.
    pub id: String,
    /// Identity of the controlling host.
    pub host_id: Uuid,
    /// Lifecycle stage.
    pub status: SessionStatus,
    /// Current absolute round number.
    pub current_round: u32,
    /// Whether the shared video room is live.
    pub video_room_created: bool,
    /// Join URL of the video room; present exactly when the room is live.
    pub video_room_url: Option<String>,
    /// Joined participants.
    pub participants: Vec<ParticipantSummary>,
    /// RFC 3339 timestamp of the last write.
    pub updated_at: String,
}

/// Roster entry inside a [`SessionSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Verified identity of the participant.
    pub actor_id: Uuid,
    /// Display name chosen when joining.
    pub display_name: String,
    /// Rounds the participant has answered.
    pub answered_rounds: Vec<u32>,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(entity: ParticipantEntity) -> Self {
        Self {
            actor_id: entity.actor_id,
            display_name: entity.display_name,
            answered_rounds: entity.answers.keys().copied().collect(),
        }
    }
}

impl From<SessionEntity> for SessionSummary {
    fn from(entity: SessionEntity) -> Self {
        let (video_room_created, video_room_url) = entity.video_room.columns();
        let video_room_url = video_room_url.map(str::to_string);
        Self {
            id: entity.code,
            host_id: entity.host_id,
            status: entity.status,
            current_round: entity.current_round,
            video_room_created,
            video_room_url,
            participants: entity
                .participants
                .into_iter()
                .map(ParticipantSummary::from)
                .collect(),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}
