use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::SystemTime};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle stage of a session. Ordered so monotonicity checks can compare
/// stages directly; regression is only allowed through an explicit host action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Row inserted, nobody joined yet.
    Created,
    /// At least one participant is waiting for the host to start.
    Lobby,
    /// Rounds are being played.
    Active,
    /// Host ended the game; terminal.
    Finished,
}

/// Video room state. The open variant carries its URL so the pair of
/// persisted columns (`video_room_created`, `video_room_url`) can never be
/// written half-set from this representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VideoRoom {
    /// No room exists for the session.
    Closed,
    /// A room is live at the given URL.
    Open {
        /// Join URL of the live room.
        url: String,
    },
}

/// Raised when the two persisted video room columns disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("video room columns disagree: created={created}, url_present={url_present}")]
pub struct VideoRoomColumnsError {
    /// Persisted `video_room_created` flag.
    pub created: bool,
    /// Whether a `video_room_url` value was present.
    pub url_present: bool,
}

impl VideoRoom {
    /// Rebuild the in-memory representation from the persisted column pair,
    /// rejecting the two half-set combinations as corrupt.
    pub fn from_columns(
        created: bool,
        url: Option<String>,
    ) -> Result<Self, VideoRoomColumnsError> {
        match (created, url) {
            (true, Some(url)) => Ok(VideoRoom::Open { url }),
            (false, None) => Ok(VideoRoom::Closed),
            (created, url) => Err(VideoRoomColumnsError {
                created,
                url_present: url.is_some(),
            }),
        }
    }

    /// Project back onto the persisted column pair.
    pub fn columns(&self) -> (bool, Option<&str>) {
        match self {
            VideoRoom::Closed => (false, None),
            VideoRoom::Open { url } => (true, Some(url)),
        }
    }

    /// True when a room is live.
    pub fn is_open(&self) -> bool {
        matches!(self, VideoRoom::Open { .. })
    }

    /// Join URL of the live room, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            VideoRoom::Closed => None,
            VideoRoom::Open { url } => Some(url),
        }
    }
}

/// A participant registered in a session roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntity {
    /// Verified identity of the participant.
    pub actor_id: Uuid,
    /// Display name chosen when joining.
    pub display_name: String,
    /// Answers submitted so far, keyed by round number.
    #[serde(default)]
    pub answers: BTreeMap<u32, u8>,
    /// When the participant joined.
    pub joined_at: SystemTime,
}

/// Root entity for one multiplayer quiz session. Rows are exclusively owned
/// by the store; in-process copies are caches, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Short human-enterable join code, immutable once assigned.
    pub code: String,
    /// Identity of the creating host, never reassigned.
    pub host_id: Uuid,
    /// Lifecycle stage.
    pub status: SessionStatus,
    /// Current round as an absolute number (0 before the first round).
    pub current_round: u32,
    /// Joined participants.
    pub participants: Vec<ParticipantEntity>,
    /// Video room state.
    pub video_room: VideoRoom,
    /// Optimistic concurrency version, incremented on every write.
    pub version: u64,
    /// Last write timestamp.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// Fresh session as inserted by the creation flow.
    pub fn new(code: String, host_id: Uuid) -> Self {
        Self {
            code,
            host_id,
            status: SessionStatus::Created,
            current_round: 0,
            participants: Vec::new(),
            video_room: VideoRoom::Closed,
            version: 1,
            updated_at: SystemTime::now(),
        }
    }
}

/// Partial update applied to a session row in a single store operation.
///
/// The video room pair travels as one [`VideoRoom`] value, so a patch can
/// never set `video_room_created` without the matching URL (or vice versa).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    /// New lifecycle stage, when it changes.
    pub status: Option<SessionStatus>,
    /// New absolute round number, when it changes.
    pub current_round: Option<u32>,
    /// New video room state, when it changes.
    pub video_room: Option<VideoRoom>,
    /// Replacement roster, when it changes.
    pub participants: Option<Vec<ParticipantEntity>>,
}

impl SessionPatch {
    /// True when the patch would not change anything and the write can be
    /// skipped entirely.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.current_round.is_none()
            && self.video_room.is_none()
            && self.participants.is_none()
    }

    /// Apply the patch to an entity, bumping its version. Used by in-memory
    /// stores and mirrored by the REST backend's PATCH body.
    pub fn apply_to(&self, session: &mut SessionEntity) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(round) = self.current_round {
            session.current_round = round;
        }
        if let Some(room) = &self.video_room {
            session.video_room = room.clone();
        }
        if let Some(roster) = &self.participants {
            session.participants = roster.clone();
        }
        session.version += 1;
        session.updated_at = SystemTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_room_round_trips_through_columns() {
        let open = VideoRoom::Open {
            url: "https://meet.example/abc".into(),
        };
        let (created, url) = open.columns();
        assert_eq!(
            VideoRoom::from_columns(created, url.map(str::to_string)),
            Ok(open)
        );

        let (created, url) = VideoRoom::Closed.columns();
        assert_eq!(
            VideoRoom::from_columns(created, url.map(str::to_string)),
            Ok(VideoRoom::Closed)
        );
    }

    #[test]
    fn half_set_columns_are_corrupt() {
        assert!(VideoRoom::from_columns(true, None).is_err());
        assert!(VideoRoom::from_columns(false, Some("https://x".into())).is_err());
    }

    #[test]
    fn status_ordering_follows_lifecycle() {
        assert!(SessionStatus::Created < SessionStatus::Lobby);
        assert!(SessionStatus::Lobby < SessionStatus::Active);
        assert!(SessionStatus::Active < SessionStatus::Finished);
    }

    #[test]
    fn patch_apply_bumps_version() {
        let mut session = SessionEntity::new("123ABC!".into(), Uuid::new_v4());
        let patch = SessionPatch {
            current_round: Some(2),
            status: Some(SessionStatus::Active),
            ..SessionPatch::default()
        };
        patch.apply_to(&mut session);
        assert_eq!(session.version, 2);
        assert_eq!(session.current_round, 2);
        assert_eq!(session.status, SessionStatus::Active);
    }
}
