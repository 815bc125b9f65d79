use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::dao::{
    models::{ParticipantEntity, SessionEntity, SessionPatch, SessionStatus, VideoRoom},
    storage::{StorageError, StorageResult},
};

use super::error::RestDaoError;

/// Wire representation of one session row. The video room travels as the two
/// persisted columns; decoding rejects half-set pairs as corrupt.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRow {
    pub code: String,
    pub host_id: Uuid,
    pub status: SessionStatus,
    pub current_round: u32,
    #[serde(default)]
    pub participants: Vec<ParticipantEntity>,
    pub video_room_created: bool,
    pub video_room_url: Option<String>,
    pub version: u64,
    pub updated_at: String,
}

impl SessionRow {
    pub fn from_entity(entity: SessionEntity) -> Self {
        let (video_room_created, video_room_url) = entity.video_room.columns();
        let video_room_url = video_room_url.map(str::to_string);
        Self {
            code: entity.code,
            host_id: entity.host_id,
            status: entity.status,
            current_round: entity.current_round,
            participants: entity.participants,
            video_room_created,
            video_room_url,
            version: entity.version,
            updated_at: format_timestamp(entity.updated_at),
        }
    }

    pub fn into_entity(self) -> StorageResult<SessionEntity> {
        let video_room = VideoRoom::from_columns(self.video_room_created, self.video_room_url)
            .map_err(|err| StorageError::Corrupt {
                code: self.code.clone(),
                detail: err.to_string(),
            })?;
        let updated_at = parse_timestamp(&self.updated_at, &self.code)?;

        Ok(SessionEntity {
            code: self.code,
            host_id: self.host_id,
            status: self.status,
            current_round: self.current_round,
            participants: self.participants,
            video_room,
            version: self.version,
            updated_at,
        })
    }
}

/// Row projection used when only the concurrency version is needed.
#[derive(Debug, Deserialize)]
pub struct VersionRow {
    pub version: u64,
}

/// PATCH body mirroring [`SessionPatch`]. The `video_room_url` field uses a
/// nested option so a closed room writes an explicit SQL NULL rather than
/// omitting the column.
#[derive(Debug, Serialize)]
pub struct PatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_room_created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_room_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<ParticipantEntity>>,
    pub version: u64,
    pub updated_at: String,
}

impl PatchBody {
    pub fn new(patch: SessionPatch, next_version: u64) -> Self {
        let (video_room_created, video_room_url) = match patch.video_room {
            Some(room) => {
                let (created, url) = room.columns();
                (Some(created), Some(url.map(str::to_string)))
            }
            None => (None, None),
        };

        Self {
            status: patch.status,
            current_round: patch.current_round,
            video_room_created,
            video_room_url,
            participants: patch.participants,
            version: next_version,
            updated_at: format_timestamp(SystemTime::now()),
        }
    }
}

fn format_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

fn parse_timestamp(value: &str, code: &str) -> StorageResult<SystemTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|source| {
            RestDaoError::InvalidTimestamp {
                path: code.to_string(),
                source,
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn half_set_row_decodes_as_corrupt() {
        let row = SessionRow {
            code: "123ABC!".into(),
            host_id: Uuid::new_v4(),
            status: SessionStatus::Lobby,
            current_round: 0,
            participants: Vec::new(),
            video_room_created: true,
            video_room_url: None,
            version: 3,
            updated_at: "2026-08-30T10:00:00Z".into(),
        };
        match row.into_entity() {
            Err(StorageError::Corrupt { code, .. }) => assert_eq!(code, "123ABC!"),
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn patch_body_couples_video_room_columns() {
        let body = PatchBody::new(
            SessionPatch {
                video_room: Some(VideoRoom::Open {
                    url: "https://meet.example/r".into(),
                }),
                ..SessionPatch::default()
            },
            4,
        );
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["video_room_created"], json!(true));
        assert_eq!(value["video_room_url"], json!("https://meet.example/r"));

        let body = PatchBody::new(
            SessionPatch {
                video_room: Some(VideoRoom::Closed),
                ..SessionPatch::default()
            },
            5,
        );
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["video_room_created"], json!(false));
        // explicit null, not an omitted column
        assert!(value.as_object().expect("object").contains_key("video_room_url"));
        assert_eq!(value["video_room_url"], json!(null));
    }

    #[test]
    fn patch_body_omits_untouched_columns() {
        let body = PatchBody::new(
            SessionPatch {
                current_round: Some(2),
                ..SessionPatch::default()
            },
            2,
        );
        let value = serde_json::to_value(&body).expect("serialize");
        let object = value.as_object().expect("object");
        assert!(!object.contains_key("video_room_created"));
        assert!(!object.contains_key("video_room_url"));
        assert!(!object.contains_key("status"));
        assert_eq!(value["current_round"], json!(2));
    }
}
