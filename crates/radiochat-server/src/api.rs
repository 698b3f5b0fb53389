//! Informational endpoints about the external audio/video stream.

use axum::Json;
use axum::extract::State;
use radiochat_settings::StreamSettings;
use serde::Serialize;

use crate::server::AppState;

/// `GET /api/v1/radio` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioInfo {
    /// HLS video URL.
    pub video_url: String,
    /// Icecast host.
    pub audio_url: String,
    /// Icecast mount point.
    pub audio_mount_point: String,
    /// Broadcast start time.
    pub start_time: String,
}

impl From<&StreamSettings> for RadioInfo {
    fn from(stream: &StreamSettings) -> Self {
        Self {
            video_url: stream.video_url.clone(),
            audio_url: stream.audio_url.clone(),
            audio_mount_point: stream.audio_mount_point.clone(),
            start_time: stream.start_time.clone(),
        }
    }
}

/// `GET /api/v1/radio`
pub async fn radio_handler(State(state): State<AppState>) -> Json<RadioInfo> {
    Json(RadioInfo::from(state.stream.as_ref()))
}

/// `GET /api/v1/token`: the public stream token as a JSON string.
pub async fn token_handler(State(state): State<AppState>) -> Json<String> {
    Json(state.stream.public_token.clone())
}
