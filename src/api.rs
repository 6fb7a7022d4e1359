// src/api.rs
//
// Transport-agnostic JSON shapes for the identification service. A
// service layer (HTTP or otherwise) binds these to routes; the CLI's
// --json mode prints them directly.

use serde::{Deserialize, Serialize};

use crate::index::TrackMetadata;
use crate::matcher::Match;

/// Response to an identification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub matches: Vec<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IdentifyResponse {
    pub fn ok(matches: Vec<Match>) -> Self {
        Self {
            matches,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Response to a track ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddTrackResponse {
    pub fn ok(track_id: String) -> Self {
        Self {
            track_id: Some(track_id),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            track_id: None,
            error: Some(message.into()),
        }
    }
}

/// Response to a catalog listing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTracksResponse {
    pub tracks: Vec<TrackMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ListTracksResponse {
    pub fn ok(tracks: Vec<TrackMetadata>) -> Self {
        Self {
            tracks,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_response_round_trip() {
        let response = IdentifyResponse::ok(vec![Match {
            track_id: "t1".to_string(),
            confidence: 0.87,
            time_offset_s: 12.3,
            query_time_s: 0.5,
            matched_vectors: 42,
        }]);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("error"));

        let back: IdentifyResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.matches.len(), 1);
        assert_eq!(back.matches[0].track_id, "t1");
        assert_eq!(back.matches[0].matched_vectors, 42);
    }

    #[test]
    fn test_error_responses_serialize_error_field() {
        let json = serde_json::to_string(&AddTrackResponse::err("bad audio")).unwrap();
        assert!(json.contains("bad audio"));
        assert!(!json.contains("track_id"));

        let json = serde_json::to_string(&IdentifyResponse::err("decode failed")).unwrap();
        assert!(json.contains("decode failed"));
    }
}
