use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::runtime::Error;
use crate::snapshot::{ImageEncoding, Snapshot, SnapshotFormat};

/// Coarse phase of a run, derived from the page's `started`/`dead` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    NotStarted,
    Playing,
    Over,
}

impl GameStatus {
    /// `dead` wins over `started`: a bird can die on the start screen.
    pub fn from_flags(started: bool, dead: bool) -> Self {
        match (started, dead) {
            (false, false) => GameStatus::NotStarted,
            (true, false) => GameStatus::Playing,
            (_, true) => GameStatus::Over,
        }
    }

    /// Whether `next` may follow `self` without an intervening restart.
    pub fn can_advance_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (NotStarted, _) | (Playing, Playing) | (Playing, Over) | (Over, Over)
        )
    }

    pub fn code(self) -> u8 {
        match self {
            GameStatus::NotStarted => 0,
            GameStatus::Playing => 1,
            GameStatus::Over => 2,
        }
    }
}

/// Stage bounds as reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One answer to the composite state query.
#[derive(Debug, Clone)]
pub struct GameState {
    pub session_id: Uuid,
    pub sequence_id: u64,
    pub score: u32,
    pub hi_score: u32,
    pub status: GameStatus,
    pub snapshot: Option<Snapshot>,
    pub timestamp: SystemTime,
    pub viewport: Viewport,
    pub vertical_position: Option<f64>,
}

impl GameState {
    pub fn is_over(&self) -> bool {
        self.status == GameStatus::Over
    }
}

/// What the composite state query should capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateQuery {
    pub snapshot: Option<SnapshotFormat>,
    pub encoding: ImageEncoding,
    /// 1-100, forwarded to the page's JPEG encoder.
    pub quality: u8,
}

impl StateQuery {
    pub fn without_snapshot() -> Self {
        Self {
            snapshot: None,
            ..Self::default()
        }
    }

    pub fn with_snapshot(format: SnapshotFormat) -> Self {
        Self {
            snapshot: Some(format),
            ..Self::default()
        }
    }

    /// Builds a query from a format name; unknown names fail here, before
    /// anything is sent to the page.
    pub fn named(format: Option<&str>) -> Result<Self, Error> {
        match format {
            Some(name) => Ok(Self::with_snapshot(name.parse()?)),
            None => Ok(Self::without_snapshot()),
        }
    }
}

impl Default for StateQuery {
    fn default() -> Self {
        Self {
            snapshot: Some(SnapshotFormat::PixelArray),
            encoding: ImageEncoding::Jpeg,
            quality: 30,
        }
    }
}

/// The page's reply to the state script, before decoding.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawState {
    pub dimensions: Viewport,
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub hiscore: Value,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub vertical_position: Option<f64>,
    #[serde(default)]
    pub snapshot: Option<String>,
}

/// Reads the page's score text. Null or empty text counts as zero.
pub(crate) fn parse_score(value: &Value) -> Result<u32, Error> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::RemoteEvaluation(format!("score out of range: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::RemoteEvaluation(format!("score is not a number: {s:?}"))),
        other => Err(Error::RemoteEvaluation(format!("unexpected score value: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_is_derived_from_flags() {
        assert_eq!(GameStatus::from_flags(false, false), GameStatus::NotStarted);
        assert_eq!(GameStatus::from_flags(true, false), GameStatus::Playing);
        assert_eq!(GameStatus::from_flags(true, true), GameStatus::Over);
        assert_eq!(GameStatus::from_flags(false, true), GameStatus::Over);
    }

    #[test]
    fn over_never_advances_to_playing() {
        assert!(!GameStatus::Over.can_advance_to(GameStatus::Playing));
        assert!(!GameStatus::Over.can_advance_to(GameStatus::NotStarted));
        assert!(!GameStatus::Playing.can_advance_to(GameStatus::NotStarted));
        assert!(GameStatus::NotStarted.can_advance_to(GameStatus::Over));
        assert!(GameStatus::Playing.can_advance_to(GameStatus::Over));
    }

    #[test]
    fn score_text_parsing() {
        assert_eq!(parse_score(&json!(null)).unwrap(), 0);
        assert_eq!(parse_score(&json!("")).unwrap(), 0);
        assert_eq!(parse_score(&json!(" 12 ")).unwrap(), 12);
        assert_eq!(parse_score(&json!(3)).unwrap(), 3);
        assert!(parse_score(&json!("twelve")).is_err());
        assert!(parse_score(&json!(-1)).is_err());
    }

    #[test]
    fn named_query_rejects_unknown_formats() {
        assert!(matches!(StateQuery::named(Some("ascii")), Err(Error::UnsupportedFormat(_))));
        assert_eq!(StateQuery::named(None).unwrap().snapshot, None);
        assert_eq!(
            StateQuery::named(Some("bytes")).unwrap().snapshot,
            Some(SnapshotFormat::RawBytes)
        );
    }

    #[test]
    fn raw_state_tolerates_missing_fields() {
        let raw: RawState = serde_json::from_value(json!({
            "dimensions": {"x": 0, "y": 0, "width": 120, "height": 160},
            "score": "4",
            "started": true,
        }))
        .unwrap();
        assert!(!raw.dead);
        assert_eq!(raw.vertical_position, None);
        assert_eq!(parse_score(&raw.score).unwrap(), 4);
        assert_eq!(raw.dimensions.width, 120.0);
    }
}
