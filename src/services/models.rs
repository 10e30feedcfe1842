use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Difficulty tier shared by users and content, ordered from beginner (N5)
/// to advanced (N1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Level {
    #[default]
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::N5, Level::N4, Level::N3, Level::N2, Level::N1];

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::N5 => "N5",
            Level::N4 => "N4",
            Level::N3 => "N3",
            Level::N2 => "N2",
            Level::N1 => "N1",
        }
    }
}

impl FromStr for Level {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownVariant::new("level", value))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Translation,
    Question,
    Audio,
    Grammar,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Question,
        ExerciseKind::Translation,
        ExerciseKind::Grammar,
        ExerciseKind::Audio,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::Translation => "translation",
            ExerciseKind::Question => "question",
            ExerciseKind::Audio => "audio",
            ExerciseKind::Grammar => "grammar",
        }
    }

    /// How many submissions a user may make against one exercise of this kind
    /// before it stops being offered. Failed attempts count.
    pub const fn max_exposures(self) -> i64 {
        match self {
            ExerciseKind::Grammar => 2,
            _ => 1,
        }
    }
}

impl FromStr for ExerciseKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "translation" => Ok(Self::Translation),
            "question" => Ok(Self::Question),
            "audio" => Ok(Self::Audio),
            "grammar" => Ok(Self::Grammar),
            other => Err(UnknownVariant::new("exercise kind", other)),
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub japanese: String,
    pub translation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioContent {
    pub text: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarContent {
    pub grammar: String,
    pub meaning: String,
    pub structure: String,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ExerciseContent {
    Translation(SentencePair),
    Question(QuestionContent),
    Audio(AudioContent),
    Grammar(GrammarContent),
}

impl ExerciseContent {
    pub fn kind(&self) -> ExerciseKind {
        match self {
            ExerciseContent::Translation(_) => ExerciseKind::Translation,
            ExerciseContent::Question(_) => ExerciseKind::Question,
            ExerciseContent::Audio(_) => ExerciseKind::Audio,
            ExerciseContent::Grammar(_) => ExerciseKind::Grammar,
        }
    }

    /// Rebuilds the variant from the `type` column and the stored payload.
    pub fn from_stored(kind: ExerciseKind, payload: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            ExerciseKind::Translation => ExerciseContent::Translation(serde_json::from_str(payload)?),
            ExerciseKind::Question => ExerciseContent::Question(serde_json::from_str(payload)?),
            ExerciseKind::Audio => ExerciseContent::Audio(serde_json::from_str(payload)?),
            ExerciseKind::Grammar => ExerciseContent::Grammar(serde_json::from_str(payload)?),
        })
    }

    /// Payload only; the kind lives in its own column.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        match self {
            ExerciseContent::Translation(c) => serde_json::to_string(c),
            ExerciseContent::Question(c) => serde_json::to_string(c),
            ExerciseContent::Audio(c) => serde_json::to_string(c),
            ExerciseContent::Grammar(c) => serde_json::to_string(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: i64,
    pub level: Level,
    #[serde(flatten)]
    pub content: ExerciseContent,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    pub fn kind(&self) -> ExerciseKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceFragment {
    pub fragment: String,
    #[serde(default)]
    pub furigana: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordExample {
    pub sentence: Vec<SentenceFragment>,
    pub translation: String,
}

impl WordExample {
    /// `漢字(かんじ)` style rendering of the annotated sentence.
    pub fn annotated(&self) -> String {
        self.sentence
            .iter()
            .map(|part| match &part.furigana {
                Some(reading) => format!("{}({})", part.fragment, reading),
                None => part.fragment.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: i64,
    pub kanji: Option<String>,
    pub kana: String,
    pub translation: String,
    pub examples: Vec<WordExample>,
    pub level: Level,
    pub audio_url: String,
    pub created_at: DateTime<Utc>,
}

impl Word {
    pub fn display_form(&self) -> &str {
        self.kanji
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(&self.kana)
    }
}

/// Content as handed to the importer; ids and timestamps are assigned on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExercise {
    pub level: Level,
    #[serde(flatten)]
    pub content: ExerciseContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWord {
    pub kanji: Option<String>,
    pub kana: String,
    pub translation: String,
    #[serde(default)]
    pub examples: Vec<WordExample>,
    pub level: Level,
    #[serde(default)]
    pub audio_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Exercise,
    Vocab,
}

impl SessionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionMode::Exercise => "exercise",
            SessionMode::Vocab => "vocab",
        }
    }
}

impl FromStr for SessionMode {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exercise" => Ok(Self::Exercise),
            "vocab" => Ok(Self::Vocab),
            other => Err(UnknownVariant::new("session mode", other)),
        }
    }
}

/// The single outstanding item a user owes an answer for, if any.
///
/// Storage keeps two nullable pointers plus a mode flag; only the pointer the
/// mode selects is meaningful, the other one is ignored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle { mode: SessionMode },
    #[serde(rename_all = "camelCase")]
    AwaitingExercise { exercise_id: i64 },
    #[serde(rename_all = "camelCase")]
    AwaitingWord { word_id: i64 },
}

impl SessionState {
    pub fn from_columns(mode: SessionMode, exercise_id: Option<i64>, word_id: Option<i64>) -> Self {
        match (mode, exercise_id, word_id) {
            (SessionMode::Exercise, Some(exercise_id), _) => SessionState::AwaitingExercise { exercise_id },
            (SessionMode::Vocab, _, Some(word_id)) => SessionState::AwaitingWord { word_id },
            (mode, _, _) => SessionState::Idle { mode },
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self {
            SessionState::Idle { mode } => *mode,
            SessionState::AwaitingExercise { .. } => SessionMode::Exercise,
            SessionState::AwaitingWord { .. } => SessionMode::Vocab,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        !matches!(self, SessionState::Idle { .. })
    }

    pub fn outstanding_exercise(&self) -> Option<i64> {
        match self {
            SessionState::AwaitingExercise { exercise_id } => Some(*exercise_id),
            _ => None,
        }
    }

    pub fn outstanding_word(&self) -> Option<i64> {
        match self {
            SessionState::AwaitingWord { word_id } => Some(*word_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "userId")]
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub level: Level,
    pub points: f64,
    pub exercises_done: i64,
    pub session: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_beginner_first() {
        assert!(Level::N5 < Level::N4);
        assert!(Level::N2 < Level::N1);
        assert_eq!("n3".parse::<Level>().unwrap(), Level::N3);
        assert!("N6".parse::<Level>().is_err());
    }

    #[test]
    fn inert_pointer_is_ignored_by_mode() {
        let state = SessionState::from_columns(SessionMode::Vocab, Some(7), None);
        assert_eq!(state, SessionState::Idle { mode: SessionMode::Vocab });

        let state = SessionState::from_columns(SessionMode::Exercise, Some(7), Some(9));
        assert_eq!(state, SessionState::AwaitingExercise { exercise_id: 7 });

        let state = SessionState::from_columns(SessionMode::Vocab, Some(7), Some(9));
        assert_eq!(state.outstanding_word(), Some(9));
        assert_eq!(state.outstanding_exercise(), None);
    }

    #[test]
    fn content_payload_is_stored_without_tag() {
        let content = ExerciseContent::Grammar(GrammarContent {
            grammar: "〜てもいい".into(),
            meaning: "may".into(),
            structure: "V-て + もいい".into(),
            example: "食べてもいい".into(),
        });
        let stored = content.to_stored().unwrap();
        assert!(!stored.contains("\"type\""));
        let back = ExerciseContent::from_stored(ExerciseKind::Grammar, &stored).unwrap();
        assert_eq!(back, content);
        assert!(ExerciseContent::from_stored(ExerciseKind::Audio, &stored).is_err());
    }

    #[test]
    fn word_falls_back_to_kana() {
        let mut word = Word {
            id: 1,
            kanji: None,
            kana: "たべる".into(),
            translation: "to eat".into(),
            examples: vec![WordExample {
                sentence: vec![
                    SentenceFragment {
                        fragment: "食".into(),
                        furigana: Some("た".into()),
                    },
                    SentenceFragment {
                        fragment: "べる".into(),
                        furigana: None,
                    },
                ],
                translation: "eat".into(),
            }],
            level: Level::N5,
            audio_url: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(word.display_form(), "たべる");
        word.kanji = Some("食べる".into());
        assert_eq!(word.display_form(), "食べる");
        assert_eq!(word.examples[0].annotated(), "食(た)べる");
    }
}
