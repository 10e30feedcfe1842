#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::FixedOffset;
use futures::future::BoxFuture;
use tempfile::TempDir;
use tokio::sync::Notify;

use renshu_backend_rust::db::config::DbConfig;
use renshu_backend_rust::db::operations::content;
use renshu_backend_rust::db::DatabaseProxy;
use renshu_backend_rust::services::grading::{GradeReport, Grader, GradingError, GradingItem};
use renshu_backend_rust::services::models::{
    ExerciseContent, GrammarContent, Level, NewExercise, NewWord, QuestionContent, SentencePair,
};
use renshu_backend_rust::state::AppState;

/// Temporary database that lives as long as the value.
pub struct TestDb {
    _dir: TempDir,
    pub proxy: Arc<DatabaseProxy>,
}

pub async fn create_test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let proxy = DatabaseProxy::connect(DbConfig::at_path(dir.path().join("renshu-test.db")))
        .await
        .unwrap();
    TestDb {
        _dir: dir,
        proxy: Arc::new(proxy),
    }
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// Deterministic stand-in for the LLM: "right" scores 90, anything else 40.
pub struct KeywordGrader;

impl Grader for KeywordGrader {
    fn score<'a>(&'a self, _item: &'a GradingItem, input: &'a str) -> BoxFuture<'a, Result<GradeReport, GradingError>> {
        let score = if input.trim() == "right" { 90 } else { 40 };
        Box::pin(async move {
            Ok(GradeReport {
                score,
                comment: format!("scored {score}"),
                suggestion: "正しい答え".to_string(),
            })
        })
    }
}

/// Grades "right" at once. Any other answer announces itself on `entered`
/// and is held until `release` fires, then scores 40.
#[derive(Default)]
pub struct GatedGrader {
    pub entered: Notify,
    pub release: Notify,
}

impl Grader for GatedGrader {
    fn score<'a>(&'a self, _item: &'a GradingItem, input: &'a str) -> BoxFuture<'a, Result<GradeReport, GradingError>> {
        Box::pin(async move {
            let score = if input.trim() == "right" {
                90
            } else {
                self.entered.notify_one();
                self.release.notified().await;
                40
            };
            Ok(GradeReport {
                score,
                comment: format!("scored {score}"),
                suggestion: String::new(),
            })
        })
    }
}

pub fn create_test_app(db: &TestDb) -> Router {
    let state = AppState::new(Arc::clone(&db.proxy), Arc::new(KeywordGrader), utc());
    renshu_backend_rust::create_app(state)
}

pub async fn seed_question(proxy: &DatabaseProxy, level: Level, question: &str) -> i64 {
    let content = ExerciseContent::Question(QuestionContent {
        question: question.to_string(),
    });
    insert_exercise(proxy, level, content).await
}

pub async fn seed_translation(proxy: &DatabaseProxy, level: Level) -> i64 {
    let content = ExerciseContent::Translation(SentencePair {
        japanese: "猫が好きです".to_string(),
        translation: "I like cats".to_string(),
    });
    insert_exercise(proxy, level, content).await
}

pub async fn seed_grammar(proxy: &DatabaseProxy, level: Level) -> i64 {
    let content = ExerciseContent::Grammar(GrammarContent {
        grammar: "〜たい".to_string(),
        meaning: "want to".to_string(),
        structure: "V-stem + たい".to_string(),
        example: "日本に行きたい".to_string(),
    });
    insert_exercise(proxy, level, content).await
}

async fn insert_exercise(proxy: &DatabaseProxy, level: Level, content: ExerciseContent) -> i64 {
    let ids = content::insert_exercises(proxy, &[NewExercise { level, content }])
        .await
        .unwrap();
    ids[0]
}

pub async fn seed_word(proxy: &DatabaseProxy, level: Level, kanji: Option<&str>, kana: &str, translation: &str) -> i64 {
    let ids = content::insert_words(
        proxy,
        &[NewWord {
            kanji: kanji.map(str::to_string),
            kana: kana.to_string(),
            translation: translation.to_string(),
            examples: vec![],
            level,
            audio_url: String::new(),
        }],
    )
    .await
    .unwrap();
    ids[0]
}
