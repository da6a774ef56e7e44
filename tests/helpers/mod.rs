//! Shared fakes and fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use calosnap::db;
use calosnap::models::analysis::FoodInfo;
use calosnap::services::analysis::{AnalysisError, AnalysisProvider};
use calosnap::services::notifier::Notifier;

/// Fresh in-memory database with the real migrations applied. One connection,
/// since every pooled connection would otherwise get its own `:memory:` store.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    pool
}

pub fn food(name: &str, calories: i64, carbs: f64, protein: f64, fat: f64) -> FoodInfo {
    FoodInfo {
        food_name: name.to_string(),
        calories,
        carbs,
        protein,
        fat,
    }
}

/// Analysis stub that replays a script of results and records every payload
/// it was asked to analyze, in call order.
pub struct ScriptedProvider {
    calls: Mutex<Vec<String>>,
    results: Mutex<VecDeque<Result<FoodInfo, String>>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<FoodInfo, String>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(results.into()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn analyze(&self, image_base64: &str) -> Result<FoodInfo, AnalysisError> {
        self.calls.lock().unwrap().push(image_base64.to_string());
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(info)) => Ok(info),
            Some(Err(message)) => Err(AnalysisError::Provider(message)),
            None => Err(AnalysisError::EmptyResponse),
        }
    }

    async fn recommend(&self, _prompt: &str) -> Result<String, AnalysisError> {
        Ok("eat your greens".to_string())
    }
}

/// Notifier stub that records the food names it was asked to announce.
#[derive(Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notified(&self) -> Vec<String> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, food_name: &str) {
        self.notified.lock().unwrap().push(food_name.to_string());
    }
}
