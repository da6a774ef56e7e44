use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::queries;
use crate::services::analysis::{AnalysisProvider, ProviderRegistry};
use crate::services::notifier::Notifier;
use crate::services::scheduler::{DeferredJob, JobOutcome};

/// Drain every queued request, oldest capture first.
///
/// Per record: analyze, log the meal under the record's *original* capture
/// timestamp, delete the queue row, notify. The queue row is only removed
/// after the meal write, so a crash between the two statements can duplicate
/// a meal but never lose one (at-least-once). The first failing record aborts
/// the run: records behind it stay queued untouched for the next trigger.
pub async fn drain_offline_queue(
    db: &SqlitePool,
    provider: &dyn AnalysisProvider,
    notifier: &dyn Notifier,
) -> JobOutcome {
    let requests = match queries::pending_requests(db).await {
        Ok(requests) => requests,
        Err(e) => {
            tracing::error!(error = %e, "failed to read offline queue");
            return JobOutcome::Retry;
        }
    };

    if requests.is_empty() {
        return JobOutcome::Success;
    }

    tracing::info!(pending = requests.len(), "draining offline queue");

    for request in requests {
        let info = match provider.analyze(&request.image_base64).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    request_id = request.id,
                    error = %e,
                    "queued analysis failed; aborting drain for retry"
                );
                update_depth_gauge(db).await;
                return JobOutcome::Retry;
            }
        };

        let meal = match queries::insert_meal(db, &info, request.created_at_ms).await {
            Ok(meal) => meal,
            Err(e) => {
                tracing::error!(request_id = request.id, error = %e, "failed to log analyzed meal");
                update_depth_gauge(db).await;
                return JobOutcome::Retry;
            }
        };

        if let Err(e) = queries::delete_request(db, request.id).await {
            // The meal row is already committed; the next run may re-process
            // this record and duplicate it.
            tracing::error!(request_id = request.id, error = %e, "failed to remove drained request");
            update_depth_gauge(db).await;
            return JobOutcome::Retry;
        }

        metrics::counter!("offline_requests_drained_total").increment(1);
        tracing::info!(
            request_id = request.id,
            meal_id = meal.id,
            food = %meal.food_name,
            "queued request analyzed"
        );

        notifier.notify(&meal.food_name).await;
    }

    update_depth_gauge(db).await;
    JobOutcome::Success
}

async fn update_depth_gauge(db: &SqlitePool) {
    if let Ok(depth) = queries::queue_depth(db).await {
        metrics::gauge!("offline_queue_depth").set(depth as f64);
    }
}

/// The one deferred job this service schedules: drain the offline queue with
/// whichever analysis backend is currently selected.
pub struct OfflineAnalysisJob {
    db: SqlitePool,
    providers: Arc<ProviderRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl OfflineAnalysisJob {
    pub fn new(db: SqlitePool, providers: Arc<ProviderRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            providers,
            notifier,
        }
    }
}

#[async_trait]
impl DeferredJob for OfflineAnalysisJob {
    async fn run(&self) -> JobOutcome {
        let provider = self.providers.active();
        drain_offline_queue(&self.db, provider.as_ref(), self.notifier.as_ref()).await
    }
}
