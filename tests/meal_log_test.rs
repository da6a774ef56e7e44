//! Meal-log queries and queue-table invariants.

mod helpers;

use helpers::{food, memory_pool};

use calosnap::db::queries;
use calosnap::models::meal::{DailyCalories, NutrientTotals};

const DAY1_NOON: i64 = 1_699_963_200_000; // 2023-11-14T12:00:00Z
const DAY2_NOON: i64 = DAY1_NOON + 86_400_000;
const DAY3_NOON: i64 = DAY2_NOON + 86_400_000;

#[tokio::test]
async fn meal_log_lists_newest_first() {
    let pool = memory_pool().await;
    queries::insert_meal(&pool, &food("breakfast", 300, 40.0, 10.0, 8.0), DAY1_NOON)
        .await
        .unwrap();
    queries::insert_meal(&pool, &food("dinner", 700, 60.0, 30.0, 25.0), DAY2_NOON)
        .await
        .unwrap();
    queries::insert_meal(&pool, &food("lunch", 500, 55.0, 20.0, 15.0), DAY1_NOON + 14_400_000)
        .await
        .unwrap();

    let meals = queries::list_meals(&pool).await.unwrap();
    let names: Vec<_> = meals.iter().map(|m| m.food_name.as_str()).collect();
    assert_eq!(names, vec!["dinner", "lunch", "breakfast"]);
    assert_eq!(meals[2].day, "2023-11-14");
}

#[tokio::test]
async fn day_totals_sum_only_that_day() {
    let pool = memory_pool().await;
    queries::insert_meal(&pool, &food("breakfast", 300, 40.0, 10.0, 8.0), DAY1_NOON)
        .await
        .unwrap();
    queries::insert_meal(&pool, &food("lunch", 500, 55.5, 20.0, 15.0), DAY1_NOON + 3_600_000)
        .await
        .unwrap();
    queries::insert_meal(&pool, &food("next-day", 999, 1.0, 2.0, 3.0), DAY2_NOON)
        .await
        .unwrap();

    let totals = queries::day_totals(&pool, "2023-11-14").await.unwrap();
    assert_eq!(
        totals,
        NutrientTotals {
            calories: 800,
            carbs: 95.5,
            protein: 30.0,
            fat: 23.0,
        }
    );

    // A day with no meals sums to zero rather than erroring.
    let empty = queries::day_totals(&pool, "2020-01-01").await.unwrap();
    assert_eq!(empty, NutrientTotals::default());
}

#[tokio::test]
async fn recent_daily_calories_groups_by_day_newest_first() {
    let pool = memory_pool().await;
    for (ts, calories) in [
        (DAY1_NOON, 300),
        (DAY1_NOON + 3_600_000, 200),
        (DAY2_NOON, 700),
        (DAY3_NOON, 450),
    ] {
        queries::insert_meal(&pool, &food("meal", calories, 0.0, 0.0, 0.0), ts)
            .await
            .unwrap();
    }

    let daily = queries::recent_daily_calories(&pool, 7).await.unwrap();
    assert_eq!(
        daily,
        vec![
            DailyCalories {
                day: "2023-11-16".to_string(),
                total_calories: 450,
            },
            DailyCalories {
                day: "2023-11-15".to_string(),
                total_calories: 700,
            },
            DailyCalories {
                day: "2023-11-14".to_string(),
                total_calories: 500,
            },
        ]
    );

    // The limit caps how far back the summary reaches.
    let capped = queries::recent_daily_calories(&pool, 2).await.unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[0].day, "2023-11-16");
}

#[tokio::test]
async fn queued_request_ids_increase_with_insertion_order() {
    let pool = memory_pool().await;
    // Capture timestamps arrive out of order; ids must still be monotonic.
    let a = queries::enqueue_request(&pool, "a", 3_000).await.unwrap();
    let b = queries::enqueue_request(&pool, "b", 1_000).await.unwrap();
    let c = queries::enqueue_request(&pool, "c", 2_000).await.unwrap();
    assert!(a.id < b.id && b.id < c.id);

    // Draining order follows capture time, not insertion.
    let pending = queries::pending_requests(&pool).await.unwrap();
    let payloads: Vec<_> = pending.iter().map(|r| r.image_base64.as_str()).collect();
    assert_eq!(payloads, vec!["b", "c", "a"]);

    queries::delete_request(&pool, b.id).await.unwrap();
    assert_eq!(queries::queue_depth(&pool).await.unwrap(), 2);
}
