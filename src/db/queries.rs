use sqlx::{Row, SqlitePool};

use crate::models::analysis::FoodInfo;
use crate::models::meal::{day_label, DailyCalories, MealRecord, NutrientTotals};
use crate::models::queue::QueuedRequest;

/// Insert a meal-log entry. The calendar-day label is derived from
/// `eaten_at_ms`, so queue-originated meals land under their capture day.
pub async fn insert_meal(
    pool: &SqlitePool,
    info: &FoodInfo,
    eaten_at_ms: i64,
) -> Result<MealRecord, sqlx::Error> {
    let day = day_label(eaten_at_ms);

    let row = sqlx::query(
        r#"
        INSERT INTO meals (food_name, calories, protein, carbs, fat, day, eaten_at_ms)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&info.food_name)
    .bind(info.calories)
    .bind(info.protein)
    .bind(info.carbs)
    .bind(info.fat)
    .bind(&day)
    .bind(eaten_at_ms)
    .fetch_one(pool)
    .await?;

    Ok(MealRecord {
        id: row.try_get("id")?,
        food_name: info.food_name.clone(),
        calories: info.calories,
        protein: info.protein,
        carbs: info.carbs,
        fat: info.fat,
        day,
        eaten_at_ms,
    })
}

/// All logged meals, newest first.
pub async fn list_meals(pool: &SqlitePool) -> Result<Vec<MealRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, food_name, calories, protein, carbs, fat, day, eaten_at_ms
        FROM meals
        ORDER BY eaten_at_ms DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(MealRecord {
                id: r.try_get("id")?,
                food_name: r.try_get("food_name")?,
                calories: r.try_get("calories")?,
                protein: r.try_get("protein")?,
                carbs: r.try_get("carbs")?,
                fat: r.try_get("fat")?,
                day: r.try_get("day")?,
                eaten_at_ms: r.try_get("eaten_at_ms")?,
            })
        })
        .collect()
}

/// Macro-nutrient totals for one day label.
pub async fn day_totals(pool: &SqlitePool, day: &str) -> Result<NutrientTotals, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(calories), 0)  AS calories,
               COALESCE(SUM(carbs), 0.0)   AS carbs,
               COALESCE(SUM(protein), 0.0) AS protein,
               COALESCE(SUM(fat), 0.0)     AS fat
        FROM meals
        WHERE day = $1
        "#,
    )
    .bind(day)
    .fetch_one(pool)
    .await?;

    Ok(NutrientTotals {
        calories: row.try_get("calories")?,
        carbs: row.try_get("carbs")?,
        protein: row.try_get("protein")?,
        fat: row.try_get("fat")?,
    })
}

/// Per-day calorie totals for the most recent day labels that have meals.
pub async fn recent_daily_calories(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<DailyCalories>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT day, SUM(calories) AS total_calories
        FROM meals
        GROUP BY day
        ORDER BY day DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(DailyCalories {
                day: r.try_get("day")?,
                total_calories: r.try_get("total_calories")?,
            })
        })
        .collect()
}

/// Append one offline analysis request.
pub async fn enqueue_request(
    pool: &SqlitePool,
    image_base64: &str,
    created_at_ms: i64,
) -> Result<QueuedRequest, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO offline_requests (image_base64, created_at_ms)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(image_base64)
    .bind(created_at_ms)
    .fetch_one(pool)
    .await?;

    Ok(QueuedRequest {
        id: row.try_get("id")?,
        image_base64: image_base64.to_string(),
        created_at_ms,
    })
}

/// The full queue, oldest capture first. Ties on the timestamp fall back to
/// insertion order.
pub async fn pending_requests(pool: &SqlitePool) -> Result<Vec<QueuedRequest>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, image_base64, created_at_ms
        FROM offline_requests
        ORDER BY created_at_ms ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(QueuedRequest {
                id: r.try_get("id")?,
                image_base64: r.try_get("image_base64")?,
                created_at_ms: r.try_get("created_at_ms")?,
            })
        })
        .collect()
}

/// Remove one drained request by id.
pub async fn delete_request(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM offline_requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Number of requests still waiting for connectivity.
pub async fn queue_depth(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS depth FROM offline_requests")
        .fetch_one(pool)
        .await?;
    row.try_get("depth")
}
