// src/handlers/recipes.rs

//! Pass-through endpoints under `/api/recipes`.
//!
//! Each handler maps its query onto the upstream endpoint, lets the key
//! manager attach a key and retry, and relays the upstream JSON.

use super::{relay, system::api_status, ApiResponse};
use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

type Params = Vec<(&'static str, String)>;

pub fn recipe_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/test", get(test_api))
        .route("/api-status", get(api_status))
        .route("/search", get(find_recipes))
        .route("/random", get(random_recipes))
        .route("/find-by-ingredients", get(find_by_ingredients))
        .route("/videos", get(search_food_videos))
        .route("/meal-plan/generate", get(generate_meal_plan))
        .route("/wine/pairing", get(wine_pairing))
        .route("/analyze-nutrition", post(analyze_nutrition))
        .route("/:id", get(recipe_information))
        .route("/:id/similar", get(similar_recipes))
        .route("/:id/nutrition", get(recipe_nutrition))
        .route("/:id/price-breakdown", get(recipe_price_breakdown))
        .route("/:id/instructions", get(recipe_instructions))
        // Legacy paths
        .route("/find", get(find_recipes))
        .route("/get/:id", get(recipe_information))
}

fn push_opt(params: &mut Params, name: &'static str, value: Option<impl ToString>) {
    if let Some(value) = value.map(|v| v.to_string()) {
        if !value.trim().is_empty() {
            params.push((name, value));
        }
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("Missing required query parameter '{name}'")))
}

async fn fetch(state: &AppState, path: &str, params: &[(&str, String)]) -> Result<Json<ApiResponse<Value>>> {
    let url = state.upstream_url(path, params);
    let response = state.key_manager.execute(&url).await?;
    Ok(relay(response))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub cuisine: Option<String>,
    pub diet: Option<String>,
    pub intolerances: Option<String>,
    #[serde(rename = "type")]
    pub dish_type: Option<String>,
    pub max_ready_time: Option<u32>,
    pub min_calories: Option<u32>,
    pub max_calories: Option<u32>,
    pub offset: Option<u32>,
    pub number: Option<u32>,
}

#[instrument(skip_all)]
pub async fn find_recipes(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let mut params: Params = vec![
        ("offset", q.offset.unwrap_or(0).to_string()),
        ("number", q.number.unwrap_or(12).to_string()),
    ];
    push_opt(&mut params, "query", q.query);
    push_opt(&mut params, "cuisine", q.cuisine);
    push_opt(&mut params, "diet", q.diet);
    push_opt(&mut params, "intolerances", q.intolerances);
    push_opt(&mut params, "type", q.dish_type);
    push_opt(&mut params, "maxReadyTime", q.max_ready_time);
    push_opt(&mut params, "minCalories", q.min_calories);
    push_opt(&mut params, "maxCalories", q.max_calories);

    fetch(&state, "/recipes/complexSearch", &params).await
}

#[derive(Debug, Deserialize)]
pub struct RandomQuery {
    pub number: Option<u32>,
    pub tags: Option<String>,
}

pub async fn random_recipes(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RandomQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let mut params: Params = vec![("number", q.number.unwrap_or(10).to_string())];
    push_opt(&mut params, "tags", q.tags);
    fetch(&state, "/recipes/random", &params).await
}

#[derive(Debug, Deserialize)]
pub struct IngredientsQuery {
    pub ingredients: Option<String>,
    pub number: Option<u32>,
    pub ranking: Option<u32>,
}

pub async fn find_by_ingredients(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IngredientsQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let params: Params = vec![
        ("ingredients", required("ingredients", q.ingredients)?),
        ("number", q.number.unwrap_or(10).to_string()),
        ("ranking", q.ranking.unwrap_or(1).to_string()),
    ];
    fetch(&state, "/recipes/findByIngredients", &params).await
}

#[derive(Debug, Deserialize)]
pub struct VideosQuery {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub video_type: Option<String>,
    pub number: Option<u32>,
}

pub async fn search_food_videos(
    State(state): State<Arc<AppState>>,
    Query(q): Query<VideosQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let params: Params = vec![
        ("query", required("query", q.query)?),
        (
            "type",
            q.video_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "main course".to_string()),
        ),
        ("number", q.number.unwrap_or(10).to_string()),
    ];
    fetch(&state, "/food/videos/search", &params).await
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub number: Option<u32>,
}

pub async fn recipe_information(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Value>>> {
    fetch(&state, &format!("/recipes/{id}/information"), &[]).await
}

pub async fn similar_recipes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(q): Query<SimilarQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let params: Params = vec![("number", q.number.unwrap_or(10).to_string())];
    fetch(&state, &format!("/recipes/{id}/similar"), &params).await
}

pub async fn recipe_nutrition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Value>>> {
    fetch(&state, &format!("/recipes/{id}/nutritionWidget.json"), &[]).await
}

pub async fn recipe_price_breakdown(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Value>>> {
    fetch(&state, &format!("/recipes/{id}/priceBreakdownWidget.json"), &[]).await
}

pub async fn recipe_instructions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Value>>> {
    fetch(&state, &format!("/recipes/{id}/analyzedInstructions"), &[]).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanQuery {
    pub time_frame: Option<String>,
    pub target_calories: Option<u32>,
    pub diet: Option<String>,
    pub exclude: Option<String>,
}

pub async fn generate_meal_plan(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MealPlanQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let time_frame = q
        .time_frame
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "day".to_string());
    let mut params: Params = vec![("timeFrame", time_frame)];
    push_opt(&mut params, "targetCalories", q.target_calories);
    push_opt(&mut params, "diet", q.diet);
    push_opt(&mut params, "exclude", q.exclude);
    fetch(&state, "/mealplanner/generate", &params).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinePairingQuery {
    pub food: Option<String>,
    pub max_price: Option<f64>,
}

pub async fn wine_pairing(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WinePairingQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let mut params: Params = vec![("food", required("food", q.food)?)];
    push_opt(&mut params, "maxPrice", q.max_price);
    fetch(&state, "/food/wine/pairing", &params).await
}

/// Recipe to analyze; forwarded as-is to `POST /recipes/analyze`.
#[derive(Debug, Deserialize, Serialize)]
pub struct NutritionAnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
}

pub async fn analyze_nutrition(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NutritionAnalysisRequest>,
) -> Result<Json<ApiResponse<Value>>> {
    let url = state.upstream_url("/recipes/analyze", &[]);
    let payload =
        serde_json::to_value(&body).map_err(|e| AppError::Internal(e.to_string()))?;
    let response = state.key_manager.execute_post(&url, payload).await?;
    Ok(relay(response))
}

/// Connectivity probe. Reports whether a key was used, never the key itself.
pub async fn test_api(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let params = [("query", "pasta".to_string()), ("number", "1".to_string())];
    let url = state.upstream_url("/recipes/complexSearch", &params);
    let response = state.key_manager.execute(&url).await?;
    info!(http.status_code = %response.status, "API test successful");

    Ok(Json(json!({
        "success": true,
        "message": "API test successful",
        "data": response.data,
        "apiKey": "Present",
    })))
}
