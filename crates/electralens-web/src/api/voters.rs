use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use electralens_core::{Error, Voter};
use serde::{Deserialize, Serialize};

use super::{api_error, ApiError};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

/// `GET /` lists voters by id with `skip` and `limit`; `GET /{id}` fetches one.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_voters))
        .route("/{id}", get(get_voter))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    skip: Option<u32>,
    /// Defaults to 100, capped at 1000.
    limit: Option<u32>,
}

/// A stored voter with rfc3339 timestamps.
#[derive(Debug, Serialize)]
pub struct VoterResponse {
    pub id: i64,
    pub name: String,
    pub age: Option<i32>,
    pub gender: String,
    pub constituency: String,
    pub booth_no: String,
    pub address: String,
    pub vote: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<Voter> for VoterResponse {
    fn from(v: Voter) -> Self {
        Self {
            id: v.id,
            name: v.name,
            age: v.age,
            gender: v.gender,
            constituency: v.constituency,
            booth_no: v.booth_no,
            address: v.address,
            vote: v.vote,
            created_at: v.created_at.to_rfc3339(),
            updated_at: v.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

async fn list_voters(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<VoterResponse>>, ApiError> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let voters = state
        .storage
        .list_voters(skip, limit)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(voters.into_iter().map(VoterResponse::from).collect()))
}

async fn get_voter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VoterResponse>, ApiError> {
    let voter = state.storage.get_voter(id).await.map_err(|e| match e {
        Error::VoterNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    })?;

    Ok(Json(VoterResponse::from(voter)))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use electralens_core::NewVoter;
    use tower::ServiceExt;

    use super::*;
    use crate::api::test_support::{json_body, test_app};

    fn voter(i: usize) -> NewVoter {
        NewVoter {
            name: format!("Resident {i}"),
            age: None,
            gender: String::new(),
            constituency: "Gandhinagar".to_string(),
            booth_no: "14".to_string(),
            address: String::new(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_list_pages_through_voters() {
        let (app, state) = test_app().await;
        let batch: Vec<NewVoter> = (0..5).map(voter).collect();
        state.storage.insert_voters(&batch).await.unwrap();

        let response = app
            .oneshot(get("/api/voters?skip=1&limit=2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Resident 1", "Resident 2"]);
    }

    #[tokio::test]
    async fn test_list_defaults() {
        let (app, state) = test_app().await;
        let batch: Vec<NewVoter> = (0..3).map(voter).collect();
        state.storage.insert_voters(&batch).await.unwrap();

        let body = json_body(app.oneshot(get("/api/voters")).await.unwrap()).await;

        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["vote"], false);
    }

    #[tokio::test]
    async fn test_get_voter_by_id() {
        let (app, state) = test_app().await;
        state.storage.insert_voters(&[voter(7)]).await.unwrap();

        let response = app.clone().oneshot(get("/api/voters/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["name"], "Resident 7");

        let response = app.oneshot(get("/api/voters/99")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
