
use crate::{model::{assignment::PersonAssignment, users::ConnectedUser, ModelController}, Result};
use axum::{extract::{Path, State}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};


#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysisRequest {
	pub photo_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SimilarFacesRequest {
	pub descriptor_id: String,
	pub threshold: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
	pub threshold: Option<f32>,
}


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/analyze/:photo_id", post(handler_analyze))
		.route("/analyze-batch", post(handler_analyze_batch))
		.route("/photo/:photo_id", get(handler_photo_faces))
		.route("/find-similar", post(handler_find_similar))
		.route("/cluster", post(handler_cluster))
		.route("/assign-person", post(handler_assign_person))
		.route("/persons", get(handler_persons))
		.route("/person/:id/photos", get(handler_person_photos))
		.with_state(mc)
}

async fn handler_analyze(Path(photo_id): Path<String>, State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let analysis = mc.analyze_photo(&photo_id, &user).await?;
	Ok(Json(json!(analysis)))
}

async fn handler_analyze_batch(State(mc): State<ModelController>, user: ConnectedUser, Json(request): Json<BatchAnalysisRequest>) -> Result<Json<Value>> {
	let analysis = mc.analyze_photos(request.photo_ids, &user).await?;
	Ok(Json(json!(analysis)))
}

async fn handler_photo_faces(Path(photo_id): Path<String>, State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let faces = mc.get_photo_faces(&photo_id, &user).await?;
	Ok(Json(json!(faces)))
}

async fn handler_find_similar(State(mc): State<ModelController>, user: ConnectedUser, Json(request): Json<SimilarFacesRequest>) -> Result<Json<Value>> {
	let matches = mc.find_similar_faces(&request.descriptor_id, request.threshold, &user).await?;
	Ok(Json(json!(matches)))
}

async fn handler_cluster(State(mc): State<ModelController>, user: ConnectedUser, request: Option<Json<ClusterRequest>>) -> Result<Json<Value>> {
	let request = request.map(|r| r.0).unwrap_or_default();
	let groups = mc.cluster_faces(request.threshold, &user).await?;
	Ok(Json(json!({
		"clusters": groups.len(),
		"groups": groups,
	})))
}

async fn handler_assign_person(State(mc): State<ModelController>, user: ConnectedUser, Json(assignment): Json<PersonAssignment>) -> Result<Json<Value>> {
	let result = mc.assign_person_to_faces(assignment, &user).await?;
	Ok(Json(json!(result)))
}

async fn handler_persons(State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let persons = mc.get_persons(&user).await?;
	Ok(Json(json!(persons)))
}

async fn handler_person_photos(Path(person_id): Path<String>, State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let photos = mc.get_person_photos(&person_id, &user).await?;
	Ok(Json(json!(photos)))
}
