
use crate::{domain::photo::{PhotoForAdd, PhotoForUpdate}, model::{users::ConnectedUser, ModelController}, Result};
use axum::{extract::{Path, State}, routing::{get, patch, post}, Json, Router};
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/", post(handler_post))
		.route("/people", get(handler_people))
		.route("/:id", get(handler_get))
		.route("/:id", patch(handler_patch))
		.with_state(mc)
}

async fn handler_post(State(mc): State<ModelController>, user: ConnectedUser, Json(photo): Json<PhotoForAdd>) -> Result<Json<Value>> {
	let photo = mc.add_photo(photo, &user).await?;
	Ok(Json(json!(photo)))
}

async fn handler_get(Path(photo_id): Path<String>, State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let photo = mc.get_photo(&photo_id, &user).await?;
	Ok(Json(json!(photo)))
}

async fn handler_patch(Path(photo_id): Path<String>, State(mc): State<ModelController>, user: ConnectedUser, Json(update): Json<PhotoForUpdate>) -> Result<Json<Value>> {
	let photo = mc.update_photo(&photo_id, update, &user).await?;
	Ok(Json(json!(photo)))
}

async fn handler_people(State(mc): State<ModelController>, user: ConnectedUser) -> Result<Json<Value>> {
	let tags = mc.get_person_tags(&user).await?;
	Ok(Json(json!(tags)))
}
