use std::collections::HashMap;

use nanoid::nanoid;

use crate::{domain::photo::{Photo, PhotoForAdd, PhotoForInsert, PhotoForUpdate, PhotoSummary}, tools::{clock::now_millis, log::{log_info, LogServiceType}}};

use super::{error::{Error, Result}, users::ConnectedUser, ModelController};


impl ModelController {

	pub async fn add_photo(&self, new_photo: PhotoForAdd, requesting_user: &ConnectedUser) -> Result<Photo> {
		let user_id = requesting_user.user_id()?;
		let name = new_photo.name.trim().to_string();
		let storage_ref = new_photo.storage_ref.trim().to_string();
		if name.is_empty() || storage_ref.is_empty() {
			return Err(Error::InvalidParams("Photo name and storage reference are required".to_string()));
		}
		let photo = PhotoForInsert {
			id: nanoid!(),
			user_id: user_id.clone(),
			name,
			storage_ref,
			mime_type: new_photo.mime_type,
			thumbnail_url: new_photo.thumbnail_url,
			person_tag: new_photo.person_tag.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
			created: now_millis(),
		};
		let id = photo.id.clone();
		self.store.add_photo(photo).await?;
		log_info(LogServiceType::Register, format!("Registered photo {} for user {}", id, user_id));
		self.get_photo(&id, requesting_user).await
	}

	pub async fn get_photo(&self, photo_id: &str, requesting_user: &ConnectedUser) -> Result<Photo> {
		let user_id = requesting_user.user_id()?;
		self.store.get_user_photo(photo_id, &user_id).await?.ok_or(Error::PhotoNotFound(photo_id.to_string()))
	}

	/// Manual edit, always replaces the primary person
	pub async fn update_photo(&self, photo_id: &str, update: PhotoForUpdate, requesting_user: &ConnectedUser) -> Result<Photo> {
		let user_id = requesting_user.user_id()?;
		let existing = self.get_photo(photo_id, requesting_user).await?;
		self.store.update_photo(&existing.id, &user_id, update).await?;
		self.get_photo(photo_id, requesting_user).await
	}

	pub async fn get_person_tags(&self, requesting_user: &ConnectedUser) -> Result<Vec<String>> {
		let user_id = requesting_user.user_id()?;
		self.store.get_person_tags(&user_id).await
	}

	/// Fills `person_tag` on the user's photos that do not have one, returns the number of photos changed
	pub async fn update_photo_primary_person(&self, photo_ids: Vec<String>, person_name: &str, user_id: &str) -> Result<usize> {
		if photo_ids.is_empty() {
			return Ok(0);
		}
		let updated = self.store.set_person_tag_if_null(photo_ids, person_name, user_id).await?;
		if updated > 0 {
			log_info(LogServiceType::Identity, format!("Tagged {} photo(s) with {}", updated, person_name));
		}
		Ok(updated)
	}

	pub(crate) async fn get_photo_summaries(&self, photo_ids: Vec<String>, user_id: &str) -> Result<HashMap<String, PhotoSummary>> {
		if photo_ids.is_empty() {
			return Ok(HashMap::new());
		}
		let photos = self.store.get_photos_by_ids(photo_ids, user_id).await?;
		Ok(photos.into_iter().map(|p| (p.id.clone(), p.summary())).collect())
	}
}

#[cfg(test)]
mod tests {
	use crate::model::test_support::{add_photo, controller, photo_tag, user};

	use super::*;

	#[tokio::test]
	async fn primary_person_is_set_once() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		let ids = vec!["p1".to_string()];
		assert_eq!(mc.update_photo_primary_person(ids.clone(), "Maria", "u1").await.unwrap(), 1);
		assert_eq!(mc.update_photo_primary_person(ids.clone(), "Maria", "u1").await.unwrap(), 0);
		assert_eq!(mc.update_photo_primary_person(ids, "Bruno", "u1").await.unwrap(), 0);
		assert_eq!(photo_tag(&mc, "p1").await, Some("Maria".to_string()));
		assert_eq!(mc.update_photo_primary_person(vec![], "Bruno", "u1").await.unwrap(), 0);
	}

	#[tokio::test]
	async fn other_users_photos_are_not_found() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		assert!(mc.get_photo("p1", &user("u1")).await.is_ok());
		assert!(matches!(mc.get_photo("p1", &user("u2")).await, Err(Error::PhotoNotFound(_))));
		assert!(matches!(mc.get_photo("p1", &ConnectedUser::Anonymous).await, Err(Error::NotServerConnected)));
		assert_eq!(mc.update_photo_primary_person(vec!["p1".to_string()], "Maria", "u2").await.unwrap(), 0);
	}

	#[tokio::test]
	async fn manual_edit_wins() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		mc.update_photo_primary_person(vec!["p1".to_string()], "Maria", "u1").await.unwrap();
		let photo = mc.update_photo("p1", PhotoForUpdate { person: Some("Joana".to_string()), ..Default::default() }, &user("u1")).await.unwrap();
		assert_eq!(photo.person_tag, Some("Joana".to_string()));
		assert_eq!(mc.update_photo_primary_person(vec!["p1".to_string()], "Maria", "u1").await.unwrap(), 0);
		assert_eq!(mc.get_person_tags(&user("u1")).await.unwrap(), vec!["Joana".to_string()]);
	}

	#[tokio::test]
	async fn add_photo_validates() {
		let mc = controller().await;
		let added = mc.add_photo(PhotoForAdd { name: "beach.jpg".to_string(), storage_ref: "2024/beach.jpg".to_string(), person_tag: Some(" ".to_string()), ..Default::default() }, &user("u1")).await.unwrap();
		assert_eq!(added.user_id, "u1");
		assert_eq!(added.person_tag, None);
		let invalid = mc.add_photo(PhotoForAdd { name: "x".to_string(), ..Default::default() }, &user("u1")).await;
		assert!(matches!(invalid, Err(Error::InvalidParams(_))));
	}
}
