use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{domain::{person::Person, photo::PhotoSummary}, tools::{log::{log_error, log_info, LogServiceType}, similarity::distance, tasks::bounded_fan_out}};

use super::{error::{Error, Result}, faces::unique_in_order, store::sql::faces::FaceQuery, users::ConnectedUser, ModelController};


#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PersonAssignment {
	pub descriptor_ids: Vec<String>,
	pub person_name: String,
	pub auto_assign: Option<bool>,
	pub threshold: Option<f32>,
}

/// Cascade started from one labeled face
#[derive(Debug, Clone)]
pub struct AutoAssignRequest {
	pub descriptor_id: String,
	pub person_id: String,
	pub person_name: String,
	pub user_id: String,
	pub threshold: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignSummary {
	pub processed: usize,
	pub total_matches: usize,
	pub newly_assigned: usize,
	pub photo_tags_updated: usize,
	pub assigned_descriptor_ids: Vec<String>,
	pub assigned_photos: Vec<PhotoSummary>,
}

impl AutoAssignSummary {
	/// Counters are summed, lists keep the first occurrence of each id, `newly_assigned` follows the merged ids
	pub fn merge(summaries: Vec<AutoAssignSummary>) -> AutoAssignSummary {
		let mut merged = AutoAssignSummary::default();
		let mut seen_photos = HashSet::new();
		let mut descriptor_ids = vec![];
		for summary in summaries {
			merged.processed += summary.processed;
			merged.total_matches += summary.total_matches;
			merged.photo_tags_updated += summary.photo_tags_updated;
			descriptor_ids.extend(summary.assigned_descriptor_ids);
			for photo in summary.assigned_photos {
				if seen_photos.insert(photo.id.clone()) {
					merged.assigned_photos.push(photo);
				}
			}
		}
		merged.assigned_descriptor_ids = unique_in_order(descriptor_ids);
		merged.newly_assigned = merged.assigned_descriptor_ids.len();
		merged
	}
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
	pub person: Person,
	/// Faces labeled by the request itself
	pub updated: usize,
	pub not_found: usize,
	pub failed: usize,
	pub total_photo_tags_updated: usize,
	pub auto_assignment: AutoAssignSummary,
}

impl ModelController {

	/// Explicit label, replaces any previous person of the face
	pub async fn assign_person(&self, descriptor_id: &str, person_id: &str) -> Result<usize> {
		let changed = self.store.set_faces_person(vec![descriptor_id.to_string()], person_id, false).await?;
		Ok(changed.len())
	}

	/// Extends the person of an anchor face to the unassigned faces of the user that are close enough.
	/// Never fails: store errors are logged and reported as nothing done.
	pub async fn auto_assign_similar_faces(&self, request: AutoAssignRequest) -> AutoAssignSummary {
		let threshold = request.threshold.unwrap_or(self.settings.auto_assign_threshold);

		let anchor = match self.store.get_user_face(&request.descriptor_id, &request.user_id).await {
			Ok(Some(anchor)) => anchor,
			Ok(None) => return AutoAssignSummary::default(),
			Err(error) => {
				log_error(LogServiceType::Identity, format!("Unable to load anchor face {}: {:#}", request.descriptor_id, error));
				return AutoAssignSummary::default();
			}
		};
		let faces = match self.store.get_faces(FaceQuery::for_user(&request.user_id)).await {
			Ok(faces) => faces,
			Err(error) => {
				log_error(LogServiceType::Identity, format!("Unable to load faces of user {}: {:#}", request.user_id, error));
				return AutoAssignSummary::default();
			}
		};

		let mut matches: Vec<(f32, usize)> = faces.iter().enumerate()
			.filter(|(_, face)| face.id != anchor.id)
			.map(|(index, face)| (distance(&anchor.embedding, &face.embedding), index))
			.filter(|(d, _)| *d < threshold)
			.collect();
		matches.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

		let mut summary = AutoAssignSummary {
			processed: faces.len(),
			total_matches: matches.len(),
			..Default::default()
		};

		// faces of another person are never taken over, faces already holding this person are satisfied
		let new_assignments: Vec<_> = matches.iter()
			.map(|(_, index)| &faces[*index])
			.filter(|face| face.person_id.is_none())
			.collect();
		if new_assignments.is_empty() {
			return summary;
		}

		let candidates = unique_in_order(new_assignments.iter().map(|f| f.id.clone()));
		// another cascade may have taken some candidates since the scan
		let ids = match self.store.set_faces_person(candidates, &request.person_id, true).await {
			Ok(ids) => ids,
			Err(error) => {
				log_error(LogServiceType::Identity, format!("Unable to propagate person {} to similar faces: {:#}", request.person_id, error));
				return summary;
			}
		};
		if ids.is_empty() {
			return summary;
		}
		let changed: HashSet<&String> = ids.iter().collect();
		let photo_ids = unique_in_order(new_assignments.iter().filter(|f| changed.contains(&f.id)).map(|f| f.photo_id.clone()));
		summary.newly_assigned = ids.len();
		summary.assigned_descriptor_ids = ids.clone();

		match self.get_photo_summaries(photo_ids.clone(), &request.user_id).await {
			Ok(photos) => {
				summary.assigned_photos = photo_ids.iter().filter_map(|id| photos.get(id).cloned()).collect();
			}
			Err(error) => log_error(LogServiceType::Identity, format!("Unable to load auto assigned photos: {:#}", error)),
		}

		match self.update_photo_primary_person(photo_ids, &request.person_name, &request.user_id).await {
			Ok(updated) => summary.photo_tags_updated = updated,
			Err(error) => log_error(LogServiceType::Identity, format!("Unable to tag auto assigned photos: {:#}", error)),
		}

		log_info(LogServiceType::Identity, format!("Face {} propagated {} to {} face(s)", request.descriptor_id, request.person_name, summary.newly_assigned));
		summary
	}

	/// Label one face and tag its photo, `None` when the face is not one of the user's
	async fn assign_user_face(&self, descriptor_id: &str, person: &Person, user_id: &str) -> Result<Option<(String, usize)>> {
		let Some(face) = self.store.get_user_face(descriptor_id, user_id).await? else {
			return Ok(None);
		};
		self.assign_person(&face.id, &person.id).await?;
		let tags = self.update_photo_primary_person(vec![face.photo_id], &person.name, user_id).await?;
		Ok(Some((face.id, tags)))
	}

	pub async fn assign_person_to_faces(&self, assignment: PersonAssignment, requesting_user: &ConnectedUser) -> Result<AssignmentResult> {
		let user_id = requesting_user.user_id()?;
		let name = assignment.person_name.trim();
		if name.is_empty() {
			return Err(Error::InvalidParams("personName can not be empty".to_string()));
		}
		let person = self.get_or_create_person(name).await?;
		let descriptor_ids = unique_in_order(assignment.descriptor_ids);

		let outcomes = bounded_fan_out(descriptor_ids, self.settings.concurrency, |descriptor_id| {
			let person = &person;
			let user_id = &user_id;
			async move {
				let outcome = self.assign_user_face(&descriptor_id, person, user_id).await;
				(descriptor_id, outcome)
			}
		}).await;

		let mut anchors = vec![];
		let mut not_found = 0;
		let mut failed = 0;
		let mut total_photo_tags_updated = 0;
		for (descriptor_id, outcome) in outcomes {
			match outcome {
				Ok(Some((id, tags))) => {
					anchors.push(id);
					total_photo_tags_updated += tags;
				}
				Ok(None) => not_found += 1,
				Err(error) => {
					log_error(LogServiceType::Identity, format!("Unable to assign face {} to {}: {:#}", descriptor_id, person.name, error));
					failed += 1;
				}
			}
		}

		let auto_assignment = if assignment.auto_assign.unwrap_or(true) && !anchors.is_empty() {
			let summaries = bounded_fan_out(anchors.clone(), self.settings.concurrency, |descriptor_id| {
				self.auto_assign_similar_faces(AutoAssignRequest {
					descriptor_id,
					person_id: person.id.clone(),
					person_name: person.name.clone(),
					user_id: user_id.clone(),
					threshold: assignment.threshold,
				})
			}).await;
			AutoAssignSummary::merge(summaries)
		} else {
			AutoAssignSummary::default()
		};
		total_photo_tags_updated += auto_assignment.photo_tags_updated;

		Ok(AssignmentResult {
			updated: anchors.len(),
			person,
			not_found,
			failed,
			total_photo_tags_updated,
			auto_assignment,
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::model::test_support::{add_face, add_photo, controller, face_person, photo_tag, user};

	use super::*;

	fn request(descriptor_id: &str, person: &Person, user_id: &str) -> AutoAssignRequest {
		AutoAssignRequest {
			descriptor_id: descriptor_id.to_string(),
			person_id: person.id.clone(),
			person_name: person.name.clone(),
			user_id: user_id.to_string(),
			threshold: None,
		}
	}

	fn assignment(ids: &[&str], name: &str) -> PersonAssignment {
		PersonAssignment {
			descriptor_ids: ids.iter().map(|id| id.to_string()).collect(),
			person_name: name.to_string(),
			auto_assign: None,
			threshold: None,
		}
	}

	#[tokio::test]
	async fn cascade_assigns_close_unassigned_faces() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u1", None).await;
		add_face(&mc, "d1", "p1", vec![0.0, 0.0, 0.0, 0.0]).await;
		add_face(&mc, "d2", "p2", vec![0.3, 0.0, 0.0, 0.0]).await;
		add_face(&mc, "far", "p2", vec![2.0, 0.0, 0.0, 0.0]).await;
		let maria = mc.get_or_create_person("Maria").await.unwrap();
		mc.assign_person("d1", &maria.id).await.unwrap();

		let summary = mc.auto_assign_similar_faces(request("d1", &maria, "u1")).await;
		assert_eq!(summary.processed, 3);
		assert_eq!(summary.total_matches, 1);
		assert_eq!(summary.newly_assigned, 1);
		assert_eq!(summary.photo_tags_updated, 1);
		assert_eq!(summary.assigned_descriptor_ids, vec!["d2".to_string()]);
		assert_eq!(summary.assigned_photos.len(), 1);
		assert_eq!(summary.assigned_photos[0].id, "p2");

		assert_eq!(face_person(&mc, "d2").await, Some(maria.id.clone()));
		assert_eq!(face_person(&mc, "far").await, None);
		assert_eq!(photo_tag(&mc, "p2").await, Some("Maria".to_string()));
	}

	#[tokio::test]
	async fn cascade_keeps_other_persons_and_counts_same_person() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_face(&mc, "anchor", "p1", vec![0.0, 0.0]).await;
		add_face(&mc, "d3", "p1", vec![0.2, 0.0]).await;
		add_face(&mc, "other", "p1", vec![0.0, 0.1]).await;
		let bruno = mc.get_or_create_person("Bruno").await.unwrap();
		let carla = mc.get_or_create_person("Carla").await.unwrap();
		mc.assign_person("anchor", &bruno.id).await.unwrap();
		mc.assign_person("d3", &bruno.id).await.unwrap();
		mc.assign_person("other", &carla.id).await.unwrap();

		let summary = mc.auto_assign_similar_faces(request("anchor", &bruno, "u1")).await;
		assert_eq!(summary.total_matches, 2);
		assert_eq!(summary.newly_assigned, 0);
		assert!(summary.assigned_descriptor_ids.is_empty());
		assert_eq!(face_person(&mc, "d3").await, Some(bruno.id.clone()));
		assert_eq!(face_person(&mc, "other").await, Some(carla.id.clone()));
	}

	#[tokio::test]
	async fn cascade_preserves_existing_tags() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u1", Some("Family")).await;
		add_face(&mc, "d1", "p1", vec![0.0]).await;
		add_face(&mc, "d2", "p2", vec![0.1]).await;
		let maria = mc.get_or_create_person("Maria").await.unwrap();

		let summary = mc.auto_assign_similar_faces(request("d1", &maria, "u1")).await;
		assert_eq!(summary.newly_assigned, 1);
		assert_eq!(summary.photo_tags_updated, 0);
		assert_eq!(photo_tag(&mc, "p2").await, Some("Family".to_string()));
	}

	#[tokio::test]
	async fn cascade_of_foreign_anchor_is_empty() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u2", None).await;
		add_face(&mc, "d1", "p1", vec![0.0]).await;
		add_face(&mc, "d2", "p2", vec![0.0]).await;
		let maria = mc.get_or_create_person("Maria").await.unwrap();

		assert_eq!(mc.auto_assign_similar_faces(request("d1", &maria, "u2")).await, AutoAssignSummary::default());
		assert_eq!(mc.auto_assign_similar_faces(request("missing", &maria, "u1")).await, AutoAssignSummary::default());
		// the other user's identical face is never reached
		let summary = mc.auto_assign_similar_faces(request("d1", &maria, "u1")).await;
		assert_eq!(summary.processed, 1);
		assert_eq!(face_person(&mc, "d2").await, None);
	}

	#[tokio::test]
	async fn assign_request_labels_and_cascades() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u1", None).await;
		add_photo(&mc, "p3", "u2", None).await;
		add_face(&mc, "d1", "p1", vec![0.0, 0.0]).await;
		add_face(&mc, "d2", "p2", vec![0.3, 0.0]).await;
		add_face(&mc, "d4", "p1", vec![0.0, 0.3]).await;
		add_face(&mc, "foreign", "p3", vec![0.0, 0.0]).await;

		let result = mc.assign_person_to_faces(assignment(&["d1", "d1", "foreign", "missing"], "  Maria "), &user("u1")).await.unwrap();
		assert_eq!(result.person.name, "Maria");
		assert_eq!(result.updated, 1);
		assert_eq!(result.not_found, 2);
		assert_eq!(result.failed, 0);
		assert_eq!(result.auto_assignment.newly_assigned, 2);
		assert_eq!(result.auto_assignment.assigned_descriptor_ids, vec!["d2".to_string(), "d4".to_string()]);
		assert_eq!(result.total_photo_tags_updated, 2);
		assert_eq!(face_person(&mc, "foreign").await, None);

		let again = mc.assign_person_to_faces(assignment(&["d1"], "maria"), &user("u1")).await.unwrap();
		assert_eq!(again.person.id, result.person.id);
		assert_eq!(again.total_photo_tags_updated, 0);
		assert_eq!(again.auto_assignment.newly_assigned, 0);
		assert_eq!(again.auto_assignment.total_matches, 2);
	}

	#[tokio::test]
	async fn shared_match_is_counted_once() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u1", None).await;
		add_photo(&mc, "p3", "u1", None).await;
		add_face(&mc, "a1", "p1", vec![0.0, 0.0]).await;
		add_face(&mc, "a2", "p2", vec![0.05, 0.0]).await;
		add_face(&mc, "d3", "p3", vec![0.2, 0.0]).await;

		let result = mc.assign_person_to_faces(assignment(&["a1", "a2"], "Maria"), &user("u1")).await.unwrap();
		assert_eq!(result.updated, 2);
		assert_eq!(result.auto_assignment.assigned_descriptor_ids, vec!["d3".to_string()]);
		assert_eq!(result.auto_assignment.newly_assigned, 1);
		let photos: Vec<&str> = result.auto_assignment.assigned_photos.iter().map(|p| p.id.as_str()).collect();
		assert_eq!(photos, vec!["p3"]);
		assert_eq!(result.auto_assignment.photo_tags_updated, 1);
		assert_eq!(result.total_photo_tags_updated, 3);
		assert_eq!(face_person(&mc, "d3").await, Some(result.person.id.clone()));
	}

	#[tokio::test]
	async fn explicit_assignment_can_move_a_face() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_face(&mc, "d1", "p1", vec![0.0]).await;
		mc.assign_person_to_faces(assignment(&["d1"], "Ana"), &user("u1")).await.unwrap();
		let mut to_bruno = assignment(&["d1"], "Bruno");
		to_bruno.auto_assign = Some(false);
		let result = mc.assign_person_to_faces(to_bruno, &user("u1")).await.unwrap();
		assert_eq!(face_person(&mc, "d1").await, Some(result.person.id));
		assert_eq!(photo_tag(&mc, "p1").await, Some("Ana".to_string()));
		assert_eq!(result.auto_assignment, AutoAssignSummary::default());
	}

	#[tokio::test]
	async fn empty_name_is_rejected() {
		let mc = controller().await;
		let result = mc.assign_person_to_faces(assignment(&["d1"], "   "), &user("u1")).await;
		assert!(matches!(result, Err(Error::InvalidParams(_))));
	}

	#[test]
	fn merge_deduplicates() {
		let photo = |id: &str| PhotoSummary { id: id.to_string(), name: id.to_string(), thumbnail_url: None, created: 0 };
		let merged = AutoAssignSummary::merge(vec![
			AutoAssignSummary { processed: 3, total_matches: 2, newly_assigned: 2, photo_tags_updated: 1, assigned_descriptor_ids: vec!["a".to_string(), "b".to_string()], assigned_photos: vec![photo("p1")] },
			AutoAssignSummary { processed: 3, total_matches: 1, newly_assigned: 1, photo_tags_updated: 0, assigned_descriptor_ids: vec!["b".to_string(), "c".to_string()], assigned_photos: vec![photo("p2"), photo("p1")] },
		]);
		assert_eq!(merged.processed, 6);
		assert_eq!(merged.newly_assigned, 3);
		assert_eq!(merged.assigned_descriptor_ids, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
		let photos: Vec<&str> = merged.assigned_photos.iter().map(|p| p.id.as_str()).collect();
		assert_eq!(photos, vec!["p1", "p2"]);
	}
}
