use std::collections::HashSet;

use nanoid::nanoid;

use crate::{domain::{face::{BatchAnalysis, ClusterFace, FaceCluster, FaceDescriptor, FaceDescriptorForInsert, FaceDetection, FaceMatch, FaceWithPerson, PhotoAnalysis, PhotoAnalysisResult}, photo::Photo}, tools::{clock::now_millis, log::{log_error, log_info, LogServiceType}, similarity::{cluster_by_seed, find_similar}, tasks::bounded_fan_out}};

use super::{error::{Error, Result}, store::sql::faces::FaceQuery, users::ConnectedUser, ModelController};


/// Distinct values keeping the first occurrence
pub(crate) fn unique_in_order<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
	let mut seen = HashSet::new();
	values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

impl ModelController {

	/// Persists one unassigned descriptor per detection in a single transaction
	pub async fn save_face_descriptors(&self, photo_id: &str, detections: Vec<FaceDetection>) -> Result<Vec<FaceDescriptor>> {
		if detections.is_empty() {
			return Ok(vec![]);
		}
		let created = now_millis();
		let faces: Vec<FaceDescriptorForInsert> = detections.into_iter().map(|detection| FaceDescriptorForInsert {
			id: nanoid!(),
			photo_id: photo_id.to_string(),
			embedding: detection.embedding,
			bbox: detection.bbox.rounded(),
			confidence: detection.confidence,
			expressions: detection.expressions,
			created,
		}).collect();
		self.store.add_faces(faces.clone()).await?;
		log_info(LogServiceType::Recognition, format!("Saved {} face(s) for photo {}", faces.len(), photo_id));
		Ok(faces.into_iter().map(|f| f.into_descriptor()).collect())
	}

	async fn detect_and_save(&self, photo: &Photo) -> Result<Vec<FaceDescriptor>> {
		let image = self.images.get_image(photo).await?;
		let detections = self.detector.detect_faces(image, photo.mime_type.clone()).await;
		self.save_face_descriptors(&photo.id, detections).await
	}

	pub async fn analyze_photo(&self, photo_id: &str, requesting_user: &ConnectedUser) -> Result<PhotoAnalysis> {
		let photo = self.get_photo(photo_id, requesting_user).await?;
		let faces = self.detect_and_save(&photo).await?;
		let message = if faces.is_empty() {
			"No faces detected".to_string()
		} else {
			format!("{} face(s) detected", faces.len())
		};
		Ok(PhotoAnalysis { count: faces.len(), faces, message })
	}

	/// Unknown photos are skipped, failures are counted and do not stop the batch
	pub async fn analyze_photos(&self, photo_ids: Vec<String>, requesting_user: &ConnectedUser) -> Result<BatchAnalysis> {
		let user_id = requesting_user.user_id()?;
		if photo_ids.is_empty() {
			return Err(Error::InvalidParams("photoIds must be a non empty list".to_string()));
		}
		let outcomes = bounded_fan_out(photo_ids, self.settings.concurrency, |photo_id| {
			let user_id = user_id.clone();
			async move {
				let photo = match self.store.get_user_photo(&photo_id, &user_id).await {
					Ok(Some(photo)) => photo,
					Ok(None) => return (photo_id, Ok(None)),
					Err(error) => return (photo_id, Err(error)),
				};
				let result = self.detect_and_save(&photo).await.map(|faces| Some(faces.len()));
				(photo_id, result)
			}
		}).await;

		let mut analysis = BatchAnalysis::default();
		for (photo_id, outcome) in outcomes {
			match outcome {
				Ok(Some(faces_detected)) => {
					analysis.processed += 1;
					analysis.results.push(PhotoAnalysisResult { photo_id, faces_detected });
				}
				Ok(None) => {}
				Err(error) => {
					log_error(LogServiceType::Recognition, format!("Unable to analyze photo {}: {:#}", photo_id, error));
					analysis.errors += 1;
				}
			}
		}
		Ok(analysis)
	}

	pub async fn get_photo_faces(&self, photo_id: &str, requesting_user: &ConnectedUser) -> Result<Vec<FaceWithPerson>> {
		let photo = self.get_photo(photo_id, requesting_user).await?;
		self.store.get_faces_with_person(&photo.id).await
	}

	/// Faces of the user closer than `threshold` to the descriptor, closest first.
	/// The descriptor itself is part of the result at distance 0.
	pub async fn find_similar_faces(&self, descriptor_id: &str, threshold: Option<f32>, requesting_user: &ConnectedUser) -> Result<Vec<FaceMatch>> {
		let user_id = requesting_user.user_id()?;
		let threshold = threshold.unwrap_or(self.settings.similarity_threshold);
		let anchor = self.store.get_user_face(descriptor_id, &user_id).await?.ok_or(Error::FaceNotFound(descriptor_id.to_string()))?;
		let candidates = self.store.get_faces(FaceQuery::for_user(&user_id)).await?;
		let matches = find_similar(&anchor.embedding, &candidates, threshold);

		let photo_ids = unique_in_order(matches.iter().map(|m| m.item.photo_id.clone()));
		let photos = self.get_photo_summaries(photo_ids, &user_id).await?;
		Ok(matches.into_iter().map(|m| FaceMatch {
			id: m.item.id.clone(),
			photo_id: m.item.photo_id.clone(),
			person_id: m.item.person_id.clone(),
			distance: m.distance,
			photo: photos.get(&m.item.photo_id).cloned(),
		}).collect())
	}

	/// Seed based grouping of the user's unassigned faces
	pub async fn cluster_faces(&self, threshold: Option<f32>, requesting_user: &ConnectedUser) -> Result<Vec<FaceCluster>> {
		let user_id = requesting_user.user_id()?;
		let threshold = threshold.unwrap_or(self.settings.cluster_threshold);
		let faces = self.store.get_faces(FaceQuery { unassigned: true, ..FaceQuery::for_user(&user_id) }).await?;
		let clusters = cluster_by_seed(&faces, threshold);

		let photo_ids = unique_in_order(clusters.iter().flatten().map(|f| f.photo_id.clone()));
		let photos = self.get_photo_summaries(photo_ids, &user_id).await?;
		log_info(LogServiceType::Recognition, format!("Grouped {} unassigned face(s) into {} cluster(s)", faces.len(), clusters.len()));
		Ok(clusters.into_iter().enumerate().map(|(index, members)| FaceCluster {
			id: format!("cluster-{}", index),
			count: members.len(),
			faces: members.into_iter().map(|face| ClusterFace {
				id: face.id.clone(),
				photo_id: face.photo_id.clone(),
				bbox: face.bbox,
				confidence: face.confidence,
				photo: photos.get(&face.photo_id).cloned(),
			}).collect(),
		}).collect())
	}
}

#[cfg(test)]
mod tests {
	use crate::{domain::face::FaceBBox, model::test_support::{add_face, add_photo, controller, controller_with, detection, user}};

	use super::*;

	#[tokio::test]
	async fn analyze_stores_rounded_boxes() {
		let mc = controller_with(vec![detection(vec![0.1, 0.2]), detection(vec![0.3, 0.4])]).await;
		add_photo(&mc, "p1", "u1", None).await;
		let analysis = mc.analyze_photo("p1", &user("u1")).await.unwrap();
		assert_eq!(analysis.count, 2);
		assert_eq!(analysis.faces[0].bbox, FaceBBox { x: 10.0, y: 21.0, width: 30.0, height: 41.0 });
		assert!(analysis.faces.iter().all(|f| f.person_id.is_none()));

		let stored = mc.get_photo_faces("p1", &user("u1")).await.unwrap();
		assert_eq!(stored.len(), 2);
		assert_eq!(stored[0].id, analysis.faces[0].id);
	}

	#[tokio::test]
	async fn analyze_without_faces_writes_nothing() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		let analysis = mc.analyze_photo("p1", &user("u1")).await.unwrap();
		assert_eq!(analysis.count, 0);
		assert_eq!(analysis.message, "No faces detected");
		assert!(mc.get_photo_faces("p1", &user("u1")).await.unwrap().is_empty());
		assert!(matches!(mc.analyze_photo("p1", &user("u2")).await, Err(Error::PhotoNotFound(_))));
	}

	#[tokio::test]
	async fn batch_skips_unknown_and_counts_errors() {
		let mc = controller_with(vec![detection(vec![0.1])]).await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u2", None).await;
		mc.store.add_photo(crate::domain::photo::PhotoForInsert {
			id: "p3".to_string(),
			user_id: "u1".to_string(),
			name: "p3.jpg".to_string(),
			storage_ref: "broken/p3.jpg".to_string(),
			mime_type: None,
			thumbnail_url: None,
			person_tag: None,
			created: 0,
		}).await.unwrap();

		let ids = vec!["p3".to_string(), "p2".to_string(), "p1".to_string(), "missing".to_string()];
		let analysis = mc.analyze_photos(ids, &user("u1")).await.unwrap();
		assert_eq!(analysis.processed, 1);
		assert_eq!(analysis.errors, 1);
		assert_eq!(analysis.results, vec![PhotoAnalysisResult { photo_id: "p1".to_string(), faces_detected: 1 }]);
		assert!(matches!(mc.analyze_photos(vec![], &user("u1")).await, Err(Error::InvalidParams(_))));
	}

	#[tokio::test]
	async fn similar_faces_stay_in_user_scope() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_photo(&mc, "p2", "u1", None).await;
		add_photo(&mc, "p3", "u2", None).await;
		add_face(&mc, "f1", "p1", vec![0.0, 0.0]).await;
		add_face(&mc, "f2", "p2", vec![0.5, 0.0]).await;
		add_face(&mc, "f3", "p2", vec![0.2, 0.0]).await;
		add_face(&mc, "f4", "p3", vec![0.0, 0.0]).await;
		add_face(&mc, "f5", "p2", vec![0.9, 0.0]).await;

		let matches = mc.find_similar_faces("f1", Some(0.6), &user("u1")).await.unwrap();
		let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
		assert_eq!(ids, vec!["f1", "f3", "f2"]);
		assert!(matches.iter().all(|m| m.distance < 0.6));
		assert_eq!(matches[1].photo.as_ref().unwrap().id, "p2");

		assert!(matches!(mc.find_similar_faces("f4", None, &user("u1")).await, Err(Error::FaceNotFound(_))));
	}

	#[tokio::test]
	async fn clusters_ignore_assigned_faces() {
		let mc = controller().await;
		add_photo(&mc, "p1", "u1", None).await;
		add_face(&mc, "seed", "p1", vec![0.0, 0.0]).await;
		add_face(&mc, "b", "p1", vec![0.4, 0.0]).await;
		add_face(&mc, "c", "p1", vec![-0.45, 0.0]).await;
		add_face(&mc, "known", "p1", vec![0.1, 0.0]).await;
		add_face(&mc, "alone", "p1", vec![5.0, 5.0]).await;
		let person = mc.get_or_create_person("Known").await.unwrap();
		mc.assign_person("known", &person.id).await.unwrap();

		let clusters = mc.cluster_faces(Some(0.5), &user("u1")).await.unwrap();
		assert_eq!(clusters.len(), 1);
		assert_eq!(clusters[0].id, "cluster-0");
		assert_eq!(clusters[0].count, 3);
		let ids: Vec<&str> = clusters[0].faces.iter().map(|f| f.id.as_str()).collect();
		assert_eq!(ids, vec!["seed", "b", "c"]);
		assert!(mc.cluster_faces(Some(0.5), &user("u2")).await.unwrap().is_empty());
	}
}
