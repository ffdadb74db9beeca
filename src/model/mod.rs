pub mod store;
pub mod error;
pub mod users;
pub mod photos;
pub mod faces;
pub mod people;
pub mod assignment;

use std::sync::Arc;

use moka::future::Cache;

use crate::{domain::person::Person, server::FaceSettings, tools::{image_source::ImageSource, recognition::FaceDetector}};

use self::store::SqliteStore;
pub use error::{Result, Error};


#[derive(Clone)]
pub struct ModelController {
	store: Arc<SqliteStore>,
	detector: Arc<dyn FaceDetector>,
	images: Arc<dyn ImageSource>,
	/// Persons by lowercased name
	person_cache: Cache<String, Person>,
	settings: Arc<FaceSettings>,
}


// Constructor
impl ModelController {
	pub fn new(store: SqliteStore, detector: Arc<dyn FaceDetector>, images: Arc<dyn ImageSource>, settings: FaceSettings) -> Self {
		Self {
			store: Arc::new(store),
			detector,
			images,
			person_cache: Cache::builder().max_capacity(settings.person_cache_size as u64).build(),
			settings: Arc::new(settings),
		}
	}
}
