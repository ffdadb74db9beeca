use nanoid::nanoid;

use crate::{domain::{person::{Person, PersonForInsert}, photo::Photo}, tools::{clock::now_millis, log::{log_info, LogServiceType}}};

use super::{error::{Error, Result}, users::ConnectedUser, ModelController};


impl ModelController {

	/// Case-insensitive lookup, creates the person when the name is new
	pub async fn get_or_create_person(&self, name: &str) -> Result<Person> {
		let key = Person::name_key(name);
		if let Some(person) = self.person_cache.get(&key).await {
			return Ok(person);
		}
		let person = match self.store.get_person_by_name(name).await? {
			Some(person) => person,
			None => {
				let person = self.store.add_person(PersonForInsert {
					id: nanoid!(),
					name: name.to_string(),
					created: now_millis(),
				}).await?;
				log_info(LogServiceType::Identity, format!("Created person {} ({})", person.name, person.id));
				person
			}
		};
		self.person_cache.insert(key, person.clone()).await;
		Ok(person)
	}

	pub async fn get_persons(&self, requesting_user: &ConnectedUser) -> Result<Vec<Person>> {
		requesting_user.check_registered()?;
		self.store.get_persons().await
	}

	pub async fn get_person(&self, person_id: &str, requesting_user: &ConnectedUser) -> Result<Person> {
		requesting_user.check_registered()?;
		self.store.get_person(person_id).await?.ok_or(Error::PersonNotFound(person_id.to_string()))
	}

	/// The user's photos holding at least one face of the person
	pub async fn get_person_photos(&self, person_id: &str, requesting_user: &ConnectedUser) -> Result<Vec<Photo>> {
		let user_id = requesting_user.user_id()?;
		let person = self.get_person(person_id, requesting_user).await?;
		self.store.get_person_photos(&person.id, &user_id).await
	}
}
