use rusqlite::{params, OptionalExtension, Row};

use crate::{domain::{person::{Person, PersonForInsert}, photo::Photo}, model::store::SqliteStore};

use crate::model::error::{Error, Result};

impl SqliteStore {

    fn row_to_person(row: &Row) -> rusqlite::Result<Person> {
        Ok(Person {
            id: row.get(0)?,
            name: row.get(1)?,
            created: row.get(2)?,
        })
    }

    pub async fn get_persons(&self) -> Result<Vec<Person>> {
        let rows = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT id, name, created FROM persons ORDER BY name_key, rowid")?;
            let rows = query.query_map([], Self::row_to_person)?;
            let persons: Vec<Person> = rows.collect::<std::result::Result<Vec<Person>, rusqlite::Error>>()?;
            Ok(persons)
        }).await?;
        Ok(rows)
    }

    pub async fn get_person(&self, person_id: &str) -> Result<Option<Person>> {
        let person_id = person_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT id, name, created FROM persons WHERE id = ?")?;
            let row = query.query_row([person_id], Self::row_to_person).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    pub async fn get_person_by_name(&self, name: &str) -> Result<Option<Person>> {
        let name_key = Person::name_key(name);
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT id, name, created FROM persons WHERE name_key = ?")?;
            let row = query.query_row([name_key], Self::row_to_person).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    /// Inserts the person unless one already uses the same name case-insensitively, returns the stored one
    pub async fn add_person(&self, person: PersonForInsert) -> Result<Person> {
        let name_key = Person::name_key(&person.name);
        let stored = self.connection.call( move |conn| {
            conn.execute("INSERT INTO persons (id, name, name_key, created)
            VALUES (?, ?, ?, ?) ON CONFLICT(name_key) DO NOTHING", params![
                person.id,
                person.name,
                name_key,
                person.created
            ])?;
            let mut query = conn.prepare("SELECT id, name, created FROM persons WHERE name_key = ?")?;
            let row = query.query_row([name_key], Self::row_to_person).optional()?;
            Ok(row)
        }).await?;
        stored.ok_or(Error::StoreInconsistency("Person missing after insert".to_string()))
    }

    /// Distinct photos of the user holding a face of this person
    pub async fn get_person_photos(&self, person_id: &str, user_id: &str) -> Result<Vec<Photo>> {
        let person_id = person_id.to_string();
        let user_id = user_id.to_string();
        let rows = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT p.id, p.user_id, p.name, p.storage_ref, p.mime_type, p.thumbnail_url, p.person_tag, p.created
                FROM photos p WHERE p.user_id = ? and p.id IN (SELECT f.photo_id FROM face_descriptors f WHERE f.person_id = ?)
                ORDER BY p.created DESC, p.rowid")?;
            let rows = query.query_map([user_id, person_id], Self::row_to_photo)?;
            let photos: Vec<Photo> = rows.collect::<std::result::Result<Vec<Photo>, rusqlite::Error>>()?;
            Ok(photos)
        }).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> PersonForInsert {
        PersonForInsert { id: id.to_string(), name: name.to_string(), created: 0 }
    }

    #[tokio::test]
    async fn names_are_case_insensitive() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ana = store.add_person(person("a1", "Ana")).await.unwrap();
        let again = store.add_person(person("a2", "ana")).await.unwrap();
        assert_eq!(ana.id, "a1");
        assert_eq!(again.id, "a1");
        assert_eq!(again.name, "Ana");

        assert_eq!(store.get_person_by_name("ANA").await.unwrap().unwrap().id, "a1");
        assert_eq!(store.get_persons().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unicode_names_fold() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.add_person(person("e1", "Élodie")).await.unwrap();
        assert_eq!(store.get_person_by_name("élodie").await.unwrap().unwrap().id, "e1");
    }

    #[tokio::test]
    async fn persons_sorted_by_name() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.add_person(person("z", "zoe")).await.unwrap();
        store.add_person(person("b", "Bruno")).await.unwrap();
        let names: Vec<String> = store.get_persons().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bruno".to_string(), "zoe".to_string()]);
    }
}
