use std::collections::HashSet;

use rusqlite::{params, types::Value, OptionalExtension, Row};

use crate::{domain::{face::{FaceDescriptor, FaceDescriptorForInsert, FaceWithPerson}, person::PersonRef}, model::store::SqliteStore};

use super::{deserialize_from_row, deserialize_optional_from_row, embedding_from_blob, embedding_to_blob, text_values, to_json_text, OrderBuilder, QueryBuilder, QueryWhereType, SqlOrder};
use crate::model::error::Result;

const FACE_COLUMNS: &str = "f.id, f.photo_id, f.embedding, f.bbox, f.confidence, f.expressions, f.person_id, f.created";

#[derive(Debug, Default, Clone)]
pub struct FaceQuery {
    /// Only faces of photos owned by this user
    pub user_id: Option<String>,
    pub photo_id: Option<String>,
    pub person_id: Option<String>,
    pub unassigned: bool,
}

impl FaceQuery {
    pub fn for_user(user_id: &str) -> Self {
        FaceQuery { user_id: Some(user_id.to_string()), ..Default::default() }
    }
}

impl SqliteStore {

    fn row_to_face(row: &Row) -> rusqlite::Result<FaceDescriptor> {
        let embedding: Vec<u8> = row.get(2)?;
        Ok(FaceDescriptor {
            id: row.get(0)?,
            photo_id: row.get(1)?,
            embedding: embedding_from_blob(&embedding),
            bbox: deserialize_from_row(row, 3)?,
            confidence: row.get(4)?,
            expressions: deserialize_optional_from_row(row, 5)?,
            person_id: row.get(6)?,
            created: row.get(7)?,
        })
    }

    fn row_to_face_with_person(row: &Row) -> rusqlite::Result<FaceWithPerson> {
        let person_id: Option<String> = row.get(4)?;
        let person_name: Option<String> = row.get(5)?;
        let person = match (&person_id, person_name) {
            (Some(id), Some(name)) => Some(PersonRef { id: id.clone(), name }),
            _ => None,
        };
        Ok(FaceWithPerson {
            id: row.get(0)?,
            photo_id: row.get(1)?,
            bbox: deserialize_from_row(row, 2)?,
            confidence: row.get(3)?,
            person_id,
            person,
        })
    }

    /// All rows are written in one transaction
    pub async fn add_faces(&self, faces: Vec<FaceDescriptorForInsert>) -> Result<()> {
        if faces.is_empty() {
            return Ok(());
        }
        self.connection.call( move |conn| {
            let tx = conn.transaction()?;
            {
                let mut insert = tx.prepare("INSERT INTO face_descriptors (id, photo_id, embedding, bbox, confidence, expressions, person_id, created)
                VALUES (?, ?, ?, ?, ?, ?, NULL, ?)")?;
                for face in faces {
                    let expressions = match &face.expressions {
                        Some(expressions) => Some(to_json_text(expressions)?),
                        None => None,
                    };
                    insert.execute(params![
                        face.id,
                        face.photo_id,
                        embedding_to_blob(&face.embedding),
                        to_json_text(&face.bbox)?,
                        face.confidence,
                        expressions,
                        face.created
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        }).await?;
        Ok(())
    }

    pub async fn get_face(&self, face_id: &str) -> Result<Option<FaceDescriptor>> {
        let face_id = face_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare(&format!("SELECT {} FROM face_descriptors f WHERE f.id = ?", FACE_COLUMNS))?;
            let row = query.query_row([face_id], Self::row_to_face).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    /// Face only when its photo is owned by `user_id`
    pub async fn get_user_face(&self, face_id: &str, user_id: &str) -> Result<Option<FaceDescriptor>> {
        let face_id = face_id.to_string();
        let user_id = user_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare(&format!("SELECT {} FROM face_descriptors f INNER JOIN photos p ON p.id = f.photo_id WHERE f.id = ? and p.user_id = ?", FACE_COLUMNS))?;
            let row = query.query_row([face_id, user_id], Self::row_to_face).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    /// Faces in insertion order
    pub async fn get_faces(&self, query: FaceQuery) -> Result<Vec<FaceDescriptor>> {
        let rows = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            if let Some(user_id) = query.user_id {
                where_query.add_where(QueryWhereType::Equal("p.user_id".to_string(), Value::Text(user_id)));
            }
            if let Some(photo_id) = query.photo_id {
                where_query.add_where(QueryWhereType::Equal("f.photo_id".to_string(), Value::Text(photo_id)));
            }
            if let Some(person_id) = query.person_id {
                where_query.add_where(QueryWhereType::Equal("f.person_id".to_string(), Value::Text(person_id)));
            }
            if query.unassigned {
                where_query.add_where(QueryWhereType::IsNull("f.person_id".to_string()));
            }
            where_query.add_oder(OrderBuilder::new("f.rowid".to_string(), SqlOrder::ASC));

            let mut query = conn.prepare(&format!("SELECT {} FROM face_descriptors f INNER JOIN photos p ON p.id = f.photo_id {}{}", FACE_COLUMNS, where_query.format(), where_query.format_order()))?;
            let rows = query.query_map(where_query.values(), Self::row_to_face)?;
            let faces: Vec<FaceDescriptor> = rows.collect::<std::result::Result<Vec<FaceDescriptor>, rusqlite::Error>>()?;
            Ok(faces)
        }).await?;
        Ok(rows)
    }

    pub async fn get_faces_with_person(&self, photo_id: &str) -> Result<Vec<FaceWithPerson>> {
        let photo_id = photo_id.to_string();
        let rows = self.connection.call( move |conn| {
            let mut query = conn.prepare("SELECT f.id, f.photo_id, f.bbox, f.confidence, f.person_id, pe.name
                FROM face_descriptors f LEFT JOIN persons pe ON pe.id = f.person_id
                WHERE f.photo_id = ? ORDER BY f.rowid")?;
            let rows = query.query_map([photo_id], Self::row_to_face_with_person)?;
            let faces: Vec<FaceWithPerson> = rows.collect::<std::result::Result<Vec<FaceWithPerson>, rusqlite::Error>>()?;
            Ok(faces)
        }).await?;
        Ok(rows)
    }

    /// Returns the number of changed rows. With `only_unassigned` faces already holding a person are left untouched.
    /// Returns the ids actually changed, in input order
    pub async fn set_faces_person(&self, face_ids: Vec<String>, person_id: &str, only_unassigned: bool) -> Result<Vec<String>> {
        let person_id = person_id.to_string();
        let changed = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_update(Some(person_id), "person_id");
            where_query.add_where(QueryWhereType::In("id".to_string(), text_values(&face_ids)));
            if only_unassigned {
                where_query.add_where(QueryWhereType::IsNull("person_id".to_string()));
            }

            let update_sql = format!("UPDATE face_descriptors SET {} {} RETURNING id", where_query.format_update(), where_query.format());
            let mut query = conn.prepare(&update_sql)?;
            let rows = query.query_map(where_query.values(), |row| row.get::<_, String>(0))?;
            let changed: HashSet<String> = rows.collect::<std::result::Result<_, rusqlite::Error>>()?;
            Ok(face_ids.into_iter().filter(|id| changed.contains(id)).collect::<Vec<_>>())
        }).await?;
        Ok(changed)
    }
}
