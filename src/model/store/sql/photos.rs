use rusqlite::{params, types::Value, OptionalExtension, Row};

use crate::{domain::photo::{Photo, PhotoForInsert, PhotoForUpdate}, model::store::SqliteStore};

use super::{text_values, OrderBuilder, QueryBuilder, QueryWhereType, SqlOrder};
use crate::model::error::Result;

const PHOTO_COLUMNS: &str = "id, user_id, name, storage_ref, mime_type, thumbnail_url, person_tag, created";

impl SqliteStore {

    pub(super) fn row_to_photo(row: &Row) -> rusqlite::Result<Photo> {
        Ok(Photo {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            storage_ref: row.get(3)?,
            mime_type: row.get(4)?,
            thumbnail_url: row.get(5)?,
            person_tag: row.get(6)?,
            created: row.get(7)?,
        })
    }

    pub async fn add_photo(&self, photo: PhotoForInsert) -> Result<()> {
        self.connection.call( move |conn| {
            conn.execute(&format!("INSERT INTO photos ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)", PHOTO_COLUMNS), params![
                photo.id,
                photo.user_id,
                photo.name,
                photo.storage_ref,
                photo.mime_type,
                photo.thumbnail_url,
                photo.person_tag,
                photo.created
            ])?;
            Ok(())
        }).await?;
        Ok(())
    }

    pub async fn get_photo(&self, photo_id: &str) -> Result<Option<Photo>> {
        let photo_id = photo_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare(&format!("SELECT {} FROM photos WHERE id = ?", PHOTO_COLUMNS))?;
            let row = query.query_row([photo_id], Self::row_to_photo).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    /// Photo only when owned by `user_id`
    pub async fn get_user_photo(&self, photo_id: &str, user_id: &str) -> Result<Option<Photo>> {
        let photo_id = photo_id.to_string();
        let user_id = user_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut query = conn.prepare(&format!("SELECT {} FROM photos WHERE id = ? and user_id = ?", PHOTO_COLUMNS))?;
            let row = query.query_row([photo_id, user_id], Self::row_to_photo).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    pub async fn get_photos_by_ids(&self, ids: Vec<String>, user_id: &str) -> Result<Vec<Photo>> {
        let user_id = user_id.to_string();
        let rows = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_where(QueryWhereType::In("id".to_string(), text_values(&ids)));
            where_query.add_where(QueryWhereType::Equal("user_id".to_string(), Value::Text(user_id)));

            let mut query = conn.prepare(&format!("SELECT {} FROM photos {}", PHOTO_COLUMNS, where_query.format()))?;
            let rows = query.query_map(where_query.values(), Self::row_to_photo)?;
            let photos: Vec<Photo> = rows.collect::<std::result::Result<Vec<Photo>, rusqlite::Error>>()?;
            Ok(photos)
        }).await?;
        Ok(rows)
    }

    /// Returns the number of changed rows
    pub async fn update_photo(&self, photo_id: &str, user_id: &str, update: PhotoForUpdate) -> Result<usize> {
        let photo_id = photo_id.to_string();
        let user_id = user_id.to_string();
        let changed = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_update(update.person.map(|p| {
                let p = p.trim().to_string();
                if p.is_empty() { Value::Null } else { Value::Text(p) }
            }), "person_tag");
            where_query.add_update(update.name, "name");
            where_query.add_update(update.thumbnail_url, "thumbnail_url");
            if !where_query.has_updates() {
                return Ok(0);
            }
            where_query.add_where(QueryWhereType::Equal("id".to_string(), Value::Text(photo_id)));
            where_query.add_where(QueryWhereType::Equal("user_id".to_string(), Value::Text(user_id)));

            let update_sql = format!("UPDATE photos SET {} {}", where_query.format_update(), where_query.format());
            let changed = conn.execute(&update_sql, where_query.values())?;
            Ok(changed)
        }).await?;
        Ok(changed)
    }

    /// Sets `person_tag` on the listed photos of the user that do not have one yet
    pub async fn set_person_tag_if_null(&self, photo_ids: Vec<String>, person_name: &str, user_id: &str) -> Result<usize> {
        let person_name = person_name.to_string();
        let user_id = user_id.to_string();
        let changed = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_update(Some(person_name), "person_tag");
            where_query.add_where(QueryWhereType::In("id".to_string(), text_values(&photo_ids)));
            where_query.add_where(QueryWhereType::Equal("user_id".to_string(), Value::Text(user_id)));
            where_query.add_where(QueryWhereType::IsNull("person_tag".to_string()));

            let update_sql = format!("UPDATE photos SET {} {}", where_query.format_update(), where_query.format());
            let changed = conn.execute(&update_sql, where_query.values())?;
            Ok(changed)
        }).await?;
        Ok(changed)
    }

    pub async fn get_person_tags(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        let tags = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_where(QueryWhereType::Equal("user_id".to_string(), Value::Text(user_id)));
            where_query.add_where(QueryWhereType::Static("person_tag IS NOT NULL".to_string()));
            where_query.add_oder(OrderBuilder::new("person_tag".to_string(), SqlOrder::ASC));

            let mut query = conn.prepare(&format!("SELECT DISTINCT person_tag FROM photos {}{}", where_query.format(), where_query.format_order()))?;
            let rows = query.query_map(where_query.values(), |row| row.get::<_, String>(0))?;
            let tags: Vec<String> = rows.collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;
            Ok(tags)
        }).await?;
        Ok(tags)
    }
}
