pub mod photos;
pub mod faces;
pub mod persons;

use rusqlite::{params_from_iter, types::{Type, Value}, ParamsFromIter, Row};
use serde::{de::DeserializeOwned, Serialize};
use tokio_rusqlite::Connection;

use crate::tools::log::{log_info, LogServiceType};

use super::Result;


pub async fn migrate_database(connection: &Connection) -> Result<usize> {
    let version = connection.call( |conn| {
        let mut version = conn.query_row(
            "SELECT user_version FROM pragma_user_version;",
            [],
            |row| {
                let version: usize = row.get(0)?;
                Ok(version)
            })?;

            if version < 1 {
                let initial = include_str!("001 - INITIAL.sql");
                conn.execute_batch(initial)?;
                version = 1;
                conn.pragma_update(None, "user_version", version)?;
                log_info(LogServiceType::Database, format!("Update Database to version: {}", version));
            }

            Ok(version)
    }).await?;

    Ok(version)
}


pub enum QueryWhereType {
    Equal(String, Value),
    IsNull(String),
    In(String, Vec<Value>),
    Static(String),
}

impl QueryWhereType {
    pub fn expand(&self) -> (String, Vec<Value>) {
        match self {
            QueryWhereType::Equal(name, value) => (format!("{} = ?", name), vec![value.clone()]),
            QueryWhereType::IsNull(name) => (format!("{} IS NULL", name), vec![]),
            QueryWhereType::In(name, values) => {
                if values.is_empty() {
                    // an empty list matches nothing
                    ("0".to_string(), vec![])
                } else {
                    let marks = vec!["?"; values.len()].join(", ");
                    (format!("{} IN ({})", name, marks), values.clone())
                }
            },
            QueryWhereType::Static(s) => (s.to_string(), vec![]),
        }
    }
}

pub enum SqlOrder {
    ASC,
    DESC
}

pub struct OrderBuilder {
    column: String,
    order: SqlOrder
}

impl OrderBuilder {
    pub fn new(column: String, order: SqlOrder) -> Self {
        OrderBuilder { column, order }
    }
    pub fn format(&self) -> String {
        match self.order {
            SqlOrder::ASC => self.column.clone(),
            SqlOrder::DESC => format!("{} DESC", self.column),
        }
    }
}

#[derive(Default)]
pub struct QueryBuilder {
    wheres: Vec<QueryWhereType>,

    columns_update: Vec<String>,
    values_update: Vec<Value>,

    columns_orders: Vec<OrderBuilder>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_update<T: Into<Value>>(&mut self, optional: Option<T>, column: &str) {
        if let Some(value) = optional {
            self.columns_update.push(format!("{} = ?", column));
            self.values_update.push(value.into());
        }
    }

    pub fn has_updates(&self) -> bool {
        !self.columns_update.is_empty()
    }

    pub fn add_where(&mut self, kind: QueryWhereType) {
        self.wheres.push(kind);
    }

    pub fn format_update(&self) -> String {
        self.columns_update.join(", ")
    }

    pub fn format(&self) -> String {
        if !self.wheres.is_empty() {
            let columns: Vec<String> = self.wheres.iter().map(|w| w.expand().0).collect();
            format!("WHERE {}", columns.join(" and "))
        } else {
            "".to_string()
        }
    }

    pub fn add_oder(&mut self, order: OrderBuilder) {
        self.columns_orders.push(order);
    }

    pub fn format_order(&self) -> String {
        if !self.columns_orders.is_empty() {
            format!(" ORDER BY {}", self.columns_orders.iter().map(|o| o.format()).collect::<Vec<String>>().join(", "))
        } else {
            "".to_string()
        }
    }

    /// Update values first, then where values, matching the placeholders of `UPDATE .. SET .. WHERE ..`
    pub fn values(&self) -> ParamsFromIter<Vec<Value>> {
        let mut all_values = self.values_update.clone();
        for w in &self.wheres {
            let (_, mut v) = w.expand();
            all_values.append(&mut v);
        }
        params_from_iter(all_values)
    }
}

pub fn text_values(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.clone())).collect()
}


pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn embedding_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

pub fn to_json_text<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub fn deserialize_from_row<T: DeserializeOwned>(row: &Row, index: usize) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    serde_json::from_str::<T>(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub fn deserialize_optional_from_row<T: DeserializeOwned>(row: &Row, index: usize) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(index)?;
    match text {
        Some(text) => serde_json::from_str::<T>(&text).map(Some).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}
