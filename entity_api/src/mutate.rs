use crate::error::Error;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Value,
};
use std::collections::HashMap;

/// Applies an `UpdateMap` to an active model and writes it.
///
/// Only the columns present in the map are touched; every other field keeps the
/// value it had in `active_model`.
pub async fn update<A, C>(
    db: &DatabaseConnection,
    mut active_model: A,
    update_map: UpdateMap,
) -> Result<<A::Entity as EntityTrait>::Model, Error>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    C: ColumnTrait,
    A::Entity: EntityTrait<Column = C>,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    for column in C::iter() {
        if let Some(value) = update_map.get(&column.to_string()) {
            active_model.set(column, value.clone());
        }
    }
    Ok(active_model.update(db).await?)
}

/// Column name to new value. A `None` value means the key is present but carries
/// nothing to write.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateMap {
    map: HashMap<String, Option<Value>>,
}

impl UpdateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).and_then(|opt| opt.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Column names present in the map.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key).and_then(|opt| opt)
    }

    /// Inserts a key-value pair, overwriting any previous value.
    pub fn insert(&mut self, key: String, value: Option<Value>) {
        self.map.insert(key, value);
    }
}

/// Conversion of a typed patch into column/value pairs.
pub trait IntoUpdateMap {
    fn into_update_map(self) -> UpdateMap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_skips_keys_without_value() {
        let mut map = UpdateMap::new();
        map.insert("posted".to_string(), Some(Value::Bool(Some(true))));
        map.insert("generated_reply".to_string(), None);

        assert_eq!(map.get("posted"), Some(&Value::Bool(Some(true))));
        assert_eq!(map.get("generated_reply"), None);
        assert!(map.contains_key("generated_reply"));

        let mut keys: Vec<&str> = map.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["generated_reply", "posted"]);
    }

    #[test]
    fn remove_returns_the_value() {
        let mut map = UpdateMap::new();
        map.insert("rating".to_string(), Some(Value::Int(Some(4))));
        assert_eq!(map.remove("rating"), Some(Value::Int(Some(4))));
        assert!(map.is_empty());
    }
}
