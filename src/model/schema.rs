//! Model schemas: a name and where its records live.

use std::fmt;
use std::sync::Arc;

/// Default file name of a record's payload inside its directory.
pub const DEFAULT_DATA_FILENAME: &str = "data.json";

/// Maps a record id to the path of its payload.
pub type DataPathFn = Arc<dyn Fn(&ModelSchema, &str) -> String + Send + Sync>;

/// Describes a model registered with a workspace.
///
/// Records live at `<name lowercase>/<id>/<data_filename>` unless a custom
/// path function is set.
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    data_filename: String,
    data_path: Option<DataPathFn>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_filename: DEFAULT_DATA_FILENAME.to_string(),
            data_path: None,
        }
    }

    pub fn with_data_filename(mut self, filename: impl Into<String>) -> Self {
        self.data_filename = filename.into();
        self
    }

    /// Replace the default record path layout.
    pub fn with_data_path<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModelSchema, &str) -> String + Send + Sync + 'static,
    {
        self.data_path = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_filename(&self) -> &str {
        &self.data_filename
    }

    /// Path of the payload for record `id`.
    pub fn data_path(&self, id: &str) -> String {
        match &self.data_path {
            Some(f) => f(self, id),
            None => self.default_data_path(id),
        }
    }

    /// `<name lowercase>/<id>/<data_filename>`
    pub fn default_data_path(&self, id: &str) -> String {
        format!("{}/{}/{}", self.name.to_lowercase(), id, self.data_filename)
    }

    /// Lock id protecting record `id`.
    pub fn lock_id(&self, id: &str) -> String {
        format!("{}/{}", self.name.to_lowercase(), id)
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("data_filename", &self.data_filename)
            .field("custom_data_path", &self.data_path.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_path() {
        let schema = ModelSchema::new("Person");
        assert_eq!(schema.data_path("john-doe"), "person/john-doe/data.json");
        assert_eq!(schema.data_path("*"), "person/*/data.json");
        assert_eq!(schema.lock_id("john-doe"), "person/john-doe");
    }

    #[test]
    fn test_custom_data_path() {
        let schema = ModelSchema::new("Post")
            .with_data_filename("post.json")
            .with_data_path(|schema, id| format!("blog/{}/{}", id, schema.data_filename()));
        assert_eq!(schema.data_path("hello"), "blog/hello/post.json");
        assert_eq!(schema.default_data_path("hello"), "post/hello/post.json");
    }
}
