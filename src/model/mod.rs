//! Models: typed records stored as blobs in a workspace.
//!
//! A model is registered with a workspace through a [`ModelSchema`] and
//! used through the returned [`ModelHandle`]. Records are any serde type
//! implementing [`Record`]; they are stored as a JSON envelope naming the
//! model, at `<model>/<id>/data.json` by default.
//!
//! ```ignore
//! let people = ws.register_model::<Person>(ModelSchema::new("Person"));
//! people.save_and_commit(&mut ws, &john, "add john", None, None)?;
//! let john = people.get(&ws, "john-doe")?;
//! ```

mod codec;
mod error;
mod handle;
mod schema;

pub use codec::{decode, encode};
pub use error::{ModelError, ModelResult};
pub use handle::{ModelHandle, Record};
pub use schema::{DataPathFn, ModelSchema, DEFAULT_DATA_FILENAME};
