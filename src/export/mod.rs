//! Model persistence
//!
//! Fitted estimators are written as checksummed bincode artifacts with a
//! metadata header describing the selection that produced them.

mod serializer;

pub use serializer::{load_object, save_object, ModelMetadata, SerializedModel};
