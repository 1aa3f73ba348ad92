//! Object storage backends

mod ephemeral;
mod filesystem;
mod s3;
mod spool;
mod traits;


pub use ephemeral::{EphemeralStorage, DEFAULT_CONTENT_TYPE};
pub use filesystem::FileSystemStorage;
pub use s3::{S3Options, S3Storage};
pub use traits::{ObjectBackend, ObjectMetadata, ObjectReader, ObjectWriter, StorageError};
