pub(crate) mod document;
mod model;
mod names;
mod uuid;

pub use self::document::{decode, encode, load, store};
pub use self::model::{Characteristic, Device, Property, PropertySet, Requirement, Service};
pub use self::names::UuidNames;
pub use self::uuid::GattUuid;
