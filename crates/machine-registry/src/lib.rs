//! Process-wide constructor registry: `(API, Model) -> Constructor`, plus
//! weak-dependency matchers, discovery probes, and instance caps.

mod attribute;
mod constructor;
mod deps;
mod discover;
mod error;
mod registration;
mod registry;
mod weak;

pub use attribute::{AttributeMapConverter, PassthroughConverter};
pub use constructor::Constructor;
pub use deps::Dependencies;
pub use discover::Discover;
pub use error::RegistryError;
pub use registration::{Registration, RegistrationKey};
pub use registry::Registry;
pub use weak::WeakMatcher;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
