//! COSEM object model for DLMS/COSEM
//!
//! The protocol layers see objects only through [`CosemObject`]: an
//! attribute index goes in, a typed value comes out. This crate provides
//! that trait, the [`ObjectCollection`] a server exposes or a client reads
//! from an association, the class registry used when parsing object lists,
//! and the interface classes needed to run an association:
//!
//! - Data (Class ID: 1)
//! - Register (Class ID: 3)
//! - Profile Generic (Class ID: 7)
//! - Clock (Class ID: 8)
//! - Association SN (Class ID: 12)
//! - Association LN (Class ID: 15)
//!
//! Other classes are represented by [`GenericObject`].

pub mod association_ln;
pub mod association_sn;
pub mod clock;
pub mod collection;
pub mod data;
pub mod generic;
pub mod object;
pub mod object_list;
pub mod profile_generic;
pub mod register;
pub mod registry;

pub use association_ln::AssociationLn;
pub use association_sn::AssociationSn;
pub use clock::Clock;
pub use collection::{ObjectCollection, SnTarget};
pub use data::Data;
pub use generic::GenericObject;
pub use object::{CosemObject, ObjectBase, Selection};
pub use object_list::{parse_object_list, ObjectDescriptor};
pub use profile_generic::{CaptureObject, ProfileGeneric, SELECTOR_ENTRY, SELECTOR_RANGE};
pub use register::{Register, ScalerUnit};
pub use registry::create_object;
