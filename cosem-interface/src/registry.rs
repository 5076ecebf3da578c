//! Interface class registry

use crate::association_ln::AssociationLn;
use crate::association_sn::AssociationSn;
use crate::clock::Clock;
use crate::data::Data;
use crate::object::CosemObject;
use crate::profile_generic::ProfileGeneric;
use crate::register::{Register, ScalerUnit};
use cosem_core::{ObisCode, ObjectType, Value};

/// Create an empty object of `object_type`, `None` when the class has no
/// implementation.
pub fn create_object(object_type: ObjectType, logical_name: ObisCode) -> Option<Box<dyn CosemObject>> {
    let object: Box<dyn CosemObject> = match object_type {
        ObjectType::Data => Box::new(Data::new(logical_name, Value::None)),
        ObjectType::Register => Box::new(Register::new(
            logical_name,
            Value::None,
            ScalerUnit::default(),
        )),
        ObjectType::Clock => Box::new(Clock::new(logical_name)),
        ObjectType::ProfileGeneric => Box::new(ProfileGeneric::new(logical_name)),
        ObjectType::AssociationLogicalName => Box::new(AssociationLn::new(logical_name)),
        ObjectType::AssociationShortName => Box::new(AssociationSn::new(logical_name)),
        _ => return None,
    };
    Some(object)
}
