//! The objects a server exposes or a client has learned from an object list

use crate::object::CosemObject;
use crate::object_list::ObjectDescriptor;
use cosem_core::{ObisCode, ObjectType};

/// What a short name points at inside an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnTarget {
    Attribute(u8),
    Method(u8),
}

#[derive(Debug, Default)]
pub struct ObjectCollection {
    objects: Vec<Box<dyn CosemObject>>,
}

impl ObjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: CosemObject + 'static>(&mut self, object: T) {
        self.objects.push(Box::new(object));
    }

    pub fn push_boxed(&mut self, object: Box<dyn CosemObject>) {
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn CosemObject + 'static)> {
        self.objects.iter().map(|o| o.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn CosemObject>> {
        self.objects.iter_mut()
    }

    pub fn get(&self, position: usize) -> Option<&dyn CosemObject> {
        self.objects.get(position).map(|o| o.as_ref())
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut (dyn CosemObject + 'static)> {
        self.objects.get_mut(position).map(|o| o.as_mut())
    }

    fn position_by_ln(&self, object_type: ObjectType, logical_name: &ObisCode) -> Option<usize> {
        self.objects
            .iter()
            .position(|o| o.object_type() == object_type && o.logical_name() == *logical_name)
    }

    pub fn find_by_ln(
        &self,
        object_type: ObjectType,
        logical_name: &ObisCode,
    ) -> Option<&dyn CosemObject> {
        self.position_by_ln(object_type, logical_name)
            .and_then(|i| self.get(i))
    }

    pub fn find_by_ln_mut(
        &mut self,
        object_type: ObjectType,
        logical_name: &ObisCode,
    ) -> Option<&mut (dyn CosemObject + 'static)> {
        let position = self.position_by_ln(object_type, logical_name)?;
        self.get_mut(position)
    }

    /// Object whose base name is `short_name`.
    pub fn find_by_sn(&self, short_name: u16) -> Option<&dyn CosemObject> {
        self.iter()
            .find(|o| o.short_name() != 0 && o.short_name() == short_name)
    }

    /// Object and attribute or method addressed by a short name.
    ///
    /// Attribute `i` of an object with base name `b` is at `b + (i - 1) * 8`;
    /// methods start at the class specific offset of
    /// [`ObjectType::sn_action_info`].
    pub fn resolve_sn(&self, short_name: u16) -> Option<(usize, SnTarget)> {
        self.objects.iter().enumerate().find_map(|(position, object)| {
            let base = object.short_name();
            if base == 0 || short_name < base {
                return None;
            }
            let offset = short_name - base;
            if offset % 8 != 0 {
                return None;
            }
            let index = offset / 8 + 1;
            if index <= u16::from(object.attribute_count()) {
                return Some((position, SnTarget::Attribute(index as u8)));
            }
            let (first, count) = object.object_type().sn_action_info();
            if count == 0 || offset < first {
                return None;
            }
            let method = (offset - first) / 8 + 1;
            (method <= u16::from(count)).then_some((position, SnTarget::Method(method as u8)))
        })
    }

    pub fn descriptors(&self) -> Vec<ObjectDescriptor> {
        self.iter().map(|o| ObjectDescriptor::of(o)).collect()
    }

    /// Fill the object list of every association object with the current
    /// content of the collection.
    pub fn update_object_lists(&mut self) {
        let descriptors = self.descriptors();
        for object in &mut self.objects {
            if let Some(list) = object.object_list_mut() {
                list.clone_from(&descriptors);
            }
        }
    }
}

impl FromIterator<Box<dyn CosemObject>> for ObjectCollection {
    fn from_iter<I: IntoIterator<Item = Box<dyn CosemObject>>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association_ln::AssociationLn;
    use crate::clock::Clock;
    use crate::data::Data;
    use crate::register::{Register, ScalerUnit};
    use cosem_core::Value;

    fn sn_collection() -> ObjectCollection {
        let mut objects = ObjectCollection::new();
        let mut register = Register::new(
            ObisCode::new(1, 0, 1, 8, 0, 255),
            Value::UInt32(0),
            ScalerUnit::default(),
        );
        register.base_mut().short_name = 0x0100;
        objects.push(register);
        let mut clock = Clock::new(ObisCode::CLOCK);
        clock.base_mut().short_name = 0x0200;
        objects.push(clock);
        objects
    }

    #[test]
    fn test_find_by_ln() {
        let mut objects = sn_collection();
        assert!(objects.find_by_ln(ObjectType::Clock, &ObisCode::CLOCK).is_some());
        assert!(objects.find_by_ln(ObjectType::Data, &ObisCode::CLOCK).is_none());
        let clock = objects
            .find_by_ln_mut(ObjectType::Clock, &ObisCode::CLOCK)
            .unwrap();
        clock.base_mut().version = 1;
        assert_eq!(objects.get(1).unwrap().version(), 1);
    }

    #[test]
    fn test_resolve_sn() {
        let objects = sn_collection();
        assert_eq!(objects.find_by_sn(0x0200).unwrap().object_type(), ObjectType::Clock);
        assert_eq!(objects.resolve_sn(0x0100), Some((0, SnTarget::Attribute(1))));
        assert_eq!(objects.resolve_sn(0x0108), Some((0, SnTarget::Attribute(2))));
        assert_eq!(objects.resolve_sn(0x0128), Some((0, SnTarget::Method(1))));
        assert_eq!(objects.resolve_sn(0x0130), None);
        assert_eq!(objects.resolve_sn(0x0240), Some((1, SnTarget::Attribute(9))));
        assert_eq!(objects.resolve_sn(0x0260 + 5 * 8), Some((1, SnTarget::Method(6))));
        assert_eq!(objects.resolve_sn(0x0104), None);
        assert_eq!(objects.resolve_sn(0x0050), None);
    }

    #[test]
    fn test_update_object_lists() {
        let mut objects = ObjectCollection::new();
        objects.push(AssociationLn::new(ObisCode::CURRENT_ASSOCIATION));
        objects.push(Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None));
        objects.update_object_lists();
        let association = objects.get_mut(0).unwrap();
        let list = association.object_list_mut().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].object_type, ObjectType::Data);
    }
}
