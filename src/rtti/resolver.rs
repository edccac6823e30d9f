// Thu Jan 16 2026 - Alex

use crate::memory::{Address, StringEncoding, TypedMemory};
use crate::rtti::layout::{RttiLayout, MAX_BASE_CLASSES, MAX_NAME_LENGTH};
use crate::symbol::{MsvcDemangler, SymbolDemangler};
use ahash::AHashMap;
use itertools::Itertools;
use parking_lot::RwLock;
use std::sync::Arc;

/// Recovers `"Derived : Base : ..."` chains from MSVC RTTI next to an
/// object's vtable.
///
/// Anything that does not look like RTTI yields `None`; nothing here
/// reports an error. Results are cached per instance address.
pub struct RttiResolver {
    memory: Arc<TypedMemory>,
    layout: RttiLayout,
    demangler: Box<dyn SymbolDemangler>,
    cache: RwLock<AHashMap<u64, Option<String>>>,
    name_max_len: usize,
    max_base_classes: i32,
}

impl RttiResolver {
    pub fn new(memory: Arc<TypedMemory>) -> Self {
        let layout = RttiLayout::for_width(memory.width());
        Self {
            memory,
            layout,
            demangler: Box::new(MsvcDemangler),
            cache: RwLock::new(AHashMap::new()),
            name_max_len: MAX_NAME_LENGTH,
            max_base_classes: MAX_BASE_CLASSES,
        }
    }

    pub fn with_demangler(mut self, demangler: Box<dyn SymbolDemangler>) -> Self {
        self.demangler = demangler;
        self
    }

    pub fn with_name_max_len(mut self, len: usize) -> Self {
        self.name_max_len = len;
        self
    }

    pub fn with_max_base_classes(mut self, max: i32) -> Self {
        self.max_base_classes = max;
        self
    }

    pub fn layout(&self) -> RttiLayout {
        self.layout
    }

    pub fn resolve(&self, instance: Address) -> Option<String> {
        let width = self.memory.width();
        if !instance.is_plausible(width) {
            return None;
        }
        if let Some(cached) = self.cache.read().get(&instance.as_u64()) {
            return cached.clone();
        }

        let locator = self.memory.read_address(instance - self.memory.pointer_size()).ok()?;
        if !locator.is_plausible(width) {
            return None;
        }

        let chain = if self.layout.is_relative() {
            self.walk_relative(locator)
        } else {
            self.walk_absolute(locator)
        };
        log::debug!("RTTI at {}: {:?}", instance, chain);

        self.cache.write().insert(instance.as_u64(), chain.clone());
        chain
    }

    pub fn cached(&self, instance: Address) -> Option<Option<String>> {
        self.cache.read().get(&instance.as_u64()).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn count_ok(&self, count: i32) -> bool {
        count > 0 && count < self.max_base_classes
    }

    fn walk_absolute(&self, locator: Address) -> Option<String> {
        let width = self.memory.width();
        let layout = self.layout;

        let hierarchy = self.memory.read_address(locator + layout.hierarchy_descriptor).ok()?;
        if !hierarchy.is_plausible(width) {
            return None;
        }
        let count = self.memory.read::<i32>(hierarchy + layout.base_class_count).ok()?;
        if !self.count_ok(count) {
            log::warn!("Rejecting base class count {} at {}", count, hierarchy);
            return None;
        }
        let array = self.memory.read_address(hierarchy + layout.base_class_array).ok()?;
        if !array.is_plausible(width) {
            return None;
        }

        let mut names = Vec::new();
        for i in 0..count as u64 {
            let descriptor = self.read_plausible(array + i * layout.array_stride);
            let Some(type_descriptor) = descriptor.and_then(|d| self.read_plausible(d)) else {
                break;
            };
            let Some(name) = self.type_name(type_descriptor + layout.type_name) else {
                break;
            };
            names.push(name);
        }
        Self::join(names)
    }

    fn walk_relative(&self, locator: Address) -> Option<String> {
        let layout = self.layout;
        let self_rva = self.read_rva(locator + layout.self_offset?)?;
        let image_base = locator.offset(-self_rva);

        let hierarchy = image_base.offset(self.read_rva(locator + layout.hierarchy_descriptor)?);
        let count = self.memory.read::<i32>(hierarchy + layout.base_class_count).ok()?;
        if !self.count_ok(count) {
            log::warn!("Rejecting base class count {} at {}", count, hierarchy);
            return None;
        }
        let array = image_base.offset(self.read_rva(hierarchy + layout.base_class_array)?);

        let mut names = Vec::new();
        for i in 0..count as u64 {
            let descriptor = self
                .read_rva(array + i * layout.array_stride)
                .map(|rva| image_base.offset(rva));
            let type_descriptor = descriptor
                .and_then(|d| self.read_rva(d))
                .map(|rva| image_base.offset(rva));
            let Some(type_descriptor) = type_descriptor else {
                break;
            };
            let Some(name) = self.type_name(type_descriptor + layout.type_name) else {
                break;
            };
            if name.is_empty() {
                break;
            }
            names.push(name);
        }
        Self::join(names)
    }

    fn read_plausible(&self, addr: Address) -> Option<Address> {
        let value = self.memory.read_address(addr).ok()?;
        value.is_plausible(self.memory.width()).then_some(value)
    }

    /// Non-zero 32-bit image-relative offset.
    fn read_rva(&self, addr: Address) -> Option<i64> {
        match self.memory.read::<i32>(addr).ok()? {
            0 => None,
            rva => Some(rva as i64),
        }
    }

    fn type_name(&self, addr: Address) -> Option<String> {
        let name = self
            .memory
            .read_string_with_len(addr, StringEncoding::Utf8, self.name_max_len)
            .ok()?;
        if name.ends_with("@@") {
            let decorated = format!("?{}", name);
            return Some(self.demangler.demangle(&decorated).unwrap_or(name));
        }
        Some(name)
    }

    fn join(names: Vec<String>) -> Option<String> {
        if names.is_empty() {
            None
        } else {
            Some(names.into_iter().join(" : "))
        }
    }
}
