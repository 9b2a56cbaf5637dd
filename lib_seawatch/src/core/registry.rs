//! # Layer Registry
//!
//! A closed table mapping each track-type tag to its [`Handler`]: the layer it
//! renders into, its static z-index, its style function, an optional icon
//! initializer and whether it feeds the heatmap. Built once at startup through
//! [`RegistryBuilder`] and immutable afterwards.
//!
//! Every registration returns a [`LayerHandle`], the capability to toggle that
//! layer's visibility. Callers that need to hide a layer get the handle passed
//! to them; nothing reaches layers through global state.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::feature::TypeTag;
use crate::core::render::{LayerHandle, LayerId, LayerSpec, RenderFeature};
use crate::core::styles::StyleParams;

/// Type tag of the fallback handler used for unregistered tags.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Computes base style parameters for a feature at a view resolution.
pub type StyleFn = fn(&RenderFeature, f64) -> StyleParams;

/// Names the image a feature needs loaded before it can be styled.
pub type IconInitializer = fn(&RenderFeature) -> Option<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("type tag '{0}' is already registered")]
    Duplicate(TypeTag),

    #[error("no handler for type tag '{0}' and no '{UNKNOWN_TYPE}' fallback")]
    Unhandled(TypeTag),
}

/// What a caller supplies to register a track type.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub type_tag: TypeTag,
    /// Group used for custom-icon lookup and redraws (e.g. `"ais"` covers
    /// terrestrial and satellite AIS).
    pub track_group: String,
    pub z_index: i32,
    pub style_fn: StyleFn,
    pub icon_initializer: Option<IconInitializer>,
    pub heatmap_member: bool,
}

/// A registered track type bound to its layer.
#[derive(Debug, Clone)]
pub struct Handler {
    pub type_tag: TypeTag,
    pub track_group: String,
    pub layer: LayerId,
    pub z_index: i32,
    pub style_fn: StyleFn,
    pub icon_initializer: Option<IconInitializer>,
    pub heatmap_member: bool,
}

/// A resolved handler, flagged when it came from the fallback.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub handler: Arc<Handler>,
    pub fallback: bool,
}

/// Collects registrations and hands out layer capabilities.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    handlers: HashMap<TypeTag, Arc<Handler>>,
    layers: Vec<(LayerSpec, LayerHandle)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a track type with a layer of its own.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<LayerHandle, RegistryError> {
        if self.handlers.contains_key(&descriptor.type_tag) {
            return Err(RegistryError::Duplicate(descriptor.type_tag));
        }
        let layer = self.layers.len() as LayerId + 1;
        let spec = LayerSpec {
            id: layer,
            name: descriptor.type_tag.clone(),
            z_index: descriptor.z_index,
        };
        let handle = LayerHandle::new(layer, descriptor.type_tag.clone());
        self.layers.push((spec, handle.clone()));

        let handler = Handler {
            type_tag: descriptor.type_tag.clone(),
            track_group: descriptor.track_group,
            layer,
            z_index: descriptor.z_index,
            style_fn: descriptor.style_fn,
            icon_initializer: descriptor.icon_initializer,
            heatmap_member: descriptor.heatmap_member,
        };
        log::debug!("Registered '{}' on layer {} (z {})", handler.type_tag, layer, handler.z_index);
        self.handlers.insert(descriptor.type_tag, Arc::new(handler));
        Ok(handle)
    }

    pub fn build(self) -> LayerRegistry {
        LayerRegistry {
            handlers: self.handlers,
            layers: self.layers,
        }
    }
}

/// The immutable type-tag table.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    handlers: HashMap<TypeTag, Arc<Handler>>,
    layers: Vec<(LayerSpec, LayerHandle)>,
}

impl LayerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get(&self, type_tag: &str) -> Option<&Arc<Handler>> {
        self.handlers.get(type_tag)
    }

    /// Looks up a handler, falling back to [`UNKNOWN_TYPE`] when registered.
    pub fn resolve(&self, type_tag: &str) -> Result<Resolved, RegistryError> {
        if let Some(handler) = self.handlers.get(type_tag) {
            return Ok(Resolved {
                handler: Arc::clone(handler),
                fallback: false,
            });
        }
        self.handlers
            .get(UNKNOWN_TYPE)
            .map(|handler| Resolved {
                handler: Arc::clone(handler),
                fallback: true,
            })
            .ok_or_else(|| RegistryError::Unhandled(type_tag.to_string()))
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<Handler>> {
        self.handlers.values()
    }

    /// Handlers whose track group is `group`.
    pub fn handlers_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Arc<Handler>> + 'a {
        self.handlers.values().filter(move |h| h.track_group == group)
    }

    /// Layer specs with their capabilities, in registration order.
    pub fn layers(&self) -> &[(LayerSpec, LayerHandle)] {
        &self.layers
    }

    /// The visibility capability for a type's layer.
    pub fn handle(&self, type_tag: &str) -> Option<LayerHandle> {
        let layer = self.handlers.get(type_tag)?.layer;
        self.layers
            .iter()
            .find(|(spec, _)| spec.id == layer)
            .map(|(_, handle)| handle.clone())
    }

    /// Highest static z-index among base layers.
    pub fn max_z_index(&self) -> i32 {
        self.layers.iter().map(|(spec, _)| spec.z_index).max().unwrap_or(0)
    }
}
