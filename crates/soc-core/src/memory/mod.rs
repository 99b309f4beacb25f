//! Memory-map primitives: bus geometry and the hierarchical address registry.

/// Shared-bus widths and the native address-space contract.
pub mod geometry;
/// Address registry, windows, and address-ordered enumeration.
pub mod registry;

pub use geometry::{
    BusGeometry, GeometryError, MAX_DATA_WIDTH, NATIVE_ADDR_WIDTH, NATIVE_DATA_WIDTH,
    NATIVE_GRANULARITY,
};
pub use registry::{
    AddressRegistry, Lookup, MappedResource, MappedWindow, Resource, Resources, Window,
};
