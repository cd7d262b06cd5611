//! SHIP Core - Core types for installing infrastructure component bundles
//!
//! This crate provides the foundational types used throughout SHIP:
//! - `Component`: A chart plus the manifests applied around its installation
//! - `ResourceRef`: A cluster resource that installation steps wait on
//! - `Bundle`: The ordered component list loaded from configuration
//! - `substitute_domain`: `${domain}` placeholder expansion for chart overrides

pub mod bundle;
pub mod component;
pub mod error;
pub mod values;

pub use bundle::{Bundle, BundleSettings, ChartFailurePolicy, ChartRepository};
pub use component::{
    ChartSpec, Component, LifecycleResource, ReadinessCondition, ResourceKind, ResourceRef,
};
pub use error::{CoreError, Result};
pub use values::{DOMAIN_PLACEHOLDER, resolve_overrides, substitute_domain};
