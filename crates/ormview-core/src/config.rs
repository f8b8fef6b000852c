//! Metadata configuration and customization hooks.

use ormview_proto::{ScalarType, TypeName, View};
use std::fmt;
use std::sync::Arc;

/// Replaces a computed class storage name, e.g. to add a schema qualifier.
pub trait StorageNameOverride: Send + Sync {
    /// Return the replacement name, or `None` to keep `original`.
    fn class_storage_name(&self, class: &TypeName, original: &str) -> Option<String>;
}

impl<F> StorageNameOverride for F
where
    F: Fn(&TypeName, &str) -> Option<String> + Send + Sync,
{
    fn class_storage_name(&self, class: &TypeName, original: &str) -> Option<String> {
        self(class, original)
    }
}

/// Post-processes a view handed out by the view cache.
///
/// Receives a copy; the cached original is never visible to the tuner.
pub trait ViewTuner: Send + Sync {
    /// Return the view to hand out.
    fn tune(&self, view_name: &str, class: &TypeName, view: View) -> View;
}

impl<F> ViewTuner for F
where
    F: Fn(&str, &TypeName, View) -> View + Send + Sync,
{
    fn tune(&self, view_name: &str, class: &TypeName, view: View) -> View {
        self(view_name, class, view)
    }
}

/// Supplies the primary key type of a class.
pub trait KeyTypeProvider: Send + Sync {
    /// Key type of `class`; `declared` is the type declared on its chain.
    fn key_type(&self, class: &TypeName, declared: Option<&ScalarType>) -> ScalarType;
}

/// Uses the declared key type, falling back to UUID keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredKeyType;

impl KeyTypeProvider for DeclaredKeyType {
    fn key_type(&self, _class: &TypeName, declared: Option<&ScalarType>) -> ScalarType {
        declared.cloned().unwrap_or(ScalarType::Uuid)
    }
}

/// Configuration for [`Metadata`](crate::Metadata).
#[derive(Clone)]
pub struct MetadataConfig {
    /// Class storage name hook.
    pub storage_name_override: Option<Arc<dyn StorageNameOverride>>,
    /// View post-processing hook.
    pub view_tuner: Option<Arc<dyn ViewTuner>>,
    /// Primary key type provider.
    pub key_type_provider: Arc<dyn KeyTypeProvider>,
    /// Memoize lookups. Disable while the registry is being edited.
    pub cache_enabled: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            storage_name_override: None,
            view_tuner: None,
            key_type_provider: Arc::new(DeclaredKeyType),
            cache_enabled: true,
        }
    }
}

impl fmt::Debug for MetadataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataConfig")
            .field("storage_name_override", &self.storage_name_override.is_some())
            .field("view_tuner", &self.view_tuner.is_some())
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}

impl MetadataConfig {
    /// Create a configuration with no hooks and caching enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the class storage name hook.
    pub fn storage_name_override(mut self, hook: impl StorageNameOverride + 'static) -> Self {
        self.storage_name_override = Some(Arc::new(hook));
        self
    }

    /// Set the view tuning hook.
    pub fn view_tuner(mut self, hook: impl ViewTuner + 'static) -> Self {
        self.view_tuner = Some(Arc::new(hook));
        self
    }

    /// Set the key type provider.
    pub fn key_type_provider(mut self, provider: impl KeyTypeProvider + 'static) -> Self {
        self.key_type_provider = Arc::new(provider);
        self
    }

    /// Enable or disable memoization.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }
}
