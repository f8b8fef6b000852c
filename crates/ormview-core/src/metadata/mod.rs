//! Metadata cache.
//!
//! [`Metadata`] answers per-class and per-property questions (storage names,
//! flags, usage types, captions, loading order) from a [`ClassRegistry`] and
//! memoizes every answer in concurrent caches. It is `Send + Sync` and meant
//! to be shared behind an `Arc`.
//!
//! Lookups in this module take a simple property name. Dotted paths are
//! resolved by [`PathResolver`](crate::resolver::PathResolver).

mod cache;
mod loading;

pub use cache::{CacheInfo, CacheStats, FactCache, FactInfo, FactKey, FactKind, Qualifier};

use crate::catalog::{ClassDef, ClassRegistry, EngineExpression, PropertyDef, StorageName};
use crate::compiler::ViewCompiler;
use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::expression::ExpressionResolver;
use crate::resolver::{PathResolver, ResolvedProperty};
use crate::views::ViewCatalog;
use ormview_proto::{PropertyType, ScalarType, TypeName, View, PRIMARY_KEY};
use tracing::debug;

/// Default primary key column.
pub const DEFAULT_PRIMARY_KEY_STORAGE_NAME: &str = "primaryKey";

/// Memoizing metadata lookup over a class registry.
#[derive(Debug)]
pub struct Metadata {
    registry: ClassRegistry,
    config: MetadataConfig,
    strings: FactCache<String>,
    pub(crate) optional_strings: FactCache<Option<String>>,
    flags: FactCache<bool>,
    lengths: FactCache<Option<u32>>,
    key_types: FactCache<ScalarType>,
    property_types: FactCache<PropertyType>,
    classes: FactCache<TypeName>,
    type_lists: FactCache<Vec<TypeName>>,
    name_lists: FactCache<Vec<String>>,
    storage_names: FactCache<StorageName>,
    pub(crate) resolved: FactCache<ResolvedProperty>,
    pub(crate) views: FactCache<Option<View>>,
}

impl Metadata {
    /// Create a metadata cache over `registry`.
    pub fn new(registry: ClassRegistry, config: MetadataConfig) -> Self {
        Self {
            registry,
            config,
            strings: FactCache::new(),
            optional_strings: FactCache::new(),
            flags: FactCache::new(),
            lengths: FactCache::new(),
            key_types: FactCache::new(),
            property_types: FactCache::new(),
            classes: FactCache::new(),
            type_lists: FactCache::new(),
            name_lists: FactCache::new(),
            storage_names: FactCache::new(),
            resolved: FactCache::new(),
            views: FactCache::new(),
        }
    }

    /// Create a metadata cache with the default configuration.
    pub fn with_registry(registry: ClassRegistry) -> Self {
        Self::new(registry, MetadataConfig::default())
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Path resolver over this cache.
    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self)
    }

    /// View compiler over this cache.
    pub fn compiler(&self) -> ViewCompiler<'_> {
        ViewCompiler::new(self)
    }

    /// Expression resolver over this cache.
    pub fn expressions(&self) -> ExpressionResolver<'_> {
        ExpressionResolver::new(self)
    }

    /// View cache over this cache.
    pub fn views(&self) -> ViewCatalog<'_> {
        ViewCatalog::new(self)
    }

    /// Check if facts about `class` may be memoized.
    pub(crate) fn cacheable(&self, class: &TypeName) -> bool {
        self.config.cache_enabled && !self.registry.class(class.as_str()).is_some_and(|c| c.ephemeral)
    }

    fn class_def(&self, class: &TypeName) -> Result<&ClassDef> {
        self.registry.get_class(class)
    }

    /// First value found walking from `class` to its root.
    fn inherited<T>(&self, class: &TypeName, pick: impl Fn(&ClassDef) -> Option<T>) -> Result<Option<T>> {
        Ok(self.registry.base_chain(class)?.into_iter().find_map(pick))
    }

    fn property_def(&self, class: &TypeName, property: &str) -> Result<(&ClassDef, &PropertyDef)> {
        self.registry.find_property(class, property)
    }

    // Class facts

    /// Table name of a class: the declared name or the short class name,
    /// passed through the storage name hook.
    pub fn class_storage_name(&self, class: &TypeName) -> Result<String> {
        let key = FactKey::class(FactKind::ClassStorageName, class);
        self.strings.get_or_try_insert_with(key, self.cacheable(class), || {
            let def = self.class_def(class)?;
            let original = def
                .storage_name
                .clone()
                .unwrap_or_else(|| class.short_name().to_string());

            let name = self
                .config
                .storage_name_override
                .as_ref()
                .and_then(|hook| hook.class_storage_name(class, &original))
                .filter(|changed| !changed.is_empty())
                .unwrap_or(original);
            Ok(name)
        })
    }

    /// Forget memoized class storage names, e.g. after the hook's inputs changed.
    pub fn clear_class_storage_names(&self) {
        debug!("clearing class storage name cache");
        self.strings.clear_kind(FactKind::ClassStorageName);
    }

    /// Discriminator value of a class.
    pub fn type_storage_name(&self, class: &TypeName) -> Result<String> {
        let key = FactKey::class(FactKind::TypeStorageName, class);
        self.strings.get_or_try_insert_with(key, self.cacheable(class), || {
            let def = self.class_def(class)?;
            Ok(def
                .type_storage_name
                .clone()
                .unwrap_or_else(|| class.short_name().to_string()))
        })
    }

    /// Primary key column of a class.
    pub fn primary_key_storage_name(&self, class: &TypeName) -> Result<String> {
        let key = FactKey::class(FactKind::PrimaryKeyStorageName, class);
        self.strings.get_or_try_insert_with(key, self.cacheable(class), || {
            Ok(self
                .inherited(class, |c| c.primary_key_storage_name.clone())?
                .unwrap_or_else(|| DEFAULT_PRIMARY_KEY_STORAGE_NAME.to_string()))
        })
    }

    /// Primary key type of a class, from the key type provider.
    pub fn key_type(&self, class: &TypeName) -> Result<ScalarType> {
        let key = FactKey::class(FactKind::KeyType, class);
        self.key_types.get_or_try_insert_with(key, self.cacheable(class), || {
            let declared = self.inherited(class, |c| c.key_type.clone())?;
            Ok(self.config.key_type_provider.key_type(class, declared.as_ref()))
        })
    }

    /// Caption of a class, defaulting to the short name.
    pub fn class_caption(&self, class: &TypeName) -> Result<String> {
        let key = FactKey::class(FactKind::ClassCaption, class);
        self.strings.get_or_try_insert_with(key, self.cacheable(class), || {
            let def = self.class_def(class)?;
            Ok(def
                .caption
                .clone()
                .unwrap_or_else(|| class.short_name().to_string()))
        })
    }

    /// Property whose value captions an instance.
    pub fn class_caption_property(&self, class: &TypeName) -> Result<Option<String>> {
        let key = FactKey::class(FactKind::CaptionProperty, class);
        self.optional_strings
            .get_or_try_insert_with(key, self.cacheable(class), || {
                self.inherited(class, |c| c.caption_property.clone())
            })
    }

    /// Check if the class has storage of its own.
    pub fn is_stored_class(&self, class: &TypeName) -> Result<bool> {
        let key = FactKey::class(FactKind::StoredClass, class);
        self.flags.get_or_try_insert_with(key, self.cacheable(class), || {
            Ok(!self.class_def(class)?.not_stored)
        })
    }

    /// Merged loading order of the class and its bases.
    pub fn loading_order(&self, class: &TypeName) -> Result<Vec<String>> {
        let key = FactKey::class(FactKind::LoadingOrder, class);
        self.name_lists.get_or_try_insert_with(key, self.cacheable(class), || {
            let chain = self.registry.base_chain(class)?;
            let orders: Vec<Vec<String>> = chain
                .iter()
                .rev()
                .flat_map(|c| c.loading_order.iter().cloned())
                .collect();
            Ok(loading::merge_orders(&orders))
        })
    }

    /// Put properties named in the loading order first, in that order,
    /// followed by the rest sorted by name.
    pub fn sort_by_loading_order(&self, class: &TypeName, properties: &[String]) -> Result<Vec<String>> {
        let order = self.loading_order(class)?;
        Ok(loading::sort_by_order(&order, properties))
    }

    /// Classes an instance converts to: root base first, the class last.
    pub fn conversion_chain(&self, class: &TypeName) -> Result<Vec<TypeName>> {
        let key = FactKey::class(FactKind::ConversionChain, class);
        self.type_lists.get_or_try_insert_with(key, self.cacheable(class), || {
            let chain = self.registry.base_chain(class)?;
            Ok(chain.iter().rev().map(|c| c.name.clone()).collect())
        })
    }

    /// Name of the property linking a detail to its aggregator.
    pub fn aggregator_property(&self, class: &TypeName) -> Result<Option<String>> {
        let key = FactKey::class(FactKind::AggregatorProperty, class);
        self.optional_strings
            .get_or_try_insert_with(key, self.cacheable(class), || {
                self.inherited(class, |c| {
                    c.properties.iter().find(|p| p.aggregator).map(|p| p.name.clone())
                })
            })
    }

    /// Name of the property ordering details.
    pub fn order_property(&self, class: &TypeName) -> Result<Option<String>> {
        let key = FactKey::class(FactKind::OrderProperty, class);
        self.optional_strings
            .get_or_try_insert_with(key, self.cacheable(class), || {
                self.inherited(class, |c| {
                    c.properties.iter().find(|p| p.order).map(|p| p.name.clone())
                })
            })
    }

    /// All property names, inherited ones first.
    pub fn property_names(&self, class: &TypeName) -> Result<Vec<String>> {
        let key = FactKey::class(FactKind::PropertyNames, class);
        self.name_lists.get_or_try_insert_with(key, self.cacheable(class), || {
            let mut names: Vec<String> = Vec::new();
            for def in self.registry.base_chain(class)?.iter().rev() {
                for property in &def.properties {
                    if !names.contains(&property.name) {
                        names.push(property.name.clone());
                    }
                }
            }
            Ok(names)
        })
    }

    /// Names of properties with a column. Details are never stored.
    pub fn storable_property_names(&self, class: &TypeName) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in self.property_names(class)? {
            let (_, def) = self.property_def(class, &name)?;
            if !def.not_stored && !def.property_type.is_detail() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Names of properties marked not stored.
    pub fn not_stored_property_names(&self, class: &TypeName) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in self.property_names(class)? {
            if !self.is_stored_property(class, &name)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Detail property of `aggregator` whose items are `item`.
    pub fn detail_array_property_name(&self, aggregator: &TypeName, item: &TypeName) -> Result<Option<String>> {
        for name in self.property_names(aggregator)? {
            if let PropertyType::Detail(_) = self.property_type(aggregator, &name)? {
                if &self.item_type(aggregator, &name)? == item {
                    return Ok(Some(name));
                }
            }
        }
        Ok(None)
    }

    /// Check if a value of `value_class` may be stored where `allowed` is
    /// expected: the same class, or classes sharing a table.
    pub fn compatible_storage(&self, value_class: &TypeName, allowed: &TypeName) -> Result<bool> {
        if value_class == allowed {
            return Ok(true);
        }
        Ok(self.class_storage_name(value_class)? == self.class_storage_name(allowed)?)
    }

    // Property facts (simple names)

    /// Declared type of a property. `__PrimaryKey` has the class key type.
    pub fn property_type(&self, class: &TypeName, property: &str) -> Result<PropertyType> {
        let key = FactKey::property(FactKind::PropertyType, class, property);
        self.property_types
            .get_or_try_insert_with(key, self.cacheable(class), || {
                if property == PRIMARY_KEY {
                    self.class_def(class)?;
                    return Ok(PropertyType::Scalar(self.key_type(class)?));
                }
                let (_, def) = self.property_def(class, property)?;
                Ok(def.property_type.clone())
            })
    }

    /// Class declaring a property. `__PrimaryKey` is declared by the class itself.
    pub fn declaring_class(&self, class: &TypeName, property: &str) -> Result<TypeName> {
        let key = FactKey::property(FactKind::DeclaringClass, class, property);
        self.classes.get_or_try_insert_with(key, self.cacheable(class), || {
            if property == PRIMARY_KEY {
                return Ok(self.class_def(class)?.name.clone());
            }
            let (owner, _) = self.property_def(class, property)?;
            Ok(owner.name.clone())
        })
    }

    /// Declared storage name of a property, defaulting to its name.
    /// `__PrimaryKey` maps to the primary key column.
    pub fn storage_name_of(&self, class: &TypeName, property: &str) -> Result<StorageName> {
        let key = FactKey::property(FactKind::PropertyStorageName, class, property);
        self.storage_names
            .get_or_try_insert_with(key, self.cacheable(class), || {
                if property == PRIMARY_KEY {
                    return Ok(StorageName::Single(self.primary_key_storage_name(class)?));
                }
                let (_, def) = self.property_def(class, property)?;
                Ok(def.storage_name())
            })
    }

    /// Column name of a property.
    pub fn property_storage_name(&self, class: &TypeName, property: &str) -> Result<String> {
        Ok(self.storage_name_of(class, property)?.primary().to_string())
    }

    /// `index`-th declared storage name of a property.
    pub fn indexed_storage_name(&self, class: &TypeName, property: &str, index: usize) -> Result<String> {
        let storage = self.storage_name_of(class, property)?;
        storage
            .at(index)
            .map(str::to_string)
            .ok_or_else(|| Error::StorageIndexOutOfRange {
                class: class.clone(),
                property: property.to_string(),
                index,
                len: storage.len(),
            })
    }

    /// Column holding the key of the `index`-th master candidate.
    pub fn master_column(&self, class: &TypeName, property: &str, index: usize) -> Result<String> {
        let storage = self.storage_name_of(class, property)?;
        storage
            .master_column(index)
            .ok_or_else(|| Error::StorageIndexOutOfRange {
                class: class.clone(),
                property: property.to_string(),
                index,
                len: storage.len(),
            })
    }

    /// Check if a property is required.
    pub fn property_not_null(&self, class: &TypeName, property: &str) -> Result<bool> {
        let key = FactKey::property(FactKind::NotNull, class, property);
        self.flags.get_or_try_insert_with(key, self.cacheable(class), || {
            if property == PRIMARY_KEY {
                return Ok(true);
            }
            Ok(self.property_def(class, property)?.1.not_null)
        })
    }

    /// Check if a property has a column.
    pub fn is_stored_property(&self, class: &TypeName, property: &str) -> Result<bool> {
        let key = FactKey::property(FactKind::Stored, class, property);
        self.flags.get_or_try_insert_with(key, self.cacheable(class), || {
            if property == PRIMARY_KEY {
                return Ok(true);
            }
            Ok(!self.property_def(class, property)?.1.not_stored)
        })
    }

    /// Maximum string length of a property, if declared.
    pub fn property_str_len(&self, class: &TypeName, property: &str) -> Result<Option<u32>> {
        let key = FactKey::property(FactKind::StrLen, class, property);
        self.lengths.get_or_try_insert_with(key, self.cacheable(class), || {
            if property == PRIMARY_KEY {
                return Ok(None);
            }
            Ok(self.property_def(class, property)?.1.str_len)
        })
    }

    /// Caption of a property, defaulting to its name.
    pub fn property_caption(&self, class: &TypeName, property: &str) -> Result<String> {
        let key = FactKey::property(FactKind::PropertyCaption, class, property);
        self.strings.get_or_try_insert_with(key, self.cacheable(class), || {
            if property == PRIMARY_KEY {
                return Ok(property.to_string());
            }
            let (_, def) = self.property_def(class, property)?;
            Ok(def.caption.clone().unwrap_or_else(|| def.name.clone()))
        })
    }

    /// Concrete types a master property may reference.
    ///
    /// A per-property override on `class` itself wins, then the property's
    /// own usage list, then the declared type. Scalars have no usage types;
    /// a detail's usage is its collection type.
    pub fn usage_types(&self, class: &TypeName, property: &str) -> Result<Vec<TypeName>> {
        let key = FactKey::property(FactKind::UsageTypes, class, property);
        self.type_lists.get_or_try_insert_with(key, self.cacheable(class), || {
            let own = self.class_def(class)?;
            if let Some(types) = own.property_type_usages.get(property) {
                return Ok(types.clone());
            }
            if property == PRIMARY_KEY {
                return Ok(Vec::new());
            }
            let (_, def) = self.property_def(class, property)?;
            if !def.type_usage.is_empty() {
                return Ok(def.type_usage.clone());
            }
            Ok(match &def.property_type {
                PropertyType::Master(target) | PropertyType::Detail(target) => vec![target.clone()],
                PropertyType::Scalar(_) => Vec::new(),
            })
        })
    }

    /// Concrete item types of a detail property.
    ///
    /// An explicit usage override on the class or property wins, then the
    /// collection's usage list, then the collection's item type. Empty for
    /// non-detail properties.
    pub fn detail_usage_types(&self, class: &TypeName, property: &str) -> Result<Vec<TypeName>> {
        let key = FactKey::property(FactKind::DetailUsageTypes, class, property);
        self.type_lists.get_or_try_insert_with(key, self.cacheable(class), || {
            let PropertyType::Detail(collection) = self.property_type(class, property)? else {
                return Ok(Vec::new());
            };
            let usage = self.usage_types(class, property)?;
            if usage.first() != Some(&collection) {
                return Ok(usage);
            }
            let def = self.collection(&collection)?;
            if !def.type_usage.is_empty() {
                return Ok(def.type_usage.clone());
            }
            Ok(vec![def.item.clone()])
        })
    }

    /// Item class of a detail property.
    pub fn item_type(&self, class: &TypeName, property: &str) -> Result<TypeName> {
        match self.property_type(class, property)? {
            PropertyType::Detail(collection) => Ok(self.collection(&collection)?.item.clone()),
            _ => Err(Error::NotNavigable {
                class: class.clone(),
                property: property.to_string(),
            }),
        }
    }

    fn collection(&self, name: &TypeName) -> Result<&crate::catalog::DetailCollectionDef> {
        self.registry
            .collection(name.as_str())
            .ok_or_else(|| Error::Registry(format!("unknown detail collection '{}'", name)))
    }

    /// Declared per-engine expressions of a property.
    pub fn property_expressions(&self, class: &TypeName, property: &str) -> Result<Vec<EngineExpression>> {
        if property == PRIMARY_KEY {
            self.class_def(class)?;
            return Ok(Vec::new());
        }
        Ok(self.property_def(class, property)?.1.expressions.clone())
    }

    /// Check if a simple property exists on the class or its bases.
    pub fn has_property(&self, class: &TypeName, property: &str) -> bool {
        property == PRIMARY_KEY || self.registry.find_property(class, property).is_ok()
    }

    // Cache management

    /// Per kind entry counts and hit/miss statistics.
    pub fn cache_info(&self) -> CacheInfo {
        let mut kinds = Vec::new();
        for kind in FactKind::ALL {
            let mut info = FactInfo {
                kind,
                entries: 0,
                hits: 0,
                misses: 0,
            };
            macro_rules! collect {
                ($($cache:ident),*) => {
                    $(
                        let stats = self.$cache.stats(kind);
                        info.entries += self.$cache.len_of(kind);
                        info.hits += stats.hits();
                        info.misses += stats.misses();
                    )*
                };
            }
            collect!(
                strings,
                optional_strings,
                flags,
                lengths,
                key_types,
                property_types,
                classes,
                type_lists,
                name_lists,
                storage_names,
                resolved,
                views
            );
            if info.entries > 0 || info.hits + info.misses > 0 {
                kinds.push(info);
            }
        }
        CacheInfo { kinds }
    }

    /// Forget memoized views.
    pub fn clear_views(&self) {
        debug!("clearing view cache");
        self.views.clear();
        self.name_lists.clear_kind(FactKind::AllViews);
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.strings.clear();
        self.optional_strings.clear();
        self.flags.clear();
        self.lengths.clear();
        self.key_types.clear();
        self.property_types.clear();
        self.classes.clear();
        self.type_lists.clear();
        self.name_lists.clear();
        self.storage_names.clear();
        self.resolved.clear();
        self.views.clear();
    }

    pub(crate) fn view_names(&self) -> &FactCache<Vec<String>> {
        &self.name_lists
    }
}
