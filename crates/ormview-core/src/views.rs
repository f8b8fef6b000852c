//! View cache.
//!
//! Views are built from their declarations on first request, memoized per
//! (class, name) and handed out as clones passed through the configured
//! [`ViewTuner`](crate::config::ViewTuner).

use crate::catalog::ViewDef;
use crate::error::{Error, Result};
use crate::metadata::{FactKey, FactKind, Metadata};
use ormview_proto::{PropertyPath, PropertyType, TypeName, View};
use tracing::debug;

/// View lookup over [`Metadata`].
#[derive(Debug, Clone, Copy)]
pub struct ViewCatalog<'a> {
    metadata: &'a Metadata,
}

impl<'a> ViewCatalog<'a> {
    pub(crate) fn new(metadata: &'a Metadata) -> Self {
        Self { metadata }
    }

    /// View `name` of `class`, declared on the class or inherited.
    ///
    /// Returns `None` when neither the class nor its bases declare it.
    pub fn get_view(&self, name: &str, class: &TypeName) -> Result<Option<View>> {
        let view = self.cached(name, class, &mut Vec::new())?;
        Ok(view.map(|view| match &self.metadata.config().view_tuner {
            Some(tuner) => tuner.tune(name, class, view),
            None => view,
        }))
    }

    /// Like [`get_view`](Self::get_view), failing with [`Error::ViewNotFound`].
    pub fn view(&self, name: &str, class: &TypeName) -> Result<View> {
        self.get_view(name, class)?.ok_or_else(|| Error::ViewNotFound {
            view: name.to_string(),
            class: class.clone(),
        })
    }

    fn cached(&self, name: &str, class: &TypeName, building: &mut Vec<(TypeName, String)>) -> Result<Option<View>> {
        let key = FactKey::property(FactKind::View, class, name);
        self.metadata
            .views
            .get_or_try_insert_with(key, self.metadata.cacheable(class), || {
                self.build(name, class, building)
            })
    }

    fn build(&self, name: &str, class: &TypeName, building: &mut Vec<(TypeName, String)>) -> Result<Option<View>> {
        let registry = self.metadata.registry();
        let Some((owner, def)) = registry
            .base_chain(class)?
            .into_iter()
            .find_map(|c| c.get_view(name).map(|def| (c, def)))
        else {
            return Ok(None);
        };

        let marker = (owner.name.clone(), name.to_string());
        if building.contains(&marker) {
            return Err(Error::Registry(format!(
                "view '{}' of '{}' contains itself through its details",
                name, owner.name
            )));
        }
        building.push(marker);
        let view = self.build_from(def, &owner.name, building);
        building.pop();

        debug!(view = name, class = %class, define_class = %owner.name, "built view");
        view.map(Some)
    }

    fn build_from(&self, def: &ViewDef, define_class: &TypeName, building: &mut Vec<(TypeName, String)>) -> Result<View> {
        let mut view = View::new(def.name.clone(), define_class.clone());
        for path in &def.properties {
            view = view.with_path(PropertyPath::parse(path)?);
        }
        view.master_type_filters = def.master_type_filters.clone();

        for detail in &def.details {
            let item = self.metadata.item_type(define_class, &detail.property)?;
            let detail_view = self
                .cached(&detail.view, &item, building)?
                .ok_or_else(|| Error::ViewNotFound {
                    view: detail.view.clone(),
                    class: item.clone(),
                })?;
            view = view.with_detail(detail.property.clone(), detail_view);
        }
        for pseudo in &def.pseudo_details {
            view = view.with_pseudo_detail(pseudo.class.clone(), pseudo.view.clone());
        }

        Ok(view)
    }

    /// Names of the views available on `class`, own views first.
    pub fn all_views(&self, class: &TypeName) -> Result<Vec<String>> {
        let key = FactKey::class(FactKind::AllViews, class);
        self.metadata
            .view_names()
            .get_or_try_insert_with(key, self.metadata.cacheable(class), || {
                let mut names: Vec<String> = Vec::new();
                for def in self.metadata.registry().base_chain(class)? {
                    for view in &def.views {
                        if !names.contains(&view.name) {
                            names.push(view.name.clone());
                        }
                    }
                }
                Ok(names)
            })
    }

    /// Names of the views shared by all `classes`.
    pub fn all_views_for(&self, classes: &[TypeName]) -> Result<Vec<String>> {
        let Some(first) = classes.first() else {
            return Ok(Vec::new());
        };
        let mut names = Vec::new();
        for name in self.all_views(first)? {
            if self.check_view_for_classes(&name, classes)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Check if every class resolves `name` to the same declaring class.
    pub fn check_view_for_classes(&self, name: &str, classes: &[TypeName]) -> Result<bool> {
        let Some((first, rest)) = classes.split_first() else {
            return Ok(false);
        };
        let Some(first_view) = self.cached(name, first, &mut Vec::new())? else {
            return Ok(false);
        };
        for class in rest {
            match self.cached(name, class, &mut Vec::new())? {
                Some(view) if view.define_class == first_view.define_class => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// View `name` of the nearest class that all `classes` derive from.
    pub fn compatible_view(&self, name: &str, classes: &[TypeName]) -> Result<Option<View>> {
        let Some(first) = classes.first() else {
            return Ok(None);
        };
        let registry = self.metadata.registry();
        for candidate in registry.base_chain(first)? {
            if classes
                .iter()
                .all(|class| registry.is_same_or_subclass(class, &candidate.name))
            {
                return self.get_view(name, &candidate.name);
            }
        }
        Ok(None)
    }

    /// Distinct property types requested by a view, its details and its
    /// pseudo-details, in first-seen order.
    pub fn all_types_from_view(&self, view: &View) -> Result<Vec<PropertyType>> {
        let mut types = Vec::new();
        self.collect_types(view, &mut types)?;
        Ok(types)
    }

    fn collect_types(&self, view: &View, types: &mut Vec<PropertyType>) -> Result<()> {
        let resolver = self.metadata.resolver();
        for property in &view.properties {
            let leaf_type = resolver.resolve_path(&view.define_class, &property.path)?.leaf_type;
            if !types.contains(&leaf_type) {
                types.push(leaf_type);
            }
        }
        for detail in &view.details {
            self.collect_types(&detail.view, types)?;
        }
        for pseudo in &view.pseudo_details {
            // A pseudo-detail whose view is not declared contributes nothing.
            if let Some(pseudo_view) = self.get_view(&pseudo.view_name, &pseudo.class)? {
                self.collect_types(&pseudo_view, types)?;
            }
        }
        Ok(())
    }

    /// Forget memoized views.
    pub fn clear(&self) {
        self.metadata.clear_views();
    }
}
