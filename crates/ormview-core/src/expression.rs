//! Expression fallback for properties without a column.
//!
//! A property may declare one expression per execution engine. The engine
//! asking for it walks its own base chain until a declared expression
//! matches, so `PostgreSql` falls back to a generic `Sql` expression.
//! Expressions reference other properties as `@Name@`; `@@` is a literal `@`.

use crate::catalog::EngineExpression;
use crate::error::Result;
use crate::metadata::{FactKey, FactKind, Metadata, Qualifier};
use ormview_proto::{TypeName, View};
use tracing::debug;

/// Extract the property names referenced by an expression.
///
/// Each name is prefixed with `namespace` (e.g. `"Dept."`). A name missing
/// its closing marker is ignored. Order and repetitions are preserved.
pub fn properties_in_expression(expression: &str, namespace: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '@' {
            continue;
        }
        if chars.peek() == Some(&'@') {
            chars.next();
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '@' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if closed && !name.is_empty() {
            names.push(format!("{}{}", namespace, name));
        }
    }

    names
}

/// Picks per-engine expressions for unstored properties.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionResolver<'a> {
    metadata: &'a Metadata,
}

impl<'a> ExpressionResolver<'a> {
    pub(crate) fn new(metadata: &'a Metadata) -> Self {
        Self { metadata }
    }

    /// Expressions declared for the leaf of `path`.
    pub fn expressions(&self, class: &TypeName, path: &str) -> Result<Vec<EngineExpression>> {
        let resolved = self.metadata.resolver().resolve(class, path)?;
        self.metadata
            .property_expressions(&resolved.owner, resolved.path.leaf())
    }

    /// Most compatible expression of the leaf of `path` for `engine`.
    pub fn resolve(&self, class: &TypeName, path: &str, engine: &str) -> Result<Option<String>> {
        let key = FactKey::property(FactKind::Expression, class, path)
            .with_qualifier(Qualifier::Engine(engine.to_string()));
        self.metadata
            .optional_strings
            .get_or_try_insert_with(key, self.metadata.cacheable(class), || {
                let declared = self.expressions(class, path)?;
                Ok(self.most_compatible(&declared, engine))
            })
    }

    fn most_compatible(&self, declared: &[EngineExpression], engine: &str) -> Option<String> {
        if declared.is_empty() {
            return None;
        }
        self.metadata
            .registry()
            .engine_chain(engine)
            .iter()
            .find_map(|candidate| declared.iter().find(|e| &e.engine == candidate))
            .map(|e| e.expression.clone())
    }

    /// Copy of `view` with the properties referenced by its unstored
    /// properties' expressions appended.
    ///
    /// Referenced names are qualified with the master prefix of the
    /// unstored property. Paths already in the view are not repeated.
    pub fn append_properties_from_not_stored(&self, view: &View, engine: &str) -> Result<View> {
        let class = &view.define_class;
        let resolver = self.metadata.resolver();

        let mut referenced = Vec::new();
        for property in &view.properties {
            if resolver.resolve_path(class, &property.path)?.stored {
                continue;
            }
            let text = property.path.to_string();
            let Some(expression) = self.resolve(class, &text, engine)? else {
                continue;
            };
            let owner = property
                .path
                .parent()
                .map(|parent| format!("{}.", parent))
                .unwrap_or_default();
            referenced.extend(properties_in_expression(&expression, &owner));
        }

        let mut view = view.clone();
        let added = view.append_properties(&referenced)?;
        if added > 0 {
            debug!(view = %view.name, added, "appended expression dependencies");
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::hr_metadata;

    #[test]
    fn test_properties_in_expression() {
        assert_eq!(
            properties_in_expression("@Salary@ + @Bonus@", ""),
            vec!["Salary".to_string(), "Bonus".to_string()]
        );
        assert_eq!(
            properties_in_expression("@Salary@ + @Bonus@", "Dept."),
            vec!["Dept.Salary".to_string(), "Dept.Bonus".to_string()]
        );
    }

    #[test]
    fn test_escaped_and_unterminated_markers() {
        assert_eq!(
            properties_in_expression("mail@@host || @Name@", ""),
            vec!["Name".to_string()]
        );
        assert_eq!(properties_in_expression("@Salary@ + @Bon", ""), vec!["Salary".to_string()]);
        assert!(properties_in_expression("no markers", "").is_empty());
        assert!(properties_in_expression("", "X.").is_empty());
    }

    #[test]
    fn test_resolve_walks_engine_chain() {
        let metadata = hr_metadata();
        let expressions = metadata.expressions();
        let employee = TypeName::new("Hr.Employee");

        assert_eq!(
            expressions.resolve(&employee, "TotalPay", "MsSql").unwrap().as_deref(),
            Some("ISNULL(@Salary@,0) + ISNULL(@Bonus@,0)")
        );
        assert_eq!(
            expressions.resolve(&employee, "TotalPay", "PostgreSql").unwrap().as_deref(),
            Some("@Salary@ + @Bonus@")
        );
        assert_eq!(expressions.resolve(&employee, "TotalPay", "Oracle").unwrap(), None);
        assert_eq!(expressions.resolve(&employee, "Name", "Sql").unwrap(), None);
    }

    #[test]
    fn test_resolve_through_master_path() {
        let metadata = hr_metadata();
        let department = TypeName::new("Hr.Department");
        assert_eq!(
            metadata
                .expressions()
                .resolve(&department, "Head.TotalPay", "Sql")
                .unwrap()
                .as_deref(),
            Some("@Salary@ + @Bonus@")
        );
    }

    #[test]
    fn test_append_properties_from_not_stored() {
        let metadata = hr_metadata();
        let view = View::from_paths("Pay", "Hr.Employee", ["Name", "TotalPay", "Salary"]).unwrap();

        let extended = metadata
            .expressions()
            .append_properties_from_not_stored(&view, "Sql")
            .unwrap();

        assert_eq!(extended.property_names(), vec!["Name", "TotalPay", "Salary", "Bonus"]);
        assert!(extended.properties[3].appended);
        assert_eq!(view.properties.len(), 3);
    }

    #[test]
    fn test_append_qualifies_with_master_prefix() {
        let metadata = hr_metadata();
        let view = View::from_paths("DeptPay", "Hr.Department", ["Title", "Head.TotalPay"]).unwrap();

        let extended = metadata
            .expressions()
            .append_properties_from_not_stored(&view, "MsSql")
            .unwrap();

        assert_eq!(
            extended.property_names(),
            vec!["Title", "Head.TotalPay", "Head.Salary", "Head.Bonus"]
        );
    }

    #[test]
    fn test_append_without_expression_is_noop() {
        let metadata = hr_metadata();
        let view = View::from_paths("Pay", "Hr.Employee", ["TotalPay"]).unwrap();
        let extended = metadata
            .expressions()
            .append_properties_from_not_stored(&view, "Oracle")
            .unwrap();
        assert_eq!(extended, view);
    }
}
