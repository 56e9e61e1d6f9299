//! The set of all known catalogs, built once per process.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::RegistryLoadError;
use crate::rule::Catalog;

/// Read-only lookup from catalog name to [`Catalog`].
///
/// Built by [`Registry::load`] and injected into the engine. By convention a
/// repository's catalog carries the repository's name, which is what implicit
/// runs look up.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    catalogs: BTreeMap<String, Arc<Catalog>>,
}

impl Registry {
    /// Index the declared catalogs by name.
    ///
    /// Either every catalog validates or nothing is returned.
    pub fn load<I>(declarations: I) -> Result<Self, RegistryLoadError>
    where
        I: IntoIterator<Item = Catalog>,
    {
        let mut catalogs = BTreeMap::new();

        for catalog in declarations {
            validate(&catalog)?;
            let name = catalog.name().to_string();
            if catalogs.contains_key(&name) {
                return Err(RegistryLoadError::DuplicateCatalog { name });
            }
            debug!(catalog = %name, rules = catalog.rules().len(), "catalog registered");
            catalogs.insert(name, Arc::new(catalog));
        }

        Ok(Self { catalogs })
    }

    pub fn catalog(&self, name: &str) -> Option<Arc<Catalog>> {
        self.catalogs.get(name).cloned()
    }

    pub fn catalog_names(&self) -> impl Iterator<Item = &str> {
        self.catalogs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Catalog>> {
        self.catalogs.values()
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

fn validate(catalog: &Catalog) -> Result<(), RegistryLoadError> {
    if catalog.name().is_empty() {
        return Err(RegistryLoadError::EmptyCatalogName);
    }

    let mut declared: HashSet<&str> = HashSet::new();
    for rule in catalog.rules() {
        if rule.catalog != catalog.name() {
            return Err(RegistryLoadError::CatalogNameMismatch {
                catalog: catalog.name().to_string(),
                rule: rule.name.clone(),
                declared: rule.catalog.clone(),
            });
        }
        for dep in &rule.depends_on {
            if !declared.contains(dep.as_str()) {
                return Err(RegistryLoadError::UnknownDependency {
                    catalog: catalog.name().to_string(),
                    rule: rule.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        if !declared.insert(&rule.name) {
            return Err(RegistryLoadError::DuplicateRule {
                catalog: catalog.name().to_string(),
                rule: rule.name.clone(),
            });
        }
    }
    Ok(())
}
