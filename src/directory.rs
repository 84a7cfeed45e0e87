//! Asset directory
//!
//! Uppercase symbol → asset id table, filled once at startup from the swap
//! service's catalog and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Catalog entry as published by the swap service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAsset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetDirectory {
    assets: HashMap<String, String>,
}

impl AssetDirectory {
    pub fn from_catalog(catalog: impl IntoIterator<Item = CatalogAsset>) -> Self {
        let assets: HashMap<String, String> = catalog
            .into_iter()
            .map(|asset| (asset.symbol.trim().to_uppercase(), asset.id))
            .collect();

        info!(supported_assets = assets.len(), "Asset directory loaded");

        Self { assets }
    }

    /// Exact, case-insensitive lookup. Surrounding whitespace is ignored.
    pub fn resolve(&self, symbol: &str) -> Option<&str> {
        self.assets
            .get(&normalize_symbol(symbol))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl<S: Into<String>, I: Into<String>> FromIterator<(S, I)> for AssetDirectory {
    fn from_iter<T: IntoIterator<Item = (S, I)>>(iter: T) -> Self {
        Self::from_catalog(iter.into_iter().map(|(symbol, id)| CatalogAsset {
            id: id.into(),
            name: String::new(),
            symbol: symbol.into(),
            price: None,
        }))
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
