//! Cache Key Module
//!
//! Derives deterministic cache keys from logical market-data queries.

use std::collections::BTreeSet;

// == Query Filter ==
/// A named, optional filter value attached to a query (e.g. a date bound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    /// Filter name, also used as the upstream query parameter
    pub name: String,
    /// Filter value, None when the caller did not supply one
    pub value: Option<String>,
}

// == Logical Query ==
/// A normalized logical query: a symbol set plus an ordered list of filters.
///
/// Symbols are trimmed, uppercased, deduplicated and kept sorted, so two
/// queries naming the same symbols in any order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogicalQuery {
    symbols: BTreeSet<String>,
    filters: Vec<QueryFilter>,
}

impl LogicalQuery {
    // == Constructor ==
    /// Builds a query from raw symbols. Blank symbols are dropped.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            symbols,
            filters: Vec::new(),
        }
    }

    /// Parses a comma-separated symbol list such as `"aapl, MSFT,aapl"`.
    pub fn from_symbol_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    // == Filters ==
    /// Appends a filter. Filter order is significant for the derived key.
    pub fn with_filter(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.filters.push(QueryFilter {
            name: name.into(),
            value: value.map(Into::into),
        });
        self
    }

    /// Sorted, deduplicated symbols.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols joined with commas, in sorted order.
    pub fn joined_symbols(&self) -> String {
        self.symbols().collect::<Vec<_>>().join(",")
    }
}

// == Cache Key Builder ==
/// Derives stable cache keys for one logical cache (e.g. `news`, `quotes`).
///
/// Key layout: `namespace:SYM1,SYM2|name=value|name~`, where `~` marks an
/// unset filter. Separator characters inside components are escaped so
/// distinct queries can never collide.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
}

impl CacheKeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // == Build Key ==
    /// Builds the key for a query. Pure; an empty symbol set is the caller's
    /// concern and still yields a key.
    pub fn build_key(&self, query: &LogicalQuery) -> String {
        let mut key = escape(&self.namespace);
        key.push(':');

        let symbols: Vec<String> = query.symbols().map(escape).collect();
        key.push_str(&symbols.join(","));

        for filter in query.filters() {
            key.push('|');
            key.push_str(&escape(&filter.name));
            match &filter.value {
                Some(value) => {
                    key.push('=');
                    key.push_str(&escape(value));
                }
                None => key.push('~'),
            }
        }

        key
    }
}

/// Escapes every character that has structural meaning in a key.
fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if matches!(c, '\\' | ':' | ',' | '|' | '=' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
