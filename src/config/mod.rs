use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Named queries loaded from a config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QueriesConfig {
    #[serde(default)]
    pub queries: BTreeMap<String, String>,
}

impl QueriesConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// A query together with the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: String,
    pub query: String,
}

/// Positional queries first (`arg1`, `arg2`, ...), then config entries by name.
pub fn collect_queries(args: &[String], config: Option<QueriesConfig>) -> Vec<NamedQuery> {
    let positional = args.iter().enumerate().map(|(i, query)| NamedQuery {
        name: format!("arg{}", i + 1),
        query: query.clone(),
    });

    let named = config
        .into_iter()
        .flat_map(|c| c.queries)
        .map(|(name, query)| NamedQuery { name, query });

    positional.chain(named).collect()
}
