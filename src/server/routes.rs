use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::registry::{BackendRegistry, Engine};
use crate::template::QueryTemplate;

/// The four injection shapes each engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Value inside a quoted string literal.
    Char,
    /// Value in numeric position.
    Int,
    /// Value inside a `LIKE '%...%'` pattern.
    Like,
    /// Value as the `ORDER BY` expression.
    OrderBy,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Char, Mode::Int, Mode::Like, Mode::OrderBy];

    pub fn slug(self) -> &'static str {
        match self {
            Mode::Char => "char",
            Mode::Int => "int",
            Mode::Like => "like",
            Mode::OrderBy => "orderby",
        }
    }

    /// Request parameter the route reads.
    pub fn param_name(self) -> &'static str {
        match self {
            Mode::Char | Mode::Int => "id",
            Mode::Like => "username",
            Mode::OrderBy => "col",
        }
    }

    /// Placeholder the parameter is bound to in the template.
    pub fn binding(self) -> &'static str {
        match self {
            Mode::Char | Mode::Int => "uid",
            Mode::Like => "username",
            Mode::OrderBy => "col",
        }
    }

    fn template_source(self) -> &'static str {
        match self {
            Mode::Char => "SELECT * FROM {table} WHERE id = '{uid}'",
            Mode::Int => "SELECT * FROM {table} WHERE id = {uid}",
            Mode::Like => "SELECT * FROM {table} WHERE username LIKE '%{username}%'",
            Mode::OrderBy => "SELECT * FROM {table} ORDER BY {col}",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.slug() == s)
            .ok_or_else(|| format!("unknown mode: {s}"))
    }
}

/// Query template for every engine and mode, with the table name already
/// filled in.
#[derive(Debug, Clone)]
pub struct RouteTable {
    templates: HashMap<(Engine, Mode), QueryTemplate>,
}

impl RouteTable {
    pub fn new(registry: &BackendRegistry) -> Self {
        let mut templates = HashMap::new();
        for engine in Engine::ALL {
            let table = registry.descriptor(engine).users_table;
            for mode in Mode::ALL {
                let source = mode.template_source().replace("{table}", table);
                templates.insert((engine, mode), QueryTemplate::new(source));
            }
        }
        Self { templates }
    }

    pub fn template(&self, engine: Engine, mode: Mode) -> Option<&QueryTemplate> {
        self.templates.get(&(engine, mode))
    }

    /// Resolve path segments to a route. `None` for anything unknown.
    pub fn resolve(&self, engine: &str, mode: &str) -> Option<(Engine, Mode, &QueryTemplate)> {
        let engine: Engine = engine.parse().ok()?;
        let mode: Mode = mode.parse().ok()?;
        let template = self.template(engine, mode)?;
        Some((engine, mode, template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(&BackendRegistry::builder().build())
    }

    #[test]
    fn test_table_is_filled_in_per_engine() {
        let routes = table();
        assert_eq!(
            routes.template(Engine::MySql, Mode::Char).map(QueryTemplate::as_str),
            Some("SELECT * FROM users WHERE id = '{uid}'")
        );
        assert_eq!(
            routes.template(Engine::ClickHouse, Mode::OrderBy).map(QueryTemplate::as_str),
            Some("SELECT * FROM sqli_lab.users ORDER BY {col}")
        );
    }

    #[test]
    fn test_every_template_binds_its_mode_parameter() {
        let routes = table();
        for engine in Engine::ALL {
            for mode in Mode::ALL {
                let template = routes.template(engine, mode).unwrap();
                assert_eq!(template.placeholders(), vec![mode.binding()]);
            }
        }
    }

    #[test]
    fn test_resolve() {
        let routes = table();
        let (engine, mode, _) = routes.resolve("postgres", "like").unwrap();
        assert_eq!((engine, mode), (Engine::Postgres, Mode::Like));
        assert_eq!(mode.param_name(), "username");

        assert!(routes.resolve("sqlite", "char").is_none());
        assert!(routes.resolve("mysql", "union").is_none());
        assert!(routes.resolve("MySQL", "char").is_none());
    }
}
