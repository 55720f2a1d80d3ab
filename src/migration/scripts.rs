//! SQL scripts compiled into the binary next to the migrations that run them

/// A SQL script embedded with [`embedded_script!`](crate::embedded_script)
///
/// `path` is the path as written at the call site, relative to the declaring source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedScript {
    pub path: &'static str,
    pub sql: &'static str,
}

impl EmbeddedScript {
    pub const fn new(path: &'static str, sql: &'static str) -> Self {
        Self { path, sql }
    }
}

/// Normalize a script path for lookup: forward slashes, no leading `./`
pub(crate) fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

/// Find a script by path in a migration's embedded scripts
pub(crate) fn find<'s>(scripts: &'s [EmbeddedScript], path: &str) -> Option<&'s EmbeddedScript> {
    let wanted = normalize_path(path);
    scripts
        .iter()
        .find(|script| normalize_path(script.path) == wanted)
}

/// Embed a SQL file relative to the current source file
///
/// ```rust,ignore
/// use tidemark::embedded_script;
/// use tidemark::migration::EmbeddedScript;
///
/// const SCRIPTS: &[EmbeddedScript] = &[
///     embedded_script!("sql/0001_create_users.sql"),
///     embedded_script!("sql/0001_drop_users.sql"),
/// ];
/// ```
#[macro_export]
macro_rules! embedded_script {
    ($path:literal) => {
        $crate::migration::EmbeddedScript::new($path, include_str!($path))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPTS: &[EmbeddedScript] = &[
        EmbeddedScript::new("sql/create.sql", "CREATE TABLE a (id BIGINT)"),
        EmbeddedScript::new("./sql/drop.sql", "DROP TABLE a"),
    ];

    #[test]
    fn test_find_normalizes_paths() {
        assert_eq!(find(SCRIPTS, "./sql/create.sql").unwrap().sql, "CREATE TABLE a (id BIGINT)");
        assert_eq!(find(SCRIPTS, "sql/drop.sql").unwrap().sql, "DROP TABLE a");
        assert_eq!(find(SCRIPTS, "sql\\drop.sql").unwrap().sql, "DROP TABLE a");
        assert!(find(SCRIPTS, "sql/seed.sql").is_none());
    }
}
