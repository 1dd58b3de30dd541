use rust_embed::RustEmbed;

/// Embedded database migrations
#[derive(RustEmbed)]
#[folder = "migrations/"]
pub struct MigrationAssets;

impl MigrationAssets {
    /// All migration files as `(file name, sql)`, ordered by file name
    pub fn get_migrations() -> Vec<(String, String)> {
        let mut migrations: Vec<(String, String)> = Self::iter()
            .filter(|path| path.ends_with(".sql"))
            .filter_map(|path| {
                Self::get(&path).map(|file| {
                    (
                        path.to_string(),
                        String::from_utf8_lossy(&file.data).to_string(),
                    )
                })
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0));
        migrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded_in_order() {
        let migrations = MigrationAssets::get_migrations();
        assert!(!migrations.is_empty());
        assert_eq!(migrations[0].0, "001_initial_schema.sql");
        assert!(migrations[0].1.contains("CREATE TABLE IF NOT EXISTS operations"));
    }
}
