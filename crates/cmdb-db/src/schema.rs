//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL except for the instance attribute bag, which
//! is a FLEXIBLE object. UUIDs are stored as strings; schema records
//! (models, relation types) are keyed by their UID. Uniqueness invariants
//! live in UNIQUE indexes so they hold regardless of caller-side checks.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "catalog_and_graph",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "service_tree",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "model_groups",
        sql: SCHEMA_V3,
    },
];

// -----------------------------------------------------------------------
// Schema v1: schema registry, instances and the relation graph
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Models (global scope, keyed by uid)
-- =======================================================================
DEFINE TABLE model SCHEMAFULL;
DEFINE FIELD uid ON TABLE model TYPE string;
DEFINE FIELD name ON TABLE model TYPE string;
DEFINE FIELD category ON TABLE model TYPE string;
DEFINE FIELD parent_uid ON TABLE model TYPE option<string>;
DEFINE FIELD level ON TABLE model TYPE int DEFAULT 0;
DEFINE FIELD provider ON TABLE model TYPE string;
DEFINE FIELD icon ON TABLE model TYPE string;
DEFINE FIELD description ON TABLE model TYPE string;
DEFINE FIELD extensible ON TABLE model TYPE bool DEFAULT false;
DEFINE FIELD model_group ON TABLE model TYPE option<string>;
DEFINE FIELD created_at ON TABLE model TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE model TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_model_uid ON TABLE model COLUMNS uid UNIQUE;
DEFINE INDEX idx_model_provider ON TABLE model COLUMNS provider;

-- =======================================================================
-- Attribute groups (global scope, per model)
-- =======================================================================
DEFINE TABLE attribute_group SCHEMAFULL;
DEFINE FIELD model_uid ON TABLE attribute_group TYPE string;
DEFINE FIELD uid ON TABLE attribute_group TYPE string;
DEFINE FIELD name ON TABLE attribute_group TYPE string;
DEFINE FIELD sort_index ON TABLE attribute_group TYPE int DEFAULT 0;
DEFINE FIELD is_builtin ON TABLE attribute_group TYPE bool DEFAULT false;
DEFINE FIELD description ON TABLE attribute_group TYPE string;
DEFINE FIELD created_at ON TABLE attribute_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE attribute_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_attribute_group_model_uid ON TABLE attribute_group \
    COLUMNS model_uid, uid UNIQUE;

-- =======================================================================
-- Attributes (global scope, per model)
-- =======================================================================
DEFINE TABLE attribute SCHEMAFULL;
DEFINE FIELD model_uid ON TABLE attribute TYPE string;
DEFINE FIELD field_uid ON TABLE attribute TYPE string;
DEFINE FIELD field_name ON TABLE attribute TYPE string;
DEFINE FIELD field_type ON TABLE attribute TYPE string \
    ASSERT $value IN ['string', 'text', 'int', 'float', 'bool', 'enum', \
    'datetime', 'date', 'array', 'json', 'link'];
DEFINE FIELD group_id ON TABLE attribute TYPE option<string>;
DEFINE FIELD display_name ON TABLE attribute TYPE string;
DEFINE FIELD display ON TABLE attribute TYPE bool DEFAULT true;
DEFINE FIELD sort_index ON TABLE attribute TYPE int DEFAULT 0;
DEFINE FIELD required ON TABLE attribute TYPE bool DEFAULT false;
DEFINE FIELD editable ON TABLE attribute TYPE bool DEFAULT true;
DEFINE FIELD searchable ON TABLE attribute TYPE bool DEFAULT false;
DEFINE FIELD is_unique ON TABLE attribute TYPE bool DEFAULT false;
DEFINE FIELD secure ON TABLE attribute TYPE bool DEFAULT false;
DEFINE FIELD is_link ON TABLE attribute TYPE bool DEFAULT false;
DEFINE FIELD link_model ON TABLE attribute TYPE option<string>;
DEFINE FIELD options ON TABLE attribute TYPE any;
DEFINE FIELD default_value ON TABLE attribute TYPE string;
DEFINE FIELD placeholder ON TABLE attribute TYPE string;
DEFINE FIELD description ON TABLE attribute TYPE string;
DEFINE FIELD created_at ON TABLE attribute TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE attribute TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_attribute_model_field ON TABLE attribute \
    COLUMNS model_uid, field_uid UNIQUE;

-- =======================================================================
-- Model relation types (global scope, keyed by uid)
-- =======================================================================
DEFINE TABLE model_relation_type SCHEMAFULL;
DEFINE FIELD uid ON TABLE model_relation_type TYPE string;
DEFINE FIELD name ON TABLE model_relation_type TYPE string;
DEFINE FIELD source_model_uid ON TABLE model_relation_type TYPE string;
DEFINE FIELD target_model_uid ON TABLE model_relation_type TYPE string;
DEFINE FIELD relation_type ON TABLE model_relation_type TYPE string \
    ASSERT $value IN ['belongs_to', 'contains', 'bindto', 'connects', \
    'depends_on'];
DEFINE FIELD direction ON TABLE model_relation_type TYPE string \
    ASSERT $value IN ['one_to_one', 'one_to_many', 'many_to_many'];
DEFINE FIELD source_to_target ON TABLE model_relation_type TYPE string;
DEFINE FIELD target_to_source ON TABLE model_relation_type TYPE string;
DEFINE FIELD description ON TABLE model_relation_type TYPE string;
DEFINE FIELD created_at ON TABLE model_relation_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE model_relation_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_relation_type_uid ON TABLE model_relation_type \
    COLUMNS uid UNIQUE;
DEFINE INDEX idx_relation_type_models ON TABLE model_relation_type \
    COLUMNS source_model_uid, target_model_uid;

-- =======================================================================
-- Instances (tenant scope, natural key tenant/model/asset)
-- =======================================================================
DEFINE TABLE instance SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE instance TYPE string;
DEFINE FIELD model_uid ON TABLE instance TYPE string;
DEFINE FIELD asset_id ON TABLE instance TYPE string;
DEFINE FIELD asset_name ON TABLE instance TYPE string;
DEFINE FIELD account_id ON TABLE instance TYPE option<int>;
DEFINE FIELD attributes ON TABLE instance TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE instance TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE instance TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_instance_natural_key ON TABLE instance \
    COLUMNS tenant_id, model_uid, asset_id UNIQUE;

-- =======================================================================
-- Instance -> Instance typed edges (tenant scope)
-- =======================================================================
DEFINE TABLE instance_relation TYPE RELATION SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE instance_relation TYPE string;
DEFINE FIELD relation_type_uid ON TABLE instance_relation TYPE string;
DEFINE FIELD created_at ON TABLE instance_relation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_relation_triple ON TABLE instance_relation \
    COLUMNS in, out, relation_type_uid UNIQUE;
DEFINE INDEX idx_relation_tenant ON TABLE instance_relation \
    COLUMNS tenant_id;
";

// -----------------------------------------------------------------------
// Schema v2: service tree nodes, binding rules and bindings
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Service tree nodes (tenant scope)
-- =======================================================================
DEFINE TABLE service_tree_node SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE service_tree_node TYPE string;
DEFINE FIELD uid ON TABLE service_tree_node TYPE string;
DEFINE FIELD name ON TABLE service_tree_node TYPE string;
DEFINE FIELD parent_id ON TABLE service_tree_node TYPE option<string>;
DEFINE FIELD level ON TABLE service_tree_node TYPE int DEFAULT 1;
DEFINE FIELD owner ON TABLE service_tree_node TYPE string;
DEFINE FIELD team ON TABLE service_tree_node TYPE string;
DEFINE FIELD description ON TABLE service_tree_node TYPE string;
DEFINE FIELD sort_order ON TABLE service_tree_node TYPE int DEFAULT 0;
DEFINE FIELD enabled ON TABLE service_tree_node TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE service_tree_node TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE service_tree_node TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_node_tenant ON TABLE service_tree_node \
    COLUMNS tenant_id;

-- =======================================================================
-- Binding rules (tenant scope)
-- =======================================================================
DEFINE TABLE binding_rule SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE binding_rule TYPE string;
DEFINE FIELD node_id ON TABLE binding_rule TYPE string;
DEFINE FIELD env_id ON TABLE binding_rule TYPE option<string>;
DEFINE FIELD name ON TABLE binding_rule TYPE string;
DEFINE FIELD priority ON TABLE binding_rule TYPE int DEFAULT 0;
DEFINE FIELD conditions ON TABLE binding_rule TYPE array<object>;
DEFINE FIELD conditions[*].field ON TABLE binding_rule TYPE string;
DEFINE FIELD conditions[*].operator ON TABLE binding_rule TYPE string;
DEFINE FIELD conditions[*].value ON TABLE binding_rule TYPE string;
DEFINE FIELD enabled ON TABLE binding_rule TYPE bool DEFAULT true;
DEFINE FIELD description ON TABLE binding_rule TYPE string;
DEFINE FIELD created_at ON TABLE binding_rule TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE binding_rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_rule_tenant_enabled ON TABLE binding_rule \
    COLUMNS tenant_id, enabled;

-- =======================================================================
-- Resource bindings (tenant scope)
-- =======================================================================
-- env_id is '' when the binding is not environment specific so the
-- unique index covers that case too.
DEFINE TABLE resource_binding SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE resource_binding TYPE string;
DEFINE FIELD node_id ON TABLE resource_binding TYPE string;
DEFINE FIELD env_id ON TABLE resource_binding TYPE string;
DEFINE FIELD resource_type ON TABLE resource_binding TYPE string \
    ASSERT $value IN ['instance', 'asset'];
DEFINE FIELD resource_id ON TABLE resource_binding TYPE string;
DEFINE FIELD bind_type ON TABLE resource_binding TYPE string \
    ASSERT $value IN ['manual', 'rule'];
DEFINE FIELD rule_id ON TABLE resource_binding TYPE option<string>;
DEFINE FIELD created_at ON TABLE resource_binding TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_binding_resource ON TABLE resource_binding \
    COLUMNS tenant_id, env_id, resource_type, resource_id UNIQUE;
DEFINE INDEX idx_binding_rule ON TABLE resource_binding \
    COLUMNS tenant_id, rule_id;
";

// -----------------------------------------------------------------------
// Schema v3: model groups
// -----------------------------------------------------------------------

const SCHEMA_V3: &str = "\
-- =======================================================================
-- Model groups (global scope, keyed by uid)
-- =======================================================================
DEFINE TABLE model_group SCHEMAFULL;
DEFINE FIELD uid ON TABLE model_group TYPE string;
DEFINE FIELD name ON TABLE model_group TYPE string;
DEFINE FIELD icon ON TABLE model_group TYPE string;
DEFINE FIELD sort_order ON TABLE model_group TYPE int DEFAULT 0;
DEFINE FIELD is_builtin ON TABLE model_group TYPE bool DEFAULT false;
DEFINE FIELD description ON TABLE model_group TYPE string;
DEFINE FIELD created_at ON TABLE model_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE model_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_model_group_uid ON TABLE model_group COLUMNS uid UNIQUE;
DEFINE INDEX idx_model_model_group ON TABLE model COLUMNS model_group;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;
    }

    info!(
        from = current_version,
        to = MIGRATIONS.last().map(|m| m.version).unwrap_or(0),
        "Schema up to date"
    );

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for tests that inspect the table definitions directly.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_relation_uniqueness() {
        assert!(SCHEMA_V1.contains("idx_relation_triple"));
        assert!(SCHEMA_V1.contains("idx_instance_natural_key"));
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
