use std::collections::BTreeMap;
use std::fmt;

/// Object types as Snowflake names them in `GRANT ... ON <type>` and in the
/// `granted_on` / `granted_to` columns of `SHOW GRANTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Database,
    Role,
    Schema,
    Table,
    View,
    Stage,
    User,
    Warehouse,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Database => "DATABASE",
            ObjectType::Role => "ROLE",
            ObjectType::Schema => "SCHEMA",
            ObjectType::Table => "TABLE",
            ObjectType::View => "VIEW",
            ObjectType::Stage => "STAGE",
            ObjectType::User => "USER",
            ObjectType::Warehouse => "WAREHOUSE",
        }
    }

    /// Plural form used by `ON FUTURE <types> IN SCHEMA`.
    pub fn plural(&self) -> String {
        format!("{}S", self.as_str())
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Privileges keyed by the object type they are granted on.
pub type ObjectPrivileges = BTreeMap<ObjectType, Vec<&'static str>>;

/// The privilege sets handed out to generated roles.
///
/// The reconciler takes a policy at construction, `PrivilegePolicy::default()`
/// being the standard one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegePolicy {
    pub warehouse_minimal: Vec<&'static str>,
    pub database_minimal: Vec<&'static str>,
    pub schema_write_access: Vec<&'static str>,
    pub schema_read_only: Vec<&'static str>,
    /// Future grants for read-only roles.
    pub object_read: ObjectPrivileges,
    /// Future grants for read-write roles.
    pub object_write: ObjectPrivileges,
}

impl Default for PrivilegePolicy {
    fn default() -> Self {
        Self {
            warehouse_minimal: vec!["USAGE"],
            database_minimal: vec!["USAGE"],
            schema_write_access: vec!["CREATE STAGE", "CREATE TABLE", "CREATE VIEW", "USAGE"],
            schema_read_only: vec!["USAGE"],
            object_read: BTreeMap::from([
                (ObjectType::Table, vec!["SELECT"]),
                (ObjectType::View, vec!["SELECT"]),
                (ObjectType::Stage, vec!["READ"]),
            ]),
            object_write: BTreeMap::from([
                (
                    ObjectType::Table,
                    vec!["SELECT", "INSERT", "UPDATE", "DELETE", "TRUNCATE", "REFERENCES"],
                ),
                (ObjectType::View, vec!["SELECT"]),
                // READ must accompany WRITE on stages
                (ObjectType::Stage, vec!["WRITE", "READ"]),
            ]),
        }
    }
}
