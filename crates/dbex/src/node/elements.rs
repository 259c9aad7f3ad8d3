//! Element and attribute names of the backup document.

/// Root element wrapping the whole backup.
pub const ROOT: &str = "backup";

/// Default namespace of backup documents.
pub const DEFAULT_NAMESPACE: &str = "http://www.atlassian.com/ao";

/// XML Schema instance namespace, used for the nil marker only.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub mod database {
    pub const NAME: &str = "database-information";
    pub const META: &str = "meta";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

pub mod table {
    pub const NAME: &str = "table";
    pub const NAME_ATTR: &str = "name";
}

pub mod column {
    pub const NAME: &str = "column";
    pub const NAME_ATTR: &str = "name";
    pub const PRIMARY_KEY: &str = "primaryKey";
    pub const AUTO_INCREMENT: &str = "autoIncrement";
    pub const SQL_TYPE: &str = "sqlType";
    pub const PRECISION: &str = "precision";
    pub const SCALE: &str = "scale";
}

pub mod foreign_key {
    pub const NAME: &str = "foreign-key";
    pub const NAME_ATTR: &str = "name";
    pub const FROM_TABLE: &str = "fromTable";
    pub const FROM_COLUMN: &str = "fromColumn";
    pub const TO_TABLE: &str = "toTable";
    pub const TO_COLUMN: &str = "toColumn";
}

pub mod data {
    pub const NAME: &str = "data";
    pub const TABLE_NAME: &str = "tableName";
    pub const COLUMN: &str = "column";
    pub const COLUMN_NAME: &str = "name";
    pub const ROW: &str = "row";
}
