/// Primary keys of leads, team members and events (`BIGSERIAL`).
pub type DbId = i64;

/// Stored and compared in UTC only.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Expected revenue (`ca`), in euros. Serialized as a JSON number.
pub type Money = rust_decimal::Decimal;
