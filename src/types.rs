//! Shared identifier types.

use uuid::Uuid;

pub type UserId = Uuid;
pub type MemberId = Uuid;
pub type DuesRecordId = Uuid;
pub type ExpenditureId = Uuid;

/// Abbreviate a UUID for log output (first 8 hex chars).
pub fn abbrev_uuid(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("a1b2c3d4-e5f6-7890-abcd-ef1234567890").unwrap();
        assert_eq!(abbrev_uuid(&id), "a1b2c3d4");
    }
}
