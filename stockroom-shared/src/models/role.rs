/// Role catalogs
///
/// Both catalogs are fixed at compile time, seeded into their tables on
/// startup (`db::seed`) and never deleted. The numeric ids are the primary
/// keys stored in `users.role_id` and `team_members.team_role_id`.
///
/// # Team roles
///
/// - **Owner** (1): created with the team; at least one per team
/// - **Admin** (2): manages members and catalog data
/// - **Member** (3): day-to-day use; the role given to invitees

use serde::{Deserialize, Serialize};

/// Global role attached to every user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Moderator, Role::Admin, Role::SuperAdmin];

    pub fn id(&self) -> i64 {
        match self {
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
            Role::SuperAdmin => "SuperAdmin",
        }
    }

    /// Policy subject that user-id subjects are grouped into
    pub fn policy_subject(&self) -> &'static str {
        match self {
            Role::User => "role:user",
            Role::Moderator => "role:moderator",
            Role::Admin => "role:admin",
            Role::SuperAdmin => "role:superadmin",
        }
    }
}

/// Role held inside one team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub const ALL: [TeamRole; 3] = [TeamRole::Owner, TeamRole::Admin, TeamRole::Member];

    pub fn id(&self) -> i64 {
        match self {
            TeamRole::Owner => 1,
            TeamRole::Admin => 2,
            TeamRole::Member => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TeamRole::Owner => "Owner",
            TeamRole::Admin => "Admin",
            TeamRole::Member => "Member",
        }
    }

    /// Subject used when evaluating team-scoped policy rules
    pub fn policy_subject(&self) -> &'static str {
        match self {
            TeamRole::Owner => "team:owner",
            TeamRole::Admin => "team:admin",
            TeamRole::Member => "team:member",
        }
    }

    /// Owners and admins are notified about join requests
    pub fn is_manager(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

/// Schema family a report template renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSchemaType {
    Table,
    Chart,
    Document,
}

impl ReportSchemaType {
    pub const ALL: [ReportSchemaType; 3] = [
        ReportSchemaType::Table,
        ReportSchemaType::Chart,
        ReportSchemaType::Document,
    ];

    pub fn id(&self) -> i64 {
        match self {
            ReportSchemaType::Table => 1,
            ReportSchemaType::Chart => 2,
            ReportSchemaType::Document => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReportSchemaType::Table => "table",
            ReportSchemaType::Chart => "chart",
            ReportSchemaType::Document => "document",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_ids_round_trip() {
        for role in TeamRole::ALL {
            assert_eq!(TeamRole::from_id(role.id()), Some(role));
        }
        assert_eq!(TeamRole::from_id(0), None);
        assert_eq!(TeamRole::from_id(4), None);
    }

    #[test]
    fn test_catalog_ids_are_fixed() {
        assert_eq!(TeamRole::Owner.id(), 1);
        assert_eq!(TeamRole::Admin.id(), 2);
        assert_eq!(TeamRole::Member.id(), 3);
        assert_eq!(Role::User.id(), 1);
        assert_eq!(Role::SuperAdmin.id(), 4);
    }

    #[test]
    fn test_managers() {
        assert!(TeamRole::Owner.is_manager());
        assert!(TeamRole::Admin.is_manager());
        assert!(!TeamRole::Member.is_manager());
    }
}
