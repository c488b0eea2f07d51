/// Team membership lifecycle
///
/// ```text
/// None ──invite / request_join──▶ Pending (inactive, Member)
/// None ──join_with_link──▶ Active (Member)
/// Pending ──accept──▶ Active (assigned role)
/// ```
///
/// A second membership for the same (team, user) is always a conflict; the
/// partial unique index on `team_members` backs the check when two requests
/// race. Role changes lock every owner row first so two concurrent demotions
/// cannot leave a team without an owner.

use futures::FutureExt;
use sqlx::PgConnection;
use tracing::info;

use super::WriteError;
use crate::db::transaction::TransactionRunner;
use crate::models::{
    membership::{MembershipState, TeamMember},
    role::TeamRole,
    team::Team,
    user::User,
};

const ALREADY_MEMBER: &str = "User already has a membership in this team";

/// Team admin invites `user_id`; the membership starts pending
pub async fn invite_member(runner: &TransactionRunner, team_id: i64, user_id: i64) -> Result<TeamMember, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                if !User::exists(&mut *conn, user_id).await? {
                    return Err(WriteError::NotFound("User not found".to_string()));
                }

                let member = create_membership(conn, team_id, user_id, false).await?;
                info!(team_id, user_id, "Member invited");
                Ok(member)
            }
            .boxed()
        })
        .await
}

/// `user_id` asks to join; the membership starts pending
pub async fn request_join(runner: &TransactionRunner, team_id: i64, user_id: i64) -> Result<TeamMember, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                ensure_team(conn, team_id).await?;

                let member = create_membership(conn, team_id, user_id, false).await?;
                info!(team_id, user_id, "Join requested");
                Ok(member)
            }
            .boxed()
        })
        .await
}

/// Shared-link join: the membership is active immediately as Member
pub async fn join_with_link(runner: &TransactionRunner, team_id: i64, user_id: i64) -> Result<TeamMember, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                ensure_team(conn, team_id).await?;

                let member = create_membership(conn, team_id, user_id, true).await?;
                info!(team_id, user_id, "Joined through shared link");
                Ok(member)
            }
            .boxed()
        })
        .await
}

/// Pending → Active with `role`
///
/// # Errors
///
/// - [`WriteError::NotFound`] when there is no membership
/// - [`WriteError::Conflict`] when the membership is already active
pub async fn accept_member(
    runner: &TransactionRunner,
    team_id: i64,
    user_id: i64,
    role: TeamRole,
) -> Result<TeamMember, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                let existing = TeamMember::find_for_update(conn, team_id, user_id).await?;

                match MembershipState::of(existing.as_ref()) {
                    MembershipState::None => {
                        return Err(WriteError::NotFound("Membership not found".to_string()));
                    }
                    MembershipState::Active => {
                        return Err(WriteError::Conflict("Membership is already active".to_string()));
                    }
                    MembershipState::Pending => {}
                }

                if !TeamMember::activate(&mut *conn, team_id, user_id, role).await? {
                    return Err(WriteError::Conflict("Membership is already active".to_string()));
                }

                info!(team_id, user_id, role = role.name(), "Membership accepted");
                reload(conn, team_id, user_id).await
            }
            .boxed()
        })
        .await
}

/// Invitee accepts their own pending invitation as Member
pub async fn accept_invite(runner: &TransactionRunner, team_id: i64, user_id: i64) -> Result<TeamMember, WriteError> {
    accept_member(runner, team_id, user_id, TeamRole::Member).await
}

/// Changes an active member's role, keeping at least one owner
pub async fn update_member_role(
    runner: &TransactionRunner,
    team_id: i64,
    user_id: i64,
    role: TeamRole,
) -> Result<TeamMember, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                // Owners first, then the target, in a fixed order across requests.
                let owners = TeamMember::lock_owners(conn, team_id).await?;

                let member = TeamMember::find_for_update(conn, team_id, user_id)
                    .await?
                    .filter(|m| m.is_active)
                    .ok_or_else(|| WriteError::NotFound("Member not found".to_string()))?;

                if member.role() == Some(TeamRole::Owner) && role != TeamRole::Owner && owners <= 1 {
                    return Err(WriteError::Conflict(
                        "A team must keep at least one owner".to_string(),
                    ));
                }

                TeamMember::set_role(&mut *conn, team_id, user_id, role).await?;

                info!(team_id, user_id, role = role.name(), "Member role updated");
                reload(conn, team_id, user_id).await
            }
            .boxed()
        })
        .await
}

async fn ensure_team(conn: &mut PgConnection, team_id: i64) -> Result<Team, WriteError> {
    Team::find_by_id(&mut *conn, team_id)
        .await?
        .ok_or_else(|| WriteError::NotFound("Team not found".to_string()))
}

async fn create_membership(
    conn: &mut PgConnection,
    team_id: i64,
    user_id: i64,
    is_active: bool,
) -> Result<TeamMember, WriteError> {
    if TeamMember::find(&mut *conn, team_id, user_id).await?.is_some() {
        return Err(WriteError::Conflict(ALREADY_MEMBER.to_string()));
    }

    TeamMember::create(&mut *conn, team_id, user_id, TeamRole::Member, is_active)
        .await
        .map_err(|e| WriteError::conflict_on_duplicate(e, ALREADY_MEMBER))
}

async fn reload(conn: &mut PgConnection, team_id: i64, user_id: i64) -> Result<TeamMember, WriteError> {
    TeamMember::find(&mut *conn, team_id, user_id)
        .await?
        .ok_or_else(|| WriteError::NotFound("Member not found".to_string()))
}
