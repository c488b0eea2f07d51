/// Team creation and updates.

use futures::FutureExt;
use sqlx::PgPool;
use tracing::info;

use super::WriteError;
use crate::db::transaction::TransactionRunner;
use crate::models::{
    membership::TeamMember,
    role::TeamRole,
    team::{Team, TeamInput},
};

const DUPLICATE_USERNAME: &str = "Team username already taken";

/// Creates the team and makes `owner_id` its active Owner
///
/// Both rows commit together or not at all.
pub async fn create_team(runner: &TransactionRunner, owner_id: i64, input: TeamInput) -> Result<Team, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                let team = Team::create(&mut *conn, input)
                    .await
                    .map_err(|e| WriteError::conflict_on_duplicate(e, DUPLICATE_USERNAME))?;

                TeamMember::create(&mut *conn, team.id, owner_id, TeamRole::Owner, true).await?;

                info!(team_id = team.id, owner_id, "Team created");
                Ok(team)
            }
            .boxed()
        })
        .await
}

/// Replaces the team's editable fields
pub async fn update_team(pool: &PgPool, team_id: i64, input: TeamInput) -> Result<Team, WriteError> {
    Team::update(pool, team_id, input)
        .await
        .map_err(|e| WriteError::conflict_on_duplicate(e, DUPLICATE_USERNAME))?
        .ok_or_else(|| WriteError::NotFound("Team not found".to_string()))
}
