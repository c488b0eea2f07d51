/// Team and membership endpoints
///
/// ```text
/// access token only
///   GET  /teams                       all teams, ?name=, paginated
///   POST /teams                       create, caller becomes owner
///   GET  /teams/me                    caller's active memberships
///   GET  /teams/join?token=           accept an emailed invite
///   POST /teams/join/link             join through a shared link
///   POST /teams/:team_id/request-join ask to join
///
/// team permission
///   GET  /teams/:team_id              PUT /teams/:team_id
///   GET  .../member-count             GET .../members
///   GET  .../pending-member-count     GET .../pending-members
///   GET  .../user-me                  PUT .../member-role
///   POST .../pending-member           POST .../shared-link
///   POST .../accept
/// ```
///
/// Mail goes out after the membership write has committed. A delivery
/// failure is logged and does not undo the write.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::{CountResponse, NameFilter},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use stockroom_shared::{
    auth::{guard::TeamAccess, identity::Identity},
    mailer::MailMessage,
    models::{
        membership::{MemberProfile, TeamMember},
        pagination::{contains_pattern, prefix_pattern, PageRequest},
        role::TeamRole,
        team::{MemberTeam, Team, TeamInput},
        user::User,
    },
    writes::{membership, team},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct TeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl From<TeamRequest> for TeamInput {
    fn from(req: TeamRequest) -> Self {
        TeamInput {
            name: req.name.trim().to_string(),
            username: req.username.trim().to_string(),
            description: req.description,
            address: req.address,
            phone: req.phone,
            email: req.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct MemberFilter {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_id: i64,
}

/// Body of `member-role` and `accept`
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub user_id: i64,
    pub team_role_id: i64,
}

impl RoleRequest {
    fn role(&self) -> ApiResult<TeamRole> {
        TeamRole::from_id(self.team_role_id)
            .ok_or_else(|| ApiError::invalid("team_role_id", "Unknown team role"))
    }

    /// Only an owner may hand out the owner role
    fn role_granted_by(&self, granter: TeamRole) -> ApiResult<TeamRole> {
        let role = self.role()?;
        if role == TeamRole::Owner && granter != TeamRole::Owner {
            return Err(ApiError::Unauthorized);
        }
        Ok(role)
    }
}

#[derive(Debug, Serialize)]
pub struct SharedLinkResponse {
    pub token: String,
    pub url: String,
}

async fn send_mail(state: &AppState, message: MailMessage) {
    let to = message.to.clone();
    if let Err(e) = state.mailer.send(message).await {
        tracing::warn!(to = %to, error = %e, "Mail delivery failed");
    }
}

pub async fn list_teams(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<NameFilter>,
) -> ApiResult<ApiResponse<Vec<Team>>> {
    let page = Team::list(&state.db, contains_pattern(filter.name.as_deref()), page.normalized()).await?;
    Ok(ApiResponse::page(page))
}

pub async fn my_teams(
    State(state): State<AppState>,
    identity: Identity,
    Query(page): Query<PageRequest>,
) -> ApiResult<ApiResponse<Vec<MemberTeam>>> {
    let page = Team::list_for_member(&state.db, identity.user_id, page.normalized()).await?;
    Ok(ApiResponse::page(page))
}

/// Creates the team with the caller as its owner
pub async fn create_team(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<TeamRequest>,
) -> ApiResult<ApiResponse<Team>> {
    req.validate()?;

    let team = team::create_team(&state.runner, identity.user_id, req.into()).await?;
    Ok(ApiResponse::created(team))
}

/// The invitee accepts; the token must have been issued to the caller
pub async fn accept_invite(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<InviteQuery>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let (team_id, user_id) = state.credentials.team_invite_from_token(&query.token)?;
    if user_id != identity.user_id {
        tracing::debug!(team_id, user_id, caller = identity.user_id, "Invite token for another user");
        return Err(ApiError::Unauthorized);
    }

    let member = membership::accept_invite(&state.runner, team_id, user_id).await?;
    Ok(ApiResponse::ok(member))
}

pub async fn join_with_link(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<LinkRequest>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let team_id = state.credentials.team_from_link_token(&req.token)?;

    let member = membership::join_with_link(&state.runner, team_id, identity.user_id).await?;
    Ok(ApiResponse::created(member))
}

/// Creates a pending membership and notifies the team's owners and admins
pub async fn request_join(
    State(state): State<AppState>,
    identity: Identity,
    Path(team_id): Path<i64>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let member = membership::request_join(&state.runner, team_id, identity.user_id).await?;

    let team = Team::find_by_id(&state.db, team_id).await?;
    let requester = User::find_by_id(&state.db, identity.user_id).await?;
    if let (Some(team), Some(requester)) = (team, requester) {
        for email in TeamMember::manager_emails(&state.db, team_id).await? {
            send_mail(&state, MailMessage::join_request(&email, &team.name, &requester.username)).await;
        }
    }

    Ok(ApiResponse::created(member))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
) -> ApiResult<ApiResponse<Team>> {
    let team = Team::find_by_id(&state.db, access.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    Ok(ApiResponse::ok(team))
}

pub async fn update_team(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<TeamRequest>,
) -> ApiResult<ApiResponse<Team>> {
    req.validate()?;

    let team = team::update_team(&state.db, access.team_id, req.into()).await?;
    Ok(ApiResponse::ok(team))
}

pub async fn member_count(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
) -> ApiResult<ApiResponse<CountResponse>> {
    let count = TeamMember::count(&state.db, access.team_id, true).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

pub async fn pending_member_count(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
) -> ApiResult<ApiResponse<CountResponse>> {
    let count = TeamMember::count(&state.db, access.team_id, false).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

async fn member_page(
    state: &AppState,
    team_id: i64,
    is_active: bool,
    page: PageRequest,
    filter: MemberFilter,
) -> ApiResult<ApiResponse<Vec<MemberProfile>>> {
    let page = TeamMember::list_profiles(
        &state.db,
        team_id,
        is_active,
        prefix_pattern(filter.username.as_deref()),
        page.normalized(),
    )
    .await?;

    Ok(ApiResponse::page(page))
}

pub async fn members(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<ApiResponse<Vec<MemberProfile>>> {
    member_page(&state, access.team_id, true, page, filter).await
}

pub async fn pending_members(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<ApiResponse<Vec<MemberProfile>>> {
    member_page(&state, access.team_id, false, page, filter).await
}

/// The caller's own membership in the team
pub async fn user_me(
    State(state): State<AppState>,
    identity: Identity,
    Extension(access): Extension<TeamAccess>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let member = TeamMember::find(&state.db, access.team_id, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    Ok(ApiResponse::ok(member))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let role = req.role()?;

    let member = membership::update_member_role(&state.runner, access.team_id, req.user_id, role).await?;
    Ok(ApiResponse::ok(member))
}

/// Creates a pending membership and mails the invitee a join token
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let member = membership::invite_member(&state.runner, access.team_id, req.user_id).await?;

    let token = state.credentials.issue_team_invite_token(access.team_id, req.user_id)?;
    let team = Team::find_by_id(&state.db, access.team_id).await?;
    let invitee = User::find_by_id(&state.db, req.user_id).await?;
    if let (Some(team), Some(invitee)) = (team, invitee) {
        let message = MailMessage::team_invite(&invitee.email, &team.name, &state.config.api.base_url, &token);
        send_mail(&state, message).await;
    }

    Ok(ApiResponse::created(member))
}

/// Issues a link token anyone signed in can use to join as a member
pub async fn shared_link(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
) -> ApiResult<ApiResponse<SharedLinkResponse>> {
    let token = state.credentials.issue_team_link_token(access.team_id)?;
    let url = format!(
        "{}/teams/join/link?token={}",
        state.config.api.base_url.trim_end_matches('/'),
        token
    );

    Ok(ApiResponse::ok(SharedLinkResponse { token, url }))
}

/// A manager activates a pending membership with the given role
pub async fn accept_member(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<ApiResponse<TeamMember>> {
    let role = req.role_granted_by(access.role)?;

    let member = membership::accept_member(&state.runner, access.team_id, req.user_id, role).await?;
    Ok(ApiResponse::ok(member))
}
