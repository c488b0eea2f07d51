/// Multi-table writes against a real database.

mod common;

use futures::FutureExt;
use stockroom_shared::db::transaction::TransactionRunner;
use stockroom_shared::models::{
    membership::{MembershipState, TeamMember},
    product::{Product, ProductFields},
    role::TeamRole,
    team::TeamInput,
};
use stockroom_shared::sequence::SequenceGenerator;
use stockroom_shared::writes::{membership, product, team, WriteError};

fn fields(code: &str) -> ProductFields {
    ProductFields {
        code: code.to_string(),
        name: "Widget".to_string(),
        description: String::new(),
        uom: "pcs".to_string(),
        price: 1250,
    }
}

async fn product_count(pool: &sqlx::PgPool, team_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE team_id = $1")
        .bind(team_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_runner_commits_and_rolls_back() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());
    let owner = common::create_user(&pool).await;
    let team_id = common::create_owned_team(&pool, owner.id).await.id;

    let result: Result<(), WriteError> = runner
        .with_transaction(move |conn| {
            async move {
                Product::insert(&mut *conn, team_id, fields("ROLLBACK-1")).await?;
                Err(WriteError::Validation("abort".to_string()))
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(WriteError::Validation(msg)) if msg == "abort"));
    assert_eq!(product_count(&pool, team_id).await, 0);

    let panicked = tokio::spawn({
        let runner = runner.clone();
        async move {
            let _: Result<(), WriteError> = runner
                .with_transaction(move |conn| {
                    async move {
                        Product::insert(&mut *conn, team_id, fields("PANIC-1")).await?;
                        panic!("callback panicked");
                    }
                    .boxed()
                })
                .await;
        }
    })
    .await;

    assert!(panicked.is_err());
    assert_eq!(product_count(&pool, team_id).await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_team_creation_adds_owner() {
    let pool = common::test_pool().await;
    let owner = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;

    let member = TeamMember::find(&pool, team.id, owner.id).await.unwrap().unwrap();
    assert_eq!(member.role(), Some(TeamRole::Owner));
    assert_eq!(member.state(), MembershipState::Active);

    let duplicate = team::create_team(
        &TransactionRunner::new(pool.clone()),
        owner.id,
        TeamInput {
            name: "Again".to_string(),
            username: team.username.clone(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(duplicate, Err(WriteError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_foreign_category_rolls_back_product() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());
    let sequences = SequenceGenerator::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let ours = common::create_owned_team(&pool, owner.id).await;
    let theirs = common::create_owned_team(&pool, owner.id).await;
    let own_category = common::create_category(&pool, ours.id, "Tools").await;
    let foreign_category = common::create_category(&pool, theirs.id, "Parts").await;

    let result = product::create_product(
        &runner,
        &sequences,
        ours.id,
        fields("W-1"),
        vec![own_category.id, foreign_category.id],
    )
    .await;

    assert!(matches!(result, Err(WriteError::Validation(_))));
    assert_eq!(product_count(&pool, ours.id).await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_update_replaces_category_set() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());
    let sequences = SequenceGenerator::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;
    let a = common::create_category(&pool, team.id, "A").await;
    let b = common::create_category(&pool, team.id, "B").await;
    let c = common::create_category(&pool, team.id, "C").await;

    let created = product::create_product(&runner, &sequences, team.id, fields(""), vec![a.id, b.id])
        .await
        .unwrap();
    assert_eq!(created.code, "P000001");
    assert_eq!(Product::category_ids(&pool, created.id).await.unwrap(), vec![a.id, b.id]);

    product::update_product(&runner, team.id, created.id, fields("P000001"), vec![b.id, c.id])
        .await
        .unwrap();
    assert_eq!(Product::category_ids(&pool, created.id).await.unwrap(), vec![b.id, c.id]);

    product::update_product(&runner, team.id, created.id, fields("P000001"), Vec::new())
        .await
        .unwrap();
    assert!(Product::category_ids(&pool, created.id).await.unwrap().is_empty());

    // A rejected update leaves the previous set in place
    product::update_product(&runner, team.id, created.id, fields("P000001"), vec![a.id])
        .await
        .unwrap();
    let rejected = product::update_product(&runner, team.id, created.id, fields("P000001"), vec![a.id, -1]).await;
    assert!(matches!(rejected, Err(WriteError::Validation(_))));
    assert_eq!(Product::category_ids(&pool, created.id).await.unwrap(), vec![a.id]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_link_insert_restores_product_fields() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;
    let tools = common::create_category(&pool, team.id, "Tools").await;

    let original = Product::insert(&pool, team.id, fields("W-7")).await.unwrap();
    let mut tx = pool.begin().await.unwrap();
    Product::insert_category_links(&mut *tx, original.id, &[tools.id]).await.unwrap();
    tx.commit().await.unwrap();

    let product_id = original.id;
    let team_id = team.id;
    let result: Result<Product, WriteError> = runner
        .with_transaction(move |conn| {
            async move {
                let changed = ProductFields {
                    name: "Renamed".to_string(),
                    price: 9900,
                    ..fields("W-7")
                };
                let product = Product::update(&mut *conn, team_id, product_id, changed)
                    .await?
                    .ok_or_else(|| WriteError::NotFound("Product not found".to_string()))?;

                Product::clear_category_links(conn, product_id).await?;
                // No such category: the junction foreign key rejects it
                Product::insert_category_links(conn, product_id, &[i64::MAX]).await?;
                Ok(product)
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(WriteError::Database(_))));

    let stored = Product::find(&pool, team.id, product_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Widget");
    assert_eq!(stored.price, 1250);
    assert_eq!(stored.updated_at, original.updated_at);
    assert_eq!(Product::category_ids(&pool, product_id).await.unwrap(), vec![tools.id]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_membership_state_machine() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let invitee = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;

    // None: accept is NotFound
    assert!(matches!(
        membership::accept_member(&runner, team.id, invitee.id, TeamRole::Admin).await,
        Err(WriteError::NotFound(_))
    ));

    // None → Pending
    let pending = membership::invite_member(&runner, team.id, invitee.id).await.unwrap();
    assert_eq!(pending.state(), MembershipState::Pending);
    assert_eq!(pending.role(), Some(TeamRole::Member));
    assert!(TeamMember::active_role_id(&pool, team.id, invitee.id).await.unwrap().is_none());

    // Pending: a second invite conflicts
    assert!(matches!(
        membership::invite_member(&runner, team.id, invitee.id).await,
        Err(WriteError::Conflict(_))
    ));

    // Pending → Active
    let active = membership::accept_member(&runner, team.id, invitee.id, TeamRole::Admin)
        .await
        .unwrap();
    assert_eq!(active.state(), MembershipState::Active);
    assert_eq!(active.role(), Some(TeamRole::Admin));

    // Active: accept and invite both conflict
    assert!(matches!(
        membership::accept_member(&runner, team.id, invitee.id, TeamRole::Member).await,
        Err(WriteError::Conflict(_))
    ));
    assert!(matches!(
        membership::invite_member(&runner, team.id, invitee.id).await,
        Err(WriteError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_shared_link_and_join_request() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let linked = common::create_user(&pool).await;
    let requester = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;

    let member = membership::join_with_link(&runner, team.id, linked.id).await.unwrap();
    assert_eq!(member.state(), MembershipState::Active);
    assert!(matches!(
        membership::join_with_link(&runner, team.id, linked.id).await,
        Err(WriteError::Conflict(_))
    ));

    let request = membership::request_join(&runner, team.id, requester.id).await.unwrap();
    assert_eq!(request.state(), MembershipState::Pending);
    let accepted = membership::accept_invite(&runner, team.id, requester.id).await.unwrap();
    assert_eq!(accepted.role(), Some(TeamRole::Member));

    assert!(matches!(
        membership::request_join(&runner, i64::MAX, requester.id).await,
        Err(WriteError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_last_owner_cannot_be_demoted() {
    let pool = common::test_pool().await;
    let runner = TransactionRunner::new(pool.clone());

    let owner = common::create_user(&pool).await;
    let second = common::create_user(&pool).await;
    let team = common::create_owned_team(&pool, owner.id).await;

    assert!(matches!(
        membership::update_member_role(&runner, team.id, owner.id, TeamRole::Member).await,
        Err(WriteError::Conflict(_))
    ));

    membership::join_with_link(&runner, team.id, second.id).await.unwrap();
    membership::update_member_role(&runner, team.id, second.id, TeamRole::Owner)
        .await
        .unwrap();

    let demoted = membership::update_member_role(&runner, team.id, owner.id, TeamRole::Admin)
        .await
        .unwrap();
    assert_eq!(demoted.role(), Some(TeamRole::Admin));

    assert!(matches!(
        membership::update_member_role(&runner, team.id, second.id, TeamRole::Member).await,
        Err(WriteError::Conflict(_))
    ));
}
