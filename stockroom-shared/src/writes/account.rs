/// Account writes: registration and profile images.

use futures::FutureExt;

use super::WriteError;
use crate::db::{seed::user_role_grouping, transaction::TransactionRunner};
use crate::models::{
    image::{CreateImage, Image},
    policy::PolicyRule,
    role::Role,
    user::{CreateUser, ProfileImage, User},
};

/// Registration input with the password already hashed
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

/// Creates the user and its `role:user` grouping together
///
/// # Errors
///
/// [`WriteError::Conflict`] when the username or email is taken.
pub async fn register(runner: &TransactionRunner, registration: Registration) -> Result<User, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                if User::username_taken(&mut *conn, &registration.username).await? {
                    return Err(WriteError::Conflict("Username already taken".to_string()));
                }
                if User::email_taken(&mut *conn, &registration.email).await? {
                    return Err(WriteError::Conflict("Email already registered".to_string()));
                }

                let user = User::create(
                    &mut *conn,
                    CreateUser {
                        username: registration.username,
                        password_hash: registration.password_hash,
                        email: registration.email,
                        full_name: registration.full_name,
                        role_id: Role::User.id(),
                    },
                )
                .await
                .map_err(|e| WriteError::conflict_on_duplicate(e, "Username or email already taken"))?;

                PolicyRule::insert(&mut *conn, &user_role_grouping(user.id, Role::User)).await?;

                tracing::info!(user_id = user.id, username = %user.username, "User registered");
                Ok(user)
            }
            .boxed()
        })
        .await
}

/// Stores image metadata and links it as the user's newest profile image
pub async fn attach_profile_image(
    runner: &TransactionRunner,
    user_id: i64,
    image: CreateImage,
) -> Result<Image, WriteError> {
    runner
        .with_transaction(move |conn| {
            async move {
                let image = Image::create(&mut *conn, user_id, image).await?;
                ProfileImage::create(&mut *conn, user_id, image.id).await?;
                Ok(image)
            }
            .boxed()
        })
        .await
}
