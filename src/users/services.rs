use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Credentials, PublicUser, RegisterResponse, TokenResponse, UserPayload},
    model::{NewUser, UserChanges, UserField},
    repo::{parse_user_id, UserStore},
};
use crate::{
    auth::{hash_password, jwt::TOKEN_TYPE, verify_password, JwtKeys},
    error::{AppError, AppResult},
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims the username and normalises the email. Any string is an acceptable
/// value for either field; only the wire decoders reject payloads.
fn normalize(payload: &mut UserPayload) {
    payload.username = payload.username.trim().to_string();
    payload.email = normalize_email(&payload.email);
}

fn new_user(payload: UserPayload) -> AppResult<NewUser> {
    Ok(NewUser {
        password_hash: hash_password(&payload.password)?,
        username: payload.username,
        email: payload.email,
    })
}

async fn load(store: &dyn UserStore, id: Uuid) -> AppResult<PublicUser> {
    store
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(AppError::user_not_found)
}

/// Registers a new account. The email pre-check and the insert are two
/// separate store calls, so concurrent registrations of one email can both pass.
#[instrument(skip(store, payload))]
pub async fn register(store: &dyn UserStore, mut payload: UserPayload) -> AppResult<RegisterResponse> {
    normalize(&mut payload);

    if store
        .find_by_field(UserField::Email, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::AlreadyExists("email already registered".into()));
    }

    let email = payload.email.clone();
    let id = store.insert(new_user(payload)?).await?;
    info!(user_id = %id, %email, "user registered");
    Ok(RegisterResponse { id })
}

#[instrument(skip(store, keys, creds))]
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    creds: Credentials,
) -> AppResult<TokenResponse> {
    let email = normalize_email(&creds.email);

    let Some(user) = store.find_by_field(UserField::Email, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::invalid_credentials());
    };

    if !verify_password(&creds.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::invalid_credentials());
    }

    let access_token = keys.issue(&user.email)?;
    info!(user_id = %user.id, %email, "user logged in");
    Ok(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    })
}

/// Administrative create: no uniqueness pre-check, returns the stored record.
#[instrument(skip(store, payload))]
pub async fn create_user(store: &dyn UserStore, mut payload: UserPayload) -> AppResult<PublicUser> {
    normalize(&mut payload);
    let id = store.insert(new_user(payload)?).await?;
    info!(user_id = %id, "user created");
    load(store, id).await
}

#[instrument(skip(store))]
pub async fn get_user(store: &dyn UserStore, raw_id: &str) -> AppResult<PublicUser> {
    let id = parse_user_id(raw_id)?;
    load(store, id).await
}

/// Resolves the token subject back to its record.
#[instrument(skip(store))]
pub async fn get_current_user(store: &dyn UserStore, email: &str) -> AppResult<PublicUser> {
    store
        .find_by_field(UserField::Email, email)
        .await?
        .map(PublicUser::from)
        .ok_or_else(AppError::user_not_found)
}

/// Replaces username, email and password. The password is always re-hashed.
#[instrument(skip(store, payload))]
pub async fn update_user(
    store: &dyn UserStore,
    raw_id: &str,
    mut payload: UserPayload,
) -> AppResult<PublicUser> {
    let id = parse_user_id(raw_id)?;
    normalize(&mut payload);

    let changes = UserChanges {
        password_hash: hash_password(&payload.password)?,
        username: payload.username,
        email: payload.email,
    };
    if store.update_by_id(id, changes).await? == 0 {
        return Err(AppError::user_not_found());
    }
    info!(user_id = %id, "user updated");
    load(store, id).await
}

#[instrument(skip(store))]
pub async fn delete_user(store: &dyn UserStore, raw_id: &str) -> AppResult<()> {
    let id = parse_user_id(raw_id)?;
    if store.delete_by_id(id).await? == 0 {
        return Err(AppError::user_not_found());
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

pub async fn list_users(store: &dyn UserStore) -> AppResult<Vec<PublicUser>> {
    let users = store.list_all().await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}
