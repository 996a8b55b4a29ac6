//! Session & Auth Adapter.
//!
//! Password hashing, token issuance and password reset are out of scope:
//! this module only resolves a `Principal` from whatever the out-of-core auth flow already
//! stamped on the session cookie, and issues/consumes `GameSessionToken`s. See DESIGN.md for the
//! Open Question decision on exactly what the cookie carries, given that cookie
//! verification to a collaborator this service doesn't own.

use crate::models::{Conversion, GameSessionToken, Mode, Principal, TokenConsumeStatus, UserId};
use crate::store::{Store, StoreResult};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// Reads `SESSION_COOKIE_NAME` out of the raw `Cookie` header directly rather than pulling in
/// `axum-extra`'s cookie jar — the surface here (one cookie, no attributes to round-trip)
/// doesn't need it.
fn cookie_value<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    let header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        (k.trim() == cookie_name).then(|| v.trim())
    })
}

/// Resolves a `Principal` for the current request. The session cookie's value is trusted to be
/// the user's id directly — verifying a signed/opaque session token is the out-of-core
/// responsibility this crate excludes.
pub async fn resolve_principal(
    parts: &Parts,
    cookie_name: &str,
    store: &dyn Store,
) -> Principal {
    let Some(raw) = cookie_value(parts, cookie_name) else {
        return Principal::Guest;
    };
    let Ok(user_id) = Uuid::parse_str(raw) else {
        return Principal::Guest;
    };
    match store.get_user(user_id).await {
        Ok(Some(user)) if user.is_admin => Principal::Admin { user_id },
        Ok(Some(_)) => Principal::User { user_id },
        _ => Principal::Guest,
    }
}

/// Extractor wrapper so handlers can write `principal: ResolvedPrincipal` in their signature.
/// Requires `crate::AppState` in `State`.
pub struct ResolvedPrincipal(pub Principal);

impl FromRequestParts<crate::AppState> for ResolvedPrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal =
            resolve_principal(parts, &state.config.session_cookie_name, state.store.as_ref())
                .await;
        Ok(ResolvedPrincipal(principal))
    }
}

const TOKEN_TTL_HOURS: i64 = 2;

pub async fn issue_game_session_token(
    store: &Arc<dyn Store>,
    user_id: UserId,
    room_id: Option<crate::models::RoomId>,
    mode: Mode,
    conv: Conversion,
) -> StoreResult<GameSessionToken> {
    let now = Utc::now();
    let token = GameSessionToken {
        session_id: Uuid::new_v4(),
        user_id,
        room_id,
        mode,
        conv,
        issued_at: now,
        expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
    };
    store.insert_game_session(token).await?;
    Ok(token)
}

pub async fn consume_game_session_token(
    store: &Arc<dyn Store>,
    session_id: Uuid,
    user_id: UserId,
    mode: Mode,
    conv: Conversion,
) -> StoreResult<TokenConsumeStatus> {
    store.consume_game_session(session_id, user_id, mode, conv).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, UserRecord};

    #[tokio::test]
    async fn issue_then_consume_succeeds_once() {
        let user_id = Uuid::new_v4();
        let mem = InMemoryStore::new();
        mem.seed_user(UserRecord {
            user_id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            is_admin: false,
        })
        .await;
        let store: Arc<dyn Store> = Arc::new(mem);

        let token = issue_game_session_token(
            &store,
            user_id,
            None,
            Mode::Classic,
            Conversion::BinaryStandalone,
        )
        .await
        .unwrap();

        let status = consume_game_session_token(
            &store,
            token.session_id,
            user_id,
            Mode::Classic,
            Conversion::BinaryStandalone,
        )
        .await
        .unwrap();
        assert_eq!(status, TokenConsumeStatus::Ok);

        let replay = consume_game_session_token(
            &store,
            token.session_id,
            user_id,
            Mode::Classic,
            Conversion::BinaryStandalone,
        )
        .await
        .unwrap();
        assert_eq!(replay, TokenConsumeStatus::AlreadyUsed);
    }
}
