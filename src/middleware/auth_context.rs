use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::AppState;
use crate::tokens::{AdminClaims, UserClaims};

/// Signed-in site member.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

impl From<UserClaims> for UserContext {
    fn from(c: UserClaims) -> Self {
        UserContext {
            user_id: c.id,
            username: c.username,
            email: c.email,
        }
    }
}

/// Member if a valid user token was sent, anonymous otherwise.
/// A bad token is treated the same as no token.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserContext>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

/// Holder of the shared admin token.
#[derive(Debug, Clone)]
pub struct AdminContext;

/// Raw bearer token for the reservation self-service routes. Which
/// reservation it unlocks is checked by the handler against the path id.
#[derive(Debug, Clone)]
pub struct ReservationBearer(pub String);

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
        TypedHeader::from_request_parts(parts, state).await.ok()?;
    Some(authz.token().to_string())
}

impl FromRequestParts<AppState> for UserContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = bearer_token(parts, state)
                .await
                .ok_or_else(ApiError::unauthenticated)?;
            let claims = state.tokens.verify::<UserClaims>(&token)?;
            Ok(claims.into())
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let Some(token) = bearer_token(parts, state).await else {
                return Ok(MaybeUser(None));
            };
            let user = state
                .tokens
                .verify::<UserClaims>(&token)
                .ok()
                .map(UserContext::from);
            Ok(MaybeUser(user))
        }
    }
}

impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = bearer_token(parts, state)
                .await
                .ok_or_else(ApiError::unauthenticated)?;
            state.tokens.verify::<AdminClaims>(&token)?;
            Ok(AdminContext)
        }
    }
}

impl FromRequestParts<AppState> for ReservationBearer {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            bearer_token(parts, state)
                .await
                .map(ReservationBearer)
                .ok_or_else(ApiError::unauthenticated)
        }
    }
}

/// Best-effort client address: first `X-Forwarded-For` hop, else the peer.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        std::future::ready(Ok(ClientIp(forwarded.or(peer))))
    }
}
