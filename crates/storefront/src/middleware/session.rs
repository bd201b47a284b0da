//! Session middleware configuration and guest session state.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. Guests get a
//! random cart token in their session the first time they add to a cart,
//! and the IDs of orders they place are remembered so they can pay for them.

use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use uuid::Uuid;

use emporium_core::OrderId;

use crate::config::StorefrontConfig;
use crate::models::{CartOwner, CurrentUser, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "emporium_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Guest orders remembered per session.
const MAX_GUEST_ORDERS: usize = 20;

/// Create the session layer with `PostgreSQL` store.
///
/// The session table is created by `emporium migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The guest cart token, if this session has one.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn guest_cart_token(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(session_keys::GUEST_CART_TOKEN).await
}

/// The cart owner for a request, creating a guest token when `create` is set.
///
/// Returns `None` for an anonymous session without a token when `create`
/// is false; such a session has an empty cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn cart_owner(
    session: &Session,
    user: Option<&CurrentUser>,
    create: bool,
) -> Result<Option<CartOwner>, tower_sessions::session::Error> {
    if let Some(user) = user {
        return Ok(Some(CartOwner::User(user.id)));
    }

    if let Some(token) = guest_cart_token(session).await? {
        return Ok(Some(CartOwner::Guest(token)));
    }

    if !create {
        return Ok(None);
    }

    let token = Uuid::new_v4().simple().to_string();
    session
        .insert(session_keys::GUEST_CART_TOKEN, &token)
        .await?;
    Ok(Some(CartOwner::Guest(token)))
}

/// Forget the guest cart token (after it was merged into a user cart).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_guest_cart_token(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<String>(session_keys::GUEST_CART_TOKEN)
        .await?;
    Ok(())
}

/// Orders placed by the guest in this session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn guest_order_ids(session: &Session) -> Result<Vec<OrderId>, tower_sessions::session::Error> {
    Ok(session
        .get::<Vec<OrderId>>(session_keys::GUEST_ORDER_IDS)
        .await?
        .unwrap_or_default())
}

/// Remember an order placed by a guest.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn record_guest_order(
    session: &Session,
    order_id: OrderId,
) -> Result<(), tower_sessions::session::Error> {
    let mut ids = guest_order_ids(session).await?;
    push_bounded(&mut ids, order_id);
    session.insert(session_keys::GUEST_ORDER_IDS, ids).await
}

fn push_bounded(ids: &mut Vec<OrderId>, id: OrderId) {
    if ids.contains(&id) {
        return;
    }
    ids.push(id);
    if ids.len() > MAX_GUEST_ORDERS {
        let excess = ids.len() - MAX_GUEST_ORDERS;
        ids.drain(..excess);
    }
}
