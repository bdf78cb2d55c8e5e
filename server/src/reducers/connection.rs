//! Connection lifecycle reducers.
//!
//! Presence rows only live while a client is connected; structures and raids
//! persist across sessions.

use crate::schema::*;
use spacetimedb::ReducerContext;

#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) {
    log::info!("Client connected: {:?}", ctx.sender);
}

/// Drops the caller's presence row so other clients dispose its ghost on their next pull.
#[spacetimedb::reducer(client_disconnected)]
pub fn identity_disconnected(ctx: &ReducerContext) {
    log::info!("Client disconnected: {:?}", ctx.sender);
    ctx.db.presence().identity().delete(ctx.sender);
}
