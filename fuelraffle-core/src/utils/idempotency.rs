//! Idempotency keys.

use super::draw_selection::to_hex;
use ring::digest;
use uuid::Uuid;

/// Key of a redemption: SHA-256 over the token's station, dispenser and issue
/// time plus the coupon being redeemed, hex encoded.
///
/// Rescanning the same QR code for the same coupon yields the same key.
pub fn redemption_key(
    station_id: Uuid,
    dispenser_id: Uuid,
    coupon_id: Uuid,
    issued_at: i64,
) -> String {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(station_id.as_bytes());
    ctx.update(dispenser_id.as_bytes());
    ctx.update(coupon_id.as_bytes());
    ctx.update(&issued_at.to_be_bytes());
    to_hex(ctx.finish().as_ref())
}

/// Key of an ad engagement, used when the caller does not supply one.
pub fn engagement_key(engagement_id: Uuid, user_id: Uuid) -> String {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(b"ad-engagement");
    ctx.update(engagement_id.as_bytes());
    ctx.update(user_id.as_bytes());
    to_hex(ctx.finish().as_ref())
}
