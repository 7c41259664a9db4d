//! Whitelist, blacklist, and operational log tables.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

/// Returns the whitelist tier for `pubkey`, `0` when not listed.
pub fn whitelist_tier(conn: &Connection, pubkey: &str) -> Result<u8, StoreError> {
    let tier: Option<i64> = conn
        .query_row(
            "SELECT tier FROM whitelist WHERE pubkey = ?1",
            [pubkey],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tier.map_or(0, |t| u8::try_from(t).unwrap_or(u8::MAX)))
}

/// Sets (or overwrites) the whitelist tier for `pubkey`.
pub fn set_whitelist_tier(conn: &Connection, pubkey: &str, tier: u8) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO whitelist (pubkey, tier) VALUES (?1, ?2)
         ON CONFLICT(pubkey) DO UPDATE SET tier = excluded.tier, updated_at = datetime('now')",
        params![pubkey, tier],
    )?;
    Ok(())
}

/// Whether `pubkey` is on the blacklist.
pub fn is_blacklisted(conn: &Connection, pubkey: &str) -> Result<bool, StoreError> {
    let listed = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blacklist WHERE pubkey = ?1)",
        [pubkey],
        |row| row.get(0),
    )?;
    Ok(listed)
}

/// Adds `pubkey` to the blacklist. Returns `false` if it was already there.
pub fn add_to_blacklist(conn: &Connection, pubkey: &str) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO blacklist (pubkey) VALUES (?1)",
        [pubkey],
    )?;
    Ok(inserted > 0)
}

/// Appends a line to the operational log table.
pub fn save_log(conn: &Connection, text: &str) -> Result<(), StoreError> {
    conn.execute("INSERT INTO logs (text) VALUES (?1)", [text])?;
    Ok(())
}
