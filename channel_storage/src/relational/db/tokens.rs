use log::trace;
use sqlx::AnyConnection;

use crate::{db_types::ChannelId, StorageError};

pub async fn insert_token(
    namespace: &str,
    token: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO token (namespace, token, channel_id) VALUES ($1, $2, $3)")
        .bind(namespace)
        .bind(token)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    trace!("🗃️ Token for channel {channel_id} saved");
    Ok(())
}

pub async fn token_exists(namespace: &str, token: &str, conn: &mut AnyConnection) -> Result<bool, StorageError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM token WHERE namespace = $1 AND token = $2")
        .bind(namespace)
        .bind(token)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Deletes every token issued for the channel. Returns the number of tokens removed.
pub async fn delete_tokens_for_channel(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM token WHERE namespace = $1 AND channel_id = $2")
        .bind(namespace)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
