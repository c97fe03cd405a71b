use sqlx::{AnyConnection, FromRow};

use super::{expect_affected, non_empty};
use crate::{
    db_types::{Amount, ChannelId, ChannelState, PaymentChannel},
    StorageError,
};

const CHANNEL_COLUMNS: &str = "channel_id, sender, receiver, value, spent, state, settlement_period, \
                               COALESCE(token_contract, '') AS token_contract";

#[derive(Debug, Clone, FromRow)]
struct ChannelRow {
    channel_id: String,
    sender: String,
    receiver: String,
    value: i64,
    spent: i64,
    state: i64,
    settlement_period: i64,
    token_contract: String,
}

impl TryFrom<ChannelRow> for PaymentChannel {
    type Error = StorageError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Self {
            channel_id: ChannelId::new(row.channel_id),
            sender: row.sender,
            receiver: row.receiver,
            value: Amount::from(row.value),
            spent: Amount::from(row.spent),
            state: ChannelState::try_from(row.state)?,
            settlement_period: row.settlement_period,
            token_contract: non_empty(row.token_contract),
        })
    }
}

fn into_channels(rows: Vec<ChannelRow>) -> Result<Vec<PaymentChannel>, StorageError> {
    rows.into_iter().map(PaymentChannel::try_from).collect()
}

/// Inserts a new channel. Fails if a channel with the same id already exists in the namespace.
pub async fn insert_channel(
    namespace: &str,
    channel: &PaymentChannel,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
            INSERT INTO channel (
                namespace,
                channel_id,
                sender,
                receiver,
                value,
                spent,
                state,
                settlement_period,
                token_contract
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(namespace)
    .bind(channel.channel_id.as_str())
    .bind(channel.sender.as_str())
    .bind(channel.receiver.as_str())
    .bind(channel.value.value())
    .bind(channel.spent.value())
    .bind(channel.state.code())
    .bind(channel.settlement_period)
    .bind(channel.token_contract.clone())
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts the channel, or overwrites every column of an existing channel with the same id.
pub async fn upsert_channel(
    namespace: &str,
    channel: &PaymentChannel,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
            INSERT INTO channel (
                namespace,
                channel_id,
                sender,
                receiver,
                value,
                spent,
                state,
                settlement_period,
                token_contract
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (namespace, channel_id) DO UPDATE SET
                sender = excluded.sender,
                receiver = excluded.receiver,
                value = excluded.value,
                spent = excluded.spent,
                state = excluded.state,
                settlement_period = excluded.settlement_period,
                token_contract = excluded.token_contract
        "#,
    )
    .bind(namespace)
    .bind(channel.channel_id.as_str())
    .bind(channel.sender.as_str())
    .bind(channel.receiver.as_str())
    .bind(channel.value.value())
    .bind(channel.spent.value())
    .bind(channel.state.code())
    .bind(channel.settlement_period)
    .bind(channel.token_contract.clone())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_channel(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<Option<PaymentChannel>, StorageError> {
    let q = format!("SELECT {CHANNEL_COLUMNS} FROM channel WHERE namespace = $1 AND channel_id = $2");
    let row: Option<ChannelRow> =
        sqlx::query_as(&q).bind(namespace).bind(channel_id.as_str()).fetch_optional(conn).await?;
    row.map(PaymentChannel::try_from).transpose()
}

pub async fn update_spent(
    namespace: &str,
    channel_id: &ChannelId,
    spent: Amount,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE channel SET spent = $1 WHERE namespace = $2 AND channel_id = $3")
        .bind(spent.value())
        .bind(namespace)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    expect_affected(result.rows_affected(), || format!("channel {channel_id}"))
}

pub async fn update_state(
    namespace: &str,
    channel_id: &ChannelId,
    state: ChannelState,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE channel SET state = $1 WHERE namespace = $2 AND channel_id = $3")
        .bind(state.code())
        .bind(namespace)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    expect_affected(result.rows_affected(), || format!("channel {channel_id}"))
}

pub async fn fetch_all_channels(namespace: &str, conn: &mut AnyConnection) -> Result<Vec<PaymentChannel>, StorageError> {
    let q = format!("SELECT {CHANNEL_COLUMNS} FROM channel WHERE namespace = $1 ORDER BY channel_id");
    let rows: Vec<ChannelRow> = sqlx::query_as(&q).bind(namespace).fetch_all(conn).await?;
    into_channels(rows)
}

pub async fn fetch_channels_by_parties(
    namespace: &str,
    sender: &str,
    receiver: &str,
    conn: &mut AnyConnection,
) -> Result<Vec<PaymentChannel>, StorageError> {
    let q = format!(
        "SELECT {CHANNEL_COLUMNS} FROM channel WHERE namespace = $1 AND sender = $2 AND receiver = $3 ORDER BY \
         channel_id"
    );
    let rows: Vec<ChannelRow> = sqlx::query_as(&q).bind(namespace).bind(sender).bind(receiver).fetch_all(conn).await?;
    into_channels(rows)
}

pub async fn delete_channel(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM channel WHERE namespace = $1 AND channel_id = $2")
        .bind(namespace)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
