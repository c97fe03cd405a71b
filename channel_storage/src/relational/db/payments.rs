use sqlx::{AnyConnection, FromRow};

use super::non_empty;
use crate::{
    db_types::{Amount, ChannelId, Payment},
    StorageError,
};

const PAYMENT_COLUMNS: &str = "channel_id, sender, receiver, price, value, channel_value, signature, meta, \
                               COALESCE(token_contract, '') AS token_contract, COALESCE(token, '') AS token, \
                               created_at";

#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    channel_id: String,
    sender: String,
    receiver: String,
    price: i64,
    value: i64,
    channel_value: i64,
    signature: String,
    meta: String,
    token_contract: String,
    token: String,
    created_at: i64,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            channel_id: ChannelId::new(row.channel_id),
            sender: row.sender,
            receiver: row.receiver,
            price: Amount::from(row.price),
            value: Amount::from(row.value),
            channel_value: Amount::from(row.channel_value),
            signature: row.signature,
            meta: row.meta,
            token_contract: non_empty(row.token_contract),
            token: non_empty(row.token),
            created_at: row.created_at,
        }
    }
}

/// Inserts the payment, recording `token` as the token it was redeemed for.
pub async fn insert_payment(
    namespace: &str,
    token: &str,
    payment: &Payment,
    conn: &mut AnyConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
            INSERT INTO payment (
                namespace,
                channel_id,
                sender,
                receiver,
                price,
                value,
                channel_value,
                signature,
                meta,
                token_contract,
                token,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(namespace)
    .bind(payment.channel_id.as_str())
    .bind(payment.sender.as_str())
    .bind(payment.receiver.as_str())
    .bind(payment.price.value())
    .bind(payment.value.value())
    .bind(payment.channel_value.value())
    .bind(payment.signature.as_str())
    .bind(payment.meta.as_str())
    .bind(payment.token_contract.clone())
    .bind(token)
    .bind(payment.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// The payment with the largest cumulative value in the channel.
pub async fn fetch_max_payment(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<Option<Payment>, StorageError> {
    let q = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment WHERE namespace = $1 AND channel_id = $2 ORDER BY value DESC LIMIT 1"
    );
    let row: Option<PaymentRow> =
        sqlx::query_as(&q).bind(namespace).bind(channel_id.as_str()).fetch_optional(conn).await?;
    Ok(row.map(Payment::from))
}

pub async fn fetch_payment_by_token(
    namespace: &str,
    token: &str,
    conn: &mut AnyConnection,
) -> Result<Option<Payment>, StorageError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payment WHERE namespace = $1 AND token = $2 LIMIT 1");
    let row: Option<PaymentRow> = sqlx::query_as(&q).bind(namespace).bind(token).fetch_optional(conn).await?;
    Ok(row.map(Payment::from))
}

pub async fn fetch_payments_for_channel(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<Vec<Payment>, StorageError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payment WHERE namespace = $1 AND channel_id = $2 ORDER BY value ASC");
    let rows: Vec<PaymentRow> = sqlx::query_as(&q).bind(namespace).bind(channel_id.as_str()).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Payment::from).collect())
}

pub async fn delete_payments_for_channel(
    namespace: &str,
    channel_id: &ChannelId,
    conn: &mut AnyConnection,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM payment WHERE namespace = $1 AND channel_id = $2")
        .bind(namespace)
        .bind(channel_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
