use channel_storage::{
    db_types::{Amount, ChannelId, ChannelState, Payment, PaymentChannel},
    Storage,
    StorageError,
};

use super::contract::FixedContract;

fn ids(channels: &[PaymentChannel]) -> Vec<&str> {
    channels.iter().map(|c| c.channel_id.as_str()).collect()
}

/// Runs every dataset operation against `storage`, which must be empty. `contract` must be the contract the storage
/// was built with.
pub async fn exercise_datasets(storage: &Storage, contract: &FixedContract) {
    let channels = storage.channels();
    let payments = storage.payments();
    let tokens = storage.tokens();

    let mut alpha = PaymentChannel::new("0xalpha".into(), "alice", "bob", Amount::from(1000));
    alpha.settlement_period = 40;
    let beta = PaymentChannel::new("0xbeta".into(), "alice", "bob", Amount::from(500));
    let gamma = PaymentChannel::new("0xgamma".into(), "carol", "bob", Amount::from(200));
    let unknown = ChannelId::from("0xnope");

    // Channels
    for channel in [&alpha, &beta, &gamma] {
        channels.save(channel).await.unwrap();
    }
    assert!(channels.save(&alpha).await.is_err(), "channel ids are unique");
    assert_eq!(channels.first_by_id(&alpha.channel_id).await.unwrap(), Some(alpha.clone()));
    assert!(channels.first_by_id(&unknown).await.unwrap().is_none());

    channels.spend(&alpha.channel_id, Amount::from(30)).await.unwrap();
    let stored = channels.first_by_id(&alpha.channel_id).await.unwrap().unwrap();
    assert_eq!(stored.spent, Amount::from(30));
    assert_eq!(stored.remaining(), Amount::from(970));
    let err = channels.spend(&unknown, Amount::from(1)).await.unwrap_err();
    assert!(matches!(err, StorageError::RecordNotFound(_)));

    let pair = channels.find_by_sender_receiver("alice", "bob").await.unwrap();
    assert_eq!(ids(&pair), vec!["0xalpha", "0xbeta"]);
    assert!(channels.find_by_sender_receiver("bob", "alice").await.unwrap().is_empty());

    let mut bigger = gamma.clone();
    bigger.value = Amount::from(250);
    channels.save_or_update(&bigger).await.unwrap();
    let delta = PaymentChannel::new("0xdelta".into(), "dave", "bob", Amount::from(10));
    channels.save_or_update(&delta).await.unwrap();
    assert_eq!(channels.first_by_id(&gamma.channel_id).await.unwrap().unwrap().value, Amount::from(250));
    assert_eq!(ids(&channels.all().await.unwrap()), vec!["0xalpha", "0xbeta", "0xdelta", "0xgamma"]);

    // Payments and tokens
    let first = Payment::new(&stored, Amount::from(10), Amount::from(10), "0xsig1");
    let second = Payment::new(&stored, Amount::from(20), Amount::from(30), "0xsig2");
    payments.save("tok-2", &second).await.unwrap();
    payments.save("tok-1", &first).await.unwrap();
    tokens.save("tok-1", &alpha.channel_id).await.unwrap();
    tokens.save("tok-2", &alpha.channel_id).await.unwrap();
    assert!(tokens.is_present("tok-1").await.unwrap());
    assert!(!tokens.is_present("tok-3").await.unwrap());

    let max = payments.first_maximum(&alpha.channel_id).await.unwrap().unwrap();
    assert_eq!(max.value, Amount::from(30));
    assert_eq!(max.token.as_deref(), Some("tok-2"));
    let by_token = payments.find_by_token("tok-1").await.unwrap().unwrap();
    assert_eq!(by_token.signature, "0xsig1");
    assert_eq!(by_token.channel_value, Amount::from(1000));
    assert_eq!(by_token.created_at, first.created_at);
    let history = payments.find_by_channel_id(&alpha.channel_id).await.unwrap();
    assert_eq!(history.iter().map(|p| p.value).collect::<Vec<_>>(), vec![Amount::from(10), Amount::from(30)]);
    assert!(payments.first_maximum(&beta.channel_id).await.unwrap().is_none());
    assert!(payments.find_by_token("tok-3").await.unwrap().is_none());

    // Open channels are confirmed with the contract
    contract.set(&beta.channel_id, ChannelState::Settled);
    channels.update_state(&gamma.channel_id, ChannelState::Settling).await.unwrap();
    let open = channels.all_open().await.unwrap();
    assert_eq!(ids(&open), vec!["0xalpha", "0xdelta"]);
    let beta_now = channels.first_by_id(&beta.channel_id).await.unwrap().unwrap();
    assert_eq!(beta_now.state, ChannelState::Settled);
    let err = channels.update_state(&unknown, ChannelState::Settled).await.unwrap_err();
    assert!(matches!(err, StorageError::RecordNotFound(_)));

    // Deleting a channel takes its payments and tokens with it
    channels.delete_by_id(&alpha.channel_id).await.unwrap();
    assert!(channels.first_by_id(&alpha.channel_id).await.unwrap().is_none());
    assert!(!tokens.is_present("tok-1").await.unwrap());
    assert!(payments.find_by_channel_id(&alpha.channel_id).await.unwrap().is_empty());
    tokens.delete_by_channel_id(&alpha.channel_id).await.unwrap();
    payments.delete_by_channel_id(&alpha.channel_id).await.unwrap();
    assert_eq!(channels.all().await.unwrap().len(), 3);
}
