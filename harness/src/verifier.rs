//! Waits that assert facts about the distributed state.

use relay_probe_lib::{encode_payload, Message, PeerRecord, RawMessage};

use crate::client::ParticipantClient;
use crate::config::WaitTiming;
use crate::error::ClientError;
use crate::polling;

pub async fn wait_for_ready(
    client: &ParticipantClient,
    timing: WaitTiming,
) -> Result<(), ClientError> {
    client
        .wait_until_ready_every(timing.timeout, timing.interval)
        .await
}

/// Waits until `client` sees a relay-connected peer whose address contains `fragment`.
pub async fn wait_for_peer(
    client: &ParticipantClient,
    fragment: &str,
    timing: WaitTiming,
) -> Result<PeerRecord, ClientError> {
    client
        .verify_peer_connection(fragment, timing.timeout, timing.interval)
        .await
}

/// Waits until one fetch on `topic` returns at least `expected` messages.
pub async fn wait_for_messages(
    client: &ParticipantClient,
    topic: &str,
    expected: usize,
    timing: WaitTiming,
) -> Result<Vec<RawMessage>, ClientError> {
    polling::wait_for_messages(
        move || client.fetch_messages(topic),
        expected,
        timing.timeout,
        timing.interval,
    )
    .await
}

/// Waits for a message on `topic` carrying `text`, then validates it.
pub async fn wait_for_payload(
    client: &ParticipantClient,
    topic: &str,
    text: &str,
    timing: WaitTiming,
) -> Result<Message, ClientError> {
    let encoded = encode_payload(text);
    let raw = polling::wait_for_specific_message(
        move || client.fetch_messages(topic),
        |message: &RawMessage| message.has_payload(&encoded),
        timing.timeout,
        timing.interval,
    )
    .await?;
    Ok(Message::try_from(raw)?)
}
