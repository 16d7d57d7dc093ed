//! Gate - pair each input with the next value from a latched channel

use crate::channel::{Chan, IoEndpoint, DEFAULT_CAPACITY};
use crate::core::Message;

/// Pair every input value with the next value available on `latch`
///
/// Emits `Tuple([input, latched])`. When the latch ends, the gate closes; the
/// latch itself is not owned by the gate and is never closed by it.
pub fn gate(latch: Chan<Message>) -> IoEndpoint<Message> {
    let inlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let outlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let endpoint = IoEndpoint::new(inlet.clone(), outlet.clone());

    tokio::spawn(async move {
        while let Some(msg) = inlet.recv().await {
            let latched = match latch.recv().await {
                Some(l) => l,
                None => break,
            };
            if !outlet.send(Message::tuple(vec![msg, latched])).await {
                break;
            }
        }
        inlet.close();
        outlet.close();
        tracing::trace!("gate closed");
    });

    endpoint
}
