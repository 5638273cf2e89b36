//! In-process broadcast transport.
//!
//! Every endpoint can reach every other endpoint (itself included). Messages
//! travel JSON-encoded, as they would between separate hosts. Collecting a
//! round blocks until all N values for that round have arrived, which is the
//! barrier between rounds. Messages for a later round that show up early are
//! buffered.

use crate::errors::BDCryptoError;
use crate::keypair::PublicValue;
use crate::protocol::ExchangeValue;
use crate::session::Round;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use serde::{Deserialize, Serialize};

use std::time::{Duration, Instant};

use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastMessage {
    Round1(PublicValue),
    Round2(ExchangeValue),
    /// The sender gave up; peers stop waiting instead of running into the timeout.
    Abort { index: usize, round: Round },
}

impl BroadcastMessage {
    pub fn to_json(&self) -> Result<String, BDCryptoError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, BDCryptoError> {
        Ok(serde_json::from_str(data)?)
    }
}

pub struct RingBus;

impl RingBus {
    /// Creates one connected endpoint per participant, in index order.
    pub fn connect(ring_size: usize) -> Vec<Endpoint> {
        let (senders, receivers): (Vec<Sender<String>>, Vec<Receiver<String>>) =
            (0..ring_size).map(|_| unbounded()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(index, inbox)| Endpoint {
                index,
                ring_size,
                peers: senders.clone(),
                inbox,
                pending: Vec::new(),
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct Endpoint {
    index: usize,
    ring_size: usize,
    peers: Vec<Sender<String>>,
    inbox: Receiver<String>,
    pending: Vec<BroadcastMessage>,
}

impl Endpoint {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Sends `message` to every participant, this one included.
    pub fn broadcast(&self, message: &BroadcastMessage) -> Result<(), BDCryptoError> {
        let encoded = message.to_json()?;

        for (peer, sender) in self.peers.iter().enumerate() {
            sender.send(encoded.clone()).map_err(|_| {
                BDCryptoError::IncompleteRound(format!(
                    "Participant {} left before receiving from {}",
                    peer, self.index
                ))
            })?;
        }

        Ok(())
    }

    /// Tells every peer this participant is out. Best effort: peers that already
    /// finished have dropped their inbox.
    pub fn abort(&self, round: Round) {
        let message = BroadcastMessage::Abort {
            index: self.index,
            round,
        };

        match message.to_json() {
            Ok(encoded) => {
                for sender in &self.peers {
                    let _ = sender.send(encoded.clone());
                }
            }
            Err(e) => warn!(participant = self.index, error = %e, "could not encode abort"),
        }
    }

    /// Waits for all N round 1 values, ordered by index.
    pub fn collect_public_values(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<PublicValue>, BDCryptoError> {
        self.collect(Round::KeyGeneration, timeout, |message| match message {
            BroadcastMessage::Round1(value) => Some((value.index, value.clone())),
            _ => None,
        })
    }

    /// Waits for all N round 2 values, ordered by index.
    pub fn collect_exchange_values(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<ExchangeValue>, BDCryptoError> {
        self.collect(Round::ExchangeComputation, timeout, |message| match message {
            BroadcastMessage::Round2(value) => Some((value.index, value.clone())),
            _ => None,
        })
    }

    fn collect<T>(
        &mut self,
        round: Round,
        timeout: Duration,
        extract: impl Fn(&BroadcastMessage) -> Option<(usize, T)>,
    ) -> Result<Vec<T>, BDCryptoError> {
        let deadline = Instant::now() + timeout;
        let mut slots: Vec<Option<T>> = (0..self.ring_size).map(|_| None).collect();
        let mut filled = 0;

        for message in std::mem::take(&mut self.pending) {
            filled += self.accept(round, message, &extract, &mut slots)?;
        }

        while filled < self.ring_size {
            let encoded = self.inbox.recv_deadline(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => BDCryptoError::IncompleteRound(format!(
                    "{} timed out with {} of {} values",
                    round, filled, self.ring_size
                )),
                RecvTimeoutError::Disconnected => {
                    BDCryptoError::IncompleteRound(format!("{} bus closed", round))
                }
            })?;

            let message = BroadcastMessage::from_json(&encoded)?;
            filled += self.accept(round, message, &extract, &mut slots)?;
        }

        debug!(participant = self.index, %round, "round collected");

        Ok(slots.into_iter().flatten().collect())
    }

    /// Files one message. Returns 1 if it filled a slot of the current round.
    fn accept<T>(
        &mut self,
        round: Round,
        message: BroadcastMessage,
        extract: &impl Fn(&BroadcastMessage) -> Option<(usize, T)>,
        slots: &mut [Option<T>],
    ) -> Result<usize, BDCryptoError> {
        if let BroadcastMessage::Abort { index, round: at } = message {
            return Err(BDCryptoError::IncompleteRound(format!(
                "Participant {} aborted during {}",
                index, at
            )));
        }

        let Some((index, value)) = extract(&message) else {
            self.pending.push(message);
            return Ok(0);
        };

        match slots.get_mut(index) {
            None => Err(BDCryptoError::IncompleteRound(format!(
                "{} value from unknown participant {}",
                round, index
            ))),
            Some(Some(_)) => Err(BDCryptoError::DegenerateGroupElement(format!(
                "Participant {} broadcast twice during {}",
                index, round
            ))),
            Some(slot) => {
                *slot = Some(value);
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn public(index: usize, value: u32) -> BroadcastMessage {
        BroadcastMessage::Round1(PublicValue {
            index,
            value: BigUint::from(value),
        })
    }

    fn exchange(index: usize, value: u32) -> BroadcastMessage {
        BroadcastMessage::Round2(ExchangeValue {
            index,
            value: BigUint::from(value),
        })
    }

    #[test]
    fn test_message_json_round_trip() -> Result<(), BDCryptoError> {
        let message = BroadcastMessage::Abort {
            index: 2,
            round: Round::ExchangeComputation,
        };
        assert_eq!(BroadcastMessage::from_json(&message.to_json()?)?, message);
        assert!(BroadcastMessage::from_json("{}").is_err());
        Ok(())
    }

    #[test]
    fn test_collect_orders_by_index() -> Result<(), BDCryptoError> {
        let mut endpoints = RingBus::connect(3);

        endpoints[2].broadcast(&public(2, 30))?;
        endpoints[0].broadcast(&public(0, 10))?;
        endpoints[1].broadcast(&public(1, 20))?;

        let collected = endpoints[1].collect_public_values(Duration::from_secs(1))?;
        let indices: Vec<usize> = collected.iter().map(|value| value.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(collected[2].value, BigUint::from(30u32));
        Ok(())
    }

    #[test]
    fn test_early_round2_messages_are_buffered() -> Result<(), BDCryptoError> {
        let mut endpoints = RingBus::connect(3);

        endpoints[0].broadcast(&public(0, 10))?;
        endpoints[0].broadcast(&exchange(0, 11))?;
        endpoints[1].broadcast(&public(1, 20))?;
        endpoints[2].broadcast(&public(2, 30))?;
        endpoints[1].broadcast(&exchange(1, 21))?;
        endpoints[2].broadcast(&exchange(2, 31))?;

        let round1 = endpoints[2].collect_public_values(Duration::from_secs(1))?;
        assert_eq!(round1.len(), 3);

        let round2 = endpoints[2].collect_exchange_values(Duration::from_secs(1))?;
        let values: Vec<BigUint> = round2.into_iter().map(|value| value.value).collect();
        assert_eq!(values, vec![BigUint::from(11u32), BigUint::from(21u32), BigUint::from(31u32)]);
        Ok(())
    }

    #[test]
    fn test_missing_participant_times_out() -> Result<(), BDCryptoError> {
        let mut endpoints = RingBus::connect(3);
        endpoints[0].broadcast(&public(0, 10))?;
        endpoints[1].broadcast(&public(1, 20))?;

        let result = endpoints[0].collect_public_values(Duration::from_millis(50));
        assert!(matches!(result, Err(BDCryptoError::IncompleteRound(_))));
        Ok(())
    }

    #[test]
    fn test_abort_stops_collection() -> Result<(), BDCryptoError> {
        let mut endpoints = RingBus::connect(3);
        endpoints[0].broadcast(&public(0, 10))?;
        endpoints[2].abort(Round::KeyGeneration);

        let result = endpoints[0].collect_public_values(Duration::from_secs(5));
        match result {
            Err(BDCryptoError::IncompleteRound(reason)) => assert!(reason.contains("aborted")),
            other => panic!("expected abort, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_duplicate_broadcast_is_rejected() -> Result<(), BDCryptoError> {
        let mut endpoints = RingBus::connect(3);
        endpoints[0].broadcast(&public(0, 10))?;
        endpoints[0].broadcast(&public(0, 99))?;

        let result = endpoints[1].collect_public_values(Duration::from_secs(1));
        assert!(matches!(result, Err(BDCryptoError::DegenerateGroupElement(_))));
        Ok(())
    }
}
