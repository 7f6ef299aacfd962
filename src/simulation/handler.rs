//! Client population reacting to order book events

use super::client::{Action, ClientState, ClientType};
use super::scheduler::Scheduler;
use crate::error::{Error, Result};
use crate::orderbook::{ClientId, Notifier, NotifyMessage, OrderEvent, Time};
use crate::utils::ClientTypeConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

/// Every simulated client, their schedule and the random source they share.
///
/// The pool receives engine events as a [`Notifier`]. An `Ack` schedules the
/// cancellation of the new order; an `End` that closes the order queues the
/// client for a new placement. Placements are priced from the weighted mid,
/// which is only readable once the engine call has returned, so they wait in
/// `pending` until [`ClientPool::resolve_pending`].
#[derive(Debug)]
pub struct ClientPool {
    types: Vec<ClientType>,
    clients: Vec<ClientState>,
    scheduler: Scheduler,
    pending: Vec<(ClientId, Time)>,
    rng: StdRng,
    trades: u64,
}

impl ClientPool {
    /// Clients get consecutive ids starting at zero, type by type
    pub fn new(configs: &[ClientTypeConfig], seed: u64) -> Result<Self> {
        let mut types = Vec::with_capacity(configs.len());
        let mut clients = Vec::new();
        for (type_index, cfg) in configs.iter().enumerate() {
            types.push(ClientType::from_config(cfg)?);
            for _ in 0..cfg.count {
                let id = clients.len() as ClientId;
                clients.push(ClientState::new(id, type_index));
            }
        }
        Ok(Self {
            types,
            clients,
            scheduler: Scheduler::new(),
            pending: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            trades: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clients(&self) -> &[ClientState] {
        &self.clients
    }

    pub fn client_type(&self, client_id: ClientId) -> Option<&ClientType> {
        self.clients
            .get(client_id as usize)
            .and_then(|c| self.types.get(c.type_index))
    }

    /// Trade events seen, both sides counted
    pub fn trades(&self) -> u64 {
        self.trades
    }

    /// Clients holding an acknowledged order
    pub fn active_orders(&self) -> usize {
        self.clients.iter().filter(|c| c.active_order.is_some()).count()
    }

    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }

    /// Queue every client for its first placement
    pub fn start(&mut self, now: Time) {
        self.pending = self.clients.iter().map(|c| (c.client_id, now)).collect();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Price queued placements at `wm`, or at `reference` while the book is
    /// one-sided
    pub fn resolve_pending(&mut self, wm: f64, reference: f64) {
        let base = if wm.is_nan() { reference } else { wm };
        for (client_id, now) in std::mem::take(&mut self.pending) {
            let Some(client) = self.clients.get_mut(client_id as usize) else {
                continue;
            };
            let (dt, placement) = self.types[client.type_index].next_placement(base, &mut self.rng);
            let next = now + dt;
            self.scheduler
                .reschedule(client_id, client.next_action_time, Some(next));
            client.next_action_time = Some(next);
            client.action = Action::Place(placement);
        }
    }

    pub fn next_action_time(&self) -> Option<Time> {
        self.scheduler.peek().map(|(t, _)| t)
    }

    /// Take the earliest action off the schedule; the client stays idle
    /// until an event reschedules it
    pub fn pop_action(&mut self) -> Option<(Time, ClientId, Action)> {
        let (time, client_id) = self.scheduler.pop()?;
        let client = self.clients.get_mut(client_id as usize)?;
        client.next_action_time = None;
        let action = std::mem::replace(&mut client.action, Action::Idle);
        match action {
            Action::Place(_) => client.orders_placed += 1,
            Action::Cancel(_) => client.cancel_requested = true,
            Action::Idle => {}
        }
        Some((time, client_id, action))
    }

    fn client_mut(&mut self, client_id: ClientId) -> Result<&mut ClientState> {
        self.clients
            .get_mut(client_id as usize)
            .ok_or_else(|| Error::Protocol(format!("event for unknown client {client_id}")))
    }
}

impl Notifier for ClientPool {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        trace!("{}", event);
        let cid = event.client_id;
        match event.kind {
            NotifyMessage::Ack => {
                let client = self.client_mut(cid)?;
                let (active, type_index) = (client.active_order, client.type_index);
                match active {
                    // a hidden slice coming back into view
                    Some(id) if id == event.order_id => {}
                    Some(id) => {
                        return Err(Error::Protocol(format!(
                            "client {cid} got Ack for {} while {id} is active",
                            event.order_id
                        )))
                    }
                    None => {
                        let dt = self.types[type_index].cancellation_dt(&mut self.rng);
                        let client = &mut self.clients[cid as usize];
                        let next = event.time + dt;
                        self.scheduler
                            .reschedule(cid, client.next_action_time, Some(next));
                        client.next_action_time = Some(next);
                        client.active_order = Some(event.order_id);
                        client.cancel_requested = false;
                        client.action = Action::Cancel(event.order_id);
                    }
                }
            }
            NotifyMessage::Trade => {
                let client = self.client_mut(cid)?;
                client.traded_size += u64::from(event.traded_size);
                self.trades += 1;
            }
            NotifyMessage::Cancel => {
                let client = self.client_mut(cid)?;
                if client.active_order != Some(event.order_id) {
                    return Err(Error::Protocol(format!(
                        "client {cid} got Cancel for unknown order {}",
                        event.order_id
                    )));
                }
                client.cancel_requested = true;
            }
            NotifyMessage::End => {
                let client = self.client_mut(cid)?;
                if client.active_order != Some(event.order_id) {
                    return Err(Error::Protocol(format!(
                        "client {cid} got End for unknown order {}",
                        event.order_id
                    )));
                }
                // only the shown slice ran out
                if event.remaining_size > 0 && !client.cancel_requested {
                    return Ok(());
                }
                client.active_order = None;
                client.cancel_requested = false;
                let old = client.next_action_time.take();
                client.action = Action::Idle;
                self.scheduler.reschedule(cid, old, None);
                self.pending.push((cid, event.time));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{MatchingEngine, Side};

    fn configs() -> Vec<ClientTypeConfig> {
        vec![ClientTypeConfig {
            tag: "test".to_string(),
            count: 3,
            placement_rate: 1.0,
            cancellation_rate: 0.1,
            size_mean: 5.0,
            price_std: 2.0,
            bid_probability: 0.5,
            show: None,
        }]
    }

    #[test]
    fn test_start_schedules_every_client() {
        let mut pool = ClientPool::new(&configs(), 0).unwrap();
        assert_eq!(pool.len(), 3);
        pool.start(0);
        pool.resolve_pending(f64::NAN, 100.0);
        assert_eq!(pool.scheduled(), 3);
        let (_, _, action) = pool.pop_action().unwrap();
        match action {
            Action::Place(p) => assert!((p.price - 100).abs() < 20),
            other => panic!("expected placement, got {other:?}"),
        }
        assert_eq!(pool.scheduled(), 2);
    }

    #[test]
    fn test_ack_then_cancel_cycle() {
        let mut pool = ClientPool::new(&configs(), 1).unwrap();
        let mut eng = MatchingEngine::new();
        pool.start(0);
        pool.resolve_pending(f64::NAN, 100.0);

        let (t, cid, action) = pool.pop_action().unwrap();
        let Action::Place(p) = action else {
            panic!("expected placement");
        };
        eng.set_time(t);
        let oid = eng
            .add_simulation_order(cid, p.price, p.size, p.show, p.side, false, &mut pool)
            .unwrap();
        let client = &pool.clients()[cid as usize];
        assert_eq!(client.active_order, Some(oid));
        assert_eq!(client.action, Action::Cancel(oid));
        assert!(client.next_action_time.unwrap() >= t);

        eng.cancel_order(oid, &mut pool).unwrap();
        assert!(pool.has_pending());
        assert_eq!(pool.clients()[cid as usize].active_order, None);
        pool.resolve_pending(eng.wm(), 100.0);
        assert!(matches!(pool.clients()[cid as usize].action, Action::Place(_)));
        assert_eq!(pool.scheduled(), 3);
    }

    #[test]
    fn test_iceberg_end_keeps_order_active() {
        let mut cfg = configs();
        cfg[0].show = Some(1);
        let mut pool = ClientPool::new(&cfg, 2).unwrap();
        let mut eng = MatchingEngine::new();
        let oid = eng
            .add_simulation_order(0, 100, 3, 1, Side::Bid, false, &mut pool)
            .unwrap();
        eng.add_simulation_order(1, 100, 1, 1, Side::Offer, false, &mut pool)
            .unwrap();
        // client 0 lost one slice but still rests with 2 lots
        assert_eq!(pool.clients()[0].active_order, Some(oid));
        assert_eq!(pool.clients()[0].traded_size, 1);
        // client 1 was filled and waits for a new placement
        assert_eq!(pool.clients()[1].active_order, None);
        assert!(pool.has_pending());
        assert_eq!(pool.trades(), 2);
    }

    #[test]
    fn test_end_for_foreign_order_is_error() {
        let mut pool = ClientPool::new(&configs(), 0).unwrap();
        let mut eng = MatchingEngine::new();
        let oid = eng
            .add_simulation_order(0, 100, 3, 3, Side::Bid, false, &mut crate::orderbook::NoopNotifier)
            .unwrap();
        assert!(eng.cancel_order(oid, &mut pool).is_err());
    }
}
