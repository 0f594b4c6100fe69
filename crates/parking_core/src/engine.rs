use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::LotConfig;
use crate::fee::{RateTable, calculate_fee};
use crate::session_ledger::{NewSession, SessionLedger};
use crate::slot_registry::SlotRegistry;
use crate::types::*;

/// Upper bound on how many sessions a history query returns
pub const MAX_RECENT_SESSIONS: usize = 50;

/// Slot and session stores, always mutated together under one lock
#[derive(Debug, Default)]
struct LotState {
    slots: SlotRegistry,
    ledger: SessionLedger,
}

/// Orchestrates vehicle entry and exit over the slot registry and the session ledger.
///
/// Every entry or exit holds the write lock for the whole transaction, so slot
/// occupancy and session state always change together. Queries share the read
/// lock and see a consistent snapshot of both stores. Cloning is cheap and
/// every clone drives the same lot.
#[derive(Clone)]
pub struct AllocationEngine {
    state: Arc<RwLock<LotState>>,
    rates: Arc<RateTable>,
    default_class: VehicleClass,
    clock: Arc<dyn Clock>,
}

impl AllocationEngine {
    /// Creates an engine stamping sessions with the system clock.
    pub fn new(config: &LotConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit time source
    pub fn with_clock(config: &LotConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let slots = SlotRegistry::new(&config.slots)?;
        log::info!(
            "Parking lot initialized with {} slots, default rate {}/min",
            slots.len(),
            config.rates.default_rate()
        );

        Ok(Self {
            state: Arc::new(RwLock::new(LotState {
                slots,
                ledger: SessionLedger::new(),
            })),
            rates: Arc::new(config.rates.clone()),
            default_class: config.default_class,
            clock,
        })
    }

    /// Admits a vehicle, assigning it a free slot of its class.
    ///
    /// A plate that is already parked gets its open session back unchanged and
    /// no further slot is consumed.
    pub async fn register_entry(
        &self,
        raw_plate: &str,
        vehicle_class: Option<VehicleClass>,
    ) -> Result<EntryOutcome, ParkingError> {
        let plate = Plate::normalize(raw_plate)?;
        let mut state = self.state.write().await;

        if let Some(existing) = state.ledger.find_open(&plate) {
            log::debug!(
                "Plate {} already parked in {}, returning open session",
                plate,
                existing.slot_code
            );
            return Ok(EntryOutcome {
                session: existing.clone(),
                created: false,
            });
        }

        let vehicle_class = vehicle_class.unwrap_or(self.default_class);
        let rate_per_minute = self.rates.rate_for(vehicle_class);
        let outcome = admit(
            &mut *state,
            plate,
            vehicle_class,
            rate_per_minute,
            self.clock.now(),
        )?;

        log::info!(
            "Vehicle {} entered, assigned slot {}",
            outcome.session.plate,
            outcome.session.slot_code
        );
        Ok(outcome)
    }

    /// Closes the plate's open session, bills it and frees its slot.
    pub async fn register_exit(&self, raw_plate: &str) -> Result<ExitReceipt, ParkingError> {
        let plate = Plate::normalize(raw_plate)?;
        let mut state = self.state.write().await;
        let LotState { slots, ledger } = &mut *state;

        let session = ledger
            .find_open(&plate)
            .ok_or_else(|| ParkingError::ActiveSessionNotFound {
                plate: plate.clone(),
            })?;

        let check_out_at = self.clock.now();
        let fee = calculate_fee(session.check_in_at, check_out_at, session.rate_per_minute);

        let closed = ledger
            .close(&plate, check_out_at, fee)
            .map_err(|_| ParkingError::ActiveSessionNotFound {
                plate: plate.clone(),
            })?;

        match slots.release(&closed.slot_code) {
            Ok(_) => {}
            Err(SlotError::AlreadyFree(code)) => {
                log::warn!("Slot {} was already free when {} left", code, plate)
            }
            Err(err) => log::error!("Failed to release slot for {}: {}", plate, err),
        }

        log::info!(
            "Vehicle {} left slot {} after {} min, charged {:.2}",
            plate,
            closed.slot_code,
            fee.minutes,
            fee.amount
        );

        Ok(ExitReceipt {
            plate,
            slot_code: closed.slot_code,
            minutes: fee.minutes,
            amount: fee.amount,
            check_out_at,
        })
    }

    /// Every slot ordered by code, with the plate currently parked in it
    pub async fn list_slots(&self) -> Vec<SlotView> {
        let state = self.state.read().await;

        let plates: HashMap<Uuid, &Plate> = state
            .ledger
            .open_sessions()
            .map(|session| (session.ticket, &session.plate))
            .collect();

        state
            .slots
            .list()
            .into_iter()
            .map(|slot| SlotView {
                occupied: slot.is_occupied(),
                plate: slot
                    .current_ticket
                    .and_then(|ticket| plates.get(&ticket))
                    .map(|plate| (*plate).clone()),
                code: slot.code,
                vehicle_class: slot.vehicle_class,
            })
            .collect()
    }

    /// Lot-wide occupancy figures
    pub async fn overview(&self) -> Overview {
        let state = self.state.read().await;

        let total = state.slots.len();
        let occupied = state.slots.occupied_count();
        let occupancy_percent = if total == 0 {
            0.0
        } else {
            ((occupied as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
        };

        Overview {
            total,
            occupied,
            free: total.saturating_sub(occupied),
            active_vehicles: state.ledger.open_count(),
            occupancy_percent,
            rate_per_minute: self.rates.default_rate(),
        }
    }

    /// Most recent sessions by check-in; `limit` is clamped to `1..=50`.
    pub async fn recent_sessions(&self, limit: usize, order: SortOrder) -> Vec<Session> {
        let limit = limit.clamp(1, MAX_RECENT_SESSIONS);
        self.state.read().await.ledger.recent(limit, order)
    }

    /// Occupied and total slots per vehicle class
    pub async fn occupancy_by_class(&self) -> BTreeMap<VehicleClass, ClassOccupancy> {
        self.state.read().await.slots.occupancy_by_class()
    }

    /// Rates applied to new sessions
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Class assumed when an entry names none
    pub fn default_class(&self) -> VehicleClass {
        self.default_class
    }
}

/// Reserves a slot and opens a session on it, releasing the slot again if
/// the session cannot be opened.
fn admit(
    state: &mut LotState,
    plate: Plate,
    vehicle_class: VehicleClass,
    rate_per_minute: f64,
    check_in_at: DateTime<Utc>,
) -> Result<EntryOutcome, ParkingError> {
    let LotState { slots, ledger } = state;
    let ticket = Uuid::new_v4();

    let slot = slots.reserve(vehicle_class, ticket).map_err(|err| {
        log::warn!("Rejecting entry for {}: {}", plate, err);
        ParkingError::NoSlotsAvailable { vehicle_class }
    })?;

    let opened = ledger.open(NewSession {
        ticket,
        plate,
        slot_code: slot.code.clone(),
        vehicle_class,
        rate_per_minute,
        check_in_at,
    });

    match opened {
        Ok(session) => Ok(EntryOutcome {
            session,
            created: true,
        }),
        Err(err) => {
            if let Err(release_err) = slots.release(&slot.code) {
                log::error!("Failed to roll back slot {}: {}", slot.code, release_err);
            }
            match err {
                LedgerError::DuplicateActiveSession(existing) => Ok(EntryOutcome {
                    session: *existing,
                    created: false,
                }),
                LedgerError::ActiveSessionNotFound(plate) => {
                    Err(ParkingError::ActiveSessionNotFound { plate })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn lot(codes: &[&str], rate: f64) -> LotConfig {
        LotConfig {
            slots: codes
                .iter()
                .map(|code| SlotSpec::new(*code, VehicleClass::Car))
                .collect(),
            rates: RateTable::flat(rate).unwrap(),
            default_class: VehicleClass::Car,
        }
    }

    fn engine(config: &LotConfig) -> (AllocationEngine, ManualClock) {
        let clock = ManualClock::new(start());
        let engine = AllocationEngine::with_clock(config, Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    #[tokio::test]
    async fn test_single_slot_release_and_reuse() {
        let (engine, clock) = engine(&lot(&["A01"], 0.05));

        let first = engine.register_entry("ABC123", None).await.unwrap();
        assert!(first.created);
        assert_eq!(first.session.slot_code, "A01");

        assert_eq!(
            engine.register_entry("XYZ999", None).await,
            Err(ParkingError::NoSlotsAvailable {
                vehicle_class: VehicleClass::Car
            })
        );

        clock.advance(Duration::seconds(130));
        let receipt = engine.register_exit("ABC123").await.unwrap();
        assert_eq!(receipt.minutes, 3);
        assert_eq!(receipt.amount, 0.15);
        assert_eq!(receipt.slot_code, "A01");
        assert_eq!(receipt.check_out_at, start() + Duration::seconds(130));

        let slots = engine.list_slots().await;
        assert!(!slots[0].occupied);
        assert!(slots[0].plate.is_none());

        let second = engine.register_entry("XYZ999", None).await.unwrap();
        assert_eq!(second.session.slot_code, "A01");
    }

    #[tokio::test]
    async fn test_entry_is_idempotent() {
        let (engine, clock) = engine(&lot(&["A01", "A02"], 0.05));

        let first = engine.register_entry(" abc123 ", None).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = engine.register_entry("ABC123", None).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.session, second.session);
        assert_eq!(engine.overview().await.occupied, 1);
    }

    #[tokio::test]
    async fn test_plate_required() {
        let (engine, _) = engine(&lot(&["A01"], 0.05));

        assert_eq!(
            engine.register_entry("   ", None).await,
            Err(ParkingError::PlateRequired)
        );
        assert_eq!(
            engine.register_exit("").await,
            Err(ParkingError::PlateRequired)
        );
        assert_eq!(engine.overview().await.occupied, 0);
    }

    #[tokio::test]
    async fn test_exit_without_entry() {
        let (engine, _) = engine(&lot(&["A01"], 0.05));

        let err = engine.register_exit("NEVERSEEN").await.unwrap_err();

        assert_eq!(
            err,
            ParkingError::ActiveSessionNotFound {
                plate: Plate::normalize("NEVERSEEN").unwrap()
            }
        );
    }

    #[tokio::test]
    async fn test_second_exit_fails() {
        let (engine, _) = engine(&lot(&["A01"], 0.05));
        engine.register_entry("ABC123", None).await.unwrap();
        engine.register_exit("ABC123").await.unwrap();

        assert!(matches!(
            engine.register_exit("ABC123").await,
            Err(ParkingError::ActiveSessionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_minimum_charge_on_immediate_exit() {
        let (engine, _) = engine(&lot(&["A01"], 0.05));
        engine.register_entry("ABC123", None).await.unwrap();

        let receipt = engine.register_exit("ABC123").await.unwrap();

        assert_eq!(receipt.minutes, 1);
        assert_eq!(receipt.amount, 0.05);
    }

    #[tokio::test]
    async fn test_overview_accounting() {
        let (engine, _) = engine(&lot(&["A01", "A02", "A03", "B01", "B02"], 0.05));
        engine.register_entry("ONE", None).await.unwrap();
        engine.register_entry("TWO", None).await.unwrap();

        let overview = engine.overview().await;

        assert_eq!(overview.total, 5);
        assert_eq!(overview.occupied, 2);
        assert_eq!(overview.free, 3);
        assert_eq!(overview.active_vehicles, 2);
        assert_eq!(overview.occupancy_percent, 40.0);
        assert_eq!(overview.rate_per_minute, 0.05);
    }

    #[tokio::test]
    async fn test_overview_of_empty_lot() {
        let (engine, _) = engine(&lot(&[], 0.05));

        let overview = engine.overview().await;

        assert_eq!(overview.total, 0);
        assert_eq!(overview.free, 0);
        assert_eq!(overview.occupancy_percent, 0.0);
        assert_eq!(
            engine.register_entry("ABC123", None).await,
            Err(ParkingError::NoSlotsAvailable {
                vehicle_class: VehicleClass::Car
            })
        );
    }

    #[tokio::test]
    async fn test_occupancy_percent_is_rounded() {
        let (engine, _) = engine(&lot(&["A01", "A02", "A03"], 0.05));
        engine.register_entry("ONE", None).await.unwrap();

        assert_eq!(engine.overview().await.occupancy_percent, 33.33);
    }

    #[tokio::test]
    async fn test_list_slots_joins_plates() {
        let (engine, _) = engine(&lot(&["B01", "A01"], 0.05));
        engine.register_entry("abc123", None).await.unwrap();

        let slots = engine.list_slots().await;

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].code, "A01");
        assert!(slots[0].occupied);
        assert_eq!(slots[0].plate.as_ref().map(Plate::as_str), Some("ABC123"));
        assert_eq!(slots[1].code, "B01");
        assert!(!slots[1].occupied);
        assert!(slots[1].plate.is_none());
    }

    #[tokio::test]
    async fn test_vehicle_classes_use_their_own_slots_and_rates() {
        let config = LotConfig {
            slots: vec![
                SlotSpec::new("A01", VehicleClass::Car),
                SlotSpec::new("M01", VehicleClass::Motorcycle),
            ],
            rates: RateTable::flat(0.05)
                .unwrap()
                .with_class_rate(VehicleClass::Motorcycle, 0.02)
                .unwrap(),
            default_class: VehicleClass::Car,
        };
        let (engine, clock) = engine(&config);

        let moto = engine
            .register_entry("MOTO1", Some(VehicleClass::Motorcycle))
            .await
            .unwrap();
        assert_eq!(moto.session.slot_code, "M01");
        assert_eq!(moto.session.rate_per_minute, 0.02);

        assert_eq!(
            engine
                .register_entry("MOTO2", Some(VehicleClass::Motorcycle))
                .await,
            Err(ParkingError::NoSlotsAvailable {
                vehicle_class: VehicleClass::Motorcycle
            })
        );
        assert_eq!(
            engine.register_entry("TRUCK1", Some(VehicleClass::Truck)).await,
            Err(ParkingError::NoSlotsAvailable {
                vehicle_class: VehicleClass::Truck
            })
        );

        clock.advance(Duration::minutes(10));
        let receipt = engine.register_exit("MOTO1").await.unwrap();
        assert_eq!(receipt.minutes, 10);
        assert_eq!(receipt.amount, 0.2);

        let by_class = engine.occupancy_by_class().await;
        assert_eq!(by_class[&VehicleClass::Motorcycle].occupied, 0);
        assert_eq!(by_class[&VehicleClass::Car].total, 1);
    }

    #[tokio::test]
    async fn test_recent_sessions() {
        let (engine, clock) = engine(&lot(&["A01", "A02"], 0.05));
        engine.register_entry("FIRST", None).await.unwrap();
        clock.advance(Duration::minutes(1));
        engine.register_entry("SECOND", None).await.unwrap();
        clock.advance(Duration::minutes(1));
        engine.register_exit("FIRST").await.unwrap();

        let desc = engine.recent_sessions(5, SortOrder::Desc).await;
        assert_eq!(desc.len(), 2);
        assert_eq!(desc[0].plate.as_str(), "SECOND");
        assert!(desc[0].check_out_at.is_none());
        assert_eq!(desc[1].plate.as_str(), "FIRST");
        assert_eq!(desc[1].amount, Some(0.1));

        let asc = engine.recent_sessions(5, SortOrder::Asc).await;
        assert_eq!(asc[0].plate.as_str(), "FIRST");

        let newest = engine.recent_sessions(0, SortOrder::Asc).await;
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].plate.as_str(), "SECOND");
    }

    #[tokio::test]
    async fn test_clock_going_backwards_charges_minimum() {
        let (engine, clock) = engine(&lot(&["A01"], 0.05));
        engine.register_entry("ABC123", None).await.unwrap();
        clock.set(start() - Duration::minutes(5));

        let receipt = engine.register_exit("ABC123").await.unwrap();

        assert_eq!(receipt.minutes, 1);
        assert_eq!(receipt.amount, 0.05);
    }

    #[test]
    fn test_failed_session_open_rolls_back_reservation() {
        let mut state = LotState {
            slots: SlotRegistry::new(&[
                SlotSpec::new("A01", VehicleClass::Car),
                SlotSpec::new("A02", VehicleClass::Car),
            ])
            .unwrap(),
            ledger: SessionLedger::new(),
        };
        let plate = Plate::normalize("ABC123").unwrap();

        let first = admit(&mut state, plate.clone(), VehicleClass::Car, 0.05, start()).unwrap();
        let second = admit(&mut state, plate, VehicleClass::Car, 0.05, start()).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.session, first.session);
        assert_eq!(state.slots.occupied_count(), 1);
        assert!(!state.slots.get("A02").unwrap().is_occupied());
        assert_eq!(state.ledger.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_entries_never_share_a_slot() {
        let codes: Vec<String> = (1..=10).map(|i| format!("A{:02}", i)).collect();
        let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let (engine, _) = engine(&lot(&code_refs, 0.05));

        let handles: Vec<_> = (0..25)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.register_entry(&format!("CAR{}", i), None).await })
            })
            .collect();

        let mut assigned = HashSet::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => assert!(assigned.insert(outcome.session.slot_code)),
                Err(ParkingError::NoSlotsAvailable { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(assigned.len(), 10);
        assert_eq!(rejected, 15);
        let overview = engine.overview().await;
        assert_eq!(overview.occupied, 10);
        assert_eq!(overview.active_vehicles, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exits_keep_stores_consistent() {
        let codes: Vec<String> = (1..=8).map(|i| format!("A{:02}", i)).collect();
        let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let (engine, _) = engine(&lot(&code_refs, 0.05));
        for i in 0..8 {
            engine.register_entry(&format!("CAR{}", i), None).await.unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.register_exit(&format!("CAR{}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let overview = engine.overview().await;
        assert_eq!(overview.occupied, 0);
        assert_eq!(overview.active_vehicles, 0);
        assert!(engine.list_slots().await.iter().all(|slot| slot.plate.is_none()));
    }
}
