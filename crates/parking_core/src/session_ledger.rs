use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::fee::Fee;
use crate::types::{LedgerError, Plate, Session, SortOrder, VehicleClass};

/// Owns every parking session, open and closed.
///
/// Sessions are appended in check-in order and never removed; the open
/// index guarantees at most one open session per plate.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    sessions: Vec<Session>,
    open_by_plate: HashMap<Plate, usize>,
}

/// Parameters of a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Ticket id, already recorded on the reserved slot
    pub ticket: Uuid,
    /// Normalized plate
    pub plate: Plate,
    /// Reserved slot code
    pub slot_code: String,
    /// Class the vehicle was admitted under
    pub vehicle_class: VehicleClass,
    /// Rate captured for the whole stay
    pub rate_per_minute: f64,
    /// Check-in timestamp
    pub check_in_at: DateTime<Utc>,
}

impl SessionLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// The open session for `plate`, if any
    pub fn find_open(&self, plate: &Plate) -> Option<&Session> {
        self.open_by_plate
            .get(plate)
            .map(|&index| &self.sessions[index])
    }

    /// Opens a session. An existing open session for the same plate is
    /// returned inside [`LedgerError::DuplicateActiveSession`] instead.
    pub fn open(&mut self, new: NewSession) -> Result<Session, LedgerError> {
        if let Some(existing) = self.find_open(&new.plate) {
            return Err(LedgerError::DuplicateActiveSession(Box::new(
                existing.clone(),
            )));
        }

        let session = Session {
            ticket: new.ticket,
            plate: new.plate,
            slot_code: new.slot_code,
            vehicle_class: new.vehicle_class,
            rate_per_minute: new.rate_per_minute,
            check_in_at: new.check_in_at,
            check_out_at: None,
            minutes: None,
            amount: None,
        };

        self.open_by_plate
            .insert(session.plate.clone(), self.sessions.len());
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// Closes the open session for `plate`, recording check-out and the billed fee.
    pub fn close(
        &mut self,
        plate: &Plate,
        check_out_at: DateTime<Utc>,
        fee: Fee,
    ) -> Result<Session, LedgerError> {
        let index = self
            .open_by_plate
            .remove(plate)
            .ok_or_else(|| LedgerError::ActiveSessionNotFound(plate.clone()))?;

        let session = &mut self.sessions[index];
        session.check_out_at = Some(check_out_at);
        session.minutes = Some(fee.minutes);
        session.amount = Some(fee.amount);
        Ok(session.clone())
    }

    /// The `limit` most recent sessions by check-in, returned in `order`.
    pub fn recent(&self, limit: usize, order: SortOrder) -> Vec<Session> {
        let mut indices: Vec<usize> = (0..self.sessions.len()).collect();
        // stable: equal check-ins keep insertion order
        indices.sort_by_key(|&index| self.sessions[index].check_in_at);

        let start = indices.len().saturating_sub(limit);
        let mut picked: Vec<Session> = indices[start..]
            .iter()
            .map(|&index| self.sessions[index].clone())
            .collect();

        if order == SortOrder::Desc {
            picked.reverse();
        }
        picked
    }

    /// Every open session, in no particular order
    pub fn open_sessions(&self) -> impl Iterator<Item = &Session> {
        self.open_by_plate
            .values()
            .map(|&index| &self.sessions[index])
    }

    /// Distinct plates with an open session
    pub fn open_count(&self) -> usize {
        self.open_by_plate.len()
    }

    /// All sessions ever opened
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session was ever opened
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
