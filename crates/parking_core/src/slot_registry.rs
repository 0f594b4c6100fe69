use std::collections::BTreeMap;

use uuid::Uuid;

use crate::types::{ClassOccupancy, ConfigError, Slot, SlotError, SlotSpec, VehicleClass};

/// Owns the fixed set of slots and their occupancy.
///
/// Slots are kept ordered by code so that allocation always picks the
/// lexicographically smallest free slot of the requested class.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    slots: BTreeMap<String, Slot>,
}

impl SlotRegistry {
    /// Builds the registry from a slot catalog.
    pub fn new(catalog: &[SlotSpec]) -> Result<Self, ConfigError> {
        let mut slots = BTreeMap::new();
        for spec in catalog {
            let code = spec.code.trim().to_uppercase();
            if code.is_empty() {
                return Err(ConfigError::EmptySlotCode);
            }
            if slots.contains_key(&code) {
                return Err(ConfigError::DuplicateSlotCode(code));
            }
            slots.insert(
                code.clone(),
                Slot {
                    code,
                    vehicle_class: spec.vehicle_class,
                    current_ticket: None,
                },
            );
        }
        Ok(Self { slots })
    }

    /// Marks the first free slot accepting `vehicle_class` as occupied by `ticket`.
    pub fn reserve(&mut self, vehicle_class: VehicleClass, ticket: Uuid) -> Result<Slot, SlotError> {
        let slot = self
            .slots
            .values_mut()
            .find(|slot| slot.vehicle_class == vehicle_class && !slot.is_occupied())
            .ok_or(SlotError::SlotsExhausted(vehicle_class))?;

        slot.current_ticket = Some(ticket);
        log::debug!("Reserved slot {} for ticket {}", slot.code, ticket);
        Ok(slot.clone())
    }

    /// Frees the slot. Releasing a free slot reports [`SlotError::AlreadyFree`]
    /// without changing anything.
    pub fn release(&mut self, slot_code: &str) -> Result<Slot, SlotError> {
        let slot = self
            .slots
            .get_mut(slot_code)
            .ok_or_else(|| SlotError::UnknownSlot(slot_code.to_string()))?;

        if slot.current_ticket.take().is_none() {
            return Err(SlotError::AlreadyFree(slot_code.to_string()));
        }
        log::debug!("Released slot {}", slot.code);
        Ok(slot.clone())
    }

    /// Snapshot of one slot
    pub fn get(&self, slot_code: &str) -> Option<&Slot> {
        self.slots.get(slot_code)
    }

    /// Snapshot of every slot, ordered by code.
    pub fn list(&self) -> Vec<Slot> {
        self.slots.values().cloned().collect()
    }

    /// Number of slots in the lot
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots
    pub fn occupied_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_occupied()).count()
    }

    /// Occupied and total slots per vehicle class present in the catalog
    pub fn occupancy_by_class(&self) -> BTreeMap<VehicleClass, ClassOccupancy> {
        let mut summary: BTreeMap<VehicleClass, ClassOccupancy> = BTreeMap::new();
        for slot in self.slots.values() {
            let entry = summary.entry(slot.vehicle_class).or_default();
            entry.total += 1;
            if slot.is_occupied() {
                entry.occupied += 1;
            }
        }
        summary
    }
}
