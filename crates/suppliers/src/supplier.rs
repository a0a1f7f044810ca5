use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libram_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use libram_events::Event;

/// Supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    contact: ContactInfo,
    version: u64,
    created: bool,
}

impl Supplier {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSupplierDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSupplierDetails {
    pub supplier_id: SupplierId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    UpdateSupplierDetails(UpdateSupplierDetails),
}

/// Event: SupplierRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDetailsUpdated {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    SupplierDetailsUpdated(SupplierDetailsUpdated),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::SupplierDetailsUpdated(_) => "suppliers.supplier.details_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::SupplierDetailsUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.created = true;
            }
            SupplierEvent::SupplierDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::UpdateSupplierDetails(cmd) => self.handle_update(cmd),
        }
    }
}

impl Supplier {
    fn ensure_supplier_id(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if self.id != supplier_id {
            return Err(DomainError::invariant("supplier_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let contact = cmd.contact.clone().unwrap_or_default();

        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(
        &self,
        cmd: &UpdateSupplierDetails,
    ) -> Result<Vec<SupplierEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_supplier_id(cmd.supplier_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_contact = cmd.contact.clone().unwrap_or_else(|| self.contact.clone());

        Ok(vec![SupplierEvent::SupplierDetailsUpdated(
            SupplierDetailsUpdated {
                supplier_id: cmd.supplier_id,
                name: new_name,
                contact: new_contact,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libram_core::AggregateId;

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn register_supplier_emits_supplier_registered_event() {
        let supplier = Supplier::empty(test_supplier_id());
        let supplier_id = test_supplier_id();
        let contact = ContactInfo {
            email: Some("orders@inkwell.example".to_string()),
            phone: Some("+123456789".to_string()),
        };
        let cmd = RegisterSupplier {
            supplier_id,
            name: "Inkwell Distribution".to_string(),
            contact: Some(contact.clone()),
            occurred_at: test_time(),
        };

        let events = supplier
            .handle(&SupplierCommand::RegisterSupplier(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            SupplierEvent::SupplierRegistered(e) => {
                assert_eq!(e.supplier_id, supplier_id);
                assert_eq!(e.name, "Inkwell Distribution");
                assert_eq!(e.contact, contact);
            }
            _ => panic!("Expected SupplierRegistered event"),
        }
    }

    #[test]
    fn register_supplier_rejects_empty_name() {
        let supplier = Supplier::empty(test_supplier_id());
        let cmd = RegisterSupplier {
            supplier_id: test_supplier_id(),
            name: "   ".to_string(),
            contact: None,
            occurred_at: test_time(),
        };

        let err = supplier
            .handle(&SupplierCommand::RegisterSupplier(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn register_supplier_rejects_duplicate_creation() {
        let mut supplier = Supplier::empty(test_supplier_id());
        let cmd = RegisterSupplier {
            supplier_id: test_supplier_id(),
            name: "Inkwell Distribution".to_string(),
            contact: None,
            occurred_at: test_time(),
        };

        let events = supplier
            .handle(&SupplierCommand::RegisterSupplier(cmd.clone()))
            .unwrap();
        supplier.apply(&events[0]);

        let err = supplier
            .handle(&SupplierCommand::RegisterSupplier(cmd))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate creation"),
        }
    }

    #[test]
    fn update_details_updates_name_and_contact() {
        let mut supplier = Supplier::empty(test_supplier_id());
        let supplier_id = test_supplier_id();

        let register_cmd = RegisterSupplier {
            supplier_id,
            name: "Old Name".to_string(),
            contact: None,
            occurred_at: test_time(),
        };
        let events = supplier
            .handle(&SupplierCommand::RegisterSupplier(register_cmd))
            .unwrap();
        supplier.apply(&events[0]);

        let new_contact = ContactInfo {
            email: Some("new@example.com".to_string()),
            phone: None,
        };
        let update_cmd = UpdateSupplierDetails {
            supplier_id,
            name: Some("New Name".to_string()),
            contact: Some(new_contact.clone()),
            occurred_at: test_time(),
        };

        let events = supplier
            .handle(&SupplierCommand::UpdateSupplierDetails(update_cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            SupplierEvent::SupplierDetailsUpdated(e) => {
                assert_eq!(e.name, "New Name");
                assert_eq!(e.contact, new_contact);
            }
            _ => panic!("Expected SupplierDetailsUpdated event"),
        }
    }

    #[test]
    fn update_details_rejects_non_existent_supplier() {
        let supplier = Supplier::empty(test_supplier_id());
        let cmd = UpdateSupplierDetails {
            supplier_id: test_supplier_id(),
            name: Some("Anything".to_string()),
            contact: None,
            occurred_at: test_time(),
        };

        let err = supplier
            .handle(&SupplierCommand::UpdateSupplierDetails(cmd))
            .unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound error for non-existent supplier"),
        }
    }

    #[test]
    fn version_increments_on_apply() {
        let mut supplier = Supplier::empty(test_supplier_id());
        assert_eq!(supplier.version(), 0);

        let supplier_id = test_supplier_id();
        let register_cmd = RegisterSupplier {
            supplier_id,
            name: "Inkwell Distribution".to_string(),
            contact: None,
            occurred_at: test_time(),
        };
        let events = supplier
            .handle(&SupplierCommand::RegisterSupplier(register_cmd))
            .unwrap();
        supplier.apply(&events[0]);
        assert_eq!(supplier.version(), 1);

        let update_cmd = UpdateSupplierDetails {
            supplier_id,
            name: Some("Inkwell & Sons".to_string()),
            contact: None,
            occurred_at: test_time(),
        };
        let events = supplier
            .handle(&SupplierCommand::UpdateSupplierDetails(update_cmd))
            .unwrap();
        supplier.apply(&events[0]);
        assert_eq!(supplier.version(), 2);
    }
}
