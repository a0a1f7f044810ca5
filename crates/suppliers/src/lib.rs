//! Supplier registry domain module.
//!
//! Suppliers exist independently of supply orders; an order references a
//! supplier only once it is authorized for placement.

pub mod supplier;

pub use supplier::{
    ContactInfo, RegisterSupplier, Supplier, SupplierCommand, SupplierDetailsUpdated,
    SupplierEvent, SupplierId, SupplierRegistered, UpdateSupplierDetails,
};
