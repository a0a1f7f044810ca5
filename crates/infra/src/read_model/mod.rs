mod store;

pub use store::{InMemoryStore, Store};
