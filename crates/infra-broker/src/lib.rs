// Hookbridge Infrastructure - In-Process Broker Adapter
// Implements: BrokerConnector, MessagePublisher

pub mod in_memory;

pub use in_memory::InMemoryBroker;
