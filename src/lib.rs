// Inbound update model and classification
pub mod event;

// User registry, permission matrix and evaluation
pub mod access;

// Lifecycle state store (Redis / in-memory)
pub mod lifecycle;

// Wake/buffer protocol for idle assets
pub mod wake;

// Routing decision
pub mod router;

// Relay to agent and coordinator
pub mod forward;

// HTTP API
pub mod api;

// Process configuration
pub mod config;

// Access config hot reload
pub mod reload;
