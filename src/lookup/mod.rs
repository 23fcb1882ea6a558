// Lookup module - address resolution and network registry queries

pub mod resolver;
pub mod whois;
