pub mod counters;
pub mod invoices;
pub mod trips;
