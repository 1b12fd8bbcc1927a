use chrono::{Datelike, Utc};
use tracing::debug;

use crate::{error::AppError, services::counters::CounterStore};

pub const INVOICE_COUNTER_KEY: &str = "invoiceCounter";

/// Sequential, human-legible invoice numbers: `{prefix}{year}{counter:04}`.
///
/// Allocation is never rolled back. If the trip entry that should carry an
/// allocated number fails to save, that number stays consumed and the
/// sequence shows a gap.
#[derive(Clone)]
pub struct InvoiceAllocator {
    counters: CounterStore,
    prefix: String,
}

impl InvoiceAllocator {
    pub fn new(counters: CounterStore, prefix: impl Into<String>) -> Self {
        Self {
            counters,
            prefix: prefix.into(),
        }
    }

    /// Read-only: repeated peeks return the same number until someone
    /// allocates.
    pub async fn peek_current(&self) -> Result<(i64, String), AppError> {
        let value = self.counters.get(INVOICE_COUNTER_KEY).await?;
        Ok((value, self.format_invoice(value)))
    }

    pub async fn allocate_next(&self) -> Result<(i64, String), AppError> {
        let value = self.counters.increment_and_get(INVOICE_COUNTER_KEY).await?;
        let formatted = self.format_invoice(value);
        debug!("allocated invoice {formatted}");
        Ok((value, formatted))
    }

    pub fn format_invoice(&self, number: i64) -> String {
        format_with_year(&self.prefix, Utc::now().year(), number)
    }
}

fn format_with_year(prefix: &str, year: i32, number: i64) -> String {
    format!("{prefix}{year}{number:04}")
}
