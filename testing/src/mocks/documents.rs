use super::{FaultSlot, lock};
use repairdesk_core::error::StoreError;
use repairdesk_core::providers::{DocumentGenerator, ReceiptSnapshot, StoreResult};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Document generator that renders nothing and remembers what it was given.
///
/// References look like `receipt://OT-00000001/1`.
#[derive(Debug, Clone, Default)]
pub struct StubDocumentGenerator {
    rendered: Arc<Mutex<Vec<ReceiptSnapshot>>>,
    failing_render: FaultSlot,
}

impl StubDocumentGenerator {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots received so far.
    #[must_use]
    pub fn rendered(&self) -> Vec<ReceiptSnapshot> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Make the next render fail with `error`.
    pub fn fail_next_render(&self, error: StoreError) {
        self.failing_render.arm(error);
    }
}

impl DocumentGenerator for StubDocumentGenerator {
    fn render_receipt(
        &self,
        snapshot: &ReceiptSnapshot,
    ) -> impl Future<Output = StoreResult<String>> + Send {
        let rendered = Arc::clone(&self.rendered);
        let fault = self.failing_render.clone();
        let snapshot = snapshot.clone();

        async move {
            fault.take()?;
            let mut rendered = lock(&rendered)?;
            let reference = format!("receipt://{}/{}", snapshot.order.ticket, rendered.len() + 1);
            rendered.push(snapshot);
            Ok(reference)
        }
    }
}
