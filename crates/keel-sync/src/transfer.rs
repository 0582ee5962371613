//! # Transfer Service Seam
//!
//! The transfer service performs the actual network upload. The engine only
//! hands it [`UploadRequest`]s, always from the dispatcher task, and expects
//! completions back through `AutoUpdateManager::on_upload_succeeded`.
//!
//! A request may be submitted more than once (immediate submit plus periodic
//! resubmission); implementations must treat repeats as harmless.

use std::sync::Arc;
use tokio::sync::RwLock;

use keel_core::UploadRequest;

/// External upload executor.
pub trait TransferService: Send + Sync {
    /// Queues an upload. Fire-and-forget; must not block for long.
    fn add_upload_task(&self, request: UploadRequest);
}

impl<F> TransferService for F
where
    F: Fn(UploadRequest) + Send + Sync,
{
    fn add_upload_task(&self, request: UploadRequest) {
        self(request)
    }
}

/// Slot holding the attached transfer service, shared by the manager, the
/// scheduler and the dispatcher.
pub(crate) type TransferSlot = Arc<RwLock<Option<Arc<dyn TransferService>>>>;

pub(crate) fn empty_slot() -> TransferSlot {
    Arc::new(RwLock::new(None))
}
