//! Stand-in transfer service for the agent.

use tracing::info;

use keel_core::UploadRequest;
use keel_sync::TransferService;

/// Logs each upload request. Completion is reported back by hand with the
/// `done` console command.
pub struct LoggingTransfer;

impl TransferService for LoggingTransfer {
    fn add_upload_task(&self, request: UploadRequest) {
        info!(
            account = %request.account,
            repo_id = %request.repo_id,
            repo_name = %request.repo_name,
            parent_dir = %request.parent_dir,
            local_path = %request.local_path,
            auto_update = request.is_auto_update,
            "Upload requested"
        );
    }
}
