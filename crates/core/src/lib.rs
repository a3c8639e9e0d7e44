pub mod command;
pub mod config;
pub mod metrics;
pub mod storage;
pub mod sync;
pub mod testing;
pub mod transfer;

pub use command::{
    is_error_output, CommandConfig, CommandError, CommandRunner, GridCommand, ProcessRunner,
    RunMode,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, MetricsConfig,
};
pub use storage::{storage_key, StorageElement, StorageError, StorageRegistry};
pub use sync::{
    run_number, run_range, DirectoryLister, DirectorySnapshot, FileEntry, KnownGoodList,
    LfcDirectoryLister, SyncConfig, SyncDriver, SyncError, SyncFilter, SyncPhase, SyncReport,
    TransferMode,
};
pub use transfer::{
    count_pending, ChannelKey, ChannelQuotaMonitor, EnqueueOutcome, FlushOutcome, FlushTrigger,
    FtsProtocol, OpenChannels, QuotaConfig, SubmissionLog, TransferConfig, TransferError,
    TransferLedger, TransferRequest, TransferSubmitter,
};
