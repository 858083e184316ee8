//! System log emission
//!
//! Every accepted record is also emitted as a `tracing` event so it ends up in
//! whatever system log the host has installed (see [`init_system_log`]).
//! Emission is fire-and-forget.
//!
//! [`init_system_log`]: super::init_system_log

use super::record::{LogRecord, SystemSeverity};

/// Emit a rendered record at the severity mapped from its level
pub fn emit(record: &LogRecord, description: &str) {
    let id = record.id;
    let log_level = record.level.as_str();
    match record.level.system_severity() {
        SystemSeverity::Fault => {
            tracing::error!(target: "logmirror::system", record_id = %id, log_level, fault = true, "{}", description)
        }
        SystemSeverity::Error => {
            tracing::error!(target: "logmirror::system", record_id = %id, log_level, "{}", description)
        }
        SystemSeverity::Notice => {
            tracing::warn!(target: "logmirror::system", record_id = %id, log_level, "{}", description)
        }
        SystemSeverity::Info => {
            tracing::info!(target: "logmirror::system", record_id = %id, log_level, "{}", description)
        }
        SystemSeverity::Debug => {
            tracing::debug!(target: "logmirror::system", record_id = %id, log_level, "{}", description)
        }
    }
}
