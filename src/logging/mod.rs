// SPDX-License-Identifier: Apache-2.0 OR MIT
// Structured, level-filtered logging for mcast
//
// Every component logs through a cloneable `Logger` tagged with a `Facility`.
// Console notices meant for the operator (banners, received datagrams) are
// printed by the binary, not logged.

mod entry;
mod facility;
mod logger;
#[macro_use]
mod macros;
mod severity;
mod sink;

pub use entry::{KeyValue, LogEntry};
pub use facility::Facility;
pub use logger::Logger;
pub use severity::Severity;
pub use sink::{JsonSink, LogSink, MemorySink, TextSink};
