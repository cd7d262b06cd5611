//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Config error - bundle missing, unreadable or invalid
pub const CONFIG_ERROR: i32 = 2;

/// Tool error - helm or kubectl is not installed
pub const TOOL_MISSING: i32 = 3;

/// Cluster error - a cluster read or an external command failed
pub const CLUSTER_ERROR: i32 = 4;

/// Chart error - a chart install stopped the run
pub const CHART_ERROR: i32 = 5;

/// Partial failure - the run finished but some components recorded errors
pub const PARTIAL_FAILURE: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by Ctrl-C (128 + SIGINT)
pub const CANCELLED: i32 = 130;
